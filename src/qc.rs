//! Quality checks over simulator output.

use std::fmt;

use tracing::warn;

use crate::calendar::{Direction, Season, WindowCalendar};
use crate::config::QcConfig;
use crate::potential::PotentialSample;

/// Potentials below this magnitude count as zero.
pub const ZERO_TOLERANCE_KW: f64 = 1e-6;

/// Outcome of one check: number of offending samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub violations: usize,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.violations == 0
    }
}

/// Total-power range observed over the series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerRange {
    pub min_kw: f64,
    pub max_kw: f64,
    pub mean_kw: f64,
    /// Whether `[min, max]` lies strictly inside the configured sanity band.
    pub in_band: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QcReport {
    pub checks: Vec<CheckResult>,
    /// Advisory only; never fails the report.
    pub power: Option<PowerRange>,
}

impl QcReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(CheckResult::passed)
    }
}

impl fmt::Display for QcReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Quality Control ---")?;
        for check in &self.checks {
            if check.passed() {
                writeln!(f, "PASS  {}", check.name)?;
            } else {
                writeln!(f, "FAIL  {} ({} samples)", check.name, check.violations)?;
            }
        }
        match &self.power {
            Some(p) => write!(
                f,
                "{}  total power min={:.2} max={:.2} mean={:.2} kW",
                if p.in_band { "PASS" } else { "WARN" },
                p.min_kw,
                p.max_kw,
                p.mean_kw
            ),
            None => write!(f, "WARN  total power (no samples)"),
        }
    }
}

/// Runs every check over the simulator output.
pub fn check(samples: &[PotentialSample], calendar: &WindowCalendar, config: &QcConfig) -> QcReport {
    let outside = |direction: Direction| {
        samples
            .iter()
            .filter(|s| !s.mask.is_active(direction) && potential(s, direction).abs() > ZERO_TOLERANCE_KW)
            .count()
    };

    let no_up_window: Vec<Season> = Season::ALL
        .into_iter()
        .filter(|&season| !calendar.has_window(season, Direction::Up))
        .collect();
    let stray_up = samples
        .iter()
        .filter(|s| no_up_window.contains(&s.season) && s.q_up_kw.abs() > ZERO_TOLERANCE_KW)
        .count();

    let overlap = samples.iter().filter(|s| s.mask.shed && s.mask.up).count();

    let checks = vec![
        CheckResult {
            name: "shed potential is zero outside shed windows",
            violations: outside(Direction::Shed),
        },
        CheckResult {
            name: "up potential is zero outside up windows",
            violations: outside(Direction::Up),
        },
        CheckResult {
            name: "no up potential in seasons without up windows",
            violations: stray_up,
        },
        CheckResult {
            name: "shed and up windows never overlap",
            violations: overlap,
        },
    ];

    let power = power_range(samples, config);
    if let Some(p) = power.as_ref().filter(|p| !p.in_band) {
        warn!(
            min_kw = p.min_kw,
            max_kw = p.max_kw,
            "total power outside expected band, check input units"
        );
    }
    for c in checks.iter().filter(|c| !c.passed()) {
        warn!(check = c.name, violations = c.violations, "quality check failed");
    }

    QcReport { checks, power }
}

fn potential(sample: &PotentialSample, direction: Direction) -> f64 {
    match direction {
        Direction::Shed => sample.q_shed_kw,
        Direction::Up => sample.q_up_kw,
    }
}

fn power_range(samples: &[PotentialSample], config: &QcConfig) -> Option<PowerRange> {
    if samples.is_empty() {
        return None;
    }
    let (min_kw, max_kw, sum) = samples.iter().map(PotentialSample::total_kw).fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(lo, hi, sum), p| (lo.min(p), hi.max(p), sum + p),
    );
    Some(PowerRange {
        min_kw,
        max_kw,
        mean_kw: sum / samples.len() as f64,
        in_band: min_kw > config.min_total_kw && max_kw < config.max_total_kw,
    })
}
