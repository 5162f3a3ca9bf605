//! Window masking and shed/up potential per 15-minute sample.

use std::fmt;

use chrono::NaiveDateTime;
use tracing::info;

use crate::calendar::{Season, WindowCalendar, WindowMask};
use crate::config::PotentialConfig;
use crate::decompose::DecomposedSample;
use crate::series::interval_energy_to_power;

/// Simulator output for one 15-minute sample. Power fields are in kW.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PotentialSample {
    pub timestamp: NaiveDateTime,
    pub season: Season,
    /// Resolved window membership; `shed && up` is never true.
    pub mask: WindowMask,
    /// Shed potential, zero outside the shed window.
    pub q_shed_kw: f64,
    /// Up potential, zero outside the up window.
    pub q_up_kw: f64,
    pub it_kw: f64,
    pub cooling_kw: f64,
    pub other_kw: f64,
}

impl PotentialSample {
    pub fn total_kw(&self) -> f64 {
        self.it_kw + self.cooling_kw + self.other_kw
    }
}

impl fmt::Display for PotentialSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<6} shed={:<5} up={:<5} Q_shed={:>9.2} kW  Q_up={:>9.2} kW",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.season,
            self.mask.shed,
            self.mask.up,
            self.q_shed_kw,
            self.q_up_kw
        )
    }
}

/// Shed potential of one sample: `α_IT · IT + α_cool(season) · Cooling + ESS`.
pub fn shed_potential(config: &PotentialConfig, season: Season, it_kw: f64, cooling_kw: f64) -> f64 {
    config.alpha_it * it_kw + config.alpha_cool(season) * cooling_kw + config.ess_fixed_kw
}

/// Up potential of one sample: `α_IT,forward · IT + ESS`.
pub fn up_potential(config: &PotentialConfig, it_kw: f64) -> f64 {
    config.alpha_it_forward * it_kw + config.ess_fixed_kw
}

/// Builds the potential sample for one decomposed interval.
///
/// Returns the sample and whether a shed/up overlap had to be resolved.
pub fn evaluate(
    row: &DecomposedSample,
    calendar: &WindowCalendar,
    config: &PotentialConfig,
) -> (PotentialSample, bool) {
    let season = Season::of(&row.timestamp);
    let (mask, overlapped) = calendar.raw_mask(&row.timestamp).resolve_overlap();

    let it_kw = interval_energy_to_power(row.it_kwh);
    let cooling_kw = interval_energy_to_power(row.cooling_kwh);
    let other_kw = interval_energy_to_power(row.other_kwh);

    let q_shed_kw = if mask.shed {
        shed_potential(config, season, it_kw, cooling_kw)
    } else {
        0.0
    };
    let q_up_kw = if mask.up {
        up_potential(config, it_kw)
    } else {
        0.0
    };

    (
        PotentialSample {
            timestamp: row.timestamp,
            season,
            mask,
            q_shed_kw,
            q_up_kw,
            it_kw,
            cooling_kw,
            other_kw,
        },
        overlapped,
    )
}

/// Runs the simulator over a decomposed series, preserving order.
pub fn simulate(
    rows: &[DecomposedSample],
    calendar: &WindowCalendar,
    config: &PotentialConfig,
) -> Vec<PotentialSample> {
    let mut overlaps = 0usize;
    let out: Vec<PotentialSample> = rows
        .iter()
        .map(|row| {
            let (sample, overlapped) = evaluate(row, calendar, config);
            overlaps += usize::from(overlapped);
            sample
        })
        .collect();

    if overlaps > 0 {
        info!(overlaps, "resolved shed/up window overlaps in favour of shed");
    }
    let shed = out.iter().filter(|s| s.mask.shed).count();
    let up = out.iter().filter(|s| s.mask.up).count();
    info!(samples = out.len(), shed, up, "window potentials simulated");
    out
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    use super::*;
    use crate::calendar::{Direction, WindowRule};

    fn row(y: i32, m: u32, d: u32, h: u32, min: u32) -> DecomposedSample {
        let timestamp = NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .unwrap();
        DecomposedSample {
            timestamp,
            measured_kwh: 500.0,
            it_kwh: 300.0,
            cooling_kwh: 100.0,
            other_kwh: 100.0,
            temperature_c: 28.0,
            humidity_pct: 60.0,
            enthalpy: 65.0,
        }
    }

    #[test]
    fn summer_shed_uses_summer_cooling_fraction() {
        let cfg = PotentialConfig::default();
        // 2024-07-03 Wednesday 14:30
        let (s, overlapped) = evaluate(&row(2024, 7, 3, 14, 30), &WindowCalendar::standard(), &cfg);
        assert!(!overlapped);
        assert!(s.mask.shed && !s.mask.up);
        // IT 1200 kW, cooling 400 kW
        assert_abs_diff_eq!(s.q_shed_kw, 0.10 * 1200.0 + 0.15 * 400.0 + 1250.0, epsilon = 1e-9);
        assert_eq!(s.q_up_kw, 0.0);
        assert_abs_diff_eq!(s.total_kw(), 2000.0, epsilon = 1e-9);
    }

    #[test]
    fn winter_up_has_no_cooling_term() {
        let cfg = PotentialConfig::default();
        // 2024-12-04 Wednesday 12:00
        let (s, _) = evaluate(&row(2024, 12, 4, 12, 0), &WindowCalendar::standard(), &cfg);
        assert!(s.mask.up && !s.mask.shed);
        assert_abs_diff_eq!(s.q_up_kw, 0.10 * 1200.0 + 1250.0, epsilon = 1e-9);
        assert_eq!(s.q_shed_kw, 0.0);
    }

    #[test]
    fn overlapping_rules_resolve_to_shed() {
        let rules = vec![
            WindowRule::new(Season::Fall, Direction::Shed, &[9]),
            WindowRule::new(Season::Fall, Direction::Up, &[9]),
        ];
        let calendar = WindowCalendar::from_rules(&rules, true);
        let cfg = PotentialConfig::default();
        // 2024-10-02 Wednesday 09:15
        let out = simulate(&[row(2024, 10, 2, 9, 15)], &calendar, &cfg);
        assert!(out[0].mask.shed);
        assert!(!out[0].mask.up);
        assert_eq!(out[0].q_up_kw, 0.0);
        assert!(out[0].q_shed_kw > 0.0);
    }

    #[test]
    fn potentials_are_zero_outside_windows() {
        let cfg = PotentialConfig::default();
        let calendar = WindowCalendar::standard();
        let mut rows = Vec::new();
        // One full week in each season, every hour.
        for (m, first_day) in [(1, 8), (4, 8), (7, 8), (10, 7)] {
            for d in first_day..first_day + 7 {
                for h in 0..24 {
                    rows.push(row(2024, m, d, h, 0));
                }
            }
        }
        for s in simulate(&rows, &calendar, &cfg) {
            assert!(!(s.mask.shed && s.mask.up));
            if !s.mask.shed {
                assert_eq!(s.q_shed_kw, 0.0, "{s}");
            }
            if !s.mask.up {
                assert_eq!(s.q_up_kw, 0.0, "{s}");
            }
        }
    }

    #[test]
    fn weekend_sample_is_outside_all_windows() {
        let cfg = PotentialConfig::default();
        // 2024-07-06 Saturday 14:00
        let (s, _) = evaluate(&row(2024, 7, 6, 14, 0), &WindowCalendar::standard(), &cfg);
        assert_eq!(s.mask, WindowMask::default());
        assert_eq!(s.q_shed_kw, 0.0);
    }
}
