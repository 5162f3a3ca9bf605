//! Seasonal summaries of the simulated DR potential.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, TimeDelta};

use crate::calendar::{Direction, Season};
use crate::config::PotentialConfig;
use crate::potential::PotentialSample;
use crate::series::{INTERVAL_HOURS, INTERVAL_MINUTES, INTERVALS_PER_HOUR};
use crate::stats;

/// Distribution of in-window potential for one season and direction.
#[derive(Debug, Clone, PartialEq)]
pub struct PotentialStats {
    pub season: Season,
    pub direction: Direction,
    pub count: usize,
    pub mean_kw: f64,
    pub p90_kw: f64,
    pub p95_kw: f64,
    pub max_kw: f64,
    /// Sample standard deviation; 0 for a single sample.
    pub std_kw: f64,
    /// `std / mean`, or 0 when the mean is not positive.
    pub cv: f64,
}

/// Mean contribution of each resource to the potential.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentBreakdown {
    pub season: Season,
    pub direction: Direction,
    pub it_kw: f64,
    /// Always zero for up-regulation.
    pub cooling_kw: f64,
    pub ess_kw: f64,
}

impl ComponentBreakdown {
    pub fn total_kw(&self) -> f64 {
        self.it_kw + self.cooling_kw + self.ess_kw
    }
}

/// Energy of 1-hour dispatch blocks that fit entirely inside a window.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStats {
    pub season: Season,
    pub direction: Direction,
    pub count: usize,
    pub mean_kwh: f64,
    pub p90_kwh: f64,
    pub max_kwh: f64,
    /// Mean over days of the best block that day.
    pub daily_max_mean_kwh: f64,
}

fn potential(sample: &PotentialSample, direction: Direction) -> f64 {
    match direction {
        Direction::Shed => sample.q_shed_kw,
        Direction::Up => sample.q_up_kw,
    }
}

fn groups() -> impl Iterator<Item = (Season, Direction)> {
    Season::ALL
        .into_iter()
        .flat_map(|s| Direction::ALL.into_iter().map(move |d| (s, d)))
}

fn in_window<'a>(
    samples: &'a [PotentialSample],
    season: Season,
    direction: Direction,
) -> impl Iterator<Item = &'a PotentialSample> {
    samples
        .iter()
        .filter(move |s| s.season == season && s.mask.is_active(direction))
}

/// Statistics per (season, direction) that has at least one in-window sample.
pub fn potential_stats(samples: &[PotentialSample]) -> Vec<PotentialStats> {
    groups()
        .filter_map(|(season, direction)| {
            let mut values: Vec<f64> = in_window(samples, season, direction)
                .map(|s| potential(s, direction))
                .collect();
            if values.is_empty() {
                return None;
            }
            values.sort_by(f64::total_cmp);
            let mean_kw = stats::mean(&values)?;
            let std_kw = stats::sample_std(&values).unwrap_or(0.0);
            Some(PotentialStats {
                season,
                direction,
                count: values.len(),
                mean_kw,
                p90_kw: stats::percentile_sorted(&values, 0.90)?,
                p95_kw: stats::percentile_sorted(&values, 0.95)?,
                max_kw: *values.last()?,
                std_kw,
                cv: if mean_kw > 0.0 { std_kw / mean_kw } else { 0.0 },
            })
        })
        .collect()
}

/// Mean IT, cooling and storage share of in-window potential.
pub fn component_breakdown(
    samples: &[PotentialSample],
    config: &PotentialConfig,
) -> Vec<ComponentBreakdown> {
    groups()
        .filter_map(|(season, direction)| {
            let window: Vec<&PotentialSample> = in_window(samples, season, direction).collect();
            if window.is_empty() {
                return None;
            }
            let n = window.len() as f64;
            let it_sum: f64 = window.iter().map(|s| s.it_kw).sum();
            let cooling_sum: f64 = window.iter().map(|s| s.cooling_kw).sum();
            let (it_kw, cooling_kw) = match direction {
                Direction::Shed => (
                    config.alpha_it * it_sum / n,
                    config.alpha_cool(season) * cooling_sum / n,
                ),
                Direction::Up => (config.alpha_it_forward * it_sum / n, 0.0),
            };
            Some(ComponentBreakdown {
                season,
                direction,
                it_kw,
                cooling_kw,
                ess_kw: config.ess_fixed_kw,
            })
        })
        .collect()
}

/// Forward-looking 1-hour block starting at `start`, if it is valid.
///
/// Valid means the next four samples are consecutive at the 15-minute
/// cadence and all inside the window for `direction`. Returns the block
/// energy in kWh.
pub fn block_energy(samples: &[PotentialSample], start: usize, direction: Direction) -> Option<f64> {
    let block = samples.get(start..start + INTERVALS_PER_HOUR)?;
    let step = TimeDelta::minutes(INTERVAL_MINUTES);
    let contiguous = block
        .windows(2)
        .all(|pair| pair[1].timestamp - pair[0].timestamp == step);
    if !contiguous || !block.iter().all(|s| s.mask.is_active(direction)) {
        return None;
    }
    Some(block.iter().map(|s| potential(s, direction) * INTERVAL_HOURS).sum())
}

/// Block energy statistics per (season of the block start, direction).
pub fn hour_blocks(samples: &[PotentialSample]) -> Vec<BlockStats> {
    let mut energies: BTreeMap<(Season, Direction), Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for start in 0..samples.len() {
        for direction in Direction::ALL {
            if let Some(e) = block_energy(samples, start, direction) {
                let first = &samples[start];
                energies
                    .entry((first.season, direction))
                    .or_default()
                    .push((first.timestamp.date(), e));
            }
        }
    }

    groups()
        .filter_map(|key| {
            let blocks = energies.get(&key)?;
            let mut values: Vec<f64> = blocks.iter().map(|&(_, e)| e).collect();
            values.sort_by(f64::total_cmp);

            let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
            for &(day, e) in blocks {
                let best = daily.entry(day).or_insert(f64::NEG_INFINITY);
                *best = best.max(e);
            }
            let daily_max: Vec<f64> = daily.into_values().collect();

            Some(BlockStats {
                season: key.0,
                direction: key.1,
                count: values.len(),
                mean_kwh: stats::mean(&values)?,
                p90_kwh: stats::percentile_sorted(&values, 0.90)?,
                max_kwh: *values.last()?,
                daily_max_mean_kwh: stats::mean(&daily_max)?,
            })
        })
        .collect()
}

/// Report bundle of all three summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct PotentialSummary {
    pub stats: Vec<PotentialStats>,
    pub components: Vec<ComponentBreakdown>,
    pub blocks: Vec<BlockStats>,
}

impl PotentialSummary {
    pub fn from_samples(samples: &[PotentialSample], config: &PotentialConfig) -> Self {
        Self {
            stats: potential_stats(samples),
            components: component_breakdown(samples, config),
            blocks: hour_blocks(samples),
        }
    }
}

impl fmt::Display for PotentialSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- DR Potential (kW) ---")?;
        writeln!(
            f,
            "{:<8} {:<5} {:>6} {:>9} {:>9} {:>9} {:>9} {:>8} {:>6}",
            "Season", "Type", "n", "Mean", "P90", "P95", "Max", "Std", "CV"
        )?;
        for s in &self.stats {
            writeln!(
                f,
                "{:<8} {:<5} {:>6} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>8.2} {:>6.3}",
                s.season, s.direction, s.count, s.mean_kw, s.p90_kw, s.p95_kw, s.max_kw, s.std_kw, s.cv
            )?;
        }
        writeln!(f)?;
        writeln!(f, "--- Component Breakdown (mean kW) ---")?;
        writeln!(
            f,
            "{:<8} {:<5} {:>9} {:>9} {:>9} {:>9}",
            "Season", "Type", "IT", "Cooling", "ESS", "Total"
        )?;
        for c in &self.components {
            writeln!(
                f,
                "{:<8} {:<5} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
                c.season,
                c.direction,
                c.it_kw,
                c.cooling_kw,
                c.ess_kw,
                c.total_kw()
            )?;
        }
        writeln!(f)?;
        writeln!(f, "--- 1-Hour Blocks (kWh) ---")?;
        write!(
            f,
            "{:<8} {:<5} {:>6} {:>9} {:>9} {:>9} {:>10}",
            "Season", "Type", "n", "Mean", "P90", "Max", "Daily max"
        )?;
        for b in &self.blocks {
            write!(
                f,
                "\n{:<8} {:<5} {:>6} {:>9.2} {:>9.2} {:>9.2} {:>10.2}",
                b.season, b.direction, b.count, b.mean_kwh, b.p90_kwh, b.max_kwh, b.daily_max_mean_kwh
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDateTime;

    use super::*;
    use crate::calendar::WindowMask;

    fn at(d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .unwrap()
    }

    fn shed(ts: NaiveDateTime, q: f64) -> PotentialSample {
        PotentialSample {
            timestamp: ts,
            season: Season::of(&ts),
            mask: WindowMask {
                shed: q > 0.0,
                up: false,
            },
            q_shed_kw: q,
            q_up_kw: 0.0,
            it_kw: 2000.0,
            cooling_kw: 800.0,
            other_kw: 500.0,
        }
    }

    /// 13:00–14:45 in window (8 samples) followed by one sample outside.
    fn afternoon(day: u32) -> Vec<PotentialSample> {
        let mut out: Vec<PotentialSample> = (0..8)
            .map(|i| shed(at(day, 13, 0) + TimeDelta::minutes(15 * i), 1000.0 + 100.0 * i as f64))
            .collect();
        out.push(shed(at(day, 15, 0), 0.0));
        out
    }

    #[test]
    fn stats_cover_only_in_window_samples() {
        let samples = afternoon(3);
        let stats = potential_stats(&samples);
        assert_eq!(stats.len(), 1);
        let s = &stats[0];
        assert_eq!((s.season, s.direction), (Season::Summer, Direction::Shed));
        assert_eq!(s.count, 8);
        assert_abs_diff_eq!(s.mean_kw, 1350.0, epsilon = 1e-9);
        assert_eq!(s.max_kw, 1700.0);
        assert!(s.cv > 0.0);
    }

    #[test]
    fn breakdown_uses_season_alpha() {
        let samples = afternoon(3);
        let cfg = PotentialConfig::default();
        let b = &component_breakdown(&samples, &cfg)[0];
        assert_abs_diff_eq!(b.it_kw, 200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(b.cooling_kw, 120.0, epsilon = 1e-9);
        assert_eq!(b.ess_kw, 1250.0);
    }

    #[test]
    fn blocks_must_fit_inside_window() {
        let samples = afternoon(3);
        // starts 0..=4 are fully inside; start 5 would include the 15:00 sample
        assert!(block_energy(&samples, 4, Direction::Shed).is_some());
        assert!(block_energy(&samples, 5, Direction::Shed).is_none());
        assert_abs_diff_eq!(
            block_energy(&samples, 0, Direction::Shed).unwrap(),
            0.25 * (1000.0 + 1100.0 + 1200.0 + 1300.0),
            epsilon = 1e-9
        );
        let blocks = hour_blocks(&samples);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].count, 5);
    }

    #[test]
    fn blocks_do_not_span_gaps() {
        let mut samples = afternoon(3);
        samples.remove(2);
        // remaining in-window run: 13:00, 13:15, 13:45, 14:00, 14:15, 14:30, 14:45
        let valid: Vec<usize> = (0..samples.len())
            .filter(|&i| block_energy(&samples, i, Direction::Shed).is_some())
            .collect();
        assert_eq!(valid, vec![2, 3]);
    }

    #[test]
    fn daily_max_mean_averages_best_blocks() {
        let mut samples = afternoon(3);
        samples.extend(afternoon(4).into_iter().map(|mut s| {
            if s.mask.shed {
                s.q_shed_kw += 400.0;
            }
            s
        }));
        let blocks = hour_blocks(&samples);
        let best_day_one = 0.25 * (1400.0 + 1500.0 + 1600.0 + 1700.0);
        assert_abs_diff_eq!(blocks[0].daily_max_mean_kwh, best_day_one + 200.0, epsilon = 1e-9);
        let summary = PotentialSummary::from_samples(&samples, &PotentialConfig::default());
        assert!(format!("{summary}").contains("1-Hour Blocks"));
    }
}
