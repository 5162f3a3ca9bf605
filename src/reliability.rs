//! Reliability of committed DR capacity against realized hourly potential.

use std::collections::BTreeMap;
use std::fmt;

use tracing::info;

use crate::calendar::Season;
use crate::config::ReliabilityConfig;
use crate::error::{Error, Result};
use crate::events::HourlyEvent;
use crate::series::is_weekend;
use crate::stats;

/// Which capacity is being committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Full shed potential including storage.
    TotalShed,
    /// Shed potential with the fixed storage contribution removed.
    NonStorage,
}

impl Resource {
    pub const ALL: [Self; 2] = [Self::TotalShed, Self::NonStorage];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TotalShed => "total_shed",
            Self::NonStorage => "non_storage",
        }
    }

    /// Actual available capacity per event hour.
    pub fn actual(self, events: &[&HourlyEvent], ess_fixed_kw: f64) -> Vec<f64> {
        events
            .iter()
            .map(|e| match self {
                Self::TotalShed => e.q_shed_kw,
                Self::NonStorage => e.q_shed_kw - ess_fixed_kw,
            })
            .collect()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the committed capacity is derived from the actual series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// One percentile over all qualifying hours.
    GlobalPercentile,
    /// A percentile per season, applied to each hour by its season.
    SeasonalPercentile,
}

impl Policy {
    pub const ALL: [Self; 2] = [Self::GlobalPercentile, Self::SeasonalPercentile];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GlobalPercentile => "global",
            Self::SeasonalPercentile => "seasonal",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Committed capacity, either one value or one value per season.
#[derive(Debug, Clone, PartialEq)]
pub enum Commitment {
    Scalar(f64),
    PerSeason(BTreeMap<Season, f64>),
}

impl Commitment {
    /// Derives the commitment for `policy` at percentile `p` of `actual`.
    ///
    /// `actual` and `seasons` are aligned per event hour. Returns `None` when
    /// `actual` is empty.
    pub fn from_policy(policy: Policy, actual: &[f64], seasons: &[Season], p: f64) -> Option<Self> {
        match policy {
            Policy::GlobalPercentile => stats::percentile(actual, p).map(Self::Scalar),
            Policy::SeasonalPercentile => {
                let mut grouped: BTreeMap<Season, Vec<f64>> = BTreeMap::new();
                for (&a, &season) in actual.iter().zip(seasons) {
                    grouped.entry(season).or_default().push(a);
                }
                let map: BTreeMap<Season, f64> = grouped
                    .into_iter()
                    .filter_map(|(season, values)| {
                        stats::percentile(&values, p).map(|c| (season, c))
                    })
                    .collect();
                (!map.is_empty()).then_some(Self::PerSeason(map))
            }
        }
    }

    /// Broadcasts the commitment to each hour.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if a season has no per-season value.
    pub fn broadcast(&self, seasons: &[Season]) -> Result<Vec<f64>> {
        match self {
            Self::Scalar(c) => Ok(vec![*c; seasons.len()]),
            Self::PerSeason(map) => seasons
                .iter()
                .map(|season| {
                    map.get(season)
                        .copied()
                        .ok_or_else(|| Error::not_found(format!("committed capacity for season {season}")))
                })
                .collect(),
        }
    }
}

/// Reliability metrics for one (resource, policy) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ReliabilityMetric {
    pub description: String,
    pub resource: Resource,
    pub policy: Policy,
    pub event_count: usize,
    pub mean_committed_kw: f64,
    pub mean_actual_kw: f64,
    /// `NaN` when the mean commitment is zero.
    pub rrmse: f64,
    pub prob_shortfall_strict: f64,
    pub prob_shortfall_tolerant: f64,
    pub expected_shortfall_kw: f64,
}

/// Scalar metrics of actual `A` against committed `C`, aligned per hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShortfallMetrics {
    pub mean_committed: f64,
    pub mean_actual: f64,
    pub rrmse: f64,
    pub prob_shortfall_strict: f64,
    pub prob_shortfall_tolerant: f64,
    pub expected_shortfall: f64,
}

impl ShortfallMetrics {
    /// Computes the metrics; `tolerance` scales `C` for the tolerant shortfall.
    ///
    /// Empty input yields zeros with an undefined RRMSE.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SeriesLength`] unless both series have one value per hour.
    ///
    /// # Examples
    ///
    /// ```
    /// use dc_flex::reliability::ShortfallMetrics;
    ///
    /// let m = ShortfallMetrics::compute(&[100.0, 90.0, 80.0], &[100.0; 3], 0.95).unwrap();
    /// assert_eq!(m.expected_shortfall, 10.0);
    /// ```
    pub fn compute(actual: &[f64], committed: &[f64], tolerance: f64) -> Result<Self> {
        if actual.len() != committed.len() {
            return Err(Error::SeriesLength {
                actual: actual.len(),
                committed: committed.len(),
            });
        }
        let n = actual.len();
        if n == 0 {
            return Ok(Self {
                mean_committed: 0.0,
                mean_actual: 0.0,
                rrmse: f64::NAN,
                prob_shortfall_strict: 0.0,
                prob_shortfall_tolerant: 0.0,
                expected_shortfall: 0.0,
            });
        }
        let nf = n as f64;
        let pairs = || actual.iter().zip(committed);

        let mean_committed = committed.iter().sum::<f64>() / nf;
        let mean_actual = actual.iter().sum::<f64>() / nf;
        let mse = pairs().map(|(a, c)| (c - a) * (c - a)).sum::<f64>() / nf;
        let rrmse = if mean_committed != 0.0 {
            mse.sqrt() / mean_committed
        } else {
            f64::NAN
        };
        let strict = pairs().filter(|(a, c)| *a < *c).count() as f64 / nf;
        let tolerant = pairs().filter(|(a, c)| **a < tolerance * **c).count() as f64 / nf;
        let expected = pairs().map(|(a, c)| (c - a).max(0.0)).sum::<f64>() / nf;

        Ok(Self {
            mean_committed,
            mean_actual,
            rrmse,
            prob_shortfall_strict: strict,
            prob_shortfall_tolerant: tolerant,
            expected_shortfall: expected,
        })
    }
}

impl ReliabilityMetric {
    /// Evaluates one resource series against one commitment series.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SeriesLength`] when the series are not aligned hour by hour.
    pub fn compute(
        resource: Resource,
        policy: Policy,
        actual: &[f64],
        committed: &[f64],
        tolerance: f64,
    ) -> Result<Self> {
        let m = ShortfallMetrics::compute(actual, committed, tolerance)?;
        Ok(Self {
            description: format!("{resource}_{policy}"),
            resource,
            policy,
            event_count: actual.len(),
            mean_committed_kw: m.mean_committed,
            mean_actual_kw: m.mean_actual,
            rrmse: m.rrmse,
            prob_shortfall_strict: m.prob_shortfall_strict,
            prob_shortfall_tolerant: m.prob_shortfall_tolerant,
            expected_shortfall_kw: m.expected_shortfall,
        })
    }
}

impl fmt::Display for ReliabilityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<22} n={:<5} C={:>9.2} kW  A={:>9.2} kW  RRMSE={:.4}  P(A<C)={:>6.2}%  P(A<tol·C)={:>6.2}%  ES={:.2} kW",
            self.description,
            self.event_count,
            self.mean_committed_kw,
            self.mean_actual_kw,
            self.rrmse,
            self.prob_shortfall_strict * 100.0,
            self.prob_shortfall_tolerant * 100.0,
            self.expected_shortfall_kw
        )
    }
}

/// Hours entering the reliability analysis: shed events, weekdays only if configured.
pub fn qualifying_events<'a>(
    hours: &'a [HourlyEvent],
    config: &ReliabilityConfig,
) -> Vec<&'a HourlyEvent> {
    hours
        .iter()
        .filter(|h| h.is_event_shed && !(config.weekdays_only && is_weekend(&h.timestamp)))
        .collect()
}

/// Evaluates every resource against every policy.
///
/// An empty qualifying set yields no records.
///
/// # Errors
///
/// Propagates [`Error::NotFound`] from a per-season commitment lookup.
/// Returns [`Error::SeriesLength`] if a commitment does not cover every event.
pub fn analyze(
    hours: &[HourlyEvent],
    config: &ReliabilityConfig,
    ess_fixed_kw: f64,
) -> Result<Vec<ReliabilityMetric>> {
    let events = qualifying_events(hours, config);
    info!(events = events.len(), "qualifying shed events for reliability");
    if events.is_empty() {
        info!("no qualifying events, reliability analysis skipped");
        return Ok(Vec::new());
    }
    let seasons: Vec<Season> = events.iter().map(|e| e.season).collect();

    let mut out = Vec::with_capacity(Resource::ALL.len() * Policy::ALL.len());
    for resource in Resource::ALL {
        let actual = resource.actual(&events, ess_fixed_kw);
        for policy in Policy::ALL {
            let Some(commitment) =
                Commitment::from_policy(policy, &actual, &seasons, config.percentile)
            else {
                continue;
            };
            let committed = commitment.broadcast(&seasons)?;
            let metric = ReliabilityMetric::compute(
                resource,
                policy,
                &actual,
                &committed,
                config.tolerance,
            )?;
            info!(
                description = %metric.description,
                rrmse = format!("{:.4}", metric.rrmse),
                shortfall = format!("{:.4}", metric.prob_shortfall_strict),
                "reliability evaluated"
            );
            out.push(metric);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    fn at(m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .unwrap()
    }

    fn hour(ts: NaiveDateTime, q: f64, event: bool) -> HourlyEvent {
        HourlyEvent {
            timestamp: ts,
            season: Season::of(&ts),
            interval_count: 4,
            active_ratio_shed: 1.0,
            active_ratio_up: 0.0,
            q_shed_kw: q,
            q_up_kw: 0.0,
            e_shed_kwh: q,
            e_up_kwh: 0.0,
            price: None,
            is_event_shed: event,
            is_event_up: false,
        }
    }

    #[test]
    fn worked_example_scalar_commitment() {
        let m = ShortfallMetrics::compute(&[100.0, 90.0, 80.0], &[100.0; 3], 0.95).unwrap();
        assert_abs_diff_eq!(m.rrmse, (500.0_f64 / 3.0).sqrt() / 100.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.rrmse, 0.1291, epsilon = 1e-4);
        assert_abs_diff_eq!(m.prob_shortfall_strict, 2.0 / 3.0, epsilon = 1e-12);
        // 90 and 80 are both below 95
        assert_abs_diff_eq!(m.prob_shortfall_tolerant, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.expected_shortfall, 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.mean_actual, 90.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_commitment_gives_nan_rrmse() {
        let m = ShortfallMetrics::compute(&[10.0, 20.0], &[0.0, 0.0], 0.95).unwrap();
        assert!(m.rrmse.is_nan());
        assert_eq!(m.prob_shortfall_strict, 0.0);
    }

    #[test]
    fn empty_input_is_zero_with_nan_rrmse() {
        let m = ShortfallMetrics::compute(&[], &[], 0.95).unwrap();
        assert!(m.rrmse.is_nan());
        assert_eq!(m.expected_shortfall, 0.0);
    }

    #[test]
    fn misaligned_series_are_rejected() {
        let err = ShortfallMetrics::compute(&[100.0, 90.0, 80.0], &[100.0], 0.95).unwrap_err();
        assert!(matches!(err, Error::SeriesLength { actual: 3, committed: 1 }));

        let result = ReliabilityMetric::compute(
            Resource::TotalShed,
            Policy::GlobalPercentile,
            &[100.0, 90.0, 80.0],
            &[100.0],
            0.95,
        );
        assert!(result.is_err());

        let metric = ReliabilityMetric::compute(
            Resource::TotalShed,
            Policy::GlobalPercentile,
            &[100.0, 90.0, 80.0],
            &[100.0; 3],
            0.95,
        )
        .unwrap();
        assert_eq!(metric.event_count, 3);
        assert_abs_diff_eq!(metric.prob_shortfall_strict, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metric.expected_shortfall_kw, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn seasonal_commitment_missing_season_is_not_found() {
        let mut map = BTreeMap::new();
        map.insert(Season::Summer, 100.0);
        let c = Commitment::PerSeason(map);
        let err = c.broadcast(&[Season::Summer, Season::Winter]).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn seasonal_commitment_uses_own_percentile() {
        let actual = [100.0, 200.0, 1000.0, 3000.0];
        let seasons = [Season::Summer, Season::Summer, Season::Winter, Season::Winter];
        let c = Commitment::from_policy(Policy::SeasonalPercentile, &actual, &seasons, 0.9).unwrap();
        let committed = c.broadcast(&seasons).unwrap();
        assert_abs_diff_eq!(committed[0], 190.0, epsilon = 1e-9);
        assert_abs_diff_eq!(committed[2], 2800.0, epsilon = 1e-9);
    }

    #[test]
    fn analyze_produces_four_records() {
        // 2024-07-01 .. 07-05 Monday to Friday, 2024-12-02 Monday
        let hours = vec![
            hour(at(7, 1, 14), 2000.0, true),
            hour(at(7, 2, 14), 2200.0, true),
            hour(at(7, 3, 14), 1800.0, true),
            hour(at(7, 4, 14), 2500.0, false),
            hour(at(12, 2, 9), 1600.0, true),
            hour(at(12, 3, 9), 1700.0, true),
        ];
        let metrics = analyze(&hours, &ReliabilityConfig::default(), 1250.0).unwrap();
        assert_eq!(metrics.len(), 4);
        assert!(metrics.iter().all(|m| m.event_count == 5));
        let non_storage = metrics
            .iter()
            .find(|m| m.resource == Resource::NonStorage && m.policy == Policy::GlobalPercentile)
            .unwrap();
        let total = metrics
            .iter()
            .find(|m| m.resource == Resource::TotalShed && m.policy == Policy::GlobalPercentile)
            .unwrap();
        assert_abs_diff_eq!(total.mean_actual_kw - non_storage.mean_actual_kw, 1250.0, epsilon = 1e-9);
        assert_eq!(total.description, "total_shed_global");
        assert!(format!("{total}").contains("RRMSE"));
    }

    #[test]
    fn weekend_events_are_excluded() {
        // 2024-07-06 Saturday
        let hours = vec![hour(at(7, 6, 14), 2000.0, true)];
        let metrics = analyze(&hours, &ReliabilityConfig::default(), 1250.0).unwrap();
        assert!(metrics.is_empty());

        let config = ReliabilityConfig {
            weekdays_only: false,
            ..ReliabilityConfig::default()
        };
        let metrics = analyze(&hours, &config, 1250.0).unwrap();
        assert_eq!(metrics.len(), 4);
        // one event, P90 equals the value, no shortfall
        assert!(metrics.iter().all(|m| m.prob_shortfall_strict == 0.0));
    }
}
