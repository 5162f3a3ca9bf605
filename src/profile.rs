//! Typical-day load profiles and synthetic series extension.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

use crate::calendar::Season;
use crate::config::SyntheticConfig;
use crate::error::{Error, Result};
use crate::series::{INTERVAL_MINUTES, Sample, is_weekend};
use crate::stats;

/// Profile slot: season, weekend flag, and time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileKey {
    pub season: Season,
    pub weekend: bool,
    pub hour: u32,
    pub minute: u32,
}

impl ProfileKey {
    /// Key of `timestamp` under an explicitly chosen profile season.
    pub fn at(season: Season, timestamp: &NaiveDateTime) -> Self {
        Self {
            season,
            weekend: is_weekend(timestamp),
            hour: timestamp.hour(),
            minute: timestamp.minute(),
        }
    }
}

/// Distribution of metered energy in one profile slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileStats {
    pub samples: usize,
    pub mean_kwh: f64,
    /// Sample standard deviation; 0 when the slot has a single observation.
    pub std_kwh: f64,
    pub p05_kwh: f64,
    pub p95_kwh: f64,
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadProfile {
    slots: BTreeMap<ProfileKey, ProfileStats>,
}

impl LoadProfile {
    /// Groups samples by (season, weekend, hour, minute).
    pub fn extract(samples: &[Sample]) -> Self {
        let mut grouped: BTreeMap<ProfileKey, Vec<&Sample>> = BTreeMap::new();
        for s in samples {
            grouped
                .entry(ProfileKey::at(Season::of(&s.timestamp), &s.timestamp))
                .or_default()
                .push(s);
        }

        let slots = grouped
            .into_iter()
            .filter_map(|(key, members)| {
                let load: Vec<f64> = members.iter().map(|s| s.measured_kwh).collect();
                let temperature: Vec<f64> = members.iter().map(|s| s.temperature_c).collect();
                let humidity: Vec<f64> = members.iter().map(|s| s.humidity_pct).collect();
                Some((
                    key,
                    ProfileStats {
                        samples: load.len(),
                        mean_kwh: stats::mean(&load)?,
                        std_kwh: stats::sample_std(&load).unwrap_or(0.0),
                        p05_kwh: stats::percentile(&load, 0.05)?,
                        p95_kwh: stats::percentile(&load, 0.95)?,
                        temperature_c: stats::mean(&temperature)?,
                        humidity_pct: stats::mean(&humidity)?,
                    },
                ))
            })
            .collect();
        Self { slots }
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the slot was never observed.
    pub fn get(&self, key: &ProfileKey) -> Result<&ProfileStats> {
        self.slots.get(key).ok_or_else(|| {
            Error::not_found(format!(
                "load profile for {} {} {:02}:{:02}",
                key.season,
                if key.weekend { "weekend" } else { "weekday" },
                key.hour,
                key.minute
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn seasons(&self) -> Vec<Season> {
        let mut seasons: Vec<Season> = self.slots.keys().map(|k| k.season).collect();
        seasons.dedup();
        seasons
    }
}

/// Standard normal noise via Box–Muller, scaled by `std_dev`.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Seeded generator that continues a series from a [`LoadProfile`].
pub struct SyntheticExtension<'a> {
    profile: &'a LoadProfile,
    config: &'a SyntheticConfig,
    rng: StdRng,
}

impl<'a> SyntheticExtension<'a> {
    pub fn new(profile: &'a LoadProfile, config: &'a SyntheticConfig) -> Self {
        Self {
            profile,
            config,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Draws one synthetic sample at `timestamp`.
    ///
    /// The value is `mean + N(0, std · noise_scale)` clipped to `[P05, P95]`
    /// and then at zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the month has no mapping or the
    /// mapped profile slot is missing.
    pub fn sample_at(&mut self, timestamp: NaiveDateTime) -> Result<Sample> {
        let month = timestamp.month();
        let mapping = self
            .config
            .month_profile(month)
            .ok_or_else(|| Error::not_found(format!("synthetic profile mapping for month {month}")))?;
        let stats = self.profile.get(&ProfileKey::at(mapping.season, &timestamp))?;

        let noise = gaussian_noise(&mut self.rng, stats.std_kwh * mapping.noise_scale);
        let lower = stats.p05_kwh.min(stats.p95_kwh);
        let upper = stats.p05_kwh.max(stats.p95_kwh);
        let measured_kwh = (stats.mean_kwh + noise).clamp(lower, upper).max(0.0);

        Ok(Sample {
            timestamp,
            measured_kwh,
            temperature_c: stats.temperature_c,
            humidity_pct: stats.humidity_pct,
        })
    }

    /// Generates samples from one interval after `last` through `end` inclusive.
    ///
    /// # Errors
    ///
    /// Fails on the first timestamp without a profile; nothing is substituted.
    pub fn generate(&mut self, last: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<Sample>> {
        let step = TimeDelta::minutes(INTERVAL_MINUTES);
        let mut out = Vec::new();
        let mut ts = last + step;
        while ts <= end {
            out.push(self.sample_at(ts)?);
            ts += step;
        }
        info!(
            generated = out.len(),
            from = %(last + step),
            to = %end,
            "synthetic samples generated"
        );
        Ok(out)
    }
}

/// Appends a synthetic continuation up to `end` to an observed series.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] when there is nothing to profile, otherwise
/// propagates missing-profile errors.
pub fn extend_series(samples: &[Sample], end: NaiveDateTime, config: &SyntheticConfig) -> Result<Vec<Sample>> {
    let Some(last) = samples.last() else {
        return Err(Error::EmptyInput { stage: "synthetic extension" });
    };
    let profile = LoadProfile::extract(samples);
    let generated = SyntheticExtension::new(&profile, config).generate(last.timestamp, end)?;
    let mut out = Vec::with_capacity(samples.len() + generated.len());
    out.extend_from_slice(samples);
    out.extend(generated);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::series::validate_contiguous;

    fn at(m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .unwrap()
    }

    /// Two full weeks starting `start`, with load depending on the hour and a little variation per day.
    fn weeks(start: NaiveDateTime) -> Vec<Sample> {
        (0..14 * 96)
            .map(|i| {
                let ts = start + TimeDelta::minutes(15 * i);
                let day = (i / 96) as f64;
                Sample {
                    timestamp: ts,
                    measured_kwh: 800.0 + 10.0 * ts.hour() as f64 + 5.0 * (day % 3.0),
                    temperature_c: 25.0,
                    humidity_pct: 55.0,
                }
            })
            .collect()
    }

    #[test]
    fn gaussian_noise_zero_std_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(gaussian_noise(&mut rng, 0.0), 0.0);
        assert_eq!(gaussian_noise(&mut rng, -1.0), 0.0);
    }

    #[test]
    fn gaussian_noise_has_roughly_unit_spread() {
        let mut rng = StdRng::seed_from_u64(7);
        let draws: Vec<f64> = (0..5000).map(|_| gaussian_noise(&mut rng, 2.0)).collect();
        let mean = stats::mean(&draws).unwrap();
        let std = stats::sample_std(&draws).unwrap();
        assert!(mean.abs() < 0.15, "mean {mean}");
        assert!((std - 2.0).abs() < 0.15, "std {std}");
    }

    #[test]
    fn profile_groups_by_slot() {
        let samples = weeks(at(7, 1, 0, 0));
        let profile = LoadProfile::extract(&samples);
        // summer only, weekday and weekend, 96 slots each
        assert_eq!(profile.len(), 2 * 96);
        assert_eq!(profile.seasons(), vec![Season::Summer]);
        let key = ProfileKey::at(Season::Summer, &at(7, 3, 14, 30));
        let stats = profile.get(&key).unwrap();
        assert_eq!(stats.samples, 10);
        assert!(stats.p05_kwh <= stats.mean_kwh && stats.mean_kwh <= stats.p95_kwh);
        assert_eq!(stats.temperature_c, 25.0);
    }

    #[test]
    fn missing_slot_is_not_found() {
        let profile = LoadProfile::extract(&weeks(at(7, 1, 0, 0)));
        let key = ProfileKey::at(Season::Winter, &at(1, 3, 12, 0));
        assert!(matches!(profile.get(&key), Err(Error::NotFound { .. })));
    }

    #[test]
    fn extension_is_contiguous_and_bounded() {
        let samples = weeks(at(7, 1, 0, 0));
        let config = SyntheticConfig::default();
        let end = at(7, 20, 23, 45);
        let extended = extend_series(&samples, end, &config).unwrap();
        validate_contiguous(&extended).unwrap();
        assert_eq!(extended.last().map(|s| s.timestamp), Some(end));

        let profile = LoadProfile::extract(&samples);
        for s in &extended[samples.len()..] {
            let stats = profile.get(&ProfileKey::at(Season::Summer, &s.timestamp)).unwrap();
            assert!(s.measured_kwh >= stats.p05_kwh - 1e-9);
            assert!(s.measured_kwh <= stats.p95_kwh + 1e-9);
        }
    }

    #[test]
    fn extension_is_deterministic_per_seed() {
        let samples = weeks(at(7, 1, 0, 0));
        let config = SyntheticConfig::default();
        let end = at(7, 16, 12, 0);
        let a = extend_series(&samples, end, &config).unwrap();
        let b = extend_series(&samples, end, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn extension_into_unprofiled_season_fails() {
        let samples = weeks(at(7, 1, 0, 0));
        // September maps to the fall profile, which the July data does not have.
        let err = extend_series(&samples, at(9, 2, 0, 0), &SyntheticConfig::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
