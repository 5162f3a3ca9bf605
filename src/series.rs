//! Interval samples and cadence validation.

use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike, Weekday};

use crate::error::{Error, Result};
use crate::weather;

/// Length of one metering interval in minutes.
pub const INTERVAL_MINUTES: i64 = 15;

/// Number of metering intervals in one clock hour.
pub const INTERVALS_PER_HOUR: usize = 4;

/// Duration of one metering interval in hours.
pub const INTERVAL_HOURS: f64 = 0.25;

/// Converts the energy of one 15-minute interval into average power.
pub fn interval_energy_to_power(energy_kwh: f64) -> f64 {
    energy_kwh * INTERVALS_PER_HOUR as f64
}

/// One 15-minute load and weather record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Interval start.
    pub timestamp: NaiveDateTime,
    /// Metered energy for the interval (kWh).
    pub measured_kwh: f64,
    /// Ambient dry-bulb temperature (°C).
    pub temperature_c: f64,
    /// Relative humidity (%).
    pub humidity_pct: f64,
}

impl Sample {
    pub fn enthalpy(&self) -> f64 {
        weather::enthalpy(self.temperature_c, self.humidity_pct)
    }
}

/// One 15-minute market price record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: NaiveDateTime,
    pub price: f64,
}

/// Returns `true` for Saturday and Sunday.
pub fn is_weekend(timestamp: &NaiveDateTime) -> bool {
    matches!(timestamp.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Truncates a timestamp to the start of its clock hour.
pub fn hour_start(timestamp: &NaiveDateTime) -> NaiveDateTime {
    timestamp
        .date()
        .and_hms_opt(timestamp.hour(), 0, 0)
        .unwrap_or(*timestamp)
}

/// Checks that samples are uniquely timestamped at a fixed 15-minute cadence.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] for an empty series and [`Error::Validation`]
/// at the first duplicate, gap, out-of-order timestamp, or non-finite reading.
pub fn validate_contiguous(samples: &[Sample]) -> Result<()> {
    if samples.is_empty() {
        return Err(Error::EmptyInput {
            stage: "decomposition",
        });
    }

    let step = TimeDelta::minutes(INTERVAL_MINUTES);
    for (index, sample) in samples.iter().enumerate() {
        if !sample.measured_kwh.is_finite()
            || !sample.temperature_c.is_finite()
            || !sample.humidity_pct.is_finite()
        {
            return Err(Error::Validation {
                index,
                timestamp: sample.timestamp,
                reason: "non-finite measurement".to_string(),
            });
        }
        if index == 0 {
            continue;
        }
        let delta = sample.timestamp - samples[index - 1].timestamp;
        if delta == step {
            continue;
        }
        let reason = if delta == TimeDelta::zero() {
            "duplicate timestamp".to_string()
        } else if delta < TimeDelta::zero() {
            "timestamp out of order".to_string()
        } else {
            format!("gap of {} minutes", delta.num_minutes())
        };
        return Err(Error::Validation {
            index,
            timestamp: sample.timestamp,
            reason,
        });
    }
    Ok(())
}
