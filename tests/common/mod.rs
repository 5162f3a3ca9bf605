//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::f64::consts::TAU;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use dc_flex::io::format_timestamp;
use dc_flex::series::{PricePoint, Sample};
use dc_flex::weather::enthalpy;
use tempfile::TempDir;

/// Enthalpy above which the fixture adds cooling load (kJ/kg).
pub const FIXTURE_THRESHOLD: f64 = 35.0;

/// Cooling energy per kJ/kg above the threshold (kWh per interval).
pub const FIXTURE_SENSITIVITY: f64 = 4.0;

/// Weather-independent base energy per interval (kWh).
pub const FIXTURE_BASE_KWH: f64 = 850.0;

fn start_of(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Temperature (°C) and relative humidity (%) with a seasonal and a daily cycle.
pub fn fixture_weather(timestamp: &NaiveDateTime, day_of_year: f64) -> (f64, f64) {
    let seasonal = -(TAU * (day_of_year + 10.0) / 366.0).cos();
    let hour = timestamp.hour() as f64 + timestamp.minute() as f64 / 60.0;
    let daily = -(TAU * (hour - 3.0) / 24.0).cos();
    let temperature = 12.5 + 17.5 * seasonal + 4.0 * daily;
    let humidity = 62.0 + 12.0 * seasonal - 8.0 * daily;
    (temperature, humidity)
}

/// Contiguous 15-minute series over `days` days from `start`.
///
/// Load follows a change-point model on enthalpy with a small
/// weather-independent ripple, so the fit is good but not exact.
pub fn synthetic_series(start: NaiveDateTime, days: i64) -> Vec<Sample> {
    (0..days * 96)
        .map(|i| {
            let timestamp = start + TimeDelta::minutes(15 * i);
            let day_of_year = (i / 96) as f64;
            let (temperature_c, humidity_pct) = fixture_weather(&timestamp, day_of_year);
            let h = enthalpy(temperature_c, humidity_pct);
            let ripple = 12.0 * (TAU * (i % 7) as f64 / 7.0).sin();
            Sample {
                timestamp,
                measured_kwh: FIXTURE_BASE_KWH
                    + FIXTURE_SENSITIVITY * (h - FIXTURE_THRESHOLD).max(0.0)
                    + ripple,
                temperature_c,
                humidity_pct,
            }
        })
        .collect()
}

/// Calendar year 2024 (366 days, all four seasons).
pub fn synthetic_year() -> Vec<Sample> {
    synthetic_series(start_of(2024, 1, 1), 366)
}

/// Eight weeks spanning the July/August summer peak.
pub fn synthetic_summer() -> Vec<Sample> {
    synthetic_series(start_of(2024, 7, 1), 56)
}

/// Market price at every sample timestamp, peaking in the afternoon.
pub fn synthetic_prices(samples: &[Sample]) -> Vec<PricePoint> {
    samples
        .iter()
        .map(|s| PricePoint {
            timestamp: s.timestamp,
            price: 90.0 + 40.0 * (TAU * (s.timestamp.hour() as f64 - 9.0) / 24.0).sin(),
        })
        .collect()
}

/// Writes samples in the load-input column layout.
pub fn load_csv(samples: &[Sample]) -> String {
    let mut out = String::from("timestamp,measured_kwh,temperature,humidity\n");
    for s in samples {
        out.push_str(&format!(
            "{},{:.4},{:.3},{:.3}\n",
            format_timestamp(&s.timestamp),
            s.measured_kwh,
            s.temperature_c,
            s.humidity_pct
        ));
    }
    out
}

/// Writes prices in the price-input column layout.
pub fn price_csv(prices: &[PricePoint]) -> String {
    let mut out = String::from("timestamp,price\n");
    for p in prices {
        out.push_str(&format!("{},{:.2}\n", format_timestamp(&p.timestamp), p.price));
    }
    out
}

/// Fresh scratch directory, removed when the returned guard drops.
pub fn scratch_dir(name: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("dc-flex-{name}-"))
        .tempdir()
        .unwrap_or_else(|e| panic!("cannot create scratch dir {name}: {e}"))
}
