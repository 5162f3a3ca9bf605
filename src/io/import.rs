//! CSV readers for input series and previously exported tables.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use super::parse_timestamp;
use crate::calendar::{Season, WindowMask};
use crate::decompose::DecomposedSample;
use crate::error::{Error, Result};
use crate::events::HourlyEvent;
use crate::potential::PotentialSample;
use crate::series::{PricePoint, Sample};

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

/// Data rows start on line 2, below the header.
fn line_of(index: usize) -> u64 {
    index as u64 + 2
}

fn parse_season(raw: &str, line: u64) -> Result<Season> {
    raw.parse().map_err(|_| Error::Field {
        line,
        field: "season",
        raw: raw.to_string(),
    })
}

#[derive(Deserialize)]
struct LoadRow {
    timestamp: String,
    measured_kwh: f64,
    temperature: f64,
    humidity: f64,
}

/// Reads a `timestamp,measured_kwh,temperature,humidity` series.
///
/// # Errors
///
/// Returns [`Error::Csv`] for malformed rows and [`Error::Timestamp`] for
/// unparseable timestamps.
pub fn read_samples<R: Read>(input: R) -> Result<Vec<Sample>> {
    let mut rdr = reader(input);
    rdr.deserialize::<LoadRow>()
        .map(|row| {
            let row = row?;
            Ok(Sample {
                timestamp: parse_timestamp(&row.timestamp)?,
                measured_kwh: row.measured_kwh,
                temperature_c: row.temperature,
                humidity_pct: row.humidity,
            })
        })
        .collect()
}

pub fn load_samples(path: &Path) -> Result<Vec<Sample>> {
    read_samples(open(path)?)
}

#[derive(Deserialize)]
struct PriceRow {
    timestamp: String,
    price: f64,
}

/// Reads a `timestamp,price` series.
pub fn read_prices<R: Read>(input: R) -> Result<Vec<PricePoint>> {
    let mut rdr = reader(input);
    rdr.deserialize::<PriceRow>()
        .map(|row| {
            let row = row?;
            Ok(PricePoint {
                timestamp: parse_timestamp(&row.timestamp)?,
                price: row.price,
            })
        })
        .collect()
}

pub fn load_prices(path: &Path) -> Result<Vec<PricePoint>> {
    read_prices(open(path)?)
}

#[derive(Deserialize)]
struct DecompositionRow {
    timestamp: String,
    measured_kwh: f64,
    it: f64,
    cooling: f64,
    other: f64,
    temperature: f64,
    humidity: f64,
    enthalpy: f64,
}

/// Reads a table written by [`super::export::write_decomposition`].
pub fn read_decomposition<R: Read>(input: R) -> Result<Vec<DecomposedSample>> {
    let mut rdr = reader(input);
    rdr.deserialize::<DecompositionRow>()
        .map(|row| {
            let row = row?;
            Ok(DecomposedSample {
                timestamp: parse_timestamp(&row.timestamp)?,
                measured_kwh: row.measured_kwh,
                it_kwh: row.it,
                cooling_kwh: row.cooling,
                other_kwh: row.other,
                temperature_c: row.temperature,
                humidity_pct: row.humidity,
                enthalpy: row.enthalpy,
            })
        })
        .collect()
}

pub fn load_decomposition(path: &Path) -> Result<Vec<DecomposedSample>> {
    read_decomposition(open(path)?)
}

#[derive(Deserialize)]
struct SimulationRow {
    timestamp: String,
    season: String,
    mask_shed: bool,
    mask_up: bool,
    q_shed_kw: f64,
    q_up_kw: f64,
    it_kw: f64,
    cooling_kw: f64,
    other_kw: f64,
}

/// Reads a table written by [`super::export::write_simulation`].
pub fn read_simulation<R: Read>(input: R) -> Result<Vec<PotentialSample>> {
    let mut rdr = reader(input);
    rdr.deserialize::<SimulationRow>()
        .enumerate()
        .map(|(i, row)| {
            let row = row?;
            Ok(PotentialSample {
                timestamp: parse_timestamp(&row.timestamp)?,
                season: parse_season(&row.season, line_of(i))?,
                mask: WindowMask {
                    shed: row.mask_shed,
                    up: row.mask_up,
                },
                q_shed_kw: row.q_shed_kw,
                q_up_kw: row.q_up_kw,
                it_kw: row.it_kw,
                cooling_kw: row.cooling_kw,
                other_kw: row.other_kw,
            })
        })
        .collect()
}

pub fn load_simulation(path: &Path) -> Result<Vec<PotentialSample>> {
    read_simulation(open(path)?)
}

#[derive(Deserialize)]
struct HourlyRow {
    timestamp: String,
    season: String,
    interval_count: usize,
    active_ratio_shed: f64,
    active_ratio_up: f64,
    q_shed_kw: f64,
    q_up_kw: f64,
    e_shed_kwh: f64,
    e_up_kwh: f64,
    price: Option<f64>,
    is_event_shed: bool,
    is_event_up: bool,
}

/// Reads a table written by [`super::export::write_hourly_events`].
pub fn read_hourly_events<R: Read>(input: R) -> Result<Vec<HourlyEvent>> {
    let mut rdr = reader(input);
    rdr.deserialize::<HourlyRow>()
        .enumerate()
        .map(|(i, row)| {
            let row = row?;
            Ok(HourlyEvent {
                timestamp: parse_timestamp(&row.timestamp)?,
                season: parse_season(&row.season, line_of(i))?,
                interval_count: row.interval_count,
                active_ratio_shed: row.active_ratio_shed,
                active_ratio_up: row.active_ratio_up,
                q_shed_kw: row.q_shed_kw,
                q_up_kw: row.q_up_kw,
                e_shed_kwh: row.e_shed_kwh,
                e_up_kwh: row.e_up_kwh,
                price: row.price,
                is_event_shed: row.is_event_shed,
                is_event_up: row.is_event_up,
            })
        })
        .collect()
}

pub fn load_hourly_events(path: &Path) -> Result<Vec<HourlyEvent>> {
    read_hourly_events(open(path)?)
}
