//! CSV export for decomposition, simulation, hourly event, and reliability tables.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use super::format_timestamp;
use crate::decompose::DecomposedSample;
use crate::events::HourlyEvent;
use crate::potential::PotentialSample;
use crate::reliability::ReliabilityMetric;

/// Column header of the decomposed series.
pub const DECOMPOSITION_HEADER: &str =
    "timestamp,measured_kwh,it,cooling,other,temperature,humidity,enthalpy";

/// Column header of the simulator output.
pub const SIMULATION_HEADER: &str = "timestamp,season,mask_shed,mask_up,q_shed_kw,q_up_kw,\
                                     it_kw,cooling_kw,other_kw";

/// Column header of the hourly event table.
pub const HOURLY_HEADER: &str = "timestamp,season,interval_count,active_ratio_shed,\
                                 active_ratio_up,q_shed_kw,q_up_kw,e_shed_kwh,e_up_kwh,\
                                 price,is_event_shed,is_event_up";

/// Column header of the reliability table.
pub const RELIABILITY_HEADER: &str = "description,resource,policy,event_count,\
                                      mean_committed_kw,mean_actual_kw,rrmse,\
                                      prob_shortfall_strict,prob_shortfall_tolerant,\
                                      expected_shortfall_kw";

fn write_rows<W: Write, T>(
    writer: W,
    header: &str,
    rows: &[T],
    fields: impl Fn(&T) -> Vec<String>,
) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(header.split(',').map(str::trim))?;
    for row in rows {
        wtr.write_record(fields(row))?;
    }

    wtr.flush()?;
    Ok(())
}

fn to_file(path: &Path, write: impl FnOnce(io::BufWriter<File>) -> io::Result<()>) -> io::Result<()> {
    let file = File::create(path)?;
    write(io::BufWriter::new(file))
}

/// Writes the decomposed series to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_decomposition(rows: &[DecomposedSample], writer: impl Write) -> io::Result<()> {
    write_rows(writer, DECOMPOSITION_HEADER, rows, |r| {
        vec![
            format_timestamp(&r.timestamp),
            format!("{:.4}", r.measured_kwh),
            format!("{:.4}", r.it_kwh),
            format!("{:.4}", r.cooling_kwh),
            format!("{:.4}", r.other_kwh),
            format!("{:.2}", r.temperature_c),
            format!("{:.2}", r.humidity_pct),
            format!("{:.4}", r.enthalpy),
        ]
    })
}

/// Exports the decomposed series to a CSV file at the given path.
pub fn export_decomposition(rows: &[DecomposedSample], path: &Path) -> io::Result<()> {
    to_file(path, |w| write_decomposition(rows, w))
}

/// Writes simulator output to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_simulation(rows: &[PotentialSample], writer: impl Write) -> io::Result<()> {
    write_rows(writer, SIMULATION_HEADER, rows, |r| {
        vec![
            format_timestamp(&r.timestamp),
            r.season.to_string(),
            r.mask.shed.to_string(),
            r.mask.up.to_string(),
            format!("{:.4}", r.q_shed_kw),
            format!("{:.4}", r.q_up_kw),
            format!("{:.4}", r.it_kw),
            format!("{:.4}", r.cooling_kw),
            format!("{:.4}", r.other_kw),
        ]
    })
}

/// Exports simulator output to a CSV file at the given path.
pub fn export_simulation(rows: &[PotentialSample], path: &Path) -> io::Result<()> {
    to_file(path, |w| write_simulation(rows, w))
}

/// Writes hourly events to any writer.
///
/// Active ratios are written at full precision so the table can be fed back
/// through the standardizer unchanged. An absent price is an empty field.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_hourly_events(rows: &[HourlyEvent], writer: impl Write) -> io::Result<()> {
    write_rows(writer, HOURLY_HEADER, rows, |r| {
        vec![
            format_timestamp(&r.timestamp),
            r.season.to_string(),
            r.interval_count.to_string(),
            r.active_ratio_shed.to_string(),
            r.active_ratio_up.to_string(),
            format!("{:.4}", r.q_shed_kw),
            format!("{:.4}", r.q_up_kw),
            format!("{:.4}", r.e_shed_kwh),
            format!("{:.4}", r.e_up_kwh),
            r.price.map(|p| format!("{p:.4}")).unwrap_or_default(),
            r.is_event_shed.to_string(),
            r.is_event_up.to_string(),
        ]
    })
}

/// Exports hourly events to a CSV file at the given path.
pub fn export_hourly_events(rows: &[HourlyEvent], path: &Path) -> io::Result<()> {
    to_file(path, |w| write_hourly_events(rows, w))
}

/// Writes reliability metrics to any writer. An undefined RRMSE is written as `NaN`.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_reliability(rows: &[ReliabilityMetric], writer: impl Write) -> io::Result<()> {
    write_rows(writer, RELIABILITY_HEADER, rows, |r| {
        vec![
            r.description.clone(),
            r.resource.to_string(),
            r.policy.to_string(),
            r.event_count.to_string(),
            format!("{:.4}", r.mean_committed_kw),
            format!("{:.4}", r.mean_actual_kw),
            format!("{:.4}", r.rrmse),
            format!("{:.4}", r.prob_shortfall_strict),
            format!("{:.4}", r.prob_shortfall_tolerant),
            format!("{:.4}", r.expected_shortfall_kw),
        ]
    })
}

/// Exports reliability metrics to a CSV file at the given path.
pub fn export_reliability(rows: &[ReliabilityMetric], path: &Path) -> io::Result<()> {
    to_file(path, |w| write_reliability(rows, w))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::calendar::{Season, WindowMask};
    use crate::io::import::{read_hourly_events, read_simulation};
    use crate::reliability::{Policy, Resource};

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 3)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    fn make_sample(i: u32) -> PotentialSample {
        PotentialSample {
            timestamp: ts(14, 15 * (i % 4)),
            season: Season::Summer,
            mask: WindowMask {
                shed: true,
                up: false,
            },
            q_shed_kw: 1612.25,
            q_up_kw: 0.0,
            it_kw: 3100.5,
            cooling_kw: 420.0,
            other_kw: 650.75,
        }
    }

    fn make_hour(price: Option<f64>) -> HourlyEvent {
        HourlyEvent {
            timestamp: ts(14, 0),
            season: Season::Summer,
            interval_count: 3,
            active_ratio_shed: 2.0 / 3.0,
            active_ratio_up: 0.0,
            q_shed_kw: 1075.5,
            q_up_kw: 0.0,
            e_shed_kwh: 1075.5,
            e_up_kwh: 0.0,
            price,
            is_event_shed: false,
            is_event_up: false,
        }
    }

    fn first_line(buf: &[u8]) -> String {
        String::from_utf8_lossy(buf).lines().next().unwrap_or("").to_string()
    }

    #[test]
    fn headers_match_column_sets() {
        let mut buf = Vec::new();
        write_simulation(&[make_sample(0)], &mut buf).ok();
        assert_eq!(
            first_line(&buf),
            "timestamp,season,mask_shed,mask_up,q_shed_kw,q_up_kw,it_kw,cooling_kw,other_kw"
        );

        let mut buf = Vec::new();
        write_hourly_events(&[make_hour(None)], &mut buf).ok();
        assert_eq!(
            first_line(&buf),
            "timestamp,season,interval_count,active_ratio_shed,active_ratio_up,q_shed_kw,\
             q_up_kw,e_shed_kwh,e_up_kwh,price,is_event_shed,is_event_up"
        );

        let mut buf = Vec::new();
        write_decomposition(&[], &mut buf).ok();
        assert_eq!(first_line(&buf), DECOMPOSITION_HEADER);
    }

    #[test]
    fn row_count_matches_sample_count() {
        let rows: Vec<PotentialSample> = (0..24).map(make_sample).collect();
        let mut buf = Vec::new();
        write_simulation(&rows, &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        // 1 header + 24 data rows
        assert_eq!(output.as_deref().unwrap_or("").lines().count(), 25);
    }

    #[test]
    fn deterministic_output() {
        let rows: Vec<PotentialSample> = (0..5).map(make_sample).collect();
        let mut buf1 = Vec::new();
        let mut buf2 = Vec::new();
        write_simulation(&rows, &mut buf1).ok();
        write_simulation(&rows, &mut buf2).ok();
        assert_eq!(buf1, buf2);
    }

    #[test]
    fn simulation_reads_back() {
        let rows: Vec<PotentialSample> = (0..4).map(make_sample).collect();
        let mut buf = Vec::new();
        write_simulation(&rows, &mut buf).ok();
        let back = read_simulation(buf.as_slice()).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn hourly_ratio_survives_round_trip() {
        let rows = vec![make_hour(Some(91.25)), make_hour(None)];
        let mut buf = Vec::new();
        write_hourly_events(&rows, &mut buf).ok();
        let back = read_hourly_events(buf.as_slice()).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn undefined_rrmse_written_as_nan() {
        let metric = ReliabilityMetric::compute(
            Resource::NonStorage,
            Policy::GlobalPercentile,
            &[0.0, 0.0],
            &[0.0, 0.0],
            0.95,
        )
        .unwrap();
        let mut buf = Vec::new();
        write_reliability(&[metric], &mut buf).ok();
        let output = String::from_utf8(buf).unwrap_or_default();
        let row = output.lines().nth(1).unwrap_or("");
        assert!(row.starts_with("non_storage_global,non_storage,global,2,"));
        assert!(row.contains(",NaN,"));
    }
}
