//! Hourly event standardization.
//!
//! Sub-hourly potential records are reduced to one record per clock hour,
//! a seasonal minimum-potential threshold is derived, and each hour is
//! classified as a dispatchable shed and/or up event.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::calendar::{Direction, Season};
use crate::config::EventsConfig;
use crate::potential::PotentialSample;
use crate::series::{INTERVALS_PER_HOUR, PricePoint, hour_start};

/// A record that can be folded into an hourly bucket.
///
/// A 15-minute sample counts as one interval. An already aggregated hour
/// reports its own interval count, so feeding standardizer output back in
/// reproduces it unchanged.
pub trait IntervalRecord {
    fn timestamp(&self) -> NaiveDateTime;
    fn season(&self) -> Season;
    /// Number of 15-minute intervals this record stands for.
    fn interval_count(&self) -> usize;
    /// How many of those intervals were inside the window for `direction`.
    fn active_intervals(&self, direction: Direction) -> usize;
    fn q_kw(&self, direction: Direction) -> f64;
    fn price(&self) -> Option<f64> {
        None
    }
}

impl IntervalRecord for PotentialSample {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn season(&self) -> Season {
        self.season
    }

    fn interval_count(&self) -> usize {
        1
    }

    fn active_intervals(&self, direction: Direction) -> usize {
        usize::from(self.mask.is_active(direction))
    }

    fn q_kw(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Shed => self.q_shed_kw,
            Direction::Up => self.q_up_kw,
        }
    }
}

/// One standardized clock hour.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyEvent {
    /// Start of the hour.
    pub timestamp: NaiveDateTime,
    /// Season of the first record in the hour.
    pub season: Season,
    /// Intervals present; 4 for a complete hour.
    pub interval_count: usize,
    pub active_ratio_shed: f64,
    pub active_ratio_up: f64,
    /// Mean shed potential over the hour (kW).
    pub q_shed_kw: f64,
    /// Mean up potential over the hour (kW).
    pub q_up_kw: f64,
    /// Energy equivalent of a 1-hour shed dispatch (kWh).
    pub e_shed_kwh: f64,
    /// Energy equivalent of a 1-hour up dispatch (kWh).
    pub e_up_kwh: f64,
    /// Mean market price over the priced intervals, if any were priced.
    pub price: Option<f64>,
    pub is_event_shed: bool,
    pub is_event_up: bool,
}

impl HourlyEvent {
    pub fn active_ratio(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Shed => self.active_ratio_shed,
            Direction::Up => self.active_ratio_up,
        }
    }

    pub fn is_event(&self, direction: Direction) -> bool {
        match direction {
            Direction::Shed => self.is_event_shed,
            Direction::Up => self.is_event_up,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.interval_count == INTERVALS_PER_HOUR
    }
}

impl IntervalRecord for HourlyEvent {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn season(&self) -> Season {
        self.season
    }

    fn interval_count(&self) -> usize {
        self.interval_count
    }

    fn active_intervals(&self, direction: Direction) -> usize {
        (self.active_ratio(direction) * self.interval_count as f64).round() as usize
    }

    fn q_kw(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Shed => self.q_shed_kw,
            Direction::Up => self.q_up_kw,
        }
    }

    fn price(&self) -> Option<f64> {
        self.price
    }
}

impl fmt::Display for HourlyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<6} n={} shed={:.2}{} up={:.2}{} Q_shed={:.2} kW Q_up={:.2} kW",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.season,
            self.interval_count,
            self.active_ratio_shed,
            if self.is_event_shed { "*" } else { "" },
            self.active_ratio_up,
            if self.is_event_up { "*" } else { "" },
            self.q_shed_kw,
            self.q_up_kw
        )
    }
}

/// Market prices keyed by interval start.
#[derive(Debug, Clone, Default)]
pub struct PriceIndex {
    prices: HashMap<NaiveDateTime, f64>,
}

impl PriceIndex {
    pub fn new(points: &[PricePoint]) -> Self {
        Self {
            prices: points.iter().map(|p| (p.timestamp, p.price)).collect(),
        }
    }

    pub fn get(&self, timestamp: &NaiveDateTime) -> Option<f64> {
        self.prices.get(timestamp).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Per-season minimum potential for each direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QminTable {
    values: BTreeMap<(Season, Direction), f64>,
}

impl QminTable {
    /// `ratio · mean(Q > 0)` per (season, direction); 0 where no hour has positive Q.
    pub fn from_hours(hours: &[HourlyEvent], ratio: f64) -> Self {
        let mut sums: BTreeMap<(Season, Direction), (f64, usize)> = BTreeMap::new();
        for hour in hours {
            for direction in Direction::ALL {
                let q = hour.q_kw(direction);
                if q > 0.0 {
                    let entry = sums.entry((hour.season, direction)).or_insert((0.0, 0));
                    entry.0 += q;
                    entry.1 += 1;
                }
            }
        }
        let values = sums
            .into_iter()
            .map(|(key, (sum, n))| (key, ratio * sum / n as f64))
            .collect();
        Self { values }
    }

    pub fn get(&self, season: Season, direction: Direction) -> f64 {
        self.values.get(&(season, direction)).copied().unwrap_or(0.0)
    }
}

impl fmt::Display for QminTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Season   Qmin shed (kW)  Qmin up (kW)")?;
        for (i, season) in Season::ALL.into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:<8} {:>14.2}  {:>12.2}",
                season,
                self.get(season, Direction::Shed),
                self.get(season, Direction::Up)
            )?;
        }
        Ok(())
    }
}

/// Event rule for one hour and direction.
pub fn qualifies(active_ratio: f64, q_kw: f64, qmin_kw: f64, full_window_ratio: f64) -> bool {
    active_ratio >= full_window_ratio && q_kw >= qmin_kw && q_kw > 0.0
}

#[derive(Default)]
struct Bucket {
    season: Option<Season>,
    members: usize,
    intervals: usize,
    active: [usize; 2],
    q_weighted: [f64; 2],
    price_sum: f64,
    price_weight: usize,
    single: Option<(f64, f64, Option<f64>)>,
}

impl Bucket {
    fn push<R: IntervalRecord>(&mut self, record: &R, price: Option<f64>) {
        let n = record.interval_count();
        self.season.get_or_insert(record.season());
        self.members += 1;
        self.intervals += n;
        for direction in Direction::ALL {
            let i = direction as usize;
            self.active[i] += record.active_intervals(direction);
            self.q_weighted[i] += record.q_kw(direction) * n as f64;
        }
        if let Some(p) = price {
            self.price_sum += p * n as f64;
            self.price_weight += n;
        }
        self.single = Some((
            record.q_kw(Direction::Shed),
            record.q_kw(Direction::Up),
            price,
        ));
    }

    fn finish(self, timestamp: NaiveDateTime) -> Option<HourlyEvent> {
        let season = self.season?;
        if self.intervals == 0 {
            return None;
        }
        let n = self.intervals as f64;
        let (q_shed_kw, q_up_kw, price) = match self.single {
            Some(single) if self.members == 1 => single,
            _ => (
                self.q_weighted[0] / n,
                self.q_weighted[1] / n,
                (self.price_weight > 0).then(|| self.price_sum / self.price_weight as f64),
            ),
        };
        Some(HourlyEvent {
            timestamp,
            season,
            interval_count: self.intervals,
            active_ratio_shed: self.active[0] as f64 / n,
            active_ratio_up: self.active[1] as f64 / n,
            q_shed_kw,
            q_up_kw,
            e_shed_kwh: q_shed_kw,
            e_up_kwh: q_up_kw,
            price,
            is_event_shed: false,
            is_event_up: false,
        })
    }
}

/// Groups records by clock hour without classifying them.
///
/// When `prices` is given, a single-interval record takes its price from the
/// index at its timestamp, falling back to the price it already carries. A
/// record spanning several intervals keeps its own averaged price and only
/// consults the index when it has none. Hours with no intervals are dropped.
pub fn aggregate_hours<R: IntervalRecord>(
    records: &[R],
    prices: Option<&PriceIndex>,
) -> Vec<HourlyEvent> {
    let mut buckets: BTreeMap<NaiveDateTime, Bucket> = BTreeMap::new();
    for record in records {
        let ts = record.timestamp();
        let indexed = || prices.and_then(|index| index.get(&ts));
        let price = if record.interval_count() > 1 {
            record.price().or_else(indexed)
        } else {
            indexed().or_else(|| record.price())
        };
        buckets.entry(hour_start(&ts)).or_default().push(record, price);
    }
    buckets
        .into_iter()
        .filter_map(|(hour, bucket)| bucket.finish(hour))
        .collect()
}

/// Sets `is_event_*` on every hour against the given thresholds.
pub fn classify(hours: &mut [HourlyEvent], qmin: &QminTable, config: &EventsConfig) {
    for hour in hours.iter_mut() {
        hour.is_event_shed = qualifies(
            hour.active_ratio_shed,
            hour.q_shed_kw,
            qmin.get(hour.season, Direction::Shed),
            config.full_window_ratio,
        );
        hour.is_event_up = qualifies(
            hour.active_ratio_up,
            hour.q_up_kw,
            qmin.get(hour.season, Direction::Up),
            config.full_window_ratio,
        );
    }
}

/// Aggregates records to hours, derives Qmin, and classifies events.
pub fn standardize<R: IntervalRecord>(
    records: &[R],
    prices: Option<&PriceIndex>,
    config: &EventsConfig,
) -> (Vec<HourlyEvent>, QminTable) {
    let mut hours = aggregate_hours(records, prices);
    let qmin = QminTable::from_hours(&hours, config.qmin_ratio);
    for season in Season::ALL {
        debug!(
            %season,
            qmin_shed = qmin.get(season, Direction::Shed),
            qmin_up = qmin.get(season, Direction::Up),
            "seasonal Qmin"
        );
    }
    classify(&mut hours, &qmin, config);

    let counts = EventCounts::from_hours(&hours);
    for season in Season::ALL {
        let (shed, up) = counts.get(season);
        if shed + up > 0 {
            info!(%season, shed, up, "hourly events qualified");
        }
    }
    info!(
        hours = hours.len(),
        incomplete = counts.incomplete_hours,
        "hourly standardization complete"
    );
    (hours, qmin)
}

/// Event counts per season, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCounts {
    per_season: BTreeMap<Season, (usize, usize)>,
    pub total_hours: usize,
    pub incomplete_hours: usize,
}

impl EventCounts {
    pub fn from_hours(hours: &[HourlyEvent]) -> Self {
        let mut counts = Self {
            total_hours: hours.len(),
            ..Self::default()
        };
        for hour in hours {
            let entry = counts.per_season.entry(hour.season).or_insert((0, 0));
            entry.0 += usize::from(hour.is_event_shed);
            entry.1 += usize::from(hour.is_event_up);
            counts.incomplete_hours += usize::from(!hour.is_complete());
        }
        counts
    }

    /// `(shed, up)` event hours for a season.
    pub fn get(&self, season: Season) -> (usize, usize) {
        self.per_season.get(&season).copied().unwrap_or((0, 0))
    }
}

impl fmt::Display for EventCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Hourly Events ---")?;
        writeln!(f, "Hours:                 {}", self.total_hours)?;
        writeln!(f, "Incomplete hours:      {}", self.incomplete_hours)?;
        write!(f, "Season   Shed events  Up events")?;
        for season in Season::ALL {
            let (shed, up) = self.get(season);
            write!(f, "\n{season:<8} {shed:>11}  {up:>9}")?;
        }
        Ok(())
    }
}
