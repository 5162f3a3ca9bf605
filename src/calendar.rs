//! Seasons, DR directions, and the calendar table of dispatch windows.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::series::is_weekend;

/// Meteorological season derived from the calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub const ALL: [Self; 4] = [Self::Spring, Self::Summer, Self::Fall, Self::Winter];

    /// Mar–May spring, Jun–Aug summer, Sep–Nov fall, Dec–Feb winter.
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            9..=11 => Self::Fall,
            _ => Self::Winter,
        }
    }

    pub fn of(timestamp: &NaiveDateTime) -> Self {
        Self::from_month(timestamp.month())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Fall => "Fall",
            Self::Winter => "Winter",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spring" => Ok(Self::Spring),
            "summer" => Ok(Self::Summer),
            "fall" | "autumn" => Ok(Self::Fall),
            "winter" => Ok(Self::Winter),
            other => Err(format!("unknown season \"{other}\"")),
        }
    }
}

/// Demand-response direction: reduce load (`Shed`) or absorb extra load (`Up`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Shed,
    Up,
}

impl Direction {
    pub const ALL: [Self; 2] = [Self::Shed, Self::Up];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shed => "Shed",
            Self::Up => "Up",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-sample window membership. Never both `true` once resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowMask {
    pub shed: bool,
    pub up: bool,
}

impl WindowMask {
    pub fn is_active(&self, direction: Direction) -> bool {
        match direction {
            Direction::Shed => self.shed,
            Direction::Up => self.up,
        }
    }

    /// Shed wins over up. Returns the resolved mask and whether an overlap was cleared.
    pub fn resolve_overlap(self) -> (Self, bool) {
        if self.shed && self.up {
            (
                Self {
                    shed: true,
                    up: false,
                },
                true,
            )
        } else {
            (self, false)
        }
    }
}

/// Set of clock hours `0..24` stored as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HourSet(u32);

impl HourSet {
    pub const EMPTY: Self = Self(0);

    /// Builds a set from hour values; hours `>= 24` are ignored.
    pub fn from_hours(hours: &[u32]) -> Self {
        Self(
            hours
                .iter()
                .filter(|&&h| h < 24)
                .fold(0, |bits, &h| bits | (1 << h)),
        )
    }

    pub fn contains(self, hour: u32) -> bool {
        hour < 24 && self.0 & (1 << hour) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn hours(self) -> impl Iterator<Item = u32> {
        (0..24).filter(move |&h| self.contains(h))
    }
}

/// One row of the window table: the hours of `season` open to `direction`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowRule {
    pub season: Season,
    pub direction: Direction,
    pub hours: Vec<u32>,
}

impl WindowRule {
    pub fn new(season: Season, direction: Direction, hours: &[u32]) -> Self {
        Self {
            season,
            direction,
            hours: hours.to_vec(),
        }
    }

    /// The standard data-center DR window table.
    ///
    /// | Season | Shed hours         | Up hours   |
    /// |--------|--------------------|------------|
    /// | Summer | 11, 13, 14, 15, 16 | none       |
    /// | Fall   | none               | 11, 12, 13 |
    /// | Winter | 8, 9, 10, 11, 15   | 12, 13     |
    /// | Spring | 10                 | 12, 13, 14 |
    pub fn standard_table() -> Vec<Self> {
        vec![
            Self::new(Season::Summer, Direction::Shed, &[11, 13, 14, 15, 16]),
            Self::new(Season::Fall, Direction::Up, &[11, 12, 13]),
            Self::new(Season::Winter, Direction::Shed, &[8, 9, 10, 11, 15]),
            Self::new(Season::Winter, Direction::Up, &[12, 13]),
            Self::new(Season::Spring, Direction::Shed, &[10]),
            Self::new(Season::Spring, Direction::Up, &[12, 13, 14]),
        ]
    }
}

/// Lookup from (season, direction) to window hours.
///
/// Pairs without a rule have no window. Rules for the same pair are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCalendar {
    hours: [[HourSet; 2]; 4],
    weekdays_only: bool,
}

impl WindowCalendar {
    pub fn from_rules(rules: &[WindowRule], weekdays_only: bool) -> Self {
        let mut hours = [[HourSet::EMPTY; 2]; 4];
        for rule in rules {
            let slot = &mut hours[rule.season.index()][rule.direction.index()];
            *slot = slot.union(HourSet::from_hours(&rule.hours));
        }
        Self {
            hours,
            weekdays_only,
        }
    }

    pub fn standard() -> Self {
        Self::from_rules(&WindowRule::standard_table(), true)
    }

    pub fn hours(&self, season: Season, direction: Direction) -> HourSet {
        self.hours[season.index()][direction.index()]
    }

    pub fn has_window(&self, season: Season, direction: Direction) -> bool {
        !self.hours(season, direction).is_empty()
    }

    pub fn weekdays_only(&self) -> bool {
        self.weekdays_only
    }

    /// Window membership straight from the table, before overlap resolution.
    pub fn raw_mask(&self, timestamp: &NaiveDateTime) -> WindowMask {
        if self.weekdays_only && is_weekend(timestamp) {
            return WindowMask::default();
        }
        let season = Season::of(timestamp);
        let hour = timestamp.hour();
        WindowMask {
            shed: self.hours(season, Direction::Shed).contains(hour),
            up: self.hours(season, Direction::Up).contains(hour),
        }
    }
}

impl Default for WindowCalendar {
    fn default() -> Self {
        Self::standard()
    }
}
