//! TOML-based analysis configuration and preset definitions.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::calendar::{Season, WindowCalendar, WindowRule};

/// Top-level analysis configuration parsed from TOML.
///
/// All fields have defaults matching the baseline analysis. Load from
/// TOML with [`AnalysisConfig::from_toml_file`] or use
/// [`AnalysisConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Change-point fit and PUE calibration.
    #[serde(default)]
    pub decomposition: DecompositionConfig,
    /// Shed/up potential coefficients.
    #[serde(default)]
    pub potential: PotentialConfig,
    /// DR window table.
    #[serde(default)]
    pub calendar: CalendarConfig,
    /// Hourly event qualification.
    #[serde(default)]
    pub events: EventsConfig,
    /// Committed-capacity reliability metrics.
    #[serde(default)]
    pub reliability: ReliabilityConfig,
    /// Quality-control sanity band.
    #[serde(default)]
    pub qc: QcConfig,
    /// Synthetic series extension.
    #[serde(default)]
    pub synthetic: SyntheticConfig,
}

/// Change-point regression sweep and PUE target.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecompositionConfig {
    /// First swept enthalpy threshold (kJ/kg, inclusive).
    pub threshold_min: i32,
    /// Last swept enthalpy threshold (kJ/kg, inclusive).
    pub threshold_max: i32,
    /// Facility PUE the Other/IT split is calibrated to.
    pub target_pue: f64,
    /// R² below this value is reported as a poor fit.
    pub min_r_squared: f64,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            threshold_min: 10,
            threshold_max: 59,
            target_pue: 1.35,
            min_r_squared: 0.0,
        }
    }
}

/// Coefficients of the shed and up potentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PotentialConfig {
    /// Sheddable fraction of IT power.
    pub alpha_it: f64,
    /// Sheddable fraction of cooling power in summer.
    pub alpha_cool_summer: f64,
    /// Sheddable fraction of cooling power outside summer.
    pub alpha_cool_other: f64,
    /// Fraction of IT power that can be brought forward for up-regulation.
    pub alpha_it_forward: f64,
    /// Fixed storage contribution added inside every window (kW).
    pub ess_fixed_kw: f64,
}

impl Default for PotentialConfig {
    fn default() -> Self {
        Self {
            alpha_it: 0.10,
            alpha_cool_summer: 0.15,
            alpha_cool_other: 0.10,
            alpha_it_forward: 0.10,
            ess_fixed_kw: 1250.0,
        }
    }
}

impl PotentialConfig {
    pub fn alpha_cool(&self, season: Season) -> f64 {
        if season == Season::Summer {
            self.alpha_cool_summer
        } else {
            self.alpha_cool_other
        }
    }
}

/// DR window table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalendarConfig {
    /// Weekend hours never open a window when set.
    pub weekdays_only: bool,
    /// Window rules; omitted means the standard table.
    pub rules: Vec<WindowRule>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            weekdays_only: true,
            rules: WindowRule::standard_table(),
        }
    }
}

impl CalendarConfig {
    pub fn build(&self) -> WindowCalendar {
        WindowCalendar::from_rules(&self.rules, self.weekdays_only)
    }
}

/// Hourly event qualification thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Qmin as a fraction of the seasonal mean of positive hourly potential.
    pub qmin_ratio: f64,
    /// Minimum active ratio for an hour to qualify (1.0 = fully inside window).
    pub full_window_ratio: f64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            qmin_ratio: 0.3,
            full_window_ratio: 1.0,
        }
    }
}

/// Reliability metric parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReliabilityConfig {
    /// Commitment percentile as a fraction (0.9 = P90).
    pub percentile: f64,
    /// Tolerant shortfall counts hours below `tolerance × committed`.
    pub tolerance: f64,
    /// Only weekday event hours are scored when set.
    pub weekdays_only: bool,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            percentile: 0.90,
            tolerance: 0.95,
            weekdays_only: true,
        }
    }
}

/// Quality-control sanity band for total facility power.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QcConfig {
    /// Lowest plausible total power (kW).
    pub min_total_kw: f64,
    /// Highest plausible total power (kW).
    pub max_total_kw: f64,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            min_total_kw: 500.0,
            max_total_kw: 10_000.0,
        }
    }
}

/// Which profile season and noise scale synthesize a calendar month.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonthProfile {
    /// Calendar months (1–12) this mapping covers.
    pub months: Vec<u32>,
    /// Season whose profile is sampled.
    pub season: Season,
    /// Multiplier on the profile standard deviation.
    #[serde(default = "unit_scale")]
    pub noise_scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

/// Synthetic series extension parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticConfig {
    /// Random seed for profile noise.
    pub seed: u64,
    /// Month to profile mapping.
    pub months: Vec<MonthProfile>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            months: vec![
                MonthProfile {
                    months: vec![1, 2],
                    season: Season::Winter,
                    noise_scale: 0.7,
                },
                MonthProfile {
                    months: vec![3, 4, 5],
                    season: Season::Fall,
                    noise_scale: 1.0,
                },
                MonthProfile {
                    months: vec![6, 7, 8],
                    season: Season::Summer,
                    noise_scale: 1.0,
                },
                MonthProfile {
                    months: vec![9, 10, 11, 12],
                    season: Season::Fall,
                    noise_scale: 1.0,
                },
            ],
        }
    }
}

impl SyntheticConfig {
    pub fn month_profile(&self, month: u32) -> Option<&MonthProfile> {
        self.months.iter().find(|m| m.months.contains(&month))
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"decomposition.target_pue"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

fn check_fraction(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::new(field, "must be in [0.0, 1.0]"));
    }
}

impl AnalysisConfig {
    /// Returns the baseline analysis with the standard coefficients and window table.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the no-storage preset: the fixed ESS contribution is removed.
    pub fn no_ess() -> Self {
        Self {
            potential: PotentialConfig {
                ess_fixed_kw: 0.0,
                ..PotentialConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the aggressive preset: deeper IT and cooling shed fractions.
    pub fn aggressive() -> Self {
        Self {
            potential: PotentialConfig {
                alpha_it: 0.15,
                alpha_cool_summer: 0.25,
                alpha_cool_other: 0.15,
                alpha_it_forward: 0.15,
                ..PotentialConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "no_ess", "aggressive"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "no_ess" => Ok(Self::no_ess()),
            "aggressive" => Ok(Self::aggressive()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let d = &self.decomposition;
        if d.threshold_min > d.threshold_max {
            errors.push(ConfigError::new(
                "decomposition.threshold_min",
                "must be <= decomposition.threshold_max",
            ));
        }
        if !(d.target_pue >= 1.0) {
            errors.push(ConfigError::new("decomposition.target_pue", "must be >= 1.0"));
        }
        if !d.min_r_squared.is_finite() {
            errors.push(ConfigError::new(
                "decomposition.min_r_squared",
                "must be a finite number",
            ));
        }

        let p = &self.potential;
        check_fraction(&mut errors, "potential.alpha_it", p.alpha_it);
        check_fraction(&mut errors, "potential.alpha_cool_summer", p.alpha_cool_summer);
        check_fraction(&mut errors, "potential.alpha_cool_other", p.alpha_cool_other);
        check_fraction(&mut errors, "potential.alpha_it_forward", p.alpha_it_forward);
        if !(p.ess_fixed_kw >= 0.0) {
            errors.push(ConfigError::new("potential.ess_fixed_kw", "must be >= 0"));
        }

        let mut seen = BTreeSet::new();
        for (i, rule) in self.calendar.rules.iter().enumerate() {
            if let Some(hour) = rule.hours.iter().find(|&&h| h >= 24) {
                errors.push(ConfigError::new(
                    format!("calendar.rules[{i}].hours"),
                    format!("hour {hour} is outside 0..24"),
                ));
            }
            if !seen.insert((rule.season, rule.direction)) {
                errors.push(ConfigError::new(
                    format!("calendar.rules[{i}]"),
                    format!("duplicate rule for {} {}", rule.season, rule.direction),
                ));
            }
        }

        let e = &self.events;
        if !(e.qmin_ratio >= 0.0) {
            errors.push(ConfigError::new("events.qmin_ratio", "must be >= 0"));
        }
        if !(e.full_window_ratio > 0.0 && e.full_window_ratio <= 1.0) {
            errors.push(ConfigError::new(
                "events.full_window_ratio",
                "must be in (0.0, 1.0]",
            ));
        }

        let r = &self.reliability;
        check_fraction(&mut errors, "reliability.percentile", r.percentile);
        check_fraction(&mut errors, "reliability.tolerance", r.tolerance);

        let q = &self.qc;
        if !(q.min_total_kw < q.max_total_kw) {
            errors.push(ConfigError::new(
                "qc.min_total_kw",
                "must be < qc.max_total_kw",
            ));
        }

        let mut months = BTreeSet::new();
        for (i, mapping) in self.synthetic.months.iter().enumerate() {
            for &month in &mapping.months {
                if !(1..=12).contains(&month) {
                    errors.push(ConfigError::new(
                        format!("synthetic.months[{i}].months"),
                        format!("month {month} is outside 1..=12"),
                    ));
                } else if !months.insert(month) {
                    errors.push(ConfigError::new(
                        format!("synthetic.months[{i}].months"),
                        format!("month {month} is mapped more than once"),
                    ));
                }
            }
            if !(mapping.noise_scale >= 0.0) {
                errors.push(ConfigError::new(
                    format!("synthetic.months[{i}].noise_scale"),
                    "must be >= 0",
                ));
            }
        }

        errors
    }
}
