//! Weather-driven load decomposition via an enthalpy change-point regression.
//!
//! Total metered energy is split into a cooling component that grows linearly
//! above an enthalpy threshold and a weather-independent base load. The base
//! load is then divided into IT and Other so the facility reaches a target PUE.

use std::fmt;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::config::{ConfigError, DecompositionConfig};
use crate::error::Result;
use crate::regression::LinearFit;
use crate::series::{Sample, validate_contiguous};

/// Fitted change-point parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangePointModel {
    /// Enthalpy above which cooling load activates (kJ/kg).
    pub threshold: f64,
    /// Cooling energy per unit of enthalpy above the threshold (kWh per kJ/kg).
    pub sensitivity: f64,
    /// Intercept of the fit (kWh).
    pub base: f64,
    /// Coefficient of determination of the selected fit.
    pub r_squared: f64,
}

impl ChangePointModel {
    /// Modelled cooling energy for one interval, `sensitivity · max(0, h − threshold)`.
    pub fn cooling(&self, enthalpy: f64) -> f64 {
        self.sensitivity * (enthalpy - self.threshold).max(0.0)
    }
}

/// R² of one candidate threshold in the sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub threshold: f64,
    pub r_squared: f64,
}

/// Per-sample load components, in the energy unit of the input (kWh per interval).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecomposedSample {
    pub timestamp: NaiveDateTime,
    pub measured_kwh: f64,
    pub it_kwh: f64,
    pub cooling_kwh: f64,
    pub other_kwh: f64,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub enthalpy: f64,
}

impl DecomposedSample {
    pub fn component_sum(&self) -> f64 {
        self.it_kwh + self.cooling_kwh + self.other_kwh
    }
}

/// Other-to-IT ratio needed for `total / IT == target_pue`.
///
/// `k = target_pue · (1 − cooling_ratio) − 1`. The second value is `false`
/// when the raw `k` was negative and has been clamped to zero.
pub fn other_to_it_ratio(target_pue: f64, cooling_ratio: f64) -> (f64, bool) {
    let k = target_pue * (1.0 - cooling_ratio) - 1.0;
    if k < 0.0 { (0.0, false) } else { (k, true) }
}

/// Splits one interval into (IT, Cooling, Other).
///
/// The base load `measured − cooling` is clipped at zero, so when modelled
/// cooling exceeds the metered energy IT and Other are both zero and the
/// components no longer sum to `measured`.
pub fn split_components(measured: f64, cooling: f64, k: f64) -> (f64, f64, f64) {
    let base_load = (measured - cooling).max(0.0);
    let it = base_load / (1.0 + k);
    let other = base_load * k / (1.0 + k);
    (it, cooling, other)
}

/// Fits the change-point model over an integer threshold sweep.
///
/// Thresholds are visited in ascending order and a candidate replaces the
/// current best only on a strictly greater R², so ties keep the lowest
/// threshold. Returns the best model and the full sweep, or `None` when the
/// sweep range or the series is empty.
pub fn fit_change_point(
    enthalpy: &[f64],
    measured: &[f64],
    threshold_min: i32,
    threshold_max: i32,
) -> Option<(ChangePointModel, Vec<SweepPoint>)> {
    let mut best: Option<ChangePointModel> = None;
    let mut sweep = Vec::new();
    let mut regressor = vec![0.0; enthalpy.len()];

    for threshold in threshold_min..=threshold_max {
        let tau = f64::from(threshold);
        for (x, h) in regressor.iter_mut().zip(enthalpy) {
            *x = (h - tau).max(0.0);
        }
        let Some(fit) = LinearFit::fit(&regressor, measured) else {
            continue;
        };
        sweep.push(SweepPoint {
            threshold: tau,
            r_squared: fit.r_squared,
        });
        if best.is_none_or(|b| fit.r_squared > b.r_squared) {
            best = Some(ChangePointModel {
                threshold: tau,
                sensitivity: fit.slope,
                base: fit.intercept,
                r_squared: fit.r_squared,
            });
        }
    }

    best.map(|model| (model, sweep))
}

/// Output of the decomposition engine.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub model: ChangePointModel,
    /// R² of every swept threshold, ascending.
    pub sweep: Vec<SweepPoint>,
    /// Other/IT ratio actually applied.
    pub other_to_it: f64,
    /// Whether the target PUE was reachable without clamping.
    pub target_reachable: bool,
    pub target_pue: f64,
    /// `total measured / total IT` after the split.
    pub achieved_pue: f64,
    /// Share of total energy attributed to cooling.
    pub cooling_ratio: f64,
    pub rows: Vec<DecomposedSample>,
}

impl Decomposition {
    /// Decomposes a contiguous 15-minute series.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EmptyInput`] for an empty series and
    /// [`crate::Error::Validation`] for gaps, duplicates, or non-finite values.
    pub fn run(samples: &[Sample], config: &DecompositionConfig) -> Result<Self> {
        validate_contiguous(samples)?;

        let enthalpy: Vec<f64> = samples.iter().map(Sample::enthalpy).collect();
        let measured: Vec<f64> = samples.iter().map(|s| s.measured_kwh).collect();

        let Some((model, sweep)) = fit_change_point(
            &enthalpy,
            &measured,
            config.threshold_min,
            config.threshold_max,
        ) else {
            return Err(ConfigError::new("decomposition.threshold_min", "threshold sweep is empty").into());
        };

        info!(
            threshold = model.threshold,
            sensitivity = format!("{:.4}", model.sensitivity),
            base = format!("{:.2}", model.base),
            r_squared = format!("{:.4}", model.r_squared),
            "change-point model fitted"
        );
        if model.r_squared < config.min_r_squared {
            warn!(
                r_squared = model.r_squared,
                floor = config.min_r_squared,
                "change-point fit is poor, continuing with best-effort model"
            );
        }

        let cooling: Vec<f64> = enthalpy.iter().map(|&h| model.cooling(h)).collect();
        let total_energy: f64 = measured.iter().sum();
        let total_cooling: f64 = cooling.iter().sum();
        let cooling_ratio = if total_energy > 0.0 {
            total_cooling / total_energy
        } else {
            0.0
        };

        let (other_to_it, target_reachable) = other_to_it_ratio(config.target_pue, cooling_ratio);
        if !target_reachable {
            warn!(
                target_pue = config.target_pue,
                cooling_ratio = format!("{cooling_ratio:.4}"),
                "target PUE is unreachable with the modelled cooling load, forcing k = 0"
            );
        }

        let rows: Vec<DecomposedSample> = samples
            .iter()
            .zip(enthalpy.iter().zip(&cooling))
            .map(|(sample, (&h, &cool))| {
                let (it, cooling_kwh, other) =
                    split_components(sample.measured_kwh, cool, other_to_it);
                DecomposedSample {
                    timestamp: sample.timestamp,
                    measured_kwh: sample.measured_kwh,
                    it_kwh: it,
                    cooling_kwh,
                    other_kwh: other,
                    temperature_c: sample.temperature_c,
                    humidity_pct: sample.humidity_pct,
                    enthalpy: h,
                }
            })
            .collect();

        let total_it: f64 = rows.iter().map(|r| r.it_kwh).sum();
        let achieved_pue = if total_it > 0.0 {
            total_energy / total_it
        } else {
            f64::NAN
        };
        info!(
            other_to_it = format!("{other_to_it:.4}"),
            achieved_pue = format!("{achieved_pue:.4}"),
            "load decomposed"
        );

        Ok(Self {
            model,
            sweep,
            other_to_it,
            target_reachable,
            target_pue: config.target_pue,
            achieved_pue,
            cooling_ratio,
            rows,
        })
    }

    /// Number of intervals where modelled cooling exceeded metered energy.
    pub fn clipped_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.cooling_kwh > r.measured_kwh)
            .count()
    }

    fn mean_of(&self, f: impl Fn(&DecomposedSample) -> f64) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().map(f).sum::<f64>() / self.rows.len() as f64
    }
}

impl fmt::Display for Decomposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Load Decomposition ---")?;
        writeln!(
            f,
            "Enthalpy threshold:    {:.0} kJ/kg (R²={:.4})",
            self.model.threshold, self.model.r_squared
        )?;
        writeln!(
            f,
            "Cooling sensitivity:   {:.4} kWh per kJ/kg",
            self.model.sensitivity
        )?;
        writeln!(f, "Intercept:             {:.2} kWh", self.model.base)?;
        writeln!(f, "Cooling share:         {:.2}%", self.cooling_ratio * 100.0)?;
        writeln!(
            f,
            "Other/IT ratio:        {:.4}{}",
            self.other_to_it,
            if self.target_reachable { "" } else { " (clamped)" }
        )?;
        writeln!(
            f,
            "PUE target/achieved:   {:.3} / {:.3}",
            self.target_pue, self.achieved_pue
        )?;
        writeln!(
            f,
            "Mean IT/Cooling/Other: {:.2} / {:.2} / {:.2} kWh",
            self.mean_of(|r| r.it_kwh),
            self.mean_of(|r| r.cooling_kwh),
            self.mean_of(|r| r.other_kwh)
        )?;
        write!(f, "Clipped intervals:     {}", self.clipped_count())
    }
}
