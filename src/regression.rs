//! Ordinary least squares with one regressor.

/// Fitted `y ≈ intercept + slope · x` with its coefficient of determination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    pub r_squared: f64,
}

impl LinearFit {
    /// Fits a simple linear regression over paired observations.
    ///
    /// A constant regressor yields a zero slope with the intercept at the mean
    /// of `ys`. When `ys` is itself constant, R² is `1.0` for a perfect fit and
    /// `0.0` otherwise.
    ///
    /// Returns `None` when the inputs are empty or differ in length.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        if xs.is_empty() || xs.len() != ys.len() {
            return None;
        }
        let n = xs.len() as f64;
        let x_mean = xs.iter().sum::<f64>() / n;
        let y_mean = ys.iter().sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (x, y) in xs.iter().zip(ys) {
            let dx = x - x_mean;
            sxx += dx * dx;
            sxy += dx * (y - y_mean);
        }

        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = y_mean - slope * x_mean;

        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for (x, y) in xs.iter().zip(ys) {
            let residual = y - (intercept + slope * x);
            ss_res += residual * residual;
            ss_tot += (y - y_mean) * (y - y_mean);
        }
        let r_squared = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Some(Self {
            intercept,
            slope,
            r_squared,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}
