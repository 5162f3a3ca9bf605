//! Moist-air enthalpy, the cooling-load driver.

/// Standard sea-level atmospheric pressure (hPa).
const ATMOSPHERIC_PRESSURE_HPA: f64 = 1013.25;

/// Saturation vapor pressure (hPa) by the Magnus approximation.
///
/// # Arguments
///
/// * `temperature_c` - Dry-bulb temperature (°C)
pub fn saturation_vapor_pressure_hpa(temperature_c: f64) -> f64 {
    6.112 * ((17.67 * temperature_c) / (temperature_c + 243.5)).exp()
}

/// Mixing ratio of water vapor to dry air (kg/kg) at standard pressure.
pub fn mixing_ratio(temperature_c: f64, relative_humidity_pct: f64) -> f64 {
    let vapor_pressure = saturation_vapor_pressure_hpa(temperature_c) * relative_humidity_pct / 100.0;
    0.622 * vapor_pressure / (ATMOSPHERIC_PRESSURE_HPA - vapor_pressure)
}

/// Specific enthalpy of moist air (kJ/kg).
///
/// `h = 1.006·T + w·(2501 + 1.86·T)` where `w` is the mixing ratio.
///
/// # Examples
///
/// ```
/// use dc_flex::weather::enthalpy;
///
/// // Dry air carries only sensible heat.
/// assert!((enthalpy(20.0, 0.0) - 20.12).abs() < 1e-9);
/// ```
pub fn enthalpy(temperature_c: f64, relative_humidity_pct: f64) -> f64 {
    let w = mixing_ratio(temperature_c, relative_humidity_pct);
    1.006 * temperature_c + w * (2501.0 + 1.86 * temperature_c)
}
