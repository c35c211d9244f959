//! Flux of a standard star under a filter
//!
//! The stellar spectrum (AB magnitudes) and the filter transmittance are
//! sampled independently, so both are resampled onto a common 1 Å grid spanning
//! the filter, converted to flux density and summed.
//!
//! Units, CGS throughout:
//! - Wavelengths in Ångström
//! - Flux density f_λ in erg s⁻¹ cm⁻² Å⁻¹
//! - Integrated flux in erg s⁻¹ cm⁻²

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::filter::FilterCurve;
use super::interp::{CubicSpline, InterpError, LinearInterpolator, OutOfBounds};
use super::spectrum::Spectrum;

/// Speed of light in Å/s, rounded the way the calibration tables were built
pub const SPEED_OF_LIGHT_ANGSTROM_PER_S: f64 = 3e18;

/// AB magnitude of a source with f_ν = 1 erg s⁻¹ cm⁻² Hz⁻¹
pub const AB_ZERO_POINT_MAG: f64 = -48.6;

/// Largest integration grid accepted, 100 µm of support at 1 Å steps
pub const MAX_GRID_POINTS: usize = 1_000_000;

#[derive(Debug, Error)]
pub enum FluxError {
    #[error("Cannot integrate an empty {0}")]
    EmptyCurve(&'static str),

    #[error("Filter wavelengths are not monotonic after sorting (repeated value {0})")]
    NotMonotonic(f64),

    #[error("Filter wavelength {0} Å is not a positive finite number")]
    InvalidWavelength(f64),

    #[error("Filter support {min}..{max} Å needs more than {MAX_GRID_POINTS} grid points")]
    GridTooLarge { min: f64, max: f64 },

    #[error("Interpolation failed: {0}")]
    Interp(#[from] InterpError),
}

/// Out-of-support behaviour of the two resampled curves.
///
/// Both default to filling with zero. For the magnitude this is an
/// approximation: a zero magnitude is a very bright source, so a spectrum that
/// does not cover the whole filter inflates the flux.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InterpolationPolicy {
    #[serde(default)]
    pub transmittance: OutOfBounds,
    #[serde(default)]
    pub magnitude: OutOfBounds,
}

/// Convert an AB magnitude to f_λ (erg s⁻¹ cm⁻² Å⁻¹) at a wavelength in Å
pub fn ab_magnitude_to_flux_density(magnitude: f64, wavelength_angstrom: f64) -> f64 {
    let f_nu = 10f64.powf((AB_ZERO_POINT_MAG - magnitude) / 2.5);
    f_nu * SPEED_OF_LIGHT_ANGSTROM_PER_S / (wavelength_angstrom * wavelength_angstrom)
}

/// Integer wavelengths in `[ceil(min), floor(max)]`, at most
/// [`MAX_GRID_POINTS`] of them
pub fn wavelength_grid(min_angstrom: f64, max_angstrom: f64) -> Result<Vec<f64>, FluxError> {
    let first = min_angstrom.ceil();
    let last = max_angstrom.floor();
    if last - first >= MAX_GRID_POINTS as f64 {
        return Err(FluxError::GridTooLarge {
            min: min_angstrom,
            max: max_angstrom,
        });
    }
    let (first, last) = (first as i64, last as i64);
    Ok((first..=last).map(|wavelength| wavelength as f64).collect())
}

/// Filter samples ordered by wavelength, without touching the caller's curve
fn sorted_samples(curve: &FilterCurve) -> Result<(Vec<f64>, Vec<f64>), FluxError> {
    let mut samples: Vec<(f64, f64)> = curve
        .wavelengths()
        .iter()
        .copied()
        .zip(curve.transmittances().iter().copied())
        .collect();
    if let Some(&(wavelength, _)) = samples
        .iter()
        .find(|(wavelength, _)| !wavelength.is_finite() || *wavelength <= 0.0)
    {
        return Err(FluxError::InvalidWavelength(wavelength));
    }
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    if let Some(pair) = samples
        .windows(2)
        .find(|pair| pair[0].0.partial_cmp(&pair[1].0) != Some(Ordering::Less))
    {
        return Err(FluxError::NotMonotonic(pair[1].0));
    }

    Ok(samples.into_iter().unzip())
}

/// Integrate the flux of `spectrum` seen through `curve`.
///
/// Returns `Ok(None)` when the filter support holds fewer than two grid points.
/// The transmittance is resampled with a cubic spline and the magnitudes
/// linearly; the product is summed with the rectangle rule, a first-order
/// approximation whose error grows when the filter curve is coarse.
///
/// # Errors
///
/// * `EmptyCurve` - spectrum or filter curve has no samples
/// * `InvalidWavelength` - a filter wavelength is NaN, infinite or not positive
/// * `NotMonotonic` - the filter repeats a wavelength
/// * `GridTooLarge` - the filter support exceeds [`MAX_GRID_POINTS`] Å
/// * `Interp` - a curve cannot be interpolated, or a sample falls outside its
///   support under an `OutOfBounds::Error` policy
pub fn integrate_flux(
    spectrum: &Spectrum,
    curve: &FilterCurve,
    policy: &InterpolationPolicy,
) -> Result<Option<f64>, FluxError> {
    if spectrum.is_empty() {
        return Err(FluxError::EmptyCurve("spectrum"));
    }
    if curve.is_empty() {
        return Err(FluxError::EmptyCurve("filter curve"));
    }

    let (filter_wavelengths, transmittances) = sorted_samples(curve)?;
    let grid = wavelength_grid(
        filter_wavelengths[0],
        filter_wavelengths[filter_wavelengths.len() - 1],
    )?;
    if grid.len() < 2 {
        log::debug!(
            "Filter support yields {} grid points, nothing to integrate",
            grid.len()
        );
        return Ok(None);
    }
    log::debug!(
        "Integrating on {} points from {} to {} Å",
        grid.len(),
        grid[0],
        grid[grid.len() - 1]
    );

    let transmittance = CubicSpline::new(filter_wavelengths, transmittances, policy.transmittance)?;
    let magnitude = LinearInterpolator::new(
        spectrum.wavelengths(),
        spectrum.magnitudes(),
        policy.magnitude,
    )?;

    let delta_lambda = grid[1] - grid[0];
    let mut total = 0.0;
    for &wavelength in &grid {
        let flux_density = ab_magnitude_to_flux_density(magnitude.at(wavelength)?, wavelength);
        total += transmittance.at(wavelength)? * flux_density * delta_lambda;
    }

    Ok(Some(total))
}
