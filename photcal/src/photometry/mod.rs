//! Photometry models and utilities

pub mod filter;
pub mod flux;
pub mod interp;
pub mod photometer;
pub mod spectrum;

pub use filter::{Filter, FilterCurve, FilterError};
pub use flux::{integrate_flux, FluxError, InterpolationPolicy};
pub use interp::{CubicSpline, InterpError, LinearInterpolator, OutOfBounds};
pub use photometer::{Photometer, PhotometerCommand, PhotometryError, PhotometryRequest};
pub use spectrum::{normalize_name, Spectrum, SpectrumError, SpectrumStore};
