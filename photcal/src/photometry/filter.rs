//! Photometric filters and their transmittance curves

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use super::spectrum::{read_two_columns, SpectrumError};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Filter {name:?} is not known for telescope {telescope}")]
    UnknownFilter { name: String, telescope: String },

    #[error("No filter naming table for telescope {0}")]
    UnknownTelescope(String),

    #[error("Could not read filter curve: {0}")]
    Curve(#[from] SpectrumError),
}

/// Tabulated filter transmittance, as delivered by the instrument team.
///
/// Samples are kept in file order; consumers that need ascending wavelengths
/// sort a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCurve {
    /// Wavelengths in Ångström
    wavelengths: Vec<f64>,

    /// Transmittance (0.0 to 1.0) at each wavelength
    transmittances: Vec<f64>,
}

impl FilterCurve {
    /// Build a curve from `(wavelength Å, transmittance)` pairs
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        let (wavelengths, transmittances) = pairs.iter().copied().unzip();
        Self {
            wavelengths,
            transmittances,
        }
    }

    /// Parse a two-column curve table, skipping any textual preamble
    pub fn from_reader<R: BufRead>(reader: R, source_name: &str) -> Result<Self, FilterError> {
        let (wavelengths, transmittances) = read_two_columns(reader, source_name)?;
        Ok(Self {
            wavelengths,
            transmittances,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, FilterError> {
        let file = File::open(path).map_err(SpectrumError::from)?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn transmittances(&self) -> &[f64] {
        &self.transmittances
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }
}

/// A filter as seen by the reduction: a canonical name and, when available,
/// its transmittance curve
#[derive(Debug, Clone)]
pub struct Filter {
    name: String,
    curve: Option<FilterCurve>,
}

impl Filter {
    pub fn new(name: impl Into<String>, curve: Option<FilterCurve>) -> Self {
        Self {
            name: name.into(),
            curve,
        }
    }

    /// Resolve the header spelling of a filter to its canonical name
    pub fn from_header_name(raw: &str, telescope: &str) -> Result<Self, FilterError> {
        Ok(Self::new(canonical_name(raw, telescope)?, None))
    }

    pub fn with_curve(mut self, curve: FilterCurve) -> Self {
        self.curve = Some(curve);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn curve(&self) -> Option<&FilterCurve> {
        self.curve.as_ref()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Map one of the many spellings found in observatory headers onto a single
/// canonical filter name.
///
/// Only the Sierra Nevada Observatory (`OSN`) table exists so far.
pub fn canonical_name(raw: &str, telescope: &str) -> Result<String, FilterError> {
    if telescope != "OSN" {
        return Err(FilterError::UnknownTelescope(telescope.to_string()));
    }

    let canonical = match raw.trim() {
        "rGu" | "rGunn" | "rgunn" | "Rgunn" | "gunnr" | "GunnR" | "gunnR" => "rGunn",
        "R" => "R",
        "H6607" | "H07" | "6607" => "H6607",
        "H6652" | "H52" | "6652" => "H6652",
        "H6650" | "H50" | "6650" => "H6650",
        "H6678" | "H78" | "6678" => "H6678",
        "Clear" | "Cle" | "clear" | "None" | "No" => "Clear",
        "I" => "I",
        "V" => "V",
        other => {
            return Err(FilterError::UnknownFilter {
                name: other.to_string(),
                telescope: telescope.to_string(),
            })
        }
    };

    Ok(canonical.to_string())
}
