//! Measured spectra of standard stars
//!
//! Spectra are stored one file per star as whitespace separated
//! `wavelength magnitude` columns (Ångström, AB magnitude). Every file starts
//! with a free-text preamble of unknown length; the first line consisting of
//! exactly two numbers marks the start of the table.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while reading tabulated curves
#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("No spectrum file at {0}")]
    NotFound(PathBuf),

    #[error("No numeric data line found in {0}")]
    NoNumericData(String),

    #[error("Unparsable data line {line} in {source_name}: {content:?}")]
    MalformedLine {
        source_name: String,
        line: usize,
        content: String,
    },

    #[error("Wavelengths in {0} are not strictly ascending")]
    NotAscending(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A standard star spectrum sampled at ascending wavelengths
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Wavelengths in Ångström
    wavelengths: Vec<f64>,

    /// AB magnitudes at each wavelength
    magnitudes: Vec<f64>,
}

impl Spectrum {
    /// Build a spectrum from `(wavelength Å, AB magnitude)` pairs
    ///
    /// # Errors
    ///
    /// `NotAscending` if the wavelengths are not strictly increasing
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, SpectrumError> {
        let (wavelengths, magnitudes) = pairs.iter().copied().unzip();
        Self::from_columns(wavelengths, magnitudes, "spectrum")
    }

    fn from_columns(
        wavelengths: Vec<f64>,
        magnitudes: Vec<f64>,
        source_name: &str,
    ) -> Result<Self, SpectrumError> {
        if !wavelengths.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(SpectrumError::NotAscending(source_name.to_string()));
        }
        Ok(Self {
            wavelengths,
            magnitudes,
        })
    }

    /// Parse a spectrum table, skipping its textual preamble
    pub fn from_reader<R: BufRead>(reader: R, source_name: &str) -> Result<Self, SpectrumError> {
        let (wavelengths, magnitudes) = read_two_columns(reader, source_name)?;
        Self::from_columns(wavelengths, magnitudes, source_name)
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }
}

/// Parse `token token` as two floats
fn numeric_pair(line: &str) -> Option<(f64, f64)> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?.parse::<f64>().ok()?;
    let second = tokens.next()?.parse::<f64>().ok()?;
    Some((first, second))
}

/// Number of preamble lines before the first line made of exactly two numbers
pub fn header_length(lines: &[String]) -> Option<usize> {
    lines
        .iter()
        .position(|line| line.split_whitespace().count() == 2 && numeric_pair(line).is_some())
}

/// Read a two-column numeric table preceded by a free-text header.
///
/// Blank lines and `#` comments inside the table are ignored; any other line
/// whose first two tokens are not numbers is an error. Tokens past the second
/// are ignored.
pub fn read_two_columns<R: BufRead>(
    reader: R,
    source_name: &str,
) -> Result<(Vec<f64>, Vec<f64>), SpectrumError> {
    let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;

    let skip = header_length(&lines)
        .ok_or_else(|| SpectrumError::NoNumericData(source_name.to_string()))?;
    log::debug!("{source_name}: skipping {skip} header lines");

    let mut first = Vec::new();
    let mut second = Vec::new();
    for (index, line) in lines.iter().enumerate().skip(skip) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (a, b) = numeric_pair(trimmed).ok_or_else(|| SpectrumError::MalformedLine {
            source_name: source_name.to_string(),
            line: index + 1,
            content: line.clone(),
        })?;
        first.push(a);
        second.push(b);
    }

    Ok((first, second))
}

/// Canonical file name for an object: lowercase, whitespace and punctuation removed
///
/// ```rust
/// use photcal::photometry::spectrum::normalize_name;
///
/// assert_eq!(normalize_name("BD+28 4211"), "bd284211");
/// assert_eq!(normalize_name("Feige_34"), "feige34");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Directory of per-star spectrum files
#[derive(Debug, Clone)]
pub struct SpectrumStore {
    root: PathBuf,
}

impl SpectrumStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the spectrum file for `objname`
    pub fn path_for(&self, objname: &str) -> PathBuf {
        self.root.join(normalize_name(objname))
    }

    /// Load the spectrum of a standard star
    pub fn load(&self, objname: &str) -> Result<Spectrum, SpectrumError> {
        let path = self.path_for(objname);
        if !path.is_file() {
            return Err(SpectrumError::NotFound(path));
        }

        log::info!("Loading spectrum of {objname} from {}", path.display());
        let reader = BufReader::new(File::open(&path)?);
        Spectrum::from_reader(reader, &path.display().to_string())
    }
}
