//! Exposure headers
//!
//! A [`Header`] is the keyword/value view of a FITS primary header plus named
//! accessors for the handful of fields the reduction reads: object text,
//! seeing, gain, exposure time, airmass, pixel shape and the astrometric
//! keywords. Which keyword holds which quantity differs between observatories,
//! so the names of the free-text and numeric ones are configurable through [`HeaderKeywords`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use fitsio::compat::fitsfile::FitsFile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wcs::WCS_KEYWORDS;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("Missing header keyword {0}")]
    MissingKeyword(String),

    #[error("Header keyword {key} is not {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::compat::errors::Error),
}

/// Value of a header card
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Integer(i64),
    Float(f64),
    Logical(bool),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(f) => Some(*f),
            HeaderValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::String(s) => write!(f, "{s}"),
            HeaderValue::Integer(i) => write!(f, "{i}"),
            HeaderValue::Float(x) => write!(f, "{x}"),
            HeaderValue::Logical(true) => write!(f, "T"),
            HeaderValue::Logical(false) => write!(f, "F"),
        }
    }
}

/// Names of the observatory-specific keywords
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderKeywords {
    pub object: String,
    pub seeing: String,
    pub gain: String,
    pub exposure_time: String,
    pub airmass: String,
    pub filter: String,
}

impl Default for HeaderKeywords {
    fn default() -> Self {
        Self {
            object: "OBJECT".to_string(),
            seeing: "SEEING".to_string(),
            gain: "GAIN".to_string(),
            exposure_time: "EXPTIME".to_string(),
            airmass: "AIRMASS".to_string(),
            filter: "FILTER".to_string(),
        }
    }
}

/// Width and height of an image in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    /// NAXIS1
    pub width: usize,
    /// NAXIS2
    pub height: usize,
}

impl ImageSize {
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Keyword/value header of one exposure
#[derive(Debug, Clone, Default)]
pub struct Header {
    /// Values keyed by upper-case keyword
    values: HashMap<String, HeaderValue>,
    keywords: HeaderKeywords,
    /// Image the header was read from, if any
    image_path: Option<PathBuf>,
}

impl Header {
    pub fn new(keywords: HeaderKeywords) -> Self {
        Self {
            values: HashMap::new(),
            keywords,
            image_path: None,
        }
    }

    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    /// Builder-style [`Header::insert`]
    pub fn with(mut self, key: &str, value: HeaderValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: HeaderValue) {
        self.values.insert(key.trim().to_uppercase(), value);
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.values.get(&key.trim().to_uppercase())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keywords(&self) -> &HeaderKeywords {
        &self.keywords
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    fn require(&self, key: &str) -> Result<&HeaderValue, HeaderError> {
        self.get(key)
            .ok_or_else(|| HeaderError::MissingKeyword(key.to_string()))
    }

    /// Numeric value of `key`
    pub fn get_f64(&self, key: &str) -> Result<f64, HeaderError> {
        self.require(key)?
            .as_f64()
            .ok_or_else(|| HeaderError::WrongType {
                key: key.to_string(),
                expected: "a number",
            })
    }

    /// String value of `key`
    pub fn get_str(&self, key: &str) -> Result<&str, HeaderError> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| HeaderError::WrongType {
                key: key.to_string(),
                expected: "a string",
            })
    }

    /// Free-text object field. Numeric values are rendered as written.
    pub fn object(&self) -> Result<String, HeaderError> {
        Ok(self.require(&self.keywords.object)?.to_string())
    }

    pub fn seeing(&self) -> Result<f64, HeaderError> {
        self.get_f64(&self.keywords.seeing)
    }

    pub fn gain(&self) -> Result<f64, HeaderError> {
        self.get_f64(&self.keywords.gain)
    }

    pub fn exposure_time(&self) -> Result<f64, HeaderError> {
        self.get_f64(&self.keywords.exposure_time)
    }

    pub fn airmass(&self) -> Result<f64, HeaderError> {
        self.get_f64(&self.keywords.airmass)
    }

    /// Filter name as written by the observatory
    pub fn filter(&self) -> Result<String, HeaderError> {
        Ok(self.require(&self.keywords.filter)?.to_string())
    }

    /// Pixel dimensions from NAXIS1/NAXIS2
    pub fn image_size(&self) -> Result<ImageSize, HeaderError> {
        let axis = |key: &str| -> Result<usize, HeaderError> {
            self.require(key)?
                .as_i64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| HeaderError::WrongType {
                    key: key.to_string(),
                    expected: "a non-negative integer",
                })
        };
        Ok(ImageSize::from_width_height(axis("NAXIS1")?, axis("NAXIS2")?))
    }

    /// Keyword/value pairs, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Read the primary header of a FITS file.
    ///
    /// Only what the reduction uses is fetched: the configured keywords, the
    /// image shape and the astrometric keywords. Absent keywords are simply
    /// left out of the header.
    pub fn from_fits_file(path: &Path, keywords: HeaderKeywords) -> Result<Self, HeaderError> {
        let fptr = FitsFile::open(path)?;
        let hdu = fptr.hdu(0)?;

        let mut header = Self::new(keywords.clone()).with_image_path(path);

        // OBJECT is free text but some observatories write plain numbers
        let object = keywords.object.as_str();
        if let Ok(text) = hdu.read_key::<String>(&fptr, object) {
            header.insert(object, HeaderValue::String(text));
        } else if let Ok(number) = hdu.read_key::<i64>(&fptr, object) {
            header.insert(object, HeaderValue::Integer(number));
        }

        for key in [keywords.filter.as_str(), "CTYPE1", "CTYPE2"] {
            if let Ok(text) = hdu.read_key::<String>(&fptr, key) {
                header.insert(key, HeaderValue::String(text));
            }
        }
        for key in ["NAXIS1", "NAXIS2"] {
            if let Ok(value) = hdu.read_key::<i64>(&fptr, key) {
                header.insert(key, HeaderValue::Integer(value));
            }
        }
        let numeric = [
            keywords.seeing.as_str(),
            keywords.gain.as_str(),
            keywords.exposure_time.as_str(),
            keywords.airmass.as_str(),
        ];
        for key in numeric.into_iter().chain(WCS_KEYWORDS) {
            if let Ok(value) = hdu.read_key::<f64>(&fptr, key) {
                header.insert(key, HeaderValue::Float(value));
            }
        }

        log::debug!("Read {} keywords from {}", header.len(), path.display());
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_proc::fits::write_image;
    use ndarray::Array2;
    use tempfile::TempDir;

    #[test]
    fn test_accessors_use_configured_keywords() {
        let keywords = HeaderKeywords {
            object: "IMAGETYP".to_string(),
            seeing: "FWHM".to_string(),
            ..HeaderKeywords::default()
        };
        let header = Header::new(keywords)
            .with("imagetyp", HeaderValue::String("dome flat".into()))
            .with("FWHM", HeaderValue::Float(2.5))
            .with("EXPTIME", HeaderValue::Integer(30))
            .with("NAXIS1", HeaderValue::Integer(100))
            .with("NAXIS2", HeaderValue::Integer(50));

        assert_eq!(header.object().unwrap(), "dome flat");
        assert_eq!(header.seeing().unwrap(), 2.5);
        assert_eq!(header.exposure_time().unwrap(), 30.0);
        assert_eq!(
            header.image_size().unwrap(),
            ImageSize::from_width_height(100, 50)
        );
        assert!(matches!(
            header.airmass(),
            Err(HeaderError::MissingKeyword(key)) if key == "AIRMASS"
        ));
    }

    #[test]
    fn test_wrong_type() {
        let header = Header::default().with("GAIN", HeaderValue::String("high".into()));
        assert!(matches!(
            header.gain(),
            Err(HeaderError::WrongType { .. })
        ));
    }

    #[test]
    fn test_numeric_object_field() {
        let header = Header::default().with("object", HeaderValue::Integer(123));
        assert_eq!(header.object().unwrap(), "123");
    }

    #[test]
    fn test_read_from_fits_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cig.fits");
        let written = Header::default()
            .with("OBJECT", HeaderValue::String("cig 0123".into()))
            .with("FILTER", HeaderValue::String("Rc".into()))
            .with("CTYPE1", HeaderValue::String("RA---TAN".into()))
            .with("CRVAL1", HeaderValue::Float(150.25))
            .with("AIRMASS", HeaderValue::Float(1.3))
            .with("OBSERVER", HeaderValue::String("nobody".into()));
        write_image(&path, &Array2::zeros((256, 512)), &written).unwrap();

        let header = Header::from_fits_file(&path, HeaderKeywords::default()).unwrap();
        assert_eq!(header.object().unwrap(), "cig 0123");
        assert_eq!(header.filter().unwrap(), "Rc");
        assert_eq!(header.get_str("CTYPE1").unwrap(), "RA---TAN");
        assert_eq!(header.get_f64("CRVAL1").unwrap(), 150.25);
        assert_eq!(header.airmass().unwrap(), 1.3);
        assert_eq!(
            header.image_size().unwrap(),
            ImageSize::from_width_height(512, 256)
        );
        assert_eq!(header.image_path(), Some(path.as_path()));

        // Keywords the reduction never looks at are not fetched
        assert!(!header.contains("OBSERVER"));
        assert!(matches!(header.seeing(), Err(HeaderError::MissingKeyword(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Header::from_fits_file(&dir.path().join("absent.fits"), HeaderKeywords::default()),
            Err(HeaderError::Fits(_))
        ));
    }
}
