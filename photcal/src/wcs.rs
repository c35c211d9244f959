//! World coordinate system of an exposure
//!
//! Maps FITS pixel coordinates to right ascension and declination for
//! gnomonic (`-TAN`) projections. The linear part is read either from a CD
//! matrix or from CDELT combined with a PC matrix or a CROTA2 rotation.
//! Distortion terms (SIP, TPV) are not applied.

use nalgebra::{Matrix2, Vector2};
use thiserror::Error;

use crate::header::{Header, HeaderError, ImageSize};

/// Every keyword [`Wcs::from_header`] may read
pub const WCS_KEYWORDS: [&str; 15] = [
    "CRPIX1", "CRPIX2", "CRVAL1", "CRVAL2", "CD1_1", "CD1_2", "CD2_1", "CD2_2", "CDELT1",
    "CDELT2", "PC1_1", "PC1_2", "PC2_1", "PC2_2", "CROTA2",
];

#[derive(Debug, Error)]
pub enum WcsError {
    #[error("Missing WCS keyword {0}")]
    MissingKeyword(String),

    #[error("Unsupported projection {0}, only TAN is handled")]
    UnsupportedProjection(String),

    #[error("Invalid WCS keyword: {0}")]
    Header(HeaderError),
}

fn required(header: &Header, key: &str) -> Result<f64, WcsError> {
    header.get_f64(key).map_err(|err| match err {
        HeaderError::MissingKeyword(key) => WcsError::MissingKeyword(key),
        other => WcsError::Header(other),
    })
}

fn optional(header: &Header, key: &str) -> Result<Option<f64>, WcsError> {
    if header.contains(key) {
        required(header, key).map(Some)
    } else {
        Ok(None)
    }
}

/// Inverse gnomonic (TAN) projection.
///
/// Given tangent-plane coordinates `(ξ, η)` in radians at reference point
/// `(crval_ra, crval_dec)` in radians, returns celestial `(ra, dec)` in radians.
pub fn inverse_tan_project(xi: f64, eta: f64, crval_ra: f64, crval_dec: f64) -> (f64, f64) {
    let sin_dec0 = crval_dec.sin();
    let cos_dec0 = crval_dec.cos();
    let rho_sq = xi * xi + eta * eta;

    if rho_sq < 1e-30 {
        return (crval_ra, crval_dec);
    }

    let rho = rho_sq.sqrt();
    let c = rho.atan();
    let sin_c = c.sin();
    let cos_c = c.cos();

    let dec = (cos_c * sin_dec0 + eta * sin_c * cos_dec0 / rho).asin();
    let ra = crval_ra + (xi * sin_c).atan2(rho * cos_dec0 * cos_c - eta * sin_dec0 * sin_c);
    (ra, dec)
}

/// Pixel to sky transform of a TAN-projected image
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    /// Reference pixel, FITS 1-based convention
    crpix: Vector2<f64>,
    /// Sky position of the reference pixel in degrees
    crval: (f64, f64),
    /// Linear transform from pixel offsets to intermediate coordinates, degrees per pixel
    cd: Matrix2<f64>,
}

impl Wcs {
    pub fn new(crpix: (f64, f64), crval: (f64, f64), cd: Matrix2<f64>) -> Self {
        Self {
            crpix: Vector2::new(crpix.0, crpix.1),
            crval,
            cd,
        }
    }

    /// Build the transform from astrometric header keywords
    pub fn from_header(header: &Header) -> Result<Self, WcsError> {
        for axis in ["CTYPE1", "CTYPE2"] {
            if let Some(ctype) = header.get(axis).and_then(|value| value.as_str()) {
                if !ctype.trim().ends_with("-TAN") {
                    return Err(WcsError::UnsupportedProjection(ctype.to_string()));
                }
            }
        }

        let crpix = (required(header, "CRPIX1")?, required(header, "CRPIX2")?);
        let crval = (required(header, "CRVAL1")?, required(header, "CRVAL2")?);

        let cd = if header.contains("CD1_1") || header.contains("CD2_2") {
            Matrix2::new(
                optional(header, "CD1_1")?.unwrap_or(0.0),
                optional(header, "CD1_2")?.unwrap_or(0.0),
                optional(header, "CD2_1")?.unwrap_or(0.0),
                optional(header, "CD2_2")?.unwrap_or(0.0),
            )
        } else {
            let cdelt = Matrix2::from_diagonal(&Vector2::new(
                required(header, "CDELT1")?,
                required(header, "CDELT2")?,
            ));
            let pc = if header.contains("PC1_1") || header.contains("PC2_2") {
                Matrix2::new(
                    optional(header, "PC1_1")?.unwrap_or(1.0),
                    optional(header, "PC1_2")?.unwrap_or(0.0),
                    optional(header, "PC2_1")?.unwrap_or(0.0),
                    optional(header, "PC2_2")?.unwrap_or(1.0),
                )
            } else {
                let rotation = optional(header, "CROTA2")?.unwrap_or(0.0).to_radians();
                Matrix2::new(
                    rotation.cos(),
                    -rotation.sin(),
                    rotation.sin(),
                    rotation.cos(),
                )
            };
            cdelt * pc
        };

        Ok(Self::new(crpix, crval, cd))
    }

    /// Sky coordinates in degrees of a 1-based pixel position.
    ///
    /// RA is returned in `[0, 360)`.
    pub fn pixel_to_world(&self, x: f64, y: f64) -> (f64, f64) {
        let offset = Vector2::new(x, y) - self.crpix;
        let intermediate = self.cd * offset;

        let (ra, dec) = inverse_tan_project(
            intermediate.x.to_radians(),
            intermediate.y.to_radians(),
            self.crval.0.to_radians(),
            self.crval.1.to_radians(),
        );
        (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }

    /// Bounding box spanned by pixel (0, 0) and pixel (width, height).
    ///
    /// The box does not wrap: an image straddling RA 0°/360° yields a box
    /// covering almost the whole RA range.
    pub fn footprint(&self, size: ImageSize) -> SkyBox {
        let first = self.pixel_to_world(0.0, 0.0);
        let last = self.pixel_to_world(size.width as f64, size.height as f64);
        SkyBox::from_corners(first, last)
    }
}

/// Axis-aligned region of sky in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyBox {
    pub ra_min: f64,
    pub ra_max: f64,
    pub dec_min: f64,
    pub dec_max: f64,
}

impl SkyBox {
    /// Box spanned by two opposite corners, in either orientation
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            ra_min: a.0.min(b.0),
            ra_max: a.0.max(b.0),
            dec_min: a.1.min(b.1),
            dec_max: a.1.max(b.1),
        }
    }

    /// Closed-interval membership on both axes
    pub fn contains(&self, ra: f64, dec: f64) -> bool {
        (self.ra_min..=self.ra_max).contains(&ra) && (self.dec_min..=self.dec_max).contains(&dec)
    }
}
