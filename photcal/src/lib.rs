//! Photometric calibration of observatory exposures
//!
//! Classifies what an exposure shows (bias, flats, blank fields, CIG galaxies,
//! standard stars), locates standards from the image astrometry, and derives
//! the flux a standard should deliver through a filter from its reference
//! spectrum. Measured counts come from an external aperture photometry
//! program. Frames are reduced with masked pixel arithmetic on FITS files.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod header;
pub mod image_proc;
pub mod photometry;
pub mod target;
pub mod wcs;

pub use catalog::{Catalog, CatalogEntry, CatalogError};
pub use classify::{ClassificationResult, Classifier, GeometryPolicy, ObjectType};
pub use config::{ConfigError, ReductionConfig};
pub use error::TargetError;
pub use header::{Header, HeaderKeywords, HeaderValue};
pub use target::{ReductionContext, Target};
pub use wcs::{SkyBox, Wcs};
