use std::path::PathBuf;

use thiserror::Error;

use crate::classify::ClassifyError;
use crate::header::HeaderError;
use crate::photometry::{FluxError, PhotometryError, SpectrumError};

/// Failures while deriving the properties of a [`crate::Target`]
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Missing header metadata: {0}")]
    MissingMetadata(#[source] HeaderError),

    #[error("Resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("Malformed spectrum: {0}")]
    MalformedSpectrum(#[source] SpectrumError),

    #[error("Cannot place the image on the sky: {0}")]
    GeometryUndefined(#[source] ClassifyError),

    #[error("Photometry failed: {0}")]
    PhotometryFailure(#[from] PhotometryError),

    #[error("No photometer configured")]
    NoPhotometer,

    #[error("Header was not read from an image file, nothing to measure")]
    NoImagePath,

    #[error("Flux integration failed: {0}")]
    Flux(#[from] FluxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<HeaderError> for TargetError {
    fn from(err: HeaderError) -> Self {
        TargetError::MissingMetadata(err)
    }
}

impl From<ClassifyError> for TargetError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::MissingObject(err) => TargetError::MissingMetadata(err),
            other => TargetError::GeometryUndefined(other),
        }
    }
}

impl From<SpectrumError> for TargetError {
    fn from(err: SpectrumError) -> Self {
        match err {
            SpectrumError::NotFound(path) => TargetError::ResourceNotFound(path),
            SpectrumError::Io(err) => TargetError::Io(err),
            other => TargetError::MalformedSpectrum(other),
        }
    }
}
