//! Reduction settings, stored as JSON

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::GeometryPolicy;
use crate::header::HeaderKeywords;
use crate::photometry::{InterpolationPolicy, PhotometerCommand};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything that varies between observatories and reductions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Directory holding the standards catalog and the spectra
    pub data_dir: PathBuf,
    /// Catalog file name inside `data_dir`
    pub catalog_file: String,
    /// Spectra sub-directory of `data_dir`
    pub spectra_dir: String,
    pub keywords: HeaderKeywords,
    pub interpolation: InterpolationPolicy,
    pub geometry: GeometryPolicy,
    /// External aperture photometry program; counts are unavailable without one
    pub photometer: Option<PhotometerCommand>,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            catalog_file: "standards.csv".to_string(),
            spectra_dir: "standard_spectra".to_string(),
            keywords: HeaderKeywords::default(),
            interpolation: InterpolationPolicy::default(),
            geometry: GeometryPolicy::default(),
            photometer: None,
        }
    }
}

impl ReductionConfig {
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join(&self.catalog_file)
    }

    pub fn spectra_path(&self) -> PathBuf {
        self.data_dir.join(&self.spectra_dir)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&json)?;
        log::debug!("Loaded reduction config from {}", path.display());
        Ok(config)
    }
}
