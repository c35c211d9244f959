//! Test infrastructure shared by the workspace crates
//!
//! Locates the workspace root (and through it the shipped `data/` directory)
//! regardless of the directory `cargo test` runs from, and builds throwaway
//! reduction directories: a standards catalog, reference spectra and blank
//! FITS frames carrying chosen header keywords.

use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::hdu::FitsHdu;
use fitsio::compat::images::{ImageDescription, ImageType, WriteImage};
use once_cell::sync::Lazy;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    /// Project root directory could not be located or accessed.
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),

    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::compat::errors::Error),
}

/// Locate the workspace root by walking up from the current directory to
/// the first Cargo.toml holding a `[workspace]` section.
///
/// # Examples
/// ```rust
/// use test_helpers::find_project_root;
///
/// let root = find_project_root().expect("Project root not found");
/// assert!(root.join("Cargo.toml").exists());
/// assert!(root.join("photcal").exists());
/// ```
pub fn find_project_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::ProjectRootNotFound(format!("Failed to get current directory: {}", e))
    })?;

    // Search for workspace Cargo.toml
    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {}", e))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::ProjectRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

static PROJECT_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_project_root().expect("Failed to find project root directory"));

/// The shipped `data/` directory (standards catalog, reference spectra)
pub fn data_dir() -> PathBuf {
    PROJECT_ROOT.join("data")
}

/// Path of a file inside the shipped `data/` directory
pub fn data_path<P: AsRef<Path>>(path: P) -> PathBuf {
    data_dir().join(path)
}

/// Value of a header card
#[derive(Debug, Clone, PartialEq)]
pub enum CardValue {
    Text(String),
    Int(i64),
    Real(f64),
    Bool(bool),
}

impl CardValue {
    fn write(
        &self,
        fptr: &mut FitsFile,
        hdu: &FitsHdu,
        key: &str,
    ) -> Result<(), fitsio::compat::errors::Error> {
        match self {
            CardValue::Text(text) => hdu.write_key(fptr, key, &text.clone()),
            CardValue::Int(value) => hdu.write_key(fptr, key, value),
            CardValue::Real(value) => hdu.write_key(fptr, key, value),
            CardValue::Bool(flag) => hdu.write_key(fptr, key, &i64::from(*flag)),
        }
    }
}

impl From<&str> for CardValue {
    fn from(text: &str) -> Self {
        CardValue::Text(text.to_string())
    }
}

impl From<i64> for CardValue {
    fn from(value: i64) -> Self {
        CardValue::Int(value)
    }
}

impl From<f64> for CardValue {
    fn from(value: f64) -> Self {
        CardValue::Real(value)
    }
}

impl From<bool> for CardValue {
    fn from(value: bool) -> Self {
        CardValue::Bool(value)
    }
}

/// Write a zero-valued `width` x `height` frame carrying `cards` in its
/// primary header
pub fn write_fits_image(
    path: &Path,
    (width, height): (usize, usize),
    cards: &[(&str, CardValue)],
) -> Result<(), TestHelperError> {
    let description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: vec![width, height],
    };
    let mut fptr = FitsFile::create(path).overwrite().open()?;
    let hdu = fptr.create_image("PRIMARY", &description)?;
    f32::write_image(&mut fptr, &hdu, &vec![0.0f32; width * height])?;
    for (key, value) in cards {
        value.write(&mut fptr, &hdu, key)?;
    }
    Ok(())
}

/// Throwaway data directory laid out like the shipped one
pub struct StandardsFixture {
    dir: TempDir,
}

impl StandardsFixture {
    /// Empty `standards.csv` and `standard_spectra/` in a fresh directory
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        fs::create_dir(dir.path().join("standard_spectra"))?;
        fs::write(dir.path().join("standards.csv"), "std_names, ra, dec\n")?;
        Ok(Self { dir })
    }

    /// Data directory to point a reduction at
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.dir.path().join("standards.csv")
    }

    pub fn spectra_dir(&self) -> PathBuf {
        self.dir.path().join("standard_spectra")
    }

    /// Append a catalog row
    pub fn add_standard(&self, name: &str, ra: f64, dec: f64) -> io::Result<()> {
        let mut catalog = fs::read_to_string(self.catalog_path())?;
        catalog.push_str(&format!("{name}, {ra}, {dec}\n"));
        fs::write(self.catalog_path(), catalog)
    }

    /// Write a spectrum file named `file_name` after a short text preamble
    pub fn add_spectrum(&self, file_name: &str, samples: &[(f64, f64)]) -> io::Result<PathBuf> {
        let mut text = format!("{file_name}\nwavelength(A) mag(AB)\n");
        for (wavelength, magnitude) in samples {
            text.push_str(&format!("{wavelength} {magnitude}\n"));
        }
        let path = self.spectra_dir().join(file_name);
        fs::write(&path, text)?;
        Ok(path)
    }

    /// Blank frame of the given (width, height) inside the fixture directory
    pub fn add_image(
        &self,
        file_name: &str,
        shape: (usize, usize),
        cards: &[(&str, CardValue)],
    ) -> Result<PathBuf, TestHelperError> {
        let path = self.dir.path().join(file_name);
        write_fits_image(&path, shape, cards)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_root_exists() {
        let root = find_project_root().expect("Failed to find project root");
        assert!(root.exists());
        assert!(root.join("Cargo.toml").exists());
    }

    #[test]
    fn test_data_dir_ships_catalog() {
        assert!(data_path("standards.csv").is_file());
    }

    #[test]
    fn test_fixture_image_is_written() {
        let fixture = StandardsFixture::new().unwrap();
        let path = fixture
            .add_image("bias.fits", (4, 3), &[("OBJECT", "bias".into())])
            .unwrap();
        assert!(path.is_file());
        assert!(path.starts_with(fixture.path()));
    }

    #[test]
    fn test_fixture_layout() {
        let fixture = StandardsFixture::new().unwrap();
        fixture.add_standard("HZ 44", 200.8966, 36.1331).unwrap();
        fixture
            .add_spectrum("hz44", &[(4000.0, 11.5), (5000.0, 11.6)])
            .unwrap();

        let catalog = fs::read_to_string(fixture.catalog_path()).unwrap();
        assert!(catalog.ends_with("HZ 44, 200.8966, 36.1331\n"));
        assert!(fixture.spectra_dir().join("hz44").is_file());
    }
}
