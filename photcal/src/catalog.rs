//! Standard-star catalog
//!
//! The catalog is a small CSV table `name, ra, dec` (degrees) loaded once and
//! shared read-only between targets. Row order is significant: coordinate
//! matching returns the first entry inside the image footprint.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use crate::wcs::SkyBox;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Could not open catalog {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Catalog row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
}

/// One reference object
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    /// Right ascension in degrees
    pub ra: f64,
    /// Declination in degrees
    pub dec: f64,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, ra: f64, dec: f64) -> Self {
        Self {
            name: name.into(),
            ra,
            dec,
        }
    }
}

/// Immutable list of reference objects in load order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Parse catalog CSV.
    ///
    /// Lines starting with `#` are comments. A first row reading
    /// `std_names, ra, dec` (any case) is the header and is skipped; any other
    /// row must parse.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv = ReaderBuilder::new()
            .has_headers(false)
            .trim(Trim::All)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (index, record) in csv.records().enumerate() {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            if index == 0 && is_header_row(&record) {
                log::debug!("Skipping catalog header row {:?}", record);
                continue;
            }
            entries.push(parse_record(&record, index + 1)?);
        }

        log::debug!("Loaded {} catalog entries", entries.len());
        Ok(Self { entries })
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let file = File::open(path).map_err(|source| CatalogError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_reader(file)?;
        log::info!(
            "Catalog {} holds {} standards",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// First entry whose name matches exactly
    pub fn find_by_name(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// First entry, in load order, inside `sky` (edges included)
    pub fn first_within(&self, sky: &SkyBox) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| sky.contains(entry.ra, entry.dec))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn field<'r>(
    record: &'r StringRecord,
    row: usize,
    position: usize,
    what: &str,
) -> Result<&'r str, CatalogError> {
    record
        .get(position)
        .ok_or_else(|| CatalogError::MalformedRow {
            row,
            reason: format!("missing {what}"),
        })
}

fn coordinate(
    record: &StringRecord,
    row: usize,
    position: usize,
    what: &str,
) -> Result<f64, CatalogError> {
    let text = field(record, row, position, what)?;
    text.parse::<f64>().map_err(|_| CatalogError::MalformedRow {
        row,
        reason: format!("{what} {text:?} is not a number"),
    })
}

/// Column names of the catalog header row
const HEADER_COLUMNS: [&str; 3] = ["std_names", "ra", "dec"];

fn is_header_row(record: &StringRecord) -> bool {
    record.len() == HEADER_COLUMNS.len()
        && record
            .iter()
            .zip(HEADER_COLUMNS)
            .all(|(field, column)| field.eq_ignore_ascii_case(column))
}

fn parse_record(record: &StringRecord, row: usize) -> Result<CatalogEntry, CatalogError> {
    let name = field(record, row, 0, "name")?;
    if name.is_empty() {
        return Err(CatalogError::MalformedRow {
            row,
            reason: "empty name".to_string(),
        });
    }
    Ok(CatalogEntry::new(
        name,
        coordinate(record, row, 1, "ra")?,
        coordinate(record, row, 2, "dec")?,
    ))
}
