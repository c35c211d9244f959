//! The object observed in one exposure
//!
//! A [`Target`] binds a header and a filter to the shared reduction context
//! and derives, on first request, everything the calibration needs: what was
//! observed, where it is, its reference spectrum, its expected flux under the
//! filter and its measured counts. Each value is computed at most once per
//! target.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use crate::catalog::{Catalog, CatalogError};
use crate::classify::{ClassificationResult, Classifier, ObjectType};
use crate::config::ReductionConfig;
use crate::error::TargetError;
use crate::header::Header;
use crate::photometry::{
    integrate_flux, normalize_name, Filter, InterpolationPolicy, Photometer, PhotometryRequest,
    Spectrum, SpectrumStore,
};

/// Prefix of the temporary coordinate files handed to the photometer
pub const COORDS_PREFIX: &str = "standards";

/// Suffix of the temporary coordinate files handed to the photometer
pub const COORDS_SUFFIX: &str = ".coords";

/// Everything shared between the targets of one reduction
pub struct ReductionContext {
    catalog: Arc<Catalog>,
    spectra: SpectrumStore,
    classifier: Classifier,
    interpolation: InterpolationPolicy,
    photometer: Option<Box<dyn Photometer>>,
}

impl ReductionContext {
    pub fn new(catalog: Arc<Catalog>, spectra: SpectrumStore) -> Self {
        Self {
            catalog,
            spectra,
            classifier: Classifier::default(),
            interpolation: InterpolationPolicy::default(),
            photometer: None,
        }
    }

    /// Load the catalog named by `config` and wire up its policies
    pub fn from_config(config: &ReductionConfig) -> Result<Self, CatalogError> {
        let catalog = Catalog::from_path(&config.catalog_path())?;
        let mut context = Self::new(Arc::new(catalog), SpectrumStore::new(config.spectra_path()))
            .with_classifier(Classifier::new(config.geometry))
            .with_interpolation(config.interpolation);
        if let Some(command) = &config.photometer {
            context = context.with_photometer(Box::new(command.clone()));
        }
        Ok(context)
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_interpolation(mut self, interpolation: InterpolationPolicy) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_photometer(mut self, photometer: Box<dyn Photometer>) -> Self {
        self.photometer = Some(photometer);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn spectra(&self) -> &SpectrumStore {
        &self.spectra
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn has_photometer(&self) -> bool {
        self.photometer.is_some()
    }
}

/// Observed object of one exposure through one filter
pub struct Target<'a> {
    header: &'a Header,
    filter: &'a Filter,
    context: &'a ReductionContext,
    classification: OnceCell<ClassificationResult>,
    coordinates: OnceCell<Option<(f64, f64)>>,
    spectrum: OnceCell<Option<Spectrum>>,
    flux: OnceCell<Option<f64>>,
    counts: OnceCell<Option<f64>>,
}

impl<'a> Target<'a> {
    pub fn new(header: &'a Header, filter: &'a Filter, context: &'a ReductionContext) -> Self {
        Self {
            header,
            filter,
            context,
            classification: OnceCell::new(),
            coordinates: OnceCell::new(),
            spectrum: OnceCell::new(),
            flux: OnceCell::new(),
            counts: OnceCell::new(),
        }
    }

    pub fn header(&self) -> &Header {
        self.header
    }

    pub fn filter(&self) -> &Filter {
        self.filter
    }

    pub fn classification(&self) -> Result<&ClassificationResult, TargetError> {
        self.classification.get_or_try_init(|| -> Result<_, TargetError> {
            Ok(self
                .context
                .classifier
                .classify(self.header, &self.context.catalog)?)
        })
    }

    pub fn objtype(&self) -> Result<ObjectType, TargetError> {
        Ok(self.classification()?.objtype)
    }

    pub fn objname(&self) -> Result<&str, TargetError> {
        Ok(&self.classification()?.objname)
    }

    /// Catalog position of a standard, `None` for anything else
    pub fn coordinates(&self) -> Result<Option<(f64, f64)>, TargetError> {
        self.coordinates
            .get_or_try_init(|| -> Result<_, TargetError> {
                let classification = self.classification()?;
                if classification.objtype != ObjectType::Standard {
                    return Ok(None);
                }
                Ok(self
                    .context
                    .catalog
                    .find_by_name(&classification.objname)
                    .map(|entry| (entry.ra, entry.dec)))
            })
            .copied()
    }

    /// Right ascension in degrees
    pub fn ra(&self) -> Result<Option<f64>, TargetError> {
        Ok(self.coordinates()?.map(|(ra, _)| ra))
    }

    /// Declination in degrees
    pub fn dec(&self) -> Result<Option<f64>, TargetError> {
        Ok(self.coordinates()?.map(|(_, dec)| dec))
    }

    /// Reference spectrum, only standards have one
    pub fn spectrum(&self) -> Result<Option<&Spectrum>, TargetError> {
        self.spectrum
            .get_or_try_init(|| -> Result<_, TargetError> {
                let classification = self.classification()?;
                if classification.objtype != ObjectType::Standard {
                    return Ok(None);
                }
                Ok(Some(self.context.spectra.load(&classification.objname)?))
            })
            .map(Option::as_ref)
    }

    /// Expected flux under the filter in erg s⁻¹ cm⁻².
    ///
    /// `None` without a reference spectrum, without a filter curve, or when
    /// the filter is too narrow for the 1 Å integration grid.
    pub fn flux(&self) -> Result<Option<f64>, TargetError> {
        self.flux
            .get_or_try_init(|| -> Result<_, TargetError> {
                let (Some(spectrum), Some(curve)) = (self.spectrum()?, self.filter.curve()) else {
                    return Ok(None);
                };
                let flux = integrate_flux(spectrum, curve, &self.context.interpolation)?;
                log::info!(
                    "Flux of {} under {}: {:?} erg/s/cm2",
                    self,
                    self.filter,
                    flux
                );
                Ok(flux)
            })
            .copied()
    }

    /// Aperture photometry of a standard, in counts.
    ///
    /// The catalog position is written to a temporary coordinate file that
    /// lives only for the duration of the measurement. Aperture and sky
    /// annulus scale with the seeing recorded in the header.
    pub fn counts(&self) -> Result<Option<f64>, TargetError> {
        self.counts
            .get_or_try_init(|| -> Result<_, TargetError> {
                if self.objtype()? != ObjectType::Standard {
                    return Ok(None);
                }
                let Some((ra, dec)) = self.coordinates()? else {
                    log::warn!("Standard {} vanished from the catalog", self);
                    return Ok(None);
                };
                self.measure(ra, dec).map(Some)
            })
            .copied()
    }

    fn measure(&self, ra: f64, dec: f64) -> Result<f64, TargetError> {
        let photometer = self
            .context
            .photometer
            .as_deref()
            .ok_or(TargetError::NoPhotometer)?;
        let image = self.header.image_path().ok_or(TargetError::NoImagePath)?;
        let seeing = self.header.seeing()?;
        let gain = self.header.gain()?;
        let exposure = self.header.exposure_time()?;
        let airmass = self.header.airmass()?;

        let mut coords = tempfile::Builder::new()
            .prefix(COORDS_PREFIX)
            .suffix(COORDS_SUFFIX)
            .tempfile()?;
        writeln!(coords, "{ra} {dec}")?;
        coords.flush()?;

        let request =
            PhotometryRequest::from_seeing(image, coords.path(), seeing, gain, exposure, airmass);
        let measured = photometer.measure(&request);
        coords.close()?;

        let counts = measured?;
        log::info!("Counts of {} in {}: {}", self, image.display(), counts);
        Ok(counts)
    }
}

impl fmt::Display for Target<'_> {
    /// Normalized object name, `unknown` while the exposure cannot be classified
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.objname() {
            Ok(name) => f.write_str(&normalize_name(name)),
            Err(_) => f.write_str(ObjectType::Unknown.label()),
        }
    }
}
