//! Exposure classification
//!
//! The object field of a header is matched against an ordered list of rules
//! (first match wins). Exposures no rule recognises are identified by looking
//! for a catalog standard inside the image footprint.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::header::{Header, HeaderError};
use crate::wcs::{Wcs, WcsError};

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Header has no object field: {0}")]
    MissingObject(#[source] HeaderError),

    #[error("Image footprint is undefined: {0}")]
    NoWcs(#[from] WcsError),

    #[error("Image shape is undefined: {0}")]
    NoShape(#[source] HeaderError),
}

/// Kind of exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Bias,
    SkyFlat,
    DomeFlat,
    Flat,
    Blank,
    /// Galaxy from the Catalogue of Isolated Galaxies
    Cig,
    /// Spectrophotometric standard star from the catalog
    Standard,
    Unknown,
}

impl ObjectType {
    pub fn label(&self) -> &'static str {
        match self {
            ObjectType::Bias => "bias",
            ObjectType::SkyFlat => "skyflat",
            ObjectType::DomeFlat => "domeflat",
            ObjectType::Flat => "flat",
            ObjectType::Blank => "blank",
            ObjectType::Cig => "cig",
            ObjectType::Standard => "standard",
            ObjectType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub objtype: ObjectType,
    pub objname: String,
}

impl ClassificationResult {
    pub fn new(objtype: ObjectType, objname: impl Into<String>) -> Self {
        Self {
            objtype,
            objname: objname.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(ObjectType::Unknown, ObjectType::Unknown.label())
    }
}

/// What to do when the coordinate fallback cannot compute an image footprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryPolicy {
    /// Report the error
    #[default]
    Fail,
    /// Classify the exposure as unknown
    Unknown,
}

/// How a matching rule names the object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameRule {
    /// The type label itself
    Label,
    /// The type label followed by the text of a named capture group
    LabelWithGroup(&'static str),
}

/// One entry of the rule table: all `patterns` must match
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    objtype: ObjectType,
    patterns: Vec<Regex>,
    name: NameRule,
}

impl ClassificationRule {
    /// Patterns are compiled case-insensitively
    pub fn new(objtype: ObjectType, patterns: &[&str], name: NameRule) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|pattern| Regex::new(&format!("(?i){pattern}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            objtype,
            patterns,
            name,
        })
    }

    pub fn objtype(&self) -> ObjectType {
        self.objtype
    }

    /// Object name if every pattern matches `text`
    pub fn apply(&self, text: &str) -> Option<String> {
        let mut objname = self.objtype.label().to_string();
        for pattern in &self.patterns {
            let captures = pattern.captures(text)?;
            if let NameRule::LabelWithGroup(group) = self.name {
                if let Some(value) = captures.name(group) {
                    objname.push_str(value.as_str());
                }
            }
        }
        Some(objname)
    }
}

fn default_rules() -> Result<Vec<ClassificationRule>, regex::Error> {
    use ObjectType::*;
    Ok(vec![
        ClassificationRule::new(Bias, &["BIAS"], NameRule::Label)?,
        ClassificationRule::new(SkyFlat, &["SKY", "FLAT"], NameRule::Label)?,
        ClassificationRule::new(DomeFlat, &["DOME", "FLAT"], NameRule::Label)?,
        ClassificationRule::new(Flat, &["FLAT"], NameRule::Label)?,
        ClassificationRule::new(Blank, &["BLANK"], NameRule::Label)?,
        ClassificationRule::new(
            Cig,
            &[r"^C(?:IG)?(?P<number>\d{1,4})"],
            NameRule::LabelWithGroup("number"),
        )?,
    ])
}

// Built from literals; a failure here is a programming error
static DEFAULT_RULES: Lazy<Vec<ClassificationRule>> =
    Lazy::new(|| default_rules().expect("built-in classification patterns are valid"));

/// Ordered rule table plus the coordinate fallback
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
    geometry: GeometryPolicy,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(GeometryPolicy::default())
    }
}

impl Classifier {
    /// Observatory rule table: bias, skyflat, domeflat, flat, blank, cig
    pub fn new(geometry: GeometryPolicy) -> Self {
        Self::with_rules(DEFAULT_RULES.clone(), geometry)
    }

    pub fn with_rules(rules: Vec<ClassificationRule>, geometry: GeometryPolicy) -> Self {
        Self { rules, geometry }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn geometry_policy(&self) -> GeometryPolicy {
        self.geometry
    }

    /// Rule stage only. Whitespace is removed before matching.
    pub fn match_object(&self, object: &str) -> Option<ClassificationResult> {
        let compact: String = object.chars().filter(|c| !c.is_whitespace()).collect();
        self.rules.iter().find_map(|rule| {
            rule.apply(&compact)
                .map(|objname| ClassificationResult::new(rule.objtype(), objname))
        })
    }

    /// Type and name of the exposure described by `header`
    pub fn classify(
        &self,
        header: &Header,
        catalog: &Catalog,
    ) -> Result<ClassificationResult, ClassifyError> {
        let object = header.object().map_err(ClassifyError::MissingObject)?;

        if let Some(result) = self.match_object(&object) {
            log::debug!("Object {:?} classified as {} by rule", object, result.objtype);
            return Ok(result);
        }

        match classify_by_coordinates(header, catalog) {
            Ok(result) => Ok(result),
            Err(err) if self.geometry == GeometryPolicy::Unknown => {
                log::warn!("Cannot locate {:?} on the sky ({}), marking unknown", object, err);
                Ok(ClassificationResult::unknown())
            }
            Err(err) => Err(err),
        }
    }
}

/// Look for a catalog standard inside the image.
///
/// The footprint is the box between the sky positions of pixel (0, 0) and
/// pixel (NAXIS1, NAXIS2); the first catalog entry inside it, in load order,
/// names the exposure.
pub fn classify_by_coordinates(
    header: &Header,
    catalog: &Catalog,
) -> Result<ClassificationResult, ClassifyError> {
    let wcs = Wcs::from_header(header)?;
    let size = header.image_size().map_err(ClassifyError::NoShape)?;
    let footprint = wcs.footprint(size);
    log::debug!(
        "Footprint of {} image: RA [{:.4}, {:.4}] Dec [{:.4}, {:.4}]",
        size,
        footprint.ra_min,
        footprint.ra_max,
        footprint.dec_min,
        footprint.dec_max
    );

    Ok(match catalog.first_within(&footprint) {
        Some(entry) => {
            log::info!("Found standard {} in the field", entry.name);
            ClassificationResult::new(ObjectType::Standard, entry.name.clone())
        }
        None => ClassificationResult::unknown(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::header::HeaderValue;
    use rstest::rstest;

    fn catalog() -> Catalog {
        Catalog::new(vec![
            CatalogEntry::new("Feige34", 159.9031, 43.1026),
            CatalogEntry::new("Standard1", 150.0, 20.0),
            CatalogEntry::new("Standard2", 150.5, 20.5),
        ])
    }

    fn imaged_header(object: &str) -> Header {
        Header::default()
            .with("OBJECT", HeaderValue::String(object.into()))
            .with("NAXIS1", HeaderValue::Integer(100))
            .with("NAXIS2", HeaderValue::Integer(100))
            .with("CTYPE1", HeaderValue::String("RA---TAN".into()))
            .with("CTYPE2", HeaderValue::String("DEC--TAN".into()))
            .with("CRPIX1", HeaderValue::Float(50.0))
            .with("CRPIX2", HeaderValue::Float(50.0))
            .with("CRVAL1", HeaderValue::Float(150.0))
            .with("CRVAL2", HeaderValue::Float(20.0))
            .with("CD1_1", HeaderValue::Float(-0.02))
            .with("CD2_2", HeaderValue::Float(0.02))
    }

    #[rstest]
    #[case("bias", ObjectType::Bias, "bias")]
    #[case(" Bias 0001 ", ObjectType::Bias, "bias")]
    #[case("SKY FLAT R", ObjectType::SkyFlat, "skyflat")]
    #[case("flat sky", ObjectType::SkyFlat, "skyflat")]
    #[case("Dome Flat", ObjectType::DomeFlat, "domeflat")]
    #[case("flat V", ObjectType::Flat, "flat")]
    #[case("Blank field", ObjectType::Blank, "blank")]
    #[case("CIG 1234", ObjectType::Cig, "cig1234")]
    #[case("cig0045 Halpha", ObjectType::Cig, "cig0045")]
    #[case("C12", ObjectType::Cig, "cig12")]
    fn test_rule_table(
        #[case] object: &str,
        #[case] objtype: ObjectType,
        #[case] objname: &str,
    ) {
        let result = Classifier::default().match_object(object).unwrap();
        assert_eq!(result, ClassificationResult::new(objtype, objname));
    }

    #[rstest]
    #[case("HZ 44")]
    #[case("NGC 1234")]
    #[case("CIG")]
    #[case("")]
    fn test_no_rule_matches(#[case] object: &str) {
        assert!(Classifier::default().match_object(object).is_none());
    }

    #[test]
    fn test_dome_flat_beats_generic_flat() {
        let classifier = Classifier::default();
        for object in ["DOME FLAT", "flat dome", "domeflat V 01"] {
            assert_eq!(
                classifier.match_object(object).unwrap().objtype,
                ObjectType::DomeFlat
            );
        }
    }

    #[test]
    fn test_rule_order_is_declaration_order() {
        let labels: Vec<&str> = Classifier::default()
            .rules()
            .iter()
            .map(|rule| rule.objtype().label())
            .collect();
        assert_eq!(
            labels,
            ["bias", "skyflat", "domeflat", "flat", "blank", "cig"]
        );

        // "bias flat" matches both bias and flat; bias is declared first
        assert_eq!(
            Classifier::default().match_object("bias flat").unwrap().objtype,
            ObjectType::Bias
        );
    }

    #[test]
    fn test_standard_found_by_coordinates() {
        let header = imaged_header("std star");
        let result = Classifier::default().classify(&header, &catalog()).unwrap();
        assert_eq!(
            result,
            ClassificationResult::new(ObjectType::Standard, "Standard1")
        );

        // Pure function of header and catalog
        let again = classify_by_coordinates(&header, &catalog()).unwrap();
        assert_eq!(again, result);
    }

    #[test]
    fn test_nothing_in_field() {
        let header = imaged_header("M 31");
        let far = Catalog::new(vec![CatalogEntry::new("Feige34", 159.9031, 43.1026)]);
        assert_eq!(
            Classifier::default().classify(&header, &far).unwrap(),
            ClassificationResult::unknown()
        );
    }

    #[test]
    fn test_rules_skip_coordinates() {
        // No WCS at all, but the rule stage answers first
        let header = Header::default().with("OBJECT", HeaderValue::String("bias".into()));
        let result = Classifier::default().classify(&header, &catalog()).unwrap();
        assert_eq!(result.objtype, ObjectType::Bias);
    }

    #[test]
    fn test_geometry_policy() {
        let header = Header::default().with("OBJECT", HeaderValue::String("target".into()));

        assert!(matches!(
            Classifier::new(GeometryPolicy::Fail).classify(&header, &catalog()),
            Err(ClassifyError::NoWcs(_))
        ));
        assert_eq!(
            Classifier::new(GeometryPolicy::Unknown)
                .classify(&header, &catalog())
                .unwrap(),
            ClassificationResult::unknown()
        );
    }

    #[test]
    fn test_missing_shape() {
        let header = Header::default()
            .with("OBJECT", HeaderValue::String("target".into()))
            .with("CRPIX1", HeaderValue::Float(50.0))
            .with("CRPIX2", HeaderValue::Float(50.0))
            .with("CRVAL1", HeaderValue::Float(150.0))
            .with("CRVAL2", HeaderValue::Float(20.0))
            .with("CDELT1", HeaderValue::Float(-0.02))
            .with("CDELT2", HeaderValue::Float(0.02));
        assert!(matches!(
            Classifier::default().classify(&header, &catalog()),
            Err(ClassifyError::NoShape(HeaderError::MissingKeyword(_)))
        ));
    }

    #[test]
    fn test_missing_object_field() {
        let header = Header::default();
        assert!(matches!(
            Classifier::default().classify(&header, &catalog()),
            Err(ClassifyError::MissingObject(HeaderError::MissingKeyword(key))) if key == "OBJECT"
        ));
    }
}
