//! Arithmetic on frames stored as FITS files
//!
//! Reads each input frame with its mask, applies one operation against a
//! second operand and writes the result next to a fresh mask file.

use std::path::{Path, PathBuf};

use super::arith::{arith, ArithOptions, Operand, Operation, OutputNaming, Reduction};
use super::fits::{read_image_with_mask, write_image, write_mask, FitsError};
use crate::header::{Header, HeaderKeywords, HeaderValue};

/// Second operand given on the command line: a number, or the path of a
/// frame read with its mask
pub fn parse_operand(text: &str, mask_key: Option<&str>) -> Result<Operand, FitsError> {
    match text.trim().parse::<f64>() {
        Ok(value) => Ok(Operand::Scalar(value)),
        Err(_) => Ok(Operand::Image(read_image_with_mask(
            Path::new(text),
            mask_key,
        )?)),
    }
}

/// How the second operand is named in HISTORY records
pub fn operand_label(text: &str, reduction: Option<Reduction>) -> String {
    let name = Path::new(text)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| text.to_string());
    match reduction {
        Some(reduction) => format!("{reduction}({name})"),
        None => name,
    }
}

/// One operation applied to every input frame
#[derive(Debug, Clone)]
pub struct FrameArith {
    pub operation: Operation,
    pub operand: Operand,
    pub operand_label: String,
    pub options: ArithOptions,
    pub naming: OutputNaming,
    /// Keyword naming the mask file of a frame
    pub mask_key: Option<String>,
    /// Mask file for every output; `<output>.msk` when unset
    pub mask_name: Option<PathBuf>,
    /// HISTORY text of the output image, describing the operation when unset
    pub message: Option<String>,
    pub keywords: HeaderKeywords,
}

impl FrameArith {
    pub fn new(operation: Operation, operand: Operand, operand_label: impl Into<String>) -> Self {
        Self {
            operation,
            operand,
            operand_label: operand_label.into(),
            options: ArithOptions::default(),
            naming: OutputNaming::default(),
            mask_key: None,
            mask_name: None,
            message: None,
            keywords: HeaderKeywords::default(),
        }
    }

    /// Process one frame, returning the path of the written image
    pub fn run(&self, input: &Path) -> Result<PathBuf, FitsError> {
        let output = self.naming.output_path(input)?;
        let mask_path = self
            .mask_name
            .clone()
            .unwrap_or_else(|| OutputNaming::mask_path(&output));

        let lhs = read_image_with_mask(input, self.mask_key.as_deref())?;
        let result = arith(&lhs, self.operation, &self.operand, self.options)?;

        // The output keeps the keywords of the input frame
        let mut header = Header::from_fits_file(input, self.keywords.clone())?;
        let history = self.message.clone().unwrap_or_else(|| {
            format!(
                "- Operation performed: {} {} {}",
                input.display(),
                self.operation,
                self.operand_label
            )
        });
        header.insert("HISTORY", HeaderValue::String(history));
        if let (Some(key), Some(name)) = (&self.mask_key, mask_path.file_name()) {
            header.insert(key, HeaderValue::String(name.to_string_lossy().into_owned()));
        }

        write_image(&output, result.data(), &header)?;
        write_mask(
            &mask_path,
            result.mask(),
            &format!("- Mask corresponding to image: {}", output.display()),
        )?;
        log::info!(
            "{} {} {} -> {} ({} masked pixels)",
            input.display(),
            self.operation,
            self.operand_label,
            output.display(),
            result.masked_count()
        );
        Ok(output)
    }
}
