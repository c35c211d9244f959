//! FITS image I/O for calibration frames
//!
//! Frames are single 2-D images in the primary HDU. Arrays are indexed
//! `[row, column]` in file order, so row 0 is the first row stored (FITS
//! y = 1). Bad-pixel masks live in separate FITS files where any non-zero
//! pixel is masked out.

use std::path::{Path, PathBuf};

use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::hdu::FitsHdu;
use fitsio::compat::images::{ImageDescription, ImageType, ReadImage, WriteImage};
use ndarray::Array2;
use thiserror::Error;

use super::arith::{ArithError, MaskedImage};
use crate::header::{Header, HeaderError, HeaderValue};

#[derive(Error, Debug)]
pub enum FitsError {
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::compat::errors::Error),

    #[error("Primary HDU of {0} is not a 2-D image")]
    NotAnImage(PathBuf),

    #[error("Cannot reshape image data of {path}: {len} pixels for {width}x{height}")]
    InvalidShape {
        path: PathBuf,
        len: usize,
        width: usize,
        height: usize,
    },

    #[error(transparent)]
    Arith(#[from] ArithError),

    #[error(transparent)]
    Header(#[from] HeaderError),
}

fn image_from_hdu(fptr: &FitsFile, hdu: &FitsHdu, path: &Path) -> Result<Array2<f64>, FitsError> {
    let naxis = hdu.read_key::<i64>(fptr, "NAXIS").unwrap_or(0);
    if naxis != 2 {
        return Err(FitsError::NotAnImage(path.to_path_buf()));
    }
    let width = hdu.read_key::<i64>(fptr, "NAXIS1").unwrap_or(0) as usize;
    let height = hdu.read_key::<i64>(fptr, "NAXIS2").unwrap_or(0) as usize;

    let pixels = f64::read_image(fptr, hdu)?;
    let len = pixels.len();
    Array2::from_shape_vec((height, width), pixels).map_err(|_| FitsError::InvalidShape {
        path: path.to_path_buf(),
        len,
        width,
        height,
    })
}

/// Pixel data of the primary HDU
pub fn read_image(path: &Path) -> Result<Array2<f64>, FitsError> {
    let fptr = FitsFile::open(path)?;
    let hdu = fptr.hdu(0)?;
    image_from_hdu(&fptr, &hdu, path)
}

/// Read a frame together with its bad-pixel mask.
///
/// The mask file is named by the `mask_key` keyword of the frame; relative
/// names are taken from the frame's directory. Without a key, or when the
/// frame does not carry it, every pixel is valid.
pub fn read_image_with_mask(path: &Path, mask_key: Option<&str>) -> Result<MaskedImage, FitsError> {
    let fptr = FitsFile::open(path)?;
    let hdu = fptr.hdu(0)?;
    let data = image_from_hdu(&fptr, &hdu, path)?;

    let mask_name = mask_key.and_then(|key| hdu.read_key::<String>(&fptr, key).ok());
    let Some(mask_name) = mask_name else {
        log::debug!("No mask for {}", path.display());
        return Ok(MaskedImage::unmasked(data));
    };

    let mask_path = match path.parent() {
        Some(dir) => dir.join(mask_name.trim()),
        None => PathBuf::from(mask_name.trim()),
    };
    log::debug!("Mask of {} is {}", path.display(), mask_path.display());
    let mask = read_image(&mask_path)?.mapv(|pixel| pixel != 0.0);
    Ok(MaskedImage::new(data, mask)?)
}

fn write_card(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    key: &str,
    value: &HeaderValue,
) -> Result<(), FitsError> {
    match value {
        HeaderValue::String(text) => hdu.write_key(fptr, key, &text.clone())?,
        HeaderValue::Integer(number) => hdu.write_key(fptr, key, number)?,
        HeaderValue::Float(number) => hdu.write_key(fptr, key, number)?,
        HeaderValue::Logical(flag) => hdu.write_key(fptr, key, &i64::from(*flag))?,
    }
    Ok(())
}

/// Write `data` as the primary image of a new file, replacing any existing
/// one, with the keywords of `header`. The image shape keywords come from
/// `data` itself.
pub fn write_image(path: &Path, data: &Array2<f64>, header: &Header) -> Result<(), FitsError> {
    let (height, width) = data.dim();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: vec![width, height],
    };

    let mut fptr = FitsFile::create(path).overwrite().open()?;
    let hdu = fptr.create_image("PRIMARY", &description)?;
    let flat: Vec<f64> = data.iter().copied().collect();
    f64::write_image(&mut fptr, &hdu, &flat)?;

    for (key, value) in header.iter().filter(|(key, _)| !key.starts_with("NAXIS")) {
        write_card(&mut fptr, &hdu, key, value)?;
    }
    Ok(())
}

/// Write a bad-pixel mask (1 = masked) with a single HISTORY record
pub fn write_mask(path: &Path, mask: &Array2<bool>, history: &str) -> Result<(), FitsError> {
    let (height, width) = mask.dim();
    let description = ImageDescription {
        data_type: ImageType::Long,
        dimensions: vec![width, height],
    };

    let mut fptr = FitsFile::create(path).overwrite().open()?;
    let hdu = fptr.create_image("PRIMARY", &description)?;
    let flat: Vec<i32> = mask.iter().map(|&masked| i32::from(masked)).collect();
    i32::write_image(&mut fptr, &hdu, &flat)?;
    hdu.write_key(&mut fptr, "HISTORY", &history.to_string())?;
    Ok(())
}
