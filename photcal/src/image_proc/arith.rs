//! Pixel-wise arithmetic between masked frames
//!
//! Used to combine calibration and science frames (bias subtraction, flat
//! division, scaling). A pixel masked in either operand is masked in the
//! result.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ndarray::{Array2, Zip};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArithError {
    #[error("Unknown operation {0:?}, expected one of + - * / **")]
    UnknownOperation(String),

    #[error("Image shapes differ: {0:?} and {1:?}")]
    ShapeMismatch((usize, usize), (usize, usize)),

    #[error("Mask shape {mask:?} does not match data shape {data:?}")]
    MaskShape {
        data: (usize, usize),
        mask: (usize, usize),
    },

    #[error("Every pixel of the operand is masked, cannot compute its {0}")]
    EmptyReduction(Reduction),

    #[error("No output name: give an output path, a prefix, a suffix or allow overwriting")]
    NoOutputName,
}

/// Binary operation between two frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl Operation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Subtract => "-",
            Operation::Multiply => "*",
            Operation::Divide => "/",
            Operation::Power => "**",
        }
    }

    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            Operation::Add => a + b,
            Operation::Subtract => a - b,
            Operation::Multiply => a * b,
            Operation::Divide => a / b,
            Operation::Power => a.powf(b),
        }
    }
}

impl FromStr for Operation {
    type Err = ArithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(Operation::Add),
            "-" => Ok(Operation::Subtract),
            "*" => Ok(Operation::Multiply),
            "/" => Ok(Operation::Divide),
            "**" => Ok(Operation::Power),
            other => Err(ArithError::UnknownOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Statistic replacing the second operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Median,
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::Mean => write!(f, "mean"),
            Reduction::Median => write!(f, "median"),
        }
    }
}

/// Frame with a bad-pixel mask, `true` marks a pixel masked out
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedImage {
    data: Array2<f64>,
    mask: Array2<bool>,
}

impl MaskedImage {
    pub fn new(data: Array2<f64>, mask: Array2<bool>) -> Result<Self, ArithError> {
        if data.dim() != mask.dim() {
            return Err(ArithError::MaskShape {
                data: data.dim(),
                mask: mask.dim(),
            });
        }
        Ok(Self { data, mask })
    }

    /// Frame without any masked pixel
    pub fn unmasked(data: Array2<f64>) -> Self {
        let mask = Array2::from_elem(data.dim(), false);
        Self { data, mask }
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    /// (rows, columns)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn masked_count(&self) -> usize {
        self.mask.iter().filter(|&&masked| masked).count()
    }

    fn valid_values(&self) -> Vec<f64> {
        self.data
            .iter()
            .zip(self.mask.iter())
            .filter(|&(_, &masked)| !masked)
            .map(|(&value, _)| value)
            .collect()
    }

    /// Mean over unmasked pixels
    pub fn mean(&self) -> Option<f64> {
        let values = self.valid_values();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Median over unmasked pixels, averaging the two central values for an
    /// even count
    pub fn median(&self) -> Option<f64> {
        let mut values = self.valid_values();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            Some((values[mid - 1] + values[mid]) / 2.0)
        } else {
            Some(values[mid])
        }
    }

    fn reduce(&self, reduction: Reduction) -> Result<f64, ArithError> {
        match reduction {
            Reduction::Mean => self.mean(),
            Reduction::Median => self.median(),
        }
        .ok_or(ArithError::EmptyReduction(reduction))
    }

    /// Data with masked pixels replaced by `value`
    pub fn filled(&self, value: f64) -> Array2<f64> {
        Zip::from(&self.data)
            .and(&self.mask)
            .map_collect(|&pixel, &masked| if masked { value } else { pixel })
    }
}

/// Second operand of an operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Image(MaskedImage),
    /// Never masked
    Scalar(f64),
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

impl From<MaskedImage> for Operand {
    fn from(image: MaskedImage) -> Self {
        Operand::Image(image)
    }
}

/// How the second operand enters the operation, and what to do with masked
/// output pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArithOptions {
    /// Replace an image operand by its mean or median
    pub reduction: Option<Reduction>,
    /// Value written into masked output pixels; without it they keep the
    /// computed value
    pub fill: Option<f64>,
}

/// Apply `operation` pixel by pixel to `lhs` and `rhs`.
///
/// A reduced image operand behaves as a scalar: it contributes no mask and
/// need not match the shape of `lhs`.
pub fn arith(
    lhs: &MaskedImage,
    operation: Operation,
    rhs: &Operand,
    options: ArithOptions,
) -> Result<MaskedImage, ArithError> {
    let (data, mask) = match (rhs, options.reduction) {
        (Operand::Scalar(value), _) => scalar_op(lhs, operation, *value),
        (Operand::Image(image), Some(reduction)) => {
            let value = image.reduce(reduction)?;
            log::debug!("Using {reduction} {value} of the second operand");
            scalar_op(lhs, operation, value)
        }
        (Operand::Image(image), None) => {
            if lhs.dim() != image.dim() {
                return Err(ArithError::ShapeMismatch(lhs.dim(), image.dim()));
            }
            let data = Zip::from(&lhs.data)
                .and(&image.data)
                .map_collect(|&a, &b| operation.apply(a, b));
            let mask = Zip::from(&lhs.mask)
                .and(&image.mask)
                .map_collect(|&a, &b| a || b);
            (data, mask)
        }
    };

    let result = MaskedImage { data, mask };
    Ok(match options.fill {
        Some(value) => MaskedImage {
            data: result.filled(value),
            mask: result.mask,
        },
        None => result,
    })
}

fn scalar_op(lhs: &MaskedImage, operation: Operation, value: f64) -> (Array2<f64>, Array2<bool>) {
    (
        lhs.data.mapv(|pixel| operation.apply(pixel, value)),
        lhs.mask.clone(),
    )
}

/// Split a file name at its first `.`: `"ngc.0001.fits"` gives
/// `("ngc", ".0001.fits")`
pub fn split_root(file_name: &str) -> (&str, &str) {
    match file_name.find('.') {
        Some(index) => file_name.split_at(index),
        None => (file_name, ""),
    }
}

/// Where the result of an operation is written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputNaming {
    /// Explicit output path, the input path otherwise
    pub output: Option<PathBuf>,
    pub prefix: String,
    pub suffix: String,
    /// Allow writing over the input when nothing else changes the name
    pub overwrite: bool,
}

impl OutputNaming {
    /// `prefix + root + suffix + extensions` in the directory of the base path
    pub fn output_path(&self, input: &Path) -> Result<PathBuf, ArithError> {
        let prefix = self.prefix.trim();
        let suffix = self.suffix.trim();
        if self.output.is_none() && prefix.is_empty() && suffix.is_empty() && !self.overwrite {
            return Err(ArithError::NoOutputName);
        }

        let base = self.output.as_deref().unwrap_or(input);
        let file_name = base
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (root, extensions) = split_root(&file_name);
        Ok(base.with_file_name(format!("{prefix}{root}{suffix}{extensions}")))
    }

    /// Companion mask file of an output image
    pub fn mask_path(output: &Path) -> PathBuf {
        let mut name = output.as_os_str().to_owned();
        name.push(".msk");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rstest::rstest;

    fn frame() -> MaskedImage {
        MaskedImage::new(
            array![[10.0, 20.0], [30.0, 40.0]],
            array![[false, true], [false, false]],
        )
        .unwrap()
    }

    #[rstest]
    #[case("+", Operation::Add, 7.0)]
    #[case("-", Operation::Subtract, 3.0)]
    #[case("*", Operation::Multiply, 10.0)]
    #[case("/", Operation::Divide, 2.5)]
    #[case("**", Operation::Power, 25.0)]
    fn test_operations(#[case] symbol: &str, #[case] operation: Operation, #[case] value: f64) {
        assert_eq!(symbol.parse::<Operation>().unwrap(), operation);
        assert_eq!(operation.to_string(), symbol);
        assert_relative_eq!(operation.apply(5.0, 2.0), value);
    }

    #[test]
    fn test_unknown_operation() {
        assert!(matches!(
            "%".parse::<Operation>(),
            Err(ArithError::UnknownOperation(_))
        ));
    }

    #[test]
    fn test_masks_are_combined() {
        let other = MaskedImage::new(
            array![[1.0, 2.0], [3.0, 4.0]],
            array![[false, false], [true, false]],
        )
        .unwrap();
        let result = arith(
            &frame(),
            Operation::Subtract,
            &other.into(),
            ArithOptions::default(),
        )
        .unwrap();

        assert_eq!(result.data(), &array![[9.0, 18.0], [27.0, 36.0]]);
        assert_eq!(result.mask(), &array![[false, true], [true, false]]);
        assert_eq!(result.masked_count(), 2);
    }

    #[test]
    fn test_scalar_operand_keeps_mask() {
        let result = arith(
            &frame(),
            Operation::Divide,
            &Operand::from(10.0),
            ArithOptions::default(),
        )
        .unwrap();
        assert_eq!(result.data(), &array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(result.mask(), frame().mask());
    }

    #[test]
    fn test_fill_value() {
        let options = ArithOptions {
            fill: Some(-1.0),
            ..Default::default()
        };
        let result = arith(&frame(), Operation::Add, &Operand::Scalar(1.0), options).unwrap();
        assert_eq!(result.data(), &array![[11.0, -1.0], [31.0, 41.0]]);
        assert!(result.mask()[[0, 1]]);
    }

    #[test]
    fn test_reductions_ignore_masked_pixels() {
        let flat = MaskedImage::new(
            array![[2.0, 1000.0, 4.0], [6.0, 8.0, 3.0]],
            array![[false, true, false], [false, false, false]],
        )
        .unwrap();
        assert_relative_eq!(flat.mean().unwrap(), 4.6);
        assert_relative_eq!(flat.median().unwrap(), 4.0);

        // Reduced operands may have any shape
        let options = ArithOptions {
            reduction: Some(Reduction::Median),
            ..Default::default()
        };
        let result = arith(&frame(), Operation::Divide, &flat.into(), options).unwrap();
        assert_eq!(result.data(), &array![[2.5, 5.0], [7.5, 10.0]]);
        assert_eq!(result.mask(), frame().mask());
    }

    #[test]
    fn test_fully_masked_reduction() {
        let masked = MaskedImage::new(array![[1.0]], array![[true]]).unwrap();
        let options = ArithOptions {
            reduction: Some(Reduction::Mean),
            ..Default::default()
        };
        assert!(matches!(
            arith(&frame(), Operation::Add, &masked.into(), options),
            Err(ArithError::EmptyReduction(Reduction::Mean))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let small = MaskedImage::unmasked(array![[1.0, 2.0, 3.0]]);
        assert!(matches!(
            arith(&frame(), Operation::Add, &small.into(), ArithOptions::default()),
            Err(ArithError::ShapeMismatch((2, 2), (1, 3)))
        ));
        assert!(matches!(
            MaskedImage::new(array![[1.0, 2.0]], array![[false]]),
            Err(ArithError::MaskShape { .. })
        ));
    }

    #[test]
    fn test_output_naming() {
        let input = Path::new("/data/night1/ngc6946.0001.fits");
        let naming = OutputNaming {
            prefix: "b".to_string(),
            suffix: " -c".to_string(),
            ..Default::default()
        };
        let output = naming.output_path(input).unwrap();
        assert_eq!(output, PathBuf::from("/data/night1/bngc6946-c.0001.fits"));
        assert_eq!(
            OutputNaming::mask_path(&output),
            PathBuf::from("/data/night1/bngc6946-c.0001.fits.msk")
        );

        let explicit = OutputNaming {
            output: Some(PathBuf::from("/tmp/result.fits")),
            ..Default::default()
        };
        assert_eq!(
            explicit.output_path(input).unwrap(),
            PathBuf::from("/tmp/result.fits")
        );

        let overwrite = OutputNaming {
            overwrite: true,
            ..Default::default()
        };
        assert_eq!(overwrite.output_path(input).unwrap(), input);

        assert!(matches!(
            OutputNaming::default().output_path(input),
            Err(ArithError::NoOutputName)
        ));
    }

    #[test]
    fn test_split_root() {
        assert_eq!(split_root("bias.fits"), ("bias", ".fits"));
        assert_eq!(split_root("ngc.0001.fits.gz"), ("ngc", ".0001.fits.gz"));
        assert_eq!(split_root("README"), ("README", ""));
    }
}
