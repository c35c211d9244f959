//! Image processing for frame reduction
//!
//! Pixel arithmetic between calibration and science frames, with bad-pixel
//! masks carried through every operation, and the FITS I/O around it.

pub mod arith;
pub mod fits;
pub mod frame_arith;

pub use arith::{
    arith, ArithError, ArithOptions, MaskedImage, Operand, Operation, OutputNaming, Reduction,
};
pub use fits::{read_image, read_image_with_mask, write_image, write_mask, FitsError};
pub use frame_arith::{operand_label, parse_operand, FrameArith};
