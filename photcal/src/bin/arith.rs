//! Pixel arithmetic between frames
//!
//! Applies `input1 <operation> input2` to every input frame, where the second
//! operand is another frame (or its mean or median) or a number. Each result
//! is written with a mask file marking the pixels masked in either operand.

use std::path::{Path, PathBuf};

use clap::Parser;
use photcal::image_proc::{
    operand_label, parse_operand, ArithOptions, FrameArith, Operation, OutputNaming, Reduction,
};

#[derive(Parser, Debug)]
#[command(
    name = "arith",
    about = "Arithmetic operations on images",
    long_about = None
)]
struct Args {
    /// `INPUT1... OPERATION INPUT2`: frames to operate on, one of
    /// + - * / **, then the frame or number used as second operand
    #[arg(required = true, num_args = 3.., allow_hyphen_values = true)]
    operands: Vec<String>,

    /// Output file, the input name otherwise (before prefix and suffix)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Prefix added to the output file name
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    prefix: String,

    /// Suffix added to the output file root
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    suffix: String,

    /// HISTORY text for the output images
    #[arg(long)]
    message: Option<String>,

    /// Header keyword holding the mask file name of a frame
    #[arg(long)]
    mask_key: Option<String>,

    /// Name of the resulting mask, `<output>.msk` otherwise
    #[arg(long)]
    mask_name: Option<PathBuf>,

    /// Value written into masked output pixels
    #[arg(long)]
    fill_val: Option<f64>,

    /// Allow overwriting the input frames
    #[arg(long)]
    overwrite: bool,

    /// Use the mean of input2 instead of the frame itself
    #[arg(long, conflicts_with = "median")]
    mean: bool,

    /// Use the median of input2 instead of the frame itself
    #[arg(long)]
    median: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let [inputs @ .., operation, input2] = args.operands.as_slice() else {
        return Err("expected INPUT1... OPERATION INPUT2".into());
    };
    if inputs.is_empty() {
        return Err("expected INPUT1... OPERATION INPUT2".into());
    }
    let operation: Operation = operation.parse()?;

    let reduction = match (args.mean, args.median) {
        (true, _) => Some(Reduction::Mean),
        (_, true) => Some(Reduction::Median),
        _ => None,
    };
    let naming = OutputNaming {
        output: args.output.clone(),
        prefix: args.prefix.clone(),
        suffix: args.suffix.clone(),
        overwrite: args.overwrite,
    };
    // Fail before reading anything when no output name can be built
    naming.output_path(Path::new(&inputs[0]))?;

    let operand = parse_operand(input2, args.mask_key.as_deref())?;
    let job = FrameArith {
        options: ArithOptions {
            reduction,
            fill: args.fill_val,
        },
        naming,
        mask_key: args.mask_key.clone(),
        mask_name: args.mask_name.clone(),
        message: args.message.clone(),
        ..FrameArith::new(operation, operand, operand_label(input2, reduction))
    };

    for input in inputs {
        let output = job.run(Path::new(input))?;
        println!("{}", output.display());
    }
    Ok(())
}
