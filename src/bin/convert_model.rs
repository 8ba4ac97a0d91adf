//! Re-encode a dlib shape predictor as the crate's bincode cache, which loads much faster.
//!
//! Usage:
//!   convert-model shape_predictor_68_face_landmarks.dat.bz2 face_landmarks.bin

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use blink_detection::ShapePredictor;

#[derive(Parser, Debug)]
#[command(name = "convert-model", version, about = "Convert a dlib shape predictor to the bincode cache format")]
struct Args {
    /// dlib model (.dat or .dat.bz2)
    input: PathBuf,

    /// Output path for the converted model
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let predictor = ShapePredictor::load(&args.input)?;
    predictor
        .write(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!(
        "wrote {} ({} landmarks)",
        args.output.display(),
        predictor.num_landmarks()
    );
    Ok(())
}
