use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use lightcal_core::io::image_io::load_image;

#[derive(Args)]
pub struct InfoArgs {
    /// Input image file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let buffer = load_image(&args.file, None)?;

    println!("File:        {}", args.file.display());
    println!("Dimensions:  {}x{}", buffer.width(), buffer.height());
    println!("Channels:    {} ({})", buffer.channels(), buffer.layout);
    println!("Bit depth:   {}", buffer.bit_depth);

    for channel in 0..buffer.channels() {
        let plane = buffer.plane(channel);
        let (min, max) = plane
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let mean = plane.mean().unwrap_or(0.0);
        println!(
            "Channel {}:   min {:.4}  mean {:.4}  max {:.4}",
            channel, min, mean, max
        );
    }

    Ok(())
}
