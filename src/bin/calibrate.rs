//! calibrate - derive a color model record from sampled pixels
//!
//! Takes HSV points picked off the belt (on the command line or from a JSON
//! file of `[h, s, v]` triples), widens their per-channel range by a padding
//! and prints a model record ready to paste into the sorter config.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use sorter_kernel::{validate_model_name, Hsv, HsvBounds, ModelDescriptor};

const DEFAULT_PADDING: u8 = 20;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Model name (lowercase, digits, '_' or '-').
    #[arg(long)]
    name: String,
    /// One sampled pixel as "h,s,v". Repeatable.
    #[arg(long = "sample", value_parser = parse_triple)]
    samples: Vec<[u8; 3]>,
    /// JSON file holding a list of [h, s, v] samples.
    #[arg(long)]
    samples_file: Option<PathBuf>,
    /// Amount each channel range is widened by.
    #[arg(long, default_value_t = DEFAULT_PADDING)]
    padding: u8,
    /// Jet the model routes to.
    #[arg(long)]
    jet: u32,
    /// Overlay color as "b,g,r".
    #[arg(long, value_parser = parse_triple, default_value = "255,255,255")]
    bgr: [u8; 3],
    /// Emit the raw samples and padding instead of resolved bounds.
    #[arg(long)]
    keep_samples: bool,
}

fn parse_triple(raw: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected three comma-separated values, got '{}'", raw));
    }
    let mut out = [0u8; 3];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("'{}' is not a value in 0..=255", part))?;
    }
    Ok(out)
}

fn read_samples_file(path: &PathBuf) -> Result<Vec<[u8; 3]>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid samples file {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    validate_model_name(&args.name)?;

    let mut samples = args.samples.clone();
    if let Some(path) = &args.samples_file {
        samples.extend(read_samples_file(path)?);
    }
    if samples.is_empty() {
        return Err(anyhow!("provide at least one --sample or a --samples-file"));
    }

    let points: Vec<Hsv> = samples.iter().copied().map(Hsv::from).collect();
    let bounds = HsvBounds::from_samples(&points, args.padding)?;
    log::info!(
        "{}: {} samples -> lower {} upper {} (padded by {})",
        args.name,
        points.len(),
        bounds.lower(),
        bounds.upper(),
        args.padding
    );

    let widen = |v: [u8; 3]| v.iter().map(|&c| c as i64).collect::<Vec<_>>();
    let descriptor = if args.keep_samples {
        ModelDescriptor {
            name: args.name.clone(),
            samples: Some(samples.iter().map(|s| widen(*s)).collect()),
            padding: Some(args.padding as i64),
            display_bgr: Some(widen(args.bgr)),
            jet_number: Some(args.jet as i64),
            ..ModelDescriptor::default()
        }
    } else {
        let lower = bounds.lower();
        let upper = bounds.upper();
        ModelDescriptor {
            name: args.name.clone(),
            lowerhsv: Some(widen([lower.h, lower.s, lower.v])),
            upperhsv: Some(widen([upper.h, upper.s, upper.v])),
            display_bgr: Some(widen(args.bgr)),
            jet_number: Some(args.jet as i64),
            ..ModelDescriptor::default()
        }
    };
    // The loader must accept whatever we print.
    descriptor.to_model()?;
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}
