//! sorterd - color sorter daemon
//!
//! This daemon:
//! 1. Loads color models, zones and thresholds (file + environment)
//! 2. Pulls HSV frames from the configured source (stub://, dir://)
//! 3. Classifies every zone, arbitrates a single winner per zone
//! 4. Writes exactly one command per jet per frame
//! 5. Drives every jet inactive on startup, on missing frames and on exit

use anyhow::{anyhow, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sorter_kernel::ingest::open_source;
use sorter_kernel::{
    ActuatorSink, Hsv, JsonLinesTelemetrySink, LogActuatorSink, LogTelemetrySink, Runner,
    SorterConfig, SyntheticConfig, TelemetrySink,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML when the name ends in .toml).
    #[arg(long, env = "SORTER_CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,
    /// Append one JSON line of diagnostics per frame to this file.
    #[arg(long)]
    telemetry_json: Option<PathBuf>,
    /// Include matching pixel coordinates in JSON telemetry.
    #[arg(long, requires = "telemetry_json")]
    include_matches: bool,
    /// Report a failed capture every N frames (stub:// sources only).
    #[arg(long)]
    fail_every: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = SorterConfig::load_from(args.config.as_deref())?;
    let engine = cfg.build_engine()?;
    log::info!(
        "sorterd {}: {} models, {} zones, threshold {}, jets {:?}",
        env!("CARGO_PKG_VERSION"),
        engine.registry().len(),
        engine.zones().len(),
        engine.threshold(),
        engine.actuators()
    );
    for (position, model) in engine.registry().models().iter().enumerate() {
        log::info!(
            "model #{} {} lower={} upper={} jet={}",
            position,
            model.name,
            model.bounds.lower(),
            model.bounds.upper(),
            model.jet
        );
    }

    // Parts on the synthetic belt cycle through the registered colors.
    let lane = cfg
        .zones
        .first()
        .map(|zone| (zone.col_min, zone.col_max))
        .ok_or_else(|| anyhow!("at least one zone is required"))?;
    let part_colors = engine
        .registry()
        .models()
        .iter()
        .map(|model| {
            let lower = model.bounds.lower();
            let upper = model.bounds.upper();
            Hsv::new(
                model.bounds.hue.center(),
                ((lower.s as u16 + upper.s as u16) / 2) as u8,
                ((lower.v as u16 + upper.v as u16) / 2) as u8,
            )
        })
        .collect();
    let synthetic = SyntheticConfig {
        lane,
        part_colors,
        fail_every: args.fail_every,
        ..SyntheticConfig::default()
    };
    let mut source = open_source(&cfg.source_url, cfg.frame.width, cfg.frame.height, synthetic)?;
    source.connect()?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }

    let mut sink = LogActuatorSink::new(engine.actuators());
    let mut telemetry: Box<dyn TelemetrySink> = match &args.telemetry_json {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| anyhow!("failed to create {}: {}", path.display(), e))?;
            log::info!("frame telemetry -> {}", path.display());
            Box::new(
                JsonLinesTelemetrySink::new(BufWriter::new(file))
                    .with_matches(args.include_matches),
            )
        }
        None => Box::new(LogTelemetrySink::new()),
    };

    let runner = Runner::new(cfg.frame.target_fps)?.with_max_ticks(args.frames);
    log::info!(
        "sorterd running: source={} period={:?} (Ctrl-C to stop)",
        cfg.source_url,
        runner.period()
    );
    let outcome = runner.run(
        source.as_mut(),
        &engine,
        &mut sink,
        telemetry.as_mut(),
        &stop,
    );

    // Safe state on every exit path.
    sink.shutdown()?;
    let stats = outcome?;
    let source_stats = source.stats();
    log::info!(
        "sorterd stopped: ticks={} frames={} missed={} detections={} write_failures={} captured={} failed={}",
        stats.ticks,
        stats.frames,
        stats.missed,
        stats.detections,
        stats.write_failures,
        source_stats.frames_captured,
        source_stats.frames_failed
    );
    Ok(())
}
