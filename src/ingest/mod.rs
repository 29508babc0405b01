//! Frame ingestion sources.
//!
//! This module provides different sources of HSV frames:
//! - Synthetic belt (`stub://...`) for tests and bench runs
//! - Still-image directories (`dir://...`, feature: ingest-image)
//!
//! All sources produce `HsvFrame` instances for the sorting engine.
//! The ingestion layer is responsible for:
//! - Acquiring pixels at the configured geometry
//! - Converting them to HSV before handoff
//! - Reporting acquisition failures as errors, never as empty frames
//!
//! The ingestion layer MUST NOT:
//! - Make sorting decisions
//! - Retain frames beyond handoff to the engine

pub mod convert;
#[cfg(feature = "ingest-image")]
pub mod image_dir;
pub mod synthetic;

use anyhow::{anyhow, Result};

use crate::frame::HsvFrame;

pub use convert::{rgb_frame_to_hsv, rgb_to_hsv};
#[cfg(feature = "ingest-image")]
pub use image_dir::{ImageDirConfig, ImageDirSource};
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// A pull-based supplier of frames.
pub trait FrameSource {
    /// Open the underlying device or stream.
    fn connect(&mut self) -> Result<()>;

    /// Next frame.
    ///
    /// - `Ok(Some(frame))`: a frame is ready
    /// - `Ok(None)`: the stream has ended
    /// - `Err(_)`: this tick has no frame; the caller may try again
    fn next_frame(&mut self) -> Result<Option<HsvFrame>>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool;

    /// Get frame statistics.
    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub frames_failed: u64,
    pub url: String,
}

/// Open a source from a URL.
///
/// `stub://` always works; `dir://path` needs the ingest-image feature and
/// accepts `?repeat` to loop over the directory.
pub fn open_source(
    url: &str,
    width: u32,
    height: u32,
    synthetic: SyntheticConfig,
) -> Result<Box<dyn FrameSource>> {
    if url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig {
            url: url.to_string(),
            width,
            height,
            ..synthetic
        })?));
    }
    if let Some(rest) = url.strip_prefix("dir://") {
        let (path, repeat) = parse_dir_url(rest)?;
        #[cfg(feature = "ingest-image")]
        {
            return Ok(Box::new(ImageDirSource::new(ImageDirConfig {
                path: path.into(),
                width,
                height,
                repeat,
            })?));
        }
        #[cfg(not(feature = "ingest-image"))]
        {
            let _ = repeat;
            return Err(anyhow!("{} requires the ingest-image feature", path));
        }
    }
    Err(anyhow!("unsupported source url '{}' (expected stub:// or dir://)", url))
}

/// Split `path[?repeat]`.
fn parse_dir_url(rest: &str) -> Result<(&str, bool)> {
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    if path.is_empty() {
        return Err(anyhow!("dir:// url needs a directory path"));
    }
    match query {
        None => Ok((path, false)),
        Some("repeat") => Ok((path, true)),
        Some(other) => Err(anyhow!("unknown dir:// option '{}' (expected repeat)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_urls_open_synthetic_source() {
        let mut source = open_source("stub://belt", 32, 24, SyntheticConfig::default()).unwrap();
        source.connect().unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (32, 24));
        assert_eq!(source.stats().url, "stub://belt");
    }

    #[test]
    fn unknown_scheme_rejected() {
        assert!(open_source("rtsp://camera", 32, 24, SyntheticConfig::default()).is_err());
    }

    #[test]
    fn dir_url_options() {
        assert_eq!(parse_dir_url("/data/belt").unwrap(), ("/data/belt", false));
        assert_eq!(parse_dir_url("/data/belt?repeat").unwrap(), ("/data/belt", true));
        assert!(parse_dir_url("/data/belt?loop").is_err());
        assert!(parse_dir_url("?repeat").is_err());
    }

    #[cfg(feature = "ingest-image")]
    #[test]
    fn dir_repeat_loops_over_images() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        let url = format!("dir://{}?repeat", dir.path().display());
        let mut source = open_source(&url, 4, 2, SyntheticConfig::default()).unwrap();
        source.connect().unwrap();
        for _ in 0..3 {
            assert!(source.next_frame().unwrap().is_some());
        }

        let url = format!("dir://{}", dir.path().display());
        let mut source = open_source(&url, 4, 2, SyntheticConfig::default()).unwrap();
        source.connect().unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }
}
