//! Still-image directory source.
//!
//! Replays `.png` / `.jpg` / `.jpeg` files from a local directory in
//! lexical order, decoding each to RGB and converting to HSV. Useful for
//! re-running captured belt images through the engine offline.
//!
//! A file that fails to decode, or whose dimensions differ from the
//! configured geometry, is reported as a failed capture for that tick.

use anyhow::{anyhow, Context, Result};
use image::GenericImageView;
use std::path::PathBuf;

use super::convert::rgb_frame_to_hsv;
use super::{FrameSource, SourceStats};
use crate::frame::HsvFrame;

/// Configuration for an image directory source.
#[derive(Clone, Debug)]
pub struct ImageDirConfig {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Start over after the last file instead of ending the stream.
    pub repeat: bool,
}

pub struct ImageDirSource {
    config: ImageDirConfig,
    files: Vec<PathBuf>,
    cursor: usize,
    frames_captured: u64,
    frames_failed: u64,
}

impl ImageDirSource {
    pub fn new(config: ImageDirConfig) -> Result<Self> {
        Ok(Self {
            config,
            files: Vec::new(),
            cursor: 0,
            frames_captured: 0,
            frames_failed: 0,
        })
    }

    fn load(&self, path: &PathBuf) -> Result<HsvFrame> {
        let image = image::open(path).with_context(|| format!("decode {}", path.display()))?;
        let (width, height) = image.dimensions();
        if (width, height) != (self.config.width, self.config.height) {
            return Err(anyhow!(
                "{} is {}x{}, expected {}x{}",
                path.display(),
                width,
                height,
                self.config.width,
                self.config.height
            ));
        }
        let rgb = image.into_rgb8();
        rgb_frame_to_hsv(rgb.as_raw(), width, height)
    }
}

fn is_image(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.config.path)
            .with_context(|| format!("read image directory {}", self.config.path.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(anyhow!(
                "no .png/.jpg images in {}",
                self.config.path.display()
            ));
        }
        log::info!(
            "ImageDirSource: {} images in {}",
            files.len(),
            self.config.path.display()
        );
        self.files = files;
        self.cursor = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<HsvFrame>> {
        if self.cursor >= self.files.len() {
            if self.config.repeat && !self.files.is_empty() {
                self.cursor = 0;
            } else {
                return Ok(None);
            }
        }
        let path = self.files[self.cursor].clone();
        self.cursor += 1;
        match self.load(&path) {
            Ok(frame) => {
                self.frames_captured += 1;
                Ok(Some(frame))
            }
            Err(e) => {
                self.frames_failed += 1;
                Err(e)
            }
        }
    }

    fn is_healthy(&self) -> bool {
        !self.files.is_empty()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            frames_failed: self.frames_failed,
            url: format!("dir://{}", self.config.path.display()),
        }
    }
}
