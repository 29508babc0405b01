use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::pipeline::SortingEngine;
use crate::registry::{ModelDescriptor, ModelRegistry};
use crate::zone::DetectionZone;

const DEFAULT_DETECTION_THRESHOLD: usize = 50;
const DEFAULT_FRAME_WIDTH: u32 = 160;
const DEFAULT_FRAME_HEIGHT: u32 = 96;
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_SOURCE_URL: &str = "stub://belt";
const DEFAULT_ZONE: DetectionZone = DetectionZone {
    row_min: 36,
    row_max: 85,
    col_min: 96,
    col_max: 121,
    actuator: 0,
};

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SorterConfigFile {
    detection_threshold: Option<usize>,
    frame: Option<FrameConfigFile>,
    source: Option<SourceConfigFile>,
    zones: Option<Vec<DetectionZone>>,
    models: Option<Vec<ModelDescriptor>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FrameConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SorterConfig {
    /// Minimum zone total (pixels) that counts as a detection.
    pub detection_threshold: usize,
    pub frame: FrameSettings,
    pub source_url: String,
    pub zones: Vec<DetectionZone>,
    pub registry: ModelRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSettings {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl SorterConfig {
    /// Load from the file named by `SORTER_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SORTER_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults only), then apply environment
    /// overrides and validate.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => SorterConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a JSON document without consulting the environment.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: SorterConfigFile =
            serde_json::from_str(raw).map_err(|e| anyhow!("invalid config: {}", e))?;
        let cfg = Self::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SorterConfigFile) -> Result<Self> {
        let detection_threshold = file
            .detection_threshold
            .unwrap_or(DEFAULT_DETECTION_THRESHOLD);
        let frame = FrameSettings {
            width: file
                .frame
                .as_ref()
                .and_then(|frame| frame.width)
                .unwrap_or(DEFAULT_FRAME_WIDTH),
            height: file
                .frame
                .as_ref()
                .and_then(|frame| frame.height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT),
            target_fps: file
                .frame
                .as_ref()
                .and_then(|frame| frame.target_fps)
                .unwrap_or(DEFAULT_TARGET_FPS),
        };
        let source_url = file
            .source
            .and_then(|source| source.url)
            .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());
        let zones = file.zones.unwrap_or_else(|| vec![DEFAULT_ZONE]);
        let registry = ModelRegistry::load(&file.models.unwrap_or_default())?;
        Ok(Self {
            detection_threshold,
            frame,
            source_url,
            zones,
            registry,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(threshold) = std::env::var("SORTER_THRESHOLD") {
            self.detection_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("SORTER_THRESHOLD must be a non-negative integer"))?;
        }
        if let Ok(fps) = std::env::var("SORTER_FPS") {
            self.frame.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("SORTER_FPS must be a positive integer"))?;
        }
        if let Ok(url) = std::env::var("SORTER_SOURCE") {
            if !url.trim().is_empty() {
                self.source_url = url;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.detection_threshold == 0 {
            return Err(anyhow!("detection_threshold must be at least 1"));
        }
        if self.frame.target_fps == 0 {
            return Err(anyhow!("frame.target_fps must be at least 1"));
        }
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(anyhow!(
                "frame size {}x{} must be non-empty",
                self.frame.width,
                self.frame.height
            ));
        }
        if self.zones.is_empty() {
            return Err(anyhow!("at least one zone is required"));
        }
        for (i, zone) in self.zones.iter().enumerate() {
            zone.validate(self.frame.height, self.frame.width)
                .with_context(|| format!("zone {}", i))?;
        }
        Ok(())
    }

    /// Build the sorting engine described by this configuration.
    pub fn build_engine(&self) -> Result<SortingEngine> {
        SortingEngine::new(
            self.registry.clone(),
            self.zones.clone(),
            self.detection_threshold,
            self.frame.width,
            self.frame.height,
        )
    }
}

fn read_config_file(path: &Path) -> Result<SorterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
