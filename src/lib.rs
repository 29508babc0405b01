//! Sorter Kernel
//!
//! This crate implements the decision core of a color sorter: objects pass
//! through a fixed camera zone, are classified by color, and a binary jet
//! diverts the ones that match.
//!
//! # Architecture
//!
//! The decision core is pure. Every frame flows through the same stages:
//!
//! 1. **Classify**: each color model is tested against every pixel of a zone.
//! 2. **Arbitrate**: per zone, counts are summed against the detection
//!    threshold and a single winner is picked (ties go to registry order).
//! 3. **Map**: the arbitration result becomes an actuator command.
//!
//! I/O lives behind narrow capability traits (`FrameSource`, `ActuatorSink`,
//! `TelemetrySink`). The core never writes GPIO, never draws, never logs a
//! decision it has not already returned as a value.
//!
//! # Module Structure
//!
//! - `model` / `registry`: color models and the ordered, validated registry
//! - `zone` / `frame`: detection zones and HSV frame buffers
//! - `classify` / `arbiter` / `actuation`: the per-frame decision stages
//! - `pipeline`: `SortingEngine`, one frame through all zones
//! - `sink` / `runtime`: capability boundaries and the pull loop
//! - `ingest`: frame sources (synthetic belt, image directories)
//! - `config`: file + environment configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

pub mod actuation;
pub mod arbiter;
pub mod classify;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod runtime;
pub mod sink;
pub mod zone;

pub use actuation::ActuationMapper;
pub use arbiter::{ArbitrationResult, Arbiter, ModelCount, Winner};
pub use classify::{classify, ClassificationResult};
pub use config::{FrameSettings, SorterConfig};
pub use frame::HsvFrame;
pub use ingest::{FrameSource, SourceStats, SyntheticConfig, SyntheticSource};
pub use model::{ColorModel, HsvBounds, HueBand};
pub use pipeline::{FrameReport, SortingEngine, ZoneReport};
pub use registry::{ModelDescriptor, ModelRegistry};
pub use runtime::{RunStats, Runner};
pub use sink::{
    ActuatorSink, JsonLinesTelemetrySink, LogActuatorSink, LogTelemetrySink, TelemetrySink,
};
pub use zone::DetectionZone;

// -------------------- Pixels --------------------

/// One HSV pixel. Each channel uses the full 8-bit range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

impl From<[u8; 3]> for Hsv {
    fn from(value: [u8; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl fmt::Display for Hsv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.h, self.s, self.v)
    }
}

// -------------------- Actuators --------------------

/// Index of a physical jet/actuator line.
pub type ActuatorIndex = u32;

/// A single on/off command for one actuator.
///
/// `active == false` is the safe state. Sinks must start and end there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ActuatorCommand {
    pub actuator: ActuatorIndex,
    pub active: bool,
}

impl ActuatorCommand {
    pub const fn active(actuator: ActuatorIndex) -> Self {
        Self {
            actuator,
            active: true,
        }
    }

    pub const fn inactive(actuator: ActuatorIndex) -> Self {
        Self {
            actuator,
            active: false,
        }
    }
}

// -------------------- Names --------------------

/// Model names are short local identifiers used in logs and telemetry.
///
/// Allowed: "red", "dark_brown", "yellow-2"
/// Disallowed: empty, uppercase, whitespace, punctuation outside [_-].
pub fn validate_model_name(name: &str) -> Result<()> {
    static MODEL_NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = MODEL_NAME_RE.get_or_init(|| {
        regex::Regex::new(r"^[a-z0-9_-]{1,64}$").expect("model name pattern compiles")
    });

    if !re.is_match(name) {
        return Err(anyhow!("name '{}' must match ^[a-z0-9_-]{{1,64}}$", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_follow_allowlist() {
        assert!(validate_model_name("red").is_ok());
        assert!(validate_model_name("dark_brown-2").is_ok());
        assert!(validate_model_name("").is_err());
        assert!(validate_model_name("Red").is_err());
        assert!(validate_model_name("red green").is_err());
        assert!(validate_model_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn actuator_command_constructors() {
        assert_eq!(
            ActuatorCommand::active(3),
            ActuatorCommand {
                actuator: 3,
                active: true
            }
        );
        assert!(!ActuatorCommand::inactive(3).active);
    }
}
