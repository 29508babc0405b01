//! Sorting engine: one frame through every zone.
//!
//! For each zone, every model is classified (registry order), the arbiter
//! picks a winner and the mapper produces a command. Zones share nothing
//! mutable, so their evaluation order does not affect the outcome. The
//! engine returns everything it decided as a `FrameReport`; it performs no
//! I/O itself.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::actuation::ActuationMapper;
use crate::arbiter::{ArbitrationResult, Arbiter};
use crate::classify::{classify, ClassificationResult};
use crate::frame::HsvFrame;
use crate::registry::ModelRegistry;
use crate::zone::DetectionZone;
use crate::ActuatorCommand;

/// Decision and diagnostics for one zone.
#[derive(Clone, Debug, Serialize)]
pub struct ZoneReport {
    pub zone: DetectionZone,
    /// One result per model, registry order.
    pub classifications: Vec<ClassificationResult>,
    pub arbitration: ArbitrationResult,
    pub command: ActuatorCommand,
}

/// Everything decided for one tick.
#[derive(Clone, Debug, Serialize)]
pub struct FrameReport {
    /// True when no frame was available and the safe state was emitted.
    pub missing: bool,
    pub zones: Vec<ZoneReport>,
    /// Exactly one command per known actuator, ascending index.
    pub commands: Vec<ActuatorCommand>,
    /// Time spent classifying and arbitrating this frame.
    #[serde(skip)]
    pub eval_time: Duration,
}

impl FrameReport {
    pub fn detected(&self) -> bool {
        self.zones.iter().any(|z| z.arbitration.detected)
    }
}

pub struct SortingEngine {
    registry: ModelRegistry,
    zones: Vec<DetectionZone>,
    arbiter: Arbiter,
    mapper: ActuationMapper,
    frame_width: u32,
    frame_height: u32,
}

impl SortingEngine {
    pub fn new(
        registry: ModelRegistry,
        zones: Vec<DetectionZone>,
        threshold: usize,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Self> {
        if zones.is_empty() {
            return Err(anyhow!("at least one detection zone is required"));
        }
        for (i, zone) in zones.iter().enumerate() {
            zone.validate(frame_height, frame_width)
                .map_err(|e| anyhow!("zone {}: {}", i, e))?;
        }
        let arbiter = Arbiter::new(threshold)?;
        let mapper = ActuationMapper::new(
            zones
                .iter()
                .map(|z| z.actuator)
                .chain(registry.jets()),
        );
        Ok(Self {
            registry,
            zones,
            arbiter,
            mapper,
            frame_width,
            frame_height,
        })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn zones(&self) -> &[DetectionZone] {
        &self.zones
    }

    pub fn threshold(&self) -> usize {
        self.arbiter.threshold()
    }

    /// Every actuator index the engine may command.
    pub fn actuators(&self) -> &[crate::ActuatorIndex] {
        self.mapper.actuators()
    }

    /// Classify, arbitrate and map one zone.
    pub fn evaluate_zone(&self, frame: &HsvFrame, zone: &DetectionZone) -> ZoneReport {
        let classifications: Vec<ClassificationResult> = self
            .registry
            .models()
            .iter()
            .map(|model| classify(frame, model, zone))
            .collect();
        let pairs: Vec<_> = self
            .registry
            .models()
            .iter()
            .zip(classifications.iter())
            .collect();
        let arbitration = self.arbiter.arbitrate(&pairs);
        let command = self.mapper.map(zone, &arbitration);
        ZoneReport {
            zone: *zone,
            classifications,
            arbitration,
            command,
        }
    }

    /// Evaluate one frame. A frame whose geometry differs from the
    /// configured one is rejected; callers treat that as a missing frame.
    pub fn evaluate(&self, frame: &HsvFrame) -> Result<FrameReport> {
        if frame.width != self.frame_width || frame.height != self.frame_height {
            return Err(anyhow!(
                "frame is {}x{}, expected {}x{}",
                frame.width,
                frame.height,
                self.frame_width,
                self.frame_height
            ));
        }
        let start = Instant::now();
        let zones: Vec<ZoneReport> = self
            .zones
            .iter()
            .map(|zone| self.evaluate_zone(frame, zone))
            .collect();
        let zone_commands: Vec<ActuatorCommand> = zones.iter().map(|z| z.command).collect();
        Ok(FrameReport {
            missing: false,
            commands: self.mapper.fan_out(&zone_commands),
            zones,
            eval_time: start.elapsed(),
        })
    }

    /// Report for a tick without a usable frame: every actuator inactive.
    pub fn missing_frame(&self) -> FrameReport {
        FrameReport {
            missing: true,
            zones: self
                .zones
                .iter()
                .map(|zone| ZoneReport {
                    zone: *zone,
                    classifications: Vec::new(),
                    arbitration: ArbitrationResult::none(),
                    command: ActuatorCommand::inactive(zone.actuator),
                })
                .collect(),
            commands: self.mapper.all_inactive(),
            eval_time: Duration::ZERO,
        }
    }

    /// Safe state for every actuator, used before the first frame.
    pub fn safe_commands(&self) -> Vec<ActuatorCommand> {
        self.mapper.all_inactive()
    }
}
