//! Actuation mapper.
//!
//! Purely reactive: detection drives the winner's jet active, no detection
//! drives the zone's actuator inactive. There is no memory between frames,
//! so counts hovering around the threshold can toggle a jet every frame.

use crate::arbiter::ArbitrationResult;
use crate::zone::DetectionZone;
use crate::{ActuatorCommand, ActuatorIndex};

/// Translates per-zone decisions into actuator commands.
///
/// Knows every actuator index in use so it can emit exactly one command per
/// actuator per frame.
#[derive(Clone, Debug)]
pub struct ActuationMapper {
    actuators: Vec<ActuatorIndex>,
}

impl ActuationMapper {
    pub fn new(actuators: impl IntoIterator<Item = ActuatorIndex>) -> Self {
        let mut actuators: Vec<_> = actuators.into_iter().collect();
        actuators.sort_unstable();
        actuators.dedup();
        Self { actuators }
    }

    /// Every actuator this mapper may address, ascending.
    pub fn actuators(&self) -> &[ActuatorIndex] {
        &self.actuators
    }

    /// Command for one zone's decision.
    pub fn map(&self, zone: &DetectionZone, result: &ArbitrationResult) -> ActuatorCommand {
        match (&result.winner, result.detected) {
            (Some(winner), true) => ActuatorCommand::active(winner.jet),
            _ => ActuatorCommand::inactive(zone.actuator),
        }
    }

    /// Merge zone commands into one command per known actuator. An actuator
    /// is active when any zone activated it this frame.
    pub fn fan_out(&self, commands: &[ActuatorCommand]) -> Vec<ActuatorCommand> {
        self.actuators
            .iter()
            .map(|&actuator| ActuatorCommand {
                actuator,
                active: commands
                    .iter()
                    .any(|cmd| cmd.actuator == actuator && cmd.active),
            })
            .collect()
    }

    /// Safe state for every known actuator.
    pub fn all_inactive(&self) -> Vec<ActuatorCommand> {
        self.actuators
            .iter()
            .map(|&actuator| ActuatorCommand::inactive(actuator))
            .collect()
    }
}
