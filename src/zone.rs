use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::ActuatorIndex;

/// Rectangular reactive region of the frame, half-open on both axes:
/// rows `row_min..row_max`, columns `col_min..col_max`.
///
/// Each zone drives exactly one actuator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionZone {
    pub row_min: u32,
    pub row_max: u32,
    pub col_min: u32,
    pub col_max: u32,
    pub actuator: ActuatorIndex,
}

impl DetectionZone {
    /// Build a zone and check it against the frame geometry.
    pub fn new(
        rows: (u32, u32),
        cols: (u32, u32),
        actuator: ActuatorIndex,
        frame_height: u32,
        frame_width: u32,
    ) -> Result<Self> {
        let zone = Self {
            row_min: rows.0,
            row_max: rows.1,
            col_min: cols.0,
            col_max: cols.1,
            actuator,
        };
        zone.validate(frame_height, frame_width)?;
        Ok(zone)
    }

    pub fn validate(&self, frame_height: u32, frame_width: u32) -> Result<()> {
        if self.row_min >= self.row_max || self.row_max > frame_height {
            return Err(anyhow!(
                "zone rows [{}, {}) must satisfy 0 <= min < max <= {}",
                self.row_min,
                self.row_max,
                frame_height
            ));
        }
        if self.col_min >= self.col_max || self.col_max > frame_width {
            return Err(anyhow!(
                "zone cols [{}, {}) must satisfy 0 <= min < max <= {}",
                self.col_min,
                self.col_max,
                frame_width
            ));
        }
        Ok(())
    }

    pub fn height(&self) -> u32 {
        self.row_max - self.row_min
    }

    pub fn width(&self) -> u32 {
        self.col_max - self.col_min
    }

    pub fn area(&self) -> usize {
        self.height() as usize * self.width() as usize
    }

    /// True when the absolute frame coordinate lies inside the zone.
    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.row_min..self.row_max).contains(&row) && (self.col_min..self.col_max).contains(&col)
    }
}
