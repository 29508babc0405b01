//! Zone classifier.
//!
//! `classify` walks only the rows and columns of one zone and tests each
//! pixel against one model. Cost is zone area, not frame area; pixels
//! outside the zone are never read.

use serde::Serialize;

use crate::frame::HsvFrame;
use crate::model::ColorModel;
use crate::zone::DetectionZone;
use crate::Hsv;

/// Matches for one (frame, model, zone). Immutable once built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    /// Zone-relative `(row, col)` of every matching pixel, row-major order.
    matches: Vec<(u32, u32)>,
}

impl ClassificationResult {
    pub fn count(&self) -> usize {
        self.matches.len()
    }

    pub fn matches(&self) -> &[(u32, u32)] {
        &self.matches
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Count pixels of `zone` whose HSV triple falls inside `model`'s bounds.
///
/// A zone that extends past the frame is clipped to it.
pub fn classify(
    frame: &HsvFrame,
    model: &ColorModel,
    zone: &DetectionZone,
) -> ClassificationResult {
    let row_end = zone.row_max.min(frame.height);
    let col_end = zone.col_max.min(frame.width);
    let mut matches = Vec::new();

    for row in zone.row_min..row_end {
        let line = frame.row(row);
        for col in zone.col_min..col_end {
            let i = col as usize * 3;
            let px = Hsv::new(line[i], line[i + 1], line[i + 2]);
            if model.matches(px) {
                matches.push((row - zone.row_min, col - zone.col_min));
            }
        }
    }

    ClassificationResult { matches }
}
