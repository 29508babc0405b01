//! Zone arbiter: winner-take-all across models for one zone.
//!
//! The zone total is the sum of every model's count. Below the detection
//! threshold there is no detection, whatever the distribution. At or above
//! it, the model with the strictly greatest count wins; among equal maxima
//! the one earliest in registry order wins. Callers must pass results in
//! registry order.

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::classify::ClassificationResult;
use crate::model::ColorModel;
use crate::ActuatorIndex;

/// Per-model count, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelCount {
    pub name: String,
    pub count: usize,
}

/// The selected model for a zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Winner {
    pub name: String,
    pub jet: ActuatorIndex,
    pub count: usize,
    /// Position in registry order.
    pub position: usize,
}

/// Decision for one zone on one frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArbitrationResult {
    pub total: usize,
    pub counts: Vec<ModelCount>,
    pub winner: Option<Winner>,
    pub detected: bool,
}

impl ArbitrationResult {
    /// Result for a tick with nothing to classify.
    pub fn none() -> Self {
        Self {
            total: 0,
            counts: Vec::new(),
            winner: None,
            detected: false,
        }
    }

    pub fn winner_name(&self) -> Option<&str> {
        self.winner.as_ref().map(|w| w.name.as_str())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Arbiter {
    threshold: usize,
}

impl Arbiter {
    /// `threshold` is the minimum zone total that counts as a detection.
    pub fn new(threshold: usize) -> Result<Self> {
        if threshold == 0 {
            return Err(anyhow!("detection threshold must be at least 1"));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn arbitrate(&self, results: &[(&ColorModel, &ClassificationResult)]) -> ArbitrationResult {
        let counts: Vec<ModelCount> = results
            .iter()
            .map(|(model, result)| ModelCount {
                name: model.name.clone(),
                count: result.count(),
            })
            .collect();
        let total = counts.iter().map(|c| c.count).sum::<usize>();

        if total < self.threshold {
            return ArbitrationResult {
                total,
                counts,
                winner: None,
                detected: false,
            };
        }

        // Running maximum; strict comparison keeps the first of any tie.
        let mut best: Option<(usize, &ColorModel, usize)> = None;
        for (position, &(model, result)) in results.iter().enumerate() {
            let count = result.count();
            if best.map_or(true, |(_, _, best_count)| count > best_count) {
                best = Some((position, model, count));
            }
        }

        let winner = best.map(|(position, model, count)| Winner {
            name: model.name.clone(),
            jet: model.jet,
            count,
            position,
        });
        ArbitrationResult {
            total,
            counts,
            detected: winner.is_some(),
            winner,
        }
    }
}
