//! Color models.
//!
//! A `ColorModel` is a named, inclusive box in HSV space plus the routing
//! information (jet index) and a display color for overlays.
//!
//! Hue is circular. A band that straddles the top of the hue range (reds) is
//! expressed as a single model with `HueBand::Wrapped`, never as two models.
//! Wrapping must be requested explicitly; an inverted hue range without the
//! wrap flag is a configuration error.

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::{ActuatorIndex, Hsv};

/// Hue membership for a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HueBand {
    /// `lo <= h <= hi`
    Inclusive { lo: u8, hi: u8 },
    /// `h >= from || h <= to`, with `from > to`
    Wrapped { from: u8, to: u8 },
}

impl HueBand {
    pub fn contains(&self, h: u8) -> bool {
        match *self {
            HueBand::Inclusive { lo, hi } => lo <= h && h <= hi,
            HueBand::Wrapped { from, to } => h >= from || h <= to,
        }
    }

    /// Hue in the middle of the band, used by the synthetic source.
    pub fn center(&self) -> u8 {
        match *self {
            HueBand::Inclusive { lo, hi } => ((lo as u16 + hi as u16) / 2) as u8,
            HueBand::Wrapped { from, to } => {
                let span = (256 - from as u16) + to as u16;
                ((from as u16 + span / 2) % 256) as u8
            }
        }
    }
}

/// Inclusive HSV bounds. Saturation and value are plain `lo..=hi` ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HsvBounds {
    pub hue: HueBand,
    pub sat: (u8, u8),
    pub val: (u8, u8),
}

impl HsvBounds {
    /// Build bounds from lower/upper triples.
    ///
    /// `hue_wrap` must be set exactly when `lower.h > upper.h`.
    pub fn new(lower: Hsv, upper: Hsv, hue_wrap: bool) -> Result<Self> {
        let hue = match (hue_wrap, lower.h <= upper.h) {
            (false, true) => HueBand::Inclusive {
                lo: lower.h,
                hi: upper.h,
            },
            (true, false) => HueBand::Wrapped {
                from: lower.h,
                to: upper.h,
            },
            (false, false) => {
                return Err(anyhow!(
                    "lower hue {} exceeds upper hue {} (set hue_wrap for a wrapped band)",
                    lower.h,
                    upper.h
                ))
            }
            (true, true) => {
                return Err(anyhow!(
                    "hue_wrap requires lower hue > upper hue (got {} <= {})",
                    lower.h,
                    upper.h
                ))
            }
        };
        if lower.s > upper.s {
            return Err(anyhow!(
                "lower saturation {} exceeds upper saturation {}",
                lower.s,
                upper.s
            ));
        }
        if lower.v > upper.v {
            return Err(anyhow!(
                "lower value {} exceeds upper value {}",
                lower.v,
                upper.v
            ));
        }
        Ok(Self {
            hue,
            sat: (lower.s, upper.s),
            val: (lower.v, upper.v),
        })
    }

    /// Derive bounds from sampled pixels: per channel min/max widened by
    /// `padding`, saturating at 0 and 255. The result never wraps.
    pub fn from_samples(samples: &[Hsv], padding: u8) -> Result<Self> {
        let first = samples
            .first()
            .ok_or_else(|| anyhow!("at least one sample is required"))?;
        let mut lower = *first;
        let mut upper = *first;
        for sample in samples {
            lower.h = lower.h.min(sample.h);
            lower.s = lower.s.min(sample.s);
            lower.v = lower.v.min(sample.v);
            upper.h = upper.h.max(sample.h);
            upper.s = upper.s.max(sample.s);
            upper.v = upper.v.max(sample.v);
        }
        let lower = Hsv::new(
            lower.h.saturating_sub(padding),
            lower.s.saturating_sub(padding),
            lower.v.saturating_sub(padding),
        );
        let upper = Hsv::new(
            upper.h.saturating_add(padding),
            upper.s.saturating_add(padding),
            upper.v.saturating_add(padding),
        );
        Self::new(lower, upper, false)
    }

    #[inline]
    pub fn contains(&self, px: Hsv) -> bool {
        self.hue.contains(px.h)
            && self.sat.0 <= px.s
            && px.s <= self.sat.1
            && self.val.0 <= px.v
            && px.v <= self.val.1
    }

    pub fn lower(&self) -> Hsv {
        let h = match self.hue {
            HueBand::Inclusive { lo, .. } => lo,
            HueBand::Wrapped { from, .. } => from,
        };
        Hsv::new(h, self.sat.0, self.val.0)
    }

    pub fn upper(&self) -> Hsv {
        let h = match self.hue {
            HueBand::Inclusive { hi, .. } => hi,
            HueBand::Wrapped { to, .. } => to,
        };
        Hsv::new(h, self.sat.1, self.val.1)
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self.hue, HueBand::Wrapped { .. })
    }
}

/// A recognizable class of object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColorModel {
    pub name: String,
    pub bounds: HsvBounds,
    /// Overlay color, blue/green/red order.
    pub display_bgr: [u8; 3],
    /// Jet this class routes to.
    pub jet: ActuatorIndex,
}

impl ColorModel {
    pub fn new(name: &str, bounds: HsvBounds, display_bgr: [u8; 3], jet: ActuatorIndex) -> Self {
        Self {
            name: name.to_string(),
            bounds,
            display_bgr,
            jet,
        }
    }

    #[inline]
    pub fn matches(&self, px: Hsv) -> bool {
        self.bounds.contains(px)
    }
}
