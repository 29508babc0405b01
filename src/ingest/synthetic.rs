//! Synthetic belt source.
//!
//! Simulates a dark belt with parts sliding down a lane:
//! - Each part is a solid block of one HSV color
//! - A new part enters every `period_frames` frames
//! - Part colors cycle through `part_colors`
//!
//! Optionally fails every Nth capture to exercise missing-frame handling.

use anyhow::{anyhow, Result};

use super::{FrameSource, SourceStats};
use crate::frame::HsvFrame;
use crate::Hsv;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub background: Hsv,
    /// Column range the parts travel down.
    pub lane: (u32, u32),
    /// Height of each part in rows.
    pub part_rows: u32,
    /// Frames between part entries. Parts travel the full frame height in this time.
    pub period_frames: u64,
    pub part_colors: Vec<Hsv>,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Report a failed capture on every Nth frame.
    pub fail_every: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://belt".to_string(),
            width: 160,
            height: 96,
            background: Hsv::new(0, 0, 16),
            lane: (96, 121),
            part_rows: 8,
            period_frames: 24,
            part_colors: vec![Hsv::new(175, 150, 200)],
            max_frames: None,
            fail_every: None,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    failures: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic source needs a non-empty frame"));
        }
        if config.period_frames == 0 {
            return Err(anyhow!("period_frames must be at least 1"));
        }
        Ok(Self {
            config,
            frame_count: 0,
            failures: 0,
            connected: false,
        })
    }

    /// Row span occupied by the current part, clipped to the frame.
    fn part_rows(&self, tick: u64) -> (u32, u32) {
        let phase = tick % self.config.period_frames;
        let travel = self.config.height as u64 + self.config.part_rows as u64;
        let top =
            (phase * travel / self.config.period_frames) as i64 - self.config.part_rows as i64;
        let start = top.max(0) as u32;
        let end = (top + self.config.part_rows as i64).clamp(0, self.config.height as i64) as u32;
        (start.min(end), end)
    }

    fn generate(&self, tick: u64) -> HsvFrame {
        let mut frame =
            HsvFrame::filled(self.config.width, self.config.height, self.config.background);
        if self.config.part_colors.is_empty() {
            return frame;
        }
        let part = tick / self.config.period_frames;
        let color = self.config.part_colors[(part % self.config.part_colors.len() as u64) as usize];
        let (row_start, row_end) = self.part_rows(tick);
        let col_end = self.config.lane.1.min(self.config.width);
        for row in row_start..row_end {
            for col in self.config.lane.0.min(col_end)..col_end {
                frame.set_pixel(row, col, color);
            }
        }
        frame
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("SyntheticSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<HsvFrame>> {
        if !self.connected {
            return Err(anyhow!("synthetic source {} not connected", self.config.url));
        }
        if self
            .config
            .max_frames
            .is_some_and(|max| self.frame_count + self.failures >= max)
        {
            return Ok(None);
        }
        let tick = self.frame_count + self.failures;
        if let Some(n) = self.config.fail_every {
            if n > 0 && (tick + 1) % n == 0 {
                self.failures += 1;
                return Err(anyhow!("synthetic capture failure at tick {}", tick));
            }
        }
        self.frame_count += 1;
        Ok(Some(self.generate(tick)))
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_failed: self.failures,
            url: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(config: SyntheticConfig) -> SyntheticSource {
        let mut source = SyntheticSource::new(config).unwrap();
        source.connect().unwrap();
        source
    }

    #[test]
    fn part_crosses_the_lane() {
        let mut source = source(SyntheticConfig {
            max_frames: Some(24),
            ..SyntheticConfig::default()
        });
        let red = Hsv::new(175, 150, 200);
        let mut seen_in_lane = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            // Never paints outside the lane.
            assert_eq!(frame.pixel(50, 10), Hsv::new(0, 0, 16));
            if (0..96).any(|r| frame.pixel(r, 100) == red) {
                seen_in_lane += 1;
            }
        }
        assert!(seen_in_lane > 10, "part visible in {} frames", seen_in_lane);
        assert_eq!(source.stats().frames_captured, 24);
    }

    #[test]
    fn colors_cycle_per_part() {
        let colors = vec![Hsv::new(10, 50, 40), Hsv::new(20, 150, 200)];
        let mut source = source(SyntheticConfig {
            period_frames: 4,
            part_colors: colors.clone(),
            ..SyntheticConfig::default()
        });
        let mut first_part = Vec::new();
        let mut second_part = Vec::new();
        for tick in 0..8 {
            let frame = source.next_frame().unwrap().unwrap();
            let painted: Vec<Hsv> = (0..96)
                .map(|r| frame.pixel(r, 100))
                .filter(|px| *px != Hsv::new(0, 0, 16))
                .collect();
            if tick < 4 {
                first_part.extend(painted);
            } else {
                second_part.extend(painted);
            }
        }
        assert!(first_part.iter().all(|px| *px == colors[0]));
        assert!(second_part.iter().all(|px| *px == colors[1]));
        assert!(!first_part.is_empty() && !second_part.is_empty());
    }

    #[test]
    fn injected_failures_are_errors() {
        let mut source = source(SyntheticConfig {
            fail_every: Some(3),
            max_frames: Some(6),
            ..SyntheticConfig::default()
        });
        let outcomes: Vec<bool> = std::iter::from_fn(|| match source.next_frame() {
            Ok(Some(_)) => Some(true),
            Ok(None) => None,
            Err(_) => Some(false),
        })
        .collect();
        assert_eq!(outcomes, vec![true, true, false, true, true, false]);
        assert_eq!(source.stats().frames_failed, 2);
        assert_eq!(source.stats().frames_captured, 4);
    }

    #[test]
    fn requires_connect() {
        let mut source = SyntheticSource::new(SyntheticConfig::default()).unwrap();
        assert!(source.next_frame().is_err());
        assert!(!source.is_healthy());
    }
}
