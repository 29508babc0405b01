//! Pull loop.
//!
//! One tick = pull a frame, evaluate it, write one command per actuator,
//! report diagnostics, sleep out the rest of the frame period. Each tick runs
//! to completion before the next frame is pulled.
//!
//! Stopping is checked before each pull and again before any write, so once
//! `stop` is observed no further commands leave the runner. Forcing the
//! final safe state is the actuator sink's `shutdown`, called by the owner.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::ingest::FrameSource;
use crate::pipeline::{FrameReport, SortingEngine};
use crate::sink::{ActuatorSink, TelemetrySink};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Counters for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Ticks that produced commands (frames + missed).
    pub ticks: u64,
    pub frames: u64,
    pub missed: u64,
    /// Ticks where at least one zone detected a part.
    pub detections: u64,
    pub write_failures: u64,
}

#[derive(Clone, Debug)]
pub struct Runner {
    period: Duration,
    max_ticks: Option<u64>,
}

impl Runner {
    /// Runner paced to `target_fps`.
    pub fn new(target_fps: u32) -> Result<Self> {
        if target_fps == 0 {
            return Err(anyhow!("target_fps must be >= 1"));
        }
        Ok(Self {
            period: Duration::from_secs(1) / target_fps,
            max_ticks: None,
        })
    }

    /// Runner that never sleeps between ticks.
    pub fn unpaced() -> Self {
        Self {
            period: Duration::ZERO,
            max_ticks: None,
        }
    }

    /// Stop after this many ticks.
    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Pull one frame and decide. Acquisition and geometry failures become a
    /// missing-frame report. `None` means the source has ended.
    pub fn tick(
        &self,
        source: &mut dyn FrameSource,
        engine: &SortingEngine,
    ) -> Option<FrameReport> {
        match source.next_frame() {
            Ok(Some(frame)) => match engine.evaluate(&frame) {
                Ok(report) => Some(report),
                Err(e) => {
                    log::warn!("frame rejected: {}", e);
                    Some(engine.missing_frame())
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("frame missing: {}", e);
                Some(engine.missing_frame())
            }
        }
    }

    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        engine: &SortingEngine,
        actuators: &mut dyn ActuatorSink,
        telemetry: &mut dyn TelemetrySink,
        stop: &AtomicBool,
    ) -> Result<RunStats> {
        let mut stats = RunStats::default();

        // Safe state before the first frame.
        stats.write_failures += actuators.apply(&engine.safe_commands()) as u64;

        let mut last_health_log = Instant::now();
        loop {
            if stop.load(Ordering::SeqCst) {
                log::info!("stop requested after {} ticks", stats.ticks);
                break;
            }
            if self.max_ticks.is_some_and(|max| stats.ticks >= max) {
                log::info!("tick limit {} reached", stats.ticks);
                break;
            }

            let tick_start = Instant::now();
            let Some(report) = self.tick(source, engine) else {
                log::info!("source {} ended", source.stats().url);
                break;
            };

            // The pull may have blocked; honour a stop that arrived meanwhile.
            if stop.load(Ordering::SeqCst) {
                log::info!("stop requested after {} ticks", stats.ticks);
                break;
            }

            stats.ticks += 1;
            if report.missing {
                stats.missed += 1;
            } else {
                stats.frames += 1;
            }
            if report.detected() {
                stats.detections += 1;
            }

            stats.write_failures += actuators.apply(&report.commands) as u64;
            telemetry.report(stats.ticks, &report, tick_start.elapsed());

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let source_stats = source.stats();
                if !source.is_healthy() {
                    log::warn!("source {} reports unhealthy", source_stats.url);
                }
                log::info!(
                    "source health={} captured={} failed={} ticks={} missed={} detections={} url={}",
                    source.is_healthy(),
                    source_stats.frames_captured,
                    source_stats.frames_failed,
                    stats.ticks,
                    stats.missed,
                    stats.detections,
                    source_stats.url
                );
                last_health_log = Instant::now();
            }

            let elapsed = tick_start.elapsed();
            if elapsed < self.period {
                std::thread::sleep(self.period - elapsed);
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::HsvFrame;
    use crate::ingest::SourceStats;
    use crate::model::{ColorModel, HsvBounds};
    use crate::registry::ModelRegistry;
    use crate::sink::LogTelemetrySink;
    use crate::zone::DetectionZone;
    use crate::{ActuatorIndex, Hsv};

    /// Scripted source: `Some(n)` = frame with n red pixels in the zone,
    /// `None` = failed capture.
    struct ScriptedSource {
        script: Vec<Option<u32>>,
        cursor: usize,
    }

    impl FrameSource for ScriptedSource {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<HsvFrame>> {
            let Some(step) = self.script.get(self.cursor).copied() else {
                return Ok(None);
            };
            self.cursor += 1;
            let Some(red) = step else {
                anyhow::bail!("camera timeout");
            };
            let mut frame = HsvFrame::filled(20, 10, Hsv::new(0, 0, 0));
            for i in 0..red {
                frame.set_pixel(i / 20, i % 20, Hsv::new(175, 150, 200));
            }
            Ok(Some(frame))
        }

        fn is_healthy(&self) -> bool {
            true
        }

        fn stats(&self) -> SourceStats {
            SourceStats {
                url: "script://".to_string(),
                ..SourceStats::default()
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        writes: Vec<Vec<(ActuatorIndex, bool)>>,
        pending: Vec<(ActuatorIndex, bool)>,
    }

    impl ActuatorSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn set_state(&mut self, actuator: ActuatorIndex, active: bool) -> Result<()> {
            self.pending.push((actuator, active));
            Ok(())
        }

        fn shutdown(&mut self) -> Result<()> {
            Ok(())
        }

        fn apply(&mut self, commands: &[crate::ActuatorCommand]) -> usize {
            for cmd in commands {
                let _ = self.set_state(cmd.actuator, cmd.active);
            }
            self.writes.push(std::mem::take(&mut self.pending));
            0
        }
    }

    fn engine() -> SortingEngine {
        let red = ColorModel::new(
            "red",
            HsvBounds::new(Hsv::new(169, 90, 140), Hsv::new(199, 255, 255), false).unwrap(),
            [0, 0, 255],
            1,
        );
        let zone = DetectionZone::new((0, 10), (0, 20), 0, 10, 20).unwrap();
        SortingEngine::new(ModelRegistry::from_models(vec![red]).unwrap(), vec![zone], 50, 20, 10)
            .unwrap()
    }

    #[test]
    fn safe_state_first_then_one_command_per_actuator() {
        let engine = engine();
        let mut source = ScriptedSource {
            script: vec![Some(60), Some(40), None, Some(60)],
            cursor: 0,
        };
        let mut sink = RecordingSink::default();
        let stop = AtomicBool::new(false);
        let stats = Runner::unpaced()
            .run(&mut source, &engine, &mut sink, &mut LogTelemetrySink::new(), &stop)
            .unwrap();

        assert_eq!(
            stats,
            RunStats {
                ticks: 4,
                frames: 3,
                missed: 1,
                detections: 2,
                write_failures: 0,
            }
        );
        assert_eq!(
            sink.writes,
            vec![
                vec![(0, false), (1, false)],
                vec![(0, false), (1, true)],
                vec![(0, false), (1, false)],
                vec![(0, false), (1, false)],
                vec![(0, false), (1, true)],
            ]
        );
    }

    #[test]
    fn stop_prevents_further_commands() {
        let engine = engine();
        let mut source = ScriptedSource {
            script: vec![Some(60); 10],
            cursor: 0,
        };
        let mut sink = RecordingSink::default();
        let stop = AtomicBool::new(true);
        let stats = Runner::unpaced()
            .run(&mut source, &engine, &mut sink, &mut LogTelemetrySink::new(), &stop)
            .unwrap();
        assert_eq!(stats.ticks, 0);
        // Only the initial safe state went out.
        assert_eq!(sink.writes, vec![vec![(0, false), (1, false)]]);
    }

    #[test]
    fn tick_limit_bounds_the_run() {
        let engine = engine();
        let mut source = ScriptedSource {
            script: vec![Some(0); 10],
            cursor: 0,
        };
        let mut sink = RecordingSink::default();
        let stop = AtomicBool::new(false);
        let stats = Runner::unpaced()
            .with_max_ticks(Some(3))
            .run(&mut source, &engine, &mut sink, &mut LogTelemetrySink::new(), &stop)
            .unwrap();
        assert_eq!(stats.ticks, 3);
        assert_eq!(source.cursor, 3);
    }

    /// Frames with no parts; sleeps before each one and raises `stop` on
    /// the given pull.
    struct SlowSource<'a> {
        delay: Duration,
        stop: &'a AtomicBool,
        stop_on_pull: Option<usize>,
        pulls: usize,
    }

    impl FrameSource for SlowSource<'_> {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<HsvFrame>> {
            self.pulls += 1;
            std::thread::sleep(self.delay);
            if self.stop_on_pull == Some(self.pulls) {
                self.stop.store(true, Ordering::SeqCst);
            }
            Ok(Some(HsvFrame::filled(20, 10, Hsv::new(0, 0, 0))))
        }

        fn is_healthy(&self) -> bool {
            true
        }

        fn stats(&self) -> SourceStats {
            SourceStats::default()
        }
    }

    #[derive(Default)]
    struct LoopTimes(Vec<Duration>);

    impl TelemetrySink for LoopTimes {
        fn report(&mut self, _sequence: u64, _report: &FrameReport, loop_time: Duration) {
            self.0.push(loop_time);
        }
    }

    #[test]
    fn loop_time_covers_acquisition() {
        let engine = engine();
        let stop = AtomicBool::new(false);
        let mut source = SlowSource {
            delay: Duration::from_millis(30),
            stop: &stop,
            stop_on_pull: None,
            pulls: 0,
        };
        let mut telemetry = LoopTimes::default();
        Runner::new(10)
            .unwrap()
            .with_max_ticks(Some(2))
            .run(
                &mut source,
                &engine,
                &mut RecordingSink::default(),
                &mut telemetry,
                &stop,
            )
            .unwrap();
        assert_eq!(telemetry.0.len(), 2);
        for loop_time in &telemetry.0 {
            assert!(*loop_time >= Duration::from_millis(30), "{:?}", loop_time);
        }
    }

    #[test]
    fn stop_during_pull_drops_that_tick() {
        let engine = engine();
        let stop = AtomicBool::new(false);
        let mut source = SlowSource {
            delay: Duration::ZERO,
            stop: &stop,
            stop_on_pull: Some(2),
            pulls: 0,
        };
        let mut sink = RecordingSink::default();
        let mut telemetry = LoopTimes::default();
        let stats = Runner::unpaced()
            .run(&mut source, &engine, &mut sink, &mut telemetry, &stop)
            .unwrap();

        assert_eq!(stats.ticks, 1);
        assert_eq!(source.pulls, 2);
        // Safe state, then the one completed tick; nothing for the second pull.
        assert_eq!(
            sink.writes,
            vec![vec![(0, false), (1, false)], vec![(0, false), (1, false)]]
        );
        assert_eq!(telemetry.0.len(), 1);
    }

    #[test]
    fn paced_runner_period() {
        assert_eq!(Runner::new(10).unwrap().period(), Duration::from_millis(100));
        assert!(Runner::new(0).is_err());
    }
}
