//! Capability boundaries for the outside world.
//!
//! The decision core only ever hands these traits values it has already
//! computed. Physical writes, retries and shutdown defaults belong to the
//! implementations.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use crate::arbiter::ArbitrationResult;
use crate::classify::ClassificationResult;
use crate::pipeline::FrameReport;
use crate::zone::DetectionZone;
use crate::{ActuatorCommand, ActuatorIndex};

/// Digital output for jets.
pub trait ActuatorSink {
    /// Sink identifier for logs.
    fn name(&self) -> &'static str;

    /// Drive one actuator. Implementations may retry; callers do not.
    fn set_state(&mut self, actuator: ActuatorIndex, active: bool) -> Result<()>;

    /// Drive every actuator this sink knows to the inactive state.
    ///
    /// Called once after the run loop stops.
    fn shutdown(&mut self) -> Result<()>;

    /// Apply a batch of commands. A failed write is logged and the rest of the
    /// batch still goes out.
    fn apply(&mut self, commands: &[ActuatorCommand]) -> usize {
        let mut failures = 0;
        for cmd in commands {
            if let Err(e) = self.set_state(cmd.actuator, cmd.active) {
                log::error!(
                    "{}: write actuator {} -> {} failed: {}",
                    self.name(),
                    cmd.actuator,
                    cmd.active,
                    e
                );
                failures += 1;
            }
        }
        failures
    }
}

/// Receives per-frame diagnostics (overlay, logging, telemetry).
pub trait TelemetrySink {
    /// `loop_time` covers the whole tick: acquisition, evaluation and
    /// actuator writes.
    fn report(&mut self, sequence: u64, report: &FrameReport, loop_time: Duration);
}

// ----------------------------------------------------------------------------
// Logging implementations
// ----------------------------------------------------------------------------

/// Actuator sink that keeps line state in memory and logs transitions.
///
/// Stands in for a GPIO backend on development machines. Every known line
/// starts inactive.
pub struct LogActuatorSink {
    states: BTreeMap<ActuatorIndex, bool>,
    writes: u64,
}

impl LogActuatorSink {
    pub fn new(actuators: &[ActuatorIndex]) -> Self {
        Self {
            states: actuators.iter().map(|&a| (a, false)).collect(),
            writes: 0,
        }
    }

    pub fn state(&self, actuator: ActuatorIndex) -> Option<bool> {
        self.states.get(&actuator).copied()
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl ActuatorSink for LogActuatorSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn set_state(&mut self, actuator: ActuatorIndex, active: bool) -> Result<()> {
        self.writes += 1;
        let previous = self.states.insert(actuator, active).unwrap_or(false);
        if previous != active {
            log::info!(
                "jet {} -> {}",
                actuator,
                if active { "ACTIVE" } else { "inactive" }
            );
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        let actuators: Vec<_> = self.states.keys().copied().collect();
        for actuator in actuators {
            self.set_state(actuator, false)?;
        }
        log::info!("log actuator sink: all jets inactive");
        Ok(())
    }
}

/// Logs per-frame diagnostics at debug level.
#[derive(Default)]
pub struct LogTelemetrySink;

impl LogTelemetrySink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for LogTelemetrySink {
    fn report(&mut self, sequence: u64, report: &FrameReport, loop_time: Duration) {
        if report.missing {
            log::debug!(
                "frame #{}: missing, all jets inactive loop={}ms",
                sequence,
                loop_time.as_millis()
            );
            return;
        }
        for (i, zone) in report.zones.iter().enumerate() {
            let counts = zone
                .arbitration
                .counts
                .iter()
                .map(|c| format!("{}={}", c.name, c.count))
                .collect::<Vec<_>>()
                .join(" ");
            log::debug!(
                "frame #{} zone {}: total={} [{}] winner={} eval={}us loop={}ms",
                sequence,
                i,
                zone.arbitration.total,
                counts,
                zone.arbitration.winner_name().unwrap_or("none"),
                report.eval_time.as_micros(),
                loop_time.as_millis()
            );
        }
    }
}

#[derive(Serialize)]
struct TelemetryLine<'a> {
    sequence: u64,
    loop_us: u64,
    eval_us: u64,
    missing: bool,
    zones: Vec<TelemetryZone<'a>>,
    commands: &'a [ActuatorCommand],
}

#[derive(Serialize)]
struct TelemetryZone<'a> {
    zone: &'a DetectionZone,
    #[serde(skip_serializing_if = "Option::is_none")]
    classifications: Option<&'a [ClassificationResult]>,
    arbitration: &'a ArbitrationResult,
    command: &'a ActuatorCommand,
}

/// Writes one JSON object per frame, for external overlays and dashboards.
pub struct JsonLinesTelemetrySink<W: Write> {
    out: W,
    include_matches: bool,
}

impl<W: Write> JsonLinesTelemetrySink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            include_matches: false,
        }
    }

    /// Also emit every matching pixel coordinate (large).
    pub fn with_matches(mut self, enabled: bool) -> Self {
        self.include_matches = enabled;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(
        &mut self,
        sequence: u64,
        report: &FrameReport,
        loop_time: Duration,
    ) -> Result<()> {
        let line = TelemetryLine {
            sequence,
            loop_us: loop_time.as_micros() as u64,
            eval_us: report.eval_time.as_micros() as u64,
            missing: report.missing,
            zones: report
                .zones
                .iter()
                .map(|zone| TelemetryZone {
                    zone: &zone.zone,
                    classifications: self
                        .include_matches
                        .then_some(zone.classifications.as_slice()),
                    arbitration: &zone.arbitration,
                    command: &zone.command,
                })
                .collect(),
            commands: &report.commands,
        };
        serde_json::to_writer(&mut self.out, &line)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> TelemetrySink for JsonLinesTelemetrySink<W> {
    fn report(&mut self, sequence: u64, report: &FrameReport, loop_time: Duration) {
        if let Err(e) = self.write_line(sequence, report, loop_time) {
            log::warn!("telemetry write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::frame::HsvFrame;
    use crate::model::{ColorModel, HsvBounds};
    use crate::pipeline::ZoneReport;
    use crate::Hsv;

    struct FailingSink {
        attempts: usize,
    }

    impl ActuatorSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn set_state(&mut self, actuator: ActuatorIndex, _active: bool) -> Result<()> {
            self.attempts += 1;
            if actuator == 1 {
                anyhow::bail!("line busy");
            }
            Ok(())
        }

        fn shutdown(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn log_sink_tracks_state_and_shuts_down_safe() {
        let mut sink = LogActuatorSink::new(&[0, 2]);
        assert_eq!(sink.state(0), Some(false));
        assert_eq!(sink.state(2), Some(false));

        let failures = sink.apply(&[ActuatorCommand::inactive(0), ActuatorCommand::active(2)]);
        assert_eq!(failures, 0);
        assert_eq!(sink.state(2), Some(true));
        assert_eq!(sink.writes(), 2);

        sink.shutdown().unwrap();
        assert_eq!(sink.state(0), Some(false));
        assert_eq!(sink.state(2), Some(false));
    }

    #[test]
    fn apply_continues_after_failed_write() {
        let mut sink = FailingSink { attempts: 0 };
        let failures = sink.apply(&[
            ActuatorCommand::inactive(0),
            ActuatorCommand::active(1),
            ActuatorCommand::inactive(2),
        ]);
        assert_eq!(failures, 1);
        assert_eq!(sink.attempts, 3);
    }

    /// Zone rows 0..2, cols 0..2 with one red pixel at (1, 0).
    fn report_with_one_match() -> FrameReport {
        let zone = DetectionZone::new((0, 2), (0, 2), 0, 2, 2).unwrap();
        let red = ColorModel::new(
            "red",
            HsvBounds::new(Hsv::new(169, 90, 140), Hsv::new(199, 255, 255), false).unwrap(),
            [0, 0, 255],
            0,
        );
        let mut frame = HsvFrame::filled(2, 2, Hsv::new(0, 0, 0));
        frame.set_pixel(1, 0, Hsv::new(175, 150, 200));
        FrameReport {
            missing: false,
            zones: vec![ZoneReport {
                zone,
                classifications: vec![classify(&frame, &red, &zone)],
                arbitration: ArbitrationResult::none(),
                command: ActuatorCommand::inactive(0),
            }],
            commands: vec![ActuatorCommand::inactive(0)],
            eval_time: Duration::from_micros(40),
        }
    }

    fn json_line(sink: JsonLinesTelemetrySink<Vec<u8>>) -> serde_json::Value {
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 1);
        serde_json::from_str(out.trim()).unwrap()
    }

    #[test]
    fn json_lines_omit_matches_by_default() {
        let report = report_with_one_match();
        let mut sink = JsonLinesTelemetrySink::new(Vec::new());
        sink.report(7, &report, Duration::from_micros(1500));
        let value = json_line(sink);
        assert_eq!(value["sequence"], 7);
        assert_eq!(value["loop_us"], 1500);
        assert_eq!(value["eval_us"], 40);
        assert_eq!(value["missing"], false);
        assert!(value["zones"][0].get("classifications").is_none());
        assert_eq!(value["zones"][0]["zone"]["actuator"], 0);
        assert_eq!(value["commands"][0]["active"], false);
    }

    #[test]
    fn json_lines_include_zone_relative_matches() {
        let report = report_with_one_match();
        let mut sink = JsonLinesTelemetrySink::new(Vec::new()).with_matches(true);
        sink.report(1, &report, Duration::from_millis(2));
        let value = json_line(sink);
        assert_eq!(value["loop_us"], 2000);
        assert_eq!(
            value["zones"][0]["classifications"][0]["matches"],
            serde_json::json!([[1, 0]])
        );
    }
}
