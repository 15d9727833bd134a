//! Replayable session traces for the deterministic CLI harness.
//!
//! A trace is an ordered list of energy samples, pulses and server tempo
//! hints. Traces come from JSON files or from the synthetic generator, and
//! [`replay`] runs one through a fresh [`DetectionSession`] to produce a
//! [`SessionReport`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{log_trace_error, TraceError};
use crate::prediction::AccuracyRecord;
use crate::session::{DetectionSession, SessionSnapshot};
use crate::telemetry::{EngineEvent, TelemetryCollector};

pub mod synthetic;

pub use synthetic::SyntheticSpec;

/// Default location for trace JSON assets.
pub const DEFAULT_TRACE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// One timestamped input to a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    Energy { time: f64, rms: f64 },
    Pulse { time: f64 },
    BpmHint { time: f64, bpm: f64 },
}

impl TraceEvent {
    pub fn time(&self) -> f64 {
        match *self {
            TraceEvent::Energy { time, .. }
            | TraceEvent::Pulse { time }
            | TraceEvent::BpmHint { time, .. } => time,
        }
    }
}

/// Ordered session input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTrace {
    pub id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub events: Vec<TraceEvent>,
}

/// Where a trace comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceSource {
    File { path: PathBuf },
    Synthetic(SyntheticSpec),
}

impl TraceSource {
    pub fn build(&self) -> Result<SessionTrace, TraceError> {
        match self {
            TraceSource::File { path } => SessionTrace::load(path),
            TraceSource::Synthetic(spec) => spec.generate("synthetic"),
        }
    }
}

impl SessionTrace {
    /// Read and validate a JSON trace
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TraceError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|err| TraceError::ReadFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let trace = Self::from_json(&json).map_err(|err| {
            log_trace_error(&err, "SessionTrace::load");
            err
        })?;
        log::info!(
            "[Trace] Loaded '{}' ({} events) from {}",
            trace.id,
            trace.events.len(),
            path.display()
        );
        Ok(trace)
    }

    pub fn from_json(json: &str) -> Result<Self, TraceError> {
        let trace: SessionTrace = serde_json::from_str(json)?;
        trace.validate()?;
        Ok(trace)
    }

    pub fn to_json(&self) -> Result<String, TraceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Times must be finite and non-decreasing, energy values finite
    pub fn validate(&self) -> Result<(), TraceError> {
        let mut previous = f64::NEG_INFINITY;
        for (index, event) in self.events.iter().enumerate() {
            let time = event.time();
            if !time.is_finite() {
                return Err(TraceError::InvalidTrace {
                    reason: format!("event {index} has a non-finite time"),
                });
            }
            if time < previous {
                return Err(TraceError::InvalidTrace {
                    reason: format!("event {index} at {time} precedes {previous}"),
                });
            }
            if let TraceEvent::Energy { rms, .. } = event {
                if !rms.is_finite() {
                    return Err(TraceError::InvalidTrace {
                        reason: format!("event {index} has a non-finite rms"),
                    });
                }
            }
            previous = time;
        }
        Ok(())
    }

    pub fn duration(&self) -> f64 {
        self.events.last().map(TraceEvent::time).unwrap_or(0.0)
    }
}

/// Summary of a replayed trace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionReport {
    pub trace: String,
    pub duration_secs: f64,
    pub energy_samples: usize,
    pub pulses: usize,
    pub bpm_hints: usize,
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub accuracy: Vec<AccuracyRecord>,
    pub tempo_changes: usize,
    pub level_changes: usize,
    pub telemetry_events: u64,
}

impl SessionReport {
    /// Whether the mean accuracy reaches `threshold`
    ///
    /// A trace with no scored phrase never passes.
    pub fn meets_accuracy(&self, threshold: f64) -> bool {
        self.session
            .mean_accuracy
            .map(|mean| mean >= threshold)
            .unwrap_or(false)
    }
}

/// Run `trace` through a fresh session built from `config`
pub fn replay(trace: &SessionTrace, config: EngineConfig) -> Result<SessionReport> {
    trace.validate().context("validating trace")?;
    let telemetry = Arc::new(TelemetryCollector::new(
        config.session.telemetry_history,
        config.session.telemetry_history,
    ));
    let mut session = DetectionSession::try_new(config)
        .context("building detection session")?
        .with_telemetry(Arc::clone(&telemetry));

    let (mut energy_samples, mut pulses, mut bpm_hints) = (0, 0, 0);
    for event in &trace.events {
        match *event {
            TraceEvent::Energy { time, rms } => {
                energy_samples += 1;
                session.process_energy_sample(time, rms);
            }
            TraceEvent::Pulse { time } => {
                pulses += 1;
                session.process_pulse(time);
            }
            TraceEvent::BpmHint { bpm, .. } => {
                bpm_hints += 1;
                session.set_server_bpm_hint(bpm);
            }
        }
    }

    let report = SessionReport {
        trace: trace.id.clone(),
        duration_secs: trace.duration(),
        energy_samples,
        pulses,
        bpm_hints,
        session: session.snapshot(),
        accuracy: session.accuracy_history(),
        tempo_changes: telemetry
            .count_matching(|e| matches!(e, EngineEvent::TempoChange { .. })),
        level_changes: telemetry
            .count_matching(|e| matches!(e, EngineEvent::EnergyLevelChanged { .. })),
        telemetry_events: telemetry.snapshot().total_events,
    };
    log::info!(
        "[Replay] '{}': {} pulses, {} phrases, mean accuracy {:?}",
        report.trace,
        report.pulses,
        report.session.phrases_completed,
        report.session.mean_accuracy
    );
    Ok(report)
}

/// Resolve a trace argument as a path or a name under `root`
pub fn resolve_trace_path(root: &Path, trace: &str) -> PathBuf {
    let as_path = Path::new(trace);
    if as_path.exists() {
        return as_path.to_path_buf();
    }
    root.join(format!("{trace}.json"))
}
