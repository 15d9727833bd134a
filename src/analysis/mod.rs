// Analysis module - signal-level detectors feeding the rhythm predictor
//
// - TempoEstimator: pulse intervals → fast + hyper-smoothed BPM
// - EnergyClassifier: RMS stream → 5 ordinal energy levels + pulse threshold
// - SustainDetector: post-pulse energy rise → held duration in 32nds
// - LevelCrossingDetector: RMS stream → pulses on threshold crossings

pub mod energy;
pub mod level_crossing;
pub mod sustain;
pub mod tempo;

pub use energy::{EnergyClassifier, EnergyLevel, EnergyUpdate, LEVEL_COUNT, UNKNOWN_LEVEL};
pub use level_crossing::{LevelCrossingDetector, PulseCrossing};
pub use sustain::{EnergySustainDetector, SustainDetector, SustainedBeat};
pub use tempo::{TempoEstimate, TempoEstimator, TempoStats};
