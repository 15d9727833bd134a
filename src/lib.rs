// Rhythm Engine - tempo, energy and phrase prediction core
// Single-threaded detection session fed by energy samples and pulses

// Module declarations
pub mod analysis;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod prediction;
pub mod remote;
pub mod session;
pub mod telemetry;

// Re-exports for convenience
pub use config::EngineConfig;
pub use prediction::{AccuracyRecord, PhrasePattern, Prediction, RhythmPredictor};
pub use session::{DetectionSession, SessionSnapshot};

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honoring `RUST_LOG` (default `info`)
///
/// Safe to call more than once; later calls are no-ops. `log` records from
/// library code are picked up through tracing's log bridge.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
