//! Signal Gate Library
//!
//! Collects multi-source market telemetry for a symbol, decides locally
//! whether it warrants a downstream analysis, and records every cycle.

pub mod config;
pub mod cycle;
pub mod detector;
pub mod error;
pub mod history;
pub mod observability;
pub mod observation;
pub mod orchestrator;
pub mod runner;
pub mod sinks;

// Re-export main types for convenience
pub use config::{ConfigHandle, DetectionConfig, MarketPressureBounds, Settings};
pub use cycle::{
    commit_cycle, prepare_cycle, run_cycle, AnalysisOutcome, AnalysisStatus, AnalysisStep,
    CyclePhase, CycleReport, NoopAnalysis, PendingCycle, WebhookAnalysis,
};
pub use detector::{
    GateDecision, GateOutcome, SignalDetector, SignalKind, SignalStrength, TriggeredSignal,
};
pub use error::GateError;
pub use history::{PreviousCycleStore, PreviousView};
pub use observability::MetricsCollector;
pub use observation::{JoinedObservation, ObservationBuilder};
pub use orchestrator::Orchestrator;
pub use runner::GateRunner;
pub use sinks::{CycleSink, JournalSink, LogSink, WebhookAlertSink};
