//! The measurement pipeline: performance sampling around controlled page loads, network tracking
//! over a fixed window, and the multi-page orchestrator that scores and aggregates both.

mod collector;
mod orchestrator;
mod sampler;
mod tracker;

pub use collector::{BASELINE_URL, IDLE_PROBE_TAG, MIN_RELIABLE_DURATION_MS, MetricsCollector};
pub use orchestrator::{ImpactOrchestrator, ImpactRun, ProgressCallback, RunProgress};
pub use sampler::{SampleMark, Sampler, WEB_VITALS_TAG};
pub use tracker::NetworkTracker;
