//! Download orchestrator.
//!
//! Drives a URL through classification, extraction and storage:
//! - **Lookup**: cached entries are returned without touching the network
//! - **Single-flight**: one download per normalized URL, concurrent callers wait
//! - **Storage**: the finished file is moved into the cache on a blocking thread

mod runner;
mod types;

pub use runner::DownloadOrchestrator;
pub use types::{FetchError, FetchOutcome, OrchestratorStatus};
