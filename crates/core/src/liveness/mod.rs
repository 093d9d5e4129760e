//! Client heartbeat watchdog and shutdown coordination.
//!
//! The player page pings the server periodically. When the pings stop for
//! longer than the grace period, or the client asks explicitly, the monitor
//! moves to `shutting_down` and the server drains and exits.

mod monitor;
mod types;

pub use monitor::LivenessMonitor;
pub use types::{LivenessState, LivenessStatus, ShutdownReason};
