use serde::{Deserialize, Serialize};

/// Lifecycle of the server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessState {
    Active,
    ShuttingDown,
    Stopped,
}

impl LivenessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LivenessState::Active => "active",
            LivenessState::ShuttingDown => "shutting_down",
            LivenessState::Stopped => "stopped",
        }
    }
}

/// Why shutdown started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownReason {
    HeartbeatTimeout,
    ClientRequest,
    Signal,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::HeartbeatTimeout => "heartbeat_timeout",
            ShutdownReason::ClientRequest => "client_request",
            ShutdownReason::Signal => "signal",
        }
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LivenessStatus {
    pub state: LivenessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ShutdownReason>,
    pub watchdog_enabled: bool,
    pub seconds_since_heartbeat: u64,
}
