use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::types::{LivenessState, LivenessStatus, ShutdownReason};
use crate::config::LivenessConfig;
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Phase {
    state: LivenessState,
    reason: Option<ShutdownReason>,
}

/// Tracks client heartbeats and the server's shutdown state.
///
/// State only moves forward: `active` → `shutting_down` → `stopped`.
pub struct LivenessMonitor {
    config: LivenessConfig,
    last_heartbeat: Mutex<Instant>,
    phase: watch::Sender<Phase>,
}

impl LivenessMonitor {
    pub fn new(config: LivenessConfig) -> Self {
        let (phase, _) = watch::channel(Phase {
            state: LivenessState::Active,
            reason: None,
        });
        Self {
            config,
            last_heartbeat: Mutex::new(Instant::now()),
            phase,
        }
    }

    /// Record a client heartbeat. Ignored unless active.
    pub fn heartbeat(&self) -> bool {
        if !self.is_active() {
            debug!("Ignoring heartbeat, server is {}", self.state().as_str());
            return false;
        }
        *self
            .last_heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
        metrics::HEARTBEATS.inc();
        trace!("Heartbeat received");
        true
    }

    /// Start shutting down. Returns false if shutdown already started.
    pub fn request_shutdown(&self, reason: ShutdownReason) -> bool {
        let started = self.phase.send_if_modified(|phase| {
            if phase.state != LivenessState::Active {
                return false;
            }
            *phase = Phase {
                state: LivenessState::ShuttingDown,
                reason: Some(reason),
            };
            true
        });
        if started {
            info!(reason = %reason, "Shutdown requested");
        }
        started
    }

    /// Final state once the server has drained.
    pub fn mark_stopped(&self) {
        self.phase.send_if_modified(|phase| {
            if phase.state == LivenessState::Stopped {
                return false;
            }
            phase.state = LivenessState::Stopped;
            true
        });
        info!("Server stopped");
    }

    pub fn state(&self) -> LivenessState {
        self.phase.borrow().state
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.phase.borrow().reason
    }

    pub fn is_active(&self) -> bool {
        self.state() == LivenessState::Active
    }

    pub fn since_last_heartbeat(&self) -> Duration {
        self.last_heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    pub fn status(&self) -> LivenessStatus {
        let phase = *self.phase.borrow();
        LivenessStatus {
            state: phase.state,
            reason: phase.reason,
            watchdog_enabled: self.config.enabled,
            seconds_since_heartbeat: self.since_last_heartbeat().as_secs(),
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.config.drain_timeout_secs)
    }

    /// Resolves once shutdown has started.
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        let mut rx = self.phase.subscribe();
        let phase = match rx.wait_for(|p| p.state != LivenessState::Active).await {
            Ok(phase) => *phase,
            // The sender lives in self, so this is unreachable while we are borrowed.
            Err(_) => *self.phase.borrow(),
        };
        phase.reason.unwrap_or(ShutdownReason::Signal)
    }

    /// Spawn the heartbeat watchdog. Returns `None` when it is disabled.
    pub fn spawn_watchdog(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            info!("Heartbeat watchdog disabled");
            return None;
        }

        let monitor = Arc::clone(self);
        let grace = Duration::from_secs(self.config.grace_period_secs);
        let period = Duration::from_secs(self.config.check_interval_secs);
        info!(
            grace_secs = grace.as_secs(),
            check_secs = period.as_secs(),
            "Starting heartbeat watchdog"
        );

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if !monitor.is_active() {
                    break;
                }
                let silent = monitor.since_last_heartbeat();
                if silent > grace {
                    warn!(
                        silent_secs = silent.as_secs(),
                        "No heartbeat within grace period"
                    );
                    monitor.request_shutdown(ShutdownReason::HeartbeatTimeout);
                    break;
                }
            }
            debug!("Heartbeat watchdog finished");
        }))
    }
}
