//! Feed connection state machine.
//!
//! ```text
//!  Disconnected ──start──▶ Connecting ──ok──▶ Connected ──msg──┐
//!       ▲                   │  ▲               │  ▲────────────┘
//!       │                   │  │ delay         │
//!       │ stop (any state)  ▼  │               │ timeout / close / error
//!       └─────────────── Retrying ◀────────────┘
//!                           │
//!                           ▼ attempts == max
//!                        GivenUp (terminal)
//! ```
//!
//! The session is owned by a single task, so counters are plain integers.

use std::time::Duration;

use tracing::{info, warn};

// =============================================================================
// STATES AND REASONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected and not trying to connect
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Receiving snapshots
    Connected,
    /// Waiting out the retry delay after a failure
    Retrying,
    /// Retry budget exhausted, terminal
    GivenUp,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Retrying => write!(f, "RETRYING"),
            Self::GivenUp => write!(f, "GIVEN_UP"),
        }
    }
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GivenUp)
    }
}

/// Reason for state transition (for logging/metrics)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    Started,
    ConnectSuccess,
    ConnectFailed,
    ConnectTimeout,
    ReadTimeout,
    ServerClose,
    NetworkError,
    RetryDelayElapsed,
    RetriesExhausted,
    StopRequested,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::ConnectSuccess => write!(f, "connect_ok"),
            Self::ConnectFailed => write!(f, "connect_failed"),
            Self::ConnectTimeout => write!(f, "connect_timeout"),
            Self::ReadTimeout => write!(f, "read_timeout"),
            Self::ServerClose => write!(f, "server_close"),
            Self::NetworkError => write!(f, "network_error"),
            Self::RetryDelayElapsed => write!(f, "retry_delay_elapsed"),
            Self::RetriesExhausted => write!(f, "retries_exhausted"),
            Self::StopRequested => write!(f, "stop"),
        }
    }
}

/// Rejected edge of the state machine. The state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub reason: TransitionReason,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal transition {} -> {} ({})",
            self.from, self.to, self.reason
        )
    }
}

impl std::error::Error for TransitionError {}

/// Legal edges of the connection state machine.
pub fn is_allowed(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;

    match (from, to) {
        (GivenUp, _) => false,
        (_, Disconnected) => true,
        (Disconnected, Connecting)
        | (Connecting, Connected)
        | (Connecting, Retrying)
        | (Connected, Retrying)
        | (Retrying, Connecting)
        | (Retrying, GivenUp) => true,
        _ => false,
    }
}

// =============================================================================
// SESSION METRICS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    pub connections_attempted: u64,
    pub connections_succeeded: u64,
    pub connections_failed: u64,
    pub retries: u64,
    pub read_timeouts: u64,
    pub messages_processed: u64,
    pub malformed_skipped: u64,
    pub books_rejected: u64,
}

impl SessionMetrics {
    /// Summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "connects={}/{} failed={} retries={} read_timeouts={} messages={} malformed={} rejected={}",
            self.connections_succeeded,
            self.connections_attempted,
            self.connections_failed,
            self.retries,
            self.read_timeouts,
            self.messages_processed,
            self.malformed_skipped,
            self.books_rejected,
        )
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// State, retry budget and counters of one feed connection.
#[derive(Debug)]
pub struct ConnectionSession {
    state: ConnectionState,
    attempts: u32,
    max_attempts: u32,
    retry_delay: Duration,
    metrics: SessionMetrics,
}

impl ConnectionSession {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            max_attempts,
            retry_delay,
            metrics: SessionMetrics::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Failed attempts since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics
    }

    pub fn retries_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    #[inline]
    pub fn record_message(&mut self) {
        self.metrics.messages_processed += 1;
    }

    #[inline]
    pub fn record_malformed(&mut self) {
        self.metrics.malformed_skipped += 1;
    }

    #[inline]
    pub fn record_rejected(&mut self) {
        self.metrics.books_rejected += 1;
    }

    /// Move to `new_state`, applying its side effects. Illegal edges are
    /// logged and rejected.
    pub fn transition(
        &mut self,
        new_state: ConnectionState,
        reason: TransitionReason,
    ) -> Result<(), TransitionError> {
        let old_state = self.state;
        if !is_allowed(old_state, new_state) {
            let err = TransitionError {
                from: old_state,
                to: new_state,
                reason,
            };
            warn!(error = %err, "illegal_session_transition");
            return Err(err);
        }
        self.state = new_state;

        match (old_state, new_state) {
            (_, ConnectionState::Connecting) => {
                self.metrics.connections_attempted += 1;
                if old_state == ConnectionState::Retrying {
                    self.metrics.retries += 1;
                }
            }
            (_, ConnectionState::Connected) => {
                self.metrics.connections_succeeded += 1;
                self.attempts = 0;
            }
            (_, ConnectionState::Retrying) => {
                self.attempts += 1;
                self.metrics.connections_failed += 1;
                if reason == TransitionReason::ReadTimeout {
                    self.metrics.read_timeouts += 1;
                }
            }
            _ => {}
        }

        info!(
            from = %old_state,
            to = %new_state,
            reason = %reason,
            attempt = self.attempts,
            max_attempts = self.max_attempts,
            "session_transition"
        );
        Ok(())
    }
}
