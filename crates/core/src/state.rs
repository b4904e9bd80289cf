//! Observable session state.

use std::fmt;

use serde::Serialize;

/// Lifecycle position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	/// Created, never started.
	Idle,
	/// Capture registered, connection attempt in flight.
	Initializing,
	/// Connection open and identified; samples are streamed.
	Running,
	/// Last attempt failed or dropped. Recoverable with `start()` or an endpoint update.
	Error,
	/// Stopped for good.
	Closed,
}

impl SessionState {
	pub fn is_terminal(self) -> bool {
		self == SessionState::Closed
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionState::Idle => write!(f, "idle"),
			SessionState::Initializing => write!(f, "initializing"),
			SessionState::Running => write!(f, "running"),
			SessionState::Error => write!(f, "error"),
			SessionState::Closed => write!(f, "closed"),
		}
	}
}

/// Diagnostic counters. Never influence transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
	pub connection_attempts: u64,
	pub hellos_sent: u64,
	pub poses_sent: u64,
	/// Samples discarded by state gating or because they were unusable.
	pub samples_dropped: u64,
	pub commands_dispatched: u64,
	pub decode_failures: u64,
	/// Connection events discarded because they belonged to a superseded attempt.
	pub stale_events: u64,
}
