//! Connection contract between a session and its transport.
//!
//! A [`Connector`] opens one channel per call. The channel reports its
//! lifecycle through the [`EventSink`] handed to `open`, and the session drives
//! it through the returned [`ConnectionHandle`]. All three calls are
//! fire-and-forget: outcomes arrive later as [`ConnectionEvent`]s.

use std::sync::Arc;

use thiserror::Error;

/// Lifecycle and message events of a single connection.
///
/// Within one connection the order is `Opened`, any number of `Text`/`Binary`,
/// then at most one of `Closed`/`Errored`. A connection that fails before the
/// handshake reports `Errored` without `Opened`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
	Opened,
	Text(String),
	Binary(Vec<u8>),
	Closed {
		code: u16,
		reason: String,
		/// `true` when the peer initiated the close.
		remote: bool,
	},
	Errored(String),
}

impl ConnectionEvent {
	/// Whether this event ends the connection.
	pub fn is_terminal(&self) -> bool {
		matches!(self, ConnectionEvent::Closed { .. } | ConnectionEvent::Errored(_))
	}
}

/// Receiver of connection events. Implementations may be called from any thread.
pub trait EventSink: Send + Sync {
	fn deliver(&self, event: ConnectionEvent);
}

/// Control side of an open (or opening) connection.
pub trait ConnectionHandle: Send + Sync {
	/// Queues a text frame. Silently dropped once the connection is closing or closed.
	fn send(&self, text: String);

	/// Requests a close. Best-effort; never fails.
	fn close(&self);
}

/// Factory for connections.
pub trait Connector: Send + Sync {
	/// Starts connecting to `endpoint`. Must not call `events` before returning.
	fn open(&self, endpoint: &str, events: Arc<dyn EventSink>) -> Result<Box<dyn ConnectionHandle>, ConnectError>;
}

/// Failures detected before any network activity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
	#[error("invalid endpoint `{endpoint}`: {reason}")]
	InvalidEndpoint { endpoint: String, reason: String },
	#[error("unsupported endpoint scheme `{0}` (expected ws or wss)")]
	UnsupportedScheme(String),
	#[error("no async runtime available to drive the connection")]
	NoRuntime,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_close_and_error_are_terminal() {
		assert!(!ConnectionEvent::Opened.is_terminal());
		assert!(!ConnectionEvent::Text("{}".into()).is_terminal());
		assert!(!ConnectionEvent::Binary(vec![1]).is_terminal());
		assert!(
			ConnectionEvent::Closed {
				code: 1000,
				reason: String::new(),
				remote: true
			}
			.is_terminal()
		);
		assert!(ConnectionEvent::Errored("reset".into()).is_terminal());
	}
}
