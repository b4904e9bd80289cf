//! WebSocket connector backed by tokio-tungstenite.
//!
//! Each [`Connector::open`] call spawns one task on the stored runtime handle.
//! The task owns the socket; the returned handle only feeds an unbounded
//! command queue, so `send` and `close` never block the caller.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::{debug, trace, warn};
use url::Url;

use crate::connection::{ConnectError, ConnectionEvent, ConnectionHandle, Connector, EventSink};

/// Close code reported when the peer vanished without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
const NORMAL_CLOSURE: u16 = 1000;

enum Outgoing {
	Text(String),
	Close,
}

/// Opens `ws://` / `wss://` connections on a tokio runtime.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
	runtime: Handle,
}

impl WebSocketConnector {
	pub fn new(runtime: Handle) -> Self {
		Self { runtime }
	}

	/// Uses the runtime of the calling context.
	pub fn from_current() -> Result<Self, ConnectError> {
		Handle::try_current().map(Self::new).map_err(|_| ConnectError::NoRuntime)
	}
}

/// Validates that `endpoint` is a WebSocket URL.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, ConnectError> {
	let url = Url::parse(endpoint).map_err(|err| ConnectError::InvalidEndpoint {
		endpoint: endpoint.to_string(),
		reason: err.to_string(),
	})?;
	match url.scheme() {
		"ws" | "wss" => Ok(url),
		other => Err(ConnectError::UnsupportedScheme(other.to_string())),
	}
}

impl Connector for WebSocketConnector {
	fn open(&self, endpoint: &str, events: Arc<dyn EventSink>) -> Result<Box<dyn ConnectionHandle>, ConnectError> {
		let url = parse_endpoint(endpoint)?;
		let (tx, rx) = mpsc::unbounded_channel();
		self.runtime.spawn(drive(url, rx, events));
		Ok(Box::new(WebSocketHandle { tx }))
	}
}

struct WebSocketHandle {
	tx: mpsc::UnboundedSender<Outgoing>,
}

impl ConnectionHandle for WebSocketHandle {
	fn send(&self, text: String) {
		let _ = self.tx.send(Outgoing::Text(text));
	}

	fn close(&self) {
		let _ = self.tx.send(Outgoing::Close);
	}
}

/// Waits until the owner asks to close (or drops the handle). Text queued before
/// the handshake is discarded.
async fn close_requested(commands: &mut mpsc::UnboundedReceiver<Outgoing>) {
	loop {
		match commands.recv().await {
			Some(Outgoing::Text(_)) => trace!(target = "posecast.ws", "dropping frame queued before open"),
			Some(Outgoing::Close) | None => return,
		}
	}
}

async fn drive(url: Url, mut commands: mpsc::UnboundedReceiver<Outgoing>, events: Arc<dyn EventSink>) {
	debug!(target = "posecast.ws", endpoint = %url, "connecting");
	let connected = tokio::select! {
		res = tokio_tungstenite::connect_async(url.as_str()) => res,
		_ = close_requested(&mut commands) => {
			debug!(target = "posecast.ws", endpoint = %url, "connect abandoned by owner");
			return;
		}
	};

	let stream = match connected {
		Ok((stream, _response)) => stream,
		Err(err) => {
			warn!(target = "posecast.ws", endpoint = %url, error = %err, "connect failed");
			events.deliver(ConnectionEvent::Errored(err.to_string()));
			return;
		}
	};

	debug!(target = "posecast.ws", endpoint = %url, "connected");
	events.deliver(ConnectionEvent::Opened);
	let (mut ws_tx, mut ws_rx) = stream.split();

	loop {
		tokio::select! {
			command = commands.recv() => match command {
				Some(Outgoing::Text(text)) => {
					if let Err(err) = ws_tx.send(Message::Text(text)).await {
						events.deliver(ConnectionEvent::Errored(err.to_string()));
						return;
					}
				}
				Some(Outgoing::Close) | None => {
					let _ = ws_tx.send(Message::Close(None)).await;
					let _ = ws_tx.close().await;
					debug!(target = "posecast.ws", endpoint = %url, "closed locally");
					events.deliver(ConnectionEvent::Closed {
						code: NORMAL_CLOSURE,
						reason: String::new(),
						remote: false,
					});
					return;
				}
			},
			incoming = ws_rx.next() => match incoming {
				Some(Ok(Message::Text(text))) => events.deliver(ConnectionEvent::Text(text)),
				Some(Ok(Message::Binary(bytes))) => events.deliver(ConnectionEvent::Binary(bytes)),
				Some(Ok(Message::Close(frame))) => {
					let (code, reason) = close_details(frame);
					debug!(target = "posecast.ws", endpoint = %url, code, reason = %reason, "closed by peer");
					events.deliver(ConnectionEvent::Closed { code, reason, remote: true });
					return;
				}
				Some(Ok(_)) => {}
				Some(Err(err)) => {
					warn!(target = "posecast.ws", endpoint = %url, error = %err, "connection error");
					events.deliver(ConnectionEvent::Errored(err.to_string()));
					return;
				}
				None => {
					events.deliver(ConnectionEvent::Closed {
						code: ABNORMAL_CLOSURE,
						reason: String::new(),
						remote: true,
					});
					return;
				}
			},
		}
	}
}

fn close_details(frame: Option<CloseFrame<'_>>) -> (u16, String) {
	match frame {
		Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
		None => (NORMAL_CLOSURE, String::new()),
	}
}
