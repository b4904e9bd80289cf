//! Session state machine.
//!
//! All mutable state lives in one [`Inner`] behind one lock. Every entry point,
//! whether called by the application, by the telemetry source, or by the
//! connection, takes that lock for the duration of a short, non-blocking
//! transition. Contended callers wait; nothing is dropped because of contention.
//!
//! Each connection attempt is tagged with a generation. The [`EventSink`]
//! handed to the connector carries that tag, so an event from a superseded
//! attempt is recognised and discarded instead of corrupting the current one.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use posecast_protocol::ClientMessage;
use posecast_runtime::{
	ConnectionEvent, ConnectionHandle, Connector, EventSink, OrientationSample, SampleSink, SamplingPriority, SubscriptionId,
	TelemetrySource,
};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::codec;
use crate::config::SessionConfig;
use crate::sink::CommandSink;
use crate::state::{SessionState, SessionStats};

/// Streams orientation telemetry to one remote endpoint.
///
/// Dropping the session stops it.
pub struct Session {
	shared: Arc<Shared>,
}

struct Shared {
	inner: Mutex<Inner>,
	connector: Arc<dyn Connector>,
	telemetry: Arc<dyn TelemetrySource>,
	commands: Arc<dyn CommandSink>,
	state_tx: watch::Sender<SessionState>,
}

struct Inner {
	state: SessionState,
	device_id: String,
	endpoint: String,
	capabilities: Vec<String>,
	priority: SamplingPriority,
	connection: Option<LiveConnection>,
	connected: bool,
	generation: u64,
	subscription: Option<SubscriptionId>,
	stats: SessionStats,
}

struct LiveConnection {
	generation: u64,
	handle: Box<dyn ConnectionHandle>,
}

impl Inner {
	fn owns(&self, generation: u64) -> bool {
		self.connection.as_ref().is_some_and(|conn| conn.generation == generation)
	}

	/// Whether an event from `generation` may still act on this session.
	fn accepts(&self, generation: u64) -> bool {
		!self.state.is_terminal() && self.owns(generation)
	}

	/// Encodes and sends on the live connection. Send failures are the
	/// connection's business; this never changes state.
	fn send(&self, message: &ClientMessage) -> bool {
		let Some(conn) = self.connection.as_ref() else {
			return false;
		};
		match codec::encode(message) {
			Ok(text) => {
				conn.handle.send(text);
				true
			}
			Err(err) => {
				warn!(target = "posecast.codec", error = %err, "dropping unencodable message");
				false
			}
		}
	}

	fn send_hello(&mut self) {
		let hello = codec::hello(&self.device_id, &self.capabilities);
		if self.send(&hello) {
			self.stats.hellos_sent += 1;
			debug!(target = "posecast.session", device_id = %self.device_id, generation = self.generation, "hello sent");
		}
	}

	/// Closes and forgets the live connection, if any.
	fn close_connection(&mut self) {
		if let Some(conn) = self.connection.take() {
			debug!(target = "posecast.session", generation = conn.generation, "closing connection");
			conn.handle.close();
		}
		self.connected = false;
	}

	fn can_stream(&self) -> bool {
		self.state == SessionState::Running && self.connected
	}
}

impl Session {
	/// Creates an idle session.
	///
	/// If the telemetry source reports no capability the session starts in
	/// [`SessionState::Error`]; `start()` will keep failing until the source
	/// becomes available.
	pub fn new(
		config: SessionConfig,
		connector: Arc<dyn Connector>,
		telemetry: Arc<dyn TelemetrySource>,
		commands: Arc<dyn CommandSink>,
	) -> Self {
		let initial = if telemetry.is_available() {
			SessionState::Idle
		} else {
			warn!(target = "posecast.session", "orientation telemetry unavailable");
			SessionState::Error
		};
		let (state_tx, _) = watch::channel(initial);

		let inner = Inner {
			state: initial,
			device_id: config.device_id,
			endpoint: config.endpoint,
			capabilities: config.capabilities,
			priority: config.priority,
			connection: None,
			connected: false,
			generation: 0,
			subscription: None,
			stats: SessionStats::default(),
		};

		Self {
			shared: Arc::new(Shared {
				inner: Mutex::new(inner),
				connector,
				telemetry,
				commands,
				state_tx,
			}),
		}
	}

	/// Registers capture and attempts a connection.
	///
	/// No-op while `Initializing` or `Running`, and after `stop()`. Returns the
	/// state after the call.
	pub fn start(&self) -> SessionState {
		self.shared.start()
	}

	/// Tears everything down and enters the terminal `Closed` state.
	///
	/// Always succeeds and may be called any number of times from any state.
	pub fn stop(&self) {
		self.shared.stop();
	}

	/// Points the session at a new endpoint.
	///
	/// Any current connection is closed before the new one is opened, and the
	/// session passes through `Initializing` even if it was `Running`. From
	/// `Idle` this also registers capture, like `start()`. Ignored after
	/// `stop()`.
	pub fn update_endpoint(&self, endpoint: impl Into<String>) -> SessionState {
		self.shared.update_endpoint(endpoint.into())
	}

	/// Changes the announced identity, re-sending `hello` when `Running`.
	/// Ignored after `stop()`.
	pub fn update_device_id(&self, device_id: impl Into<String>) {
		self.shared.update_device_id(device_id.into());
	}

	/// Asks the remote side to move this device to `target_scene`.
	///
	/// Returns `false` (and sends nothing) unless the session is `Running`.
	pub fn request_scene_shift(&self, target_scene: &str, reason: &str) -> bool {
		self.shared.request_scene_shift(target_scene, reason)
	}

	pub fn state(&self) -> SessionState {
		self.shared.inner.lock().state
	}

	/// Receiver that observes every state transition.
	pub fn watch_state(&self) -> watch::Receiver<SessionState> {
		self.shared.state_tx.subscribe()
	}

	/// Whether the current connection completed its open handshake.
	pub fn is_connected(&self) -> bool {
		self.shared.inner.lock().connected
	}

	pub fn device_id(&self) -> String {
		self.shared.inner.lock().device_id.clone()
	}

	pub fn endpoint(&self) -> String {
		self.shared.inner.lock().endpoint.clone()
	}

	/// Tag of the most recent connection attempt.
	pub fn generation(&self) -> u64 {
		self.shared.inner.lock().generation
	}

	pub fn stats(&self) -> SessionStats {
		self.shared.inner.lock().stats
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		self.shared.stop();
	}
}

impl Shared {
	fn set_state(&self, inner: &mut Inner, next: SessionState) {
		if inner.state == next {
			return;
		}
		info!(target = "posecast.session", from = %inner.state, to = %next, generation = inner.generation, "state transition");
		inner.state = next;
		self.state_tx.send_replace(next);
	}

	fn start(self: &Arc<Self>) -> SessionState {
		let mut inner = self.inner.lock();
		match inner.state {
			state if state.is_terminal() => {
				warn!(target = "posecast.session", "start() after stop() ignored");
			}
			SessionState::Initializing | SessionState::Running => {
				debug!(target = "posecast.session", state = %inner.state, "start() ignored, already active");
			}
			_ => self.begin_attempt(&mut inner),
		}
		inner.state
	}

	/// Ensures capture is registered, then replaces any connection with a fresh attempt.
	fn begin_attempt(self: &Arc<Self>, inner: &mut Inner) {
		if inner.subscription.is_none() {
			match self.telemetry.register(inner.priority, self.sample_sink()) {
				Ok(subscription) => {
					debug!(target = "posecast.session", subscription = subscription.0, priority = %inner.priority, "telemetry registered");
					inner.subscription = Some(subscription);
				}
				Err(err) => {
					warn!(target = "posecast.session", error = %err, "cannot register telemetry");
					inner.close_connection();
					self.set_state(inner, SessionState::Error);
					return;
				}
			}
		}

		inner.close_connection();
		inner.generation += 1;
		let generation = inner.generation;
		self.set_state(inner, SessionState::Initializing);
		inner.stats.connection_attempts += 1;

		let events: Arc<dyn EventSink> = Arc::new(GenerationSink {
			generation,
			shared: Arc::downgrade(self),
		});
		info!(target = "posecast.session", endpoint = %inner.endpoint, generation, "connecting");
		match self.connector.open(&inner.endpoint, events) {
			Ok(handle) => inner.connection = Some(LiveConnection { generation, handle }),
			Err(err) => {
				warn!(target = "posecast.session", endpoint = %inner.endpoint, error = %err, "connection attempt rejected");
				self.set_state(inner, SessionState::Error);
			}
		}
	}

	fn sample_sink(self: &Arc<Self>) -> SampleSink {
		let shared = Arc::downgrade(self);
		Arc::new(move |sample: OrientationSample| {
			if let Some(shared) = shared.upgrade() {
				shared.on_sample(sample);
			}
		})
	}

	fn stop(&self) {
		let mut inner = self.inner.lock();
		if let Some(subscription) = inner.subscription.take() {
			self.telemetry.unregister(subscription);
			debug!(target = "posecast.session", subscription = subscription.0, "telemetry unregistered");
		}
		if inner.state.is_terminal() {
			return;
		}
		inner.close_connection();
		// in-flight events from the last attempt no longer match anything
		inner.generation += 1;
		self.set_state(&mut inner, SessionState::Closed);
	}

	fn update_endpoint(self: &Arc<Self>, endpoint: String) -> SessionState {
		let mut inner = self.inner.lock();
		if inner.state.is_terminal() {
			warn!(target = "posecast.session", endpoint = %endpoint, "endpoint update after stop() ignored");
			return inner.state;
		}
		info!(target = "posecast.session", from = %inner.endpoint, to = %endpoint, "endpoint updated, reconnecting");
		inner.endpoint = endpoint;
		self.begin_attempt(&mut inner);
		inner.state
	}

	fn update_device_id(&self, device_id: String) {
		let mut inner = self.inner.lock();
		if inner.state.is_terminal() {
			warn!(target = "posecast.session", device_id = %device_id, "device id update after stop() ignored");
			return;
		}
		info!(target = "posecast.session", from = %inner.device_id, to = %device_id, "device id updated");
		inner.device_id = device_id;
		if inner.can_stream() {
			inner.send_hello();
		}
	}

	fn request_scene_shift(&self, target_scene: &str, reason: &str) -> bool {
		let mut inner = self.inner.lock();
		if !inner.can_stream() {
			debug!(target = "posecast.session", state = %inner.state, target_scene, "scene shift request dropped, not running");
			return false;
		}
		let request = ClientMessage::DomShiftRequest {
			device_id: inner.device_id.clone(),
			target_scene: target_scene.to_string(),
			reason: reason.to_string(),
		};
		inner.send(&request)
	}

	fn on_sample(&self, sample: OrientationSample) {
		let mut inner = self.inner.lock();
		if !inner.can_stream() {
			inner.stats.samples_dropped += 1;
			trace!(target = "posecast.session", state = %inner.state, ts = sample.timestamp_nanos, "sample gated");
			return;
		}
		let Some(pose) = codec::pose(&sample) else {
			inner.stats.samples_dropped += 1;
			trace!(target = "posecast.session", ts = sample.timestamp_nanos, components = sample.components.len(), "unusable sample");
			return;
		};
		if inner.send(&pose) {
			inner.stats.poses_sent += 1;
		}
	}

	fn on_event(&self, generation: u64, event: ConnectionEvent) {
		let inbound = {
			let mut inner = self.inner.lock();
			if !inner.accepts(generation) {
				inner.stats.stale_events += 1;
				debug!(target = "posecast.session", generation, current = inner.generation, ?event, "stale connection event discarded");
				return;
			}

			match event {
				ConnectionEvent::Opened => {
					if inner.state == SessionState::Initializing {
						inner.connected = true;
						self.set_state(&mut inner, SessionState::Running);
						inner.send_hello();
					} else {
						debug!(target = "posecast.session", state = %inner.state, "open event outside initializing ignored");
					}
					None
				}
				ConnectionEvent::Text(text) => inner.connected.then_some(text),
				ConnectionEvent::Binary(bytes) => {
					trace!(target = "posecast.session", len = bytes.len(), "binary frame ignored");
					None
				}
				ConnectionEvent::Closed { code, reason, remote } => {
					warn!(target = "posecast.session", code, reason = %reason, remote, generation, "connection closed");
					// already closed; nothing to tear down
					inner.connection = None;
					inner.connected = false;
					self.set_state(&mut inner, SessionState::Error);
					None
				}
				ConnectionEvent::Errored(cause) => {
					warn!(target = "posecast.session", cause = %cause, generation, "connection failed");
					inner.close_connection();
					self.set_state(&mut inner, SessionState::Error);
					None
				}
			}
		};

		if let Some(text) = inbound {
			self.dispatch_inbound(generation, &text);
		}
	}

	/// Decodes and hands a server message to the command sink. Runs unlocked.
	///
	/// Ownership is checked again after decoding: a reconfiguration that won
	/// the lock in between supersedes the message.
	fn dispatch_inbound(&self, generation: u64, text: &str) {
		match codec::decode(text) {
			Ok(message) => {
				{
					let mut inner = self.inner.lock();
					if !inner.accepts(generation) {
						inner.stats.stale_events += 1;
						debug!(target = "posecast.session", generation, command = %message.kind, "superseded server command discarded");
						return;
					}
				}
				debug!(target = "posecast.codec", command = %message.kind, "server command");
				self.commands.dispatch(&message.kind, text);
				self.inner.lock().stats.commands_dispatched += 1;
			}
			Err(err) => {
				debug!(target = "posecast.codec", error = %err, "dropping server message");
				self.inner.lock().stats.decode_failures += 1;
			}
		}
	}
}

/// Routes one attempt's events into the state machine, stamped with its generation.
struct GenerationSink {
	generation: u64,
	shared: Weak<Shared>,
}

impl EventSink for GenerationSink {
	fn deliver(&self, event: ConnectionEvent) {
		if let Some(shared) = self.shared.upgrade() {
			shared.on_event(self.generation, event);
		}
	}
}

#[cfg(test)]
mod tests {
	use posecast_runtime::fake::{FakeConnector, FakeConnectorController, FakeTelemetrySource};

	use super::*;
	use crate::sink::NullCommandSink;

	#[derive(Default)]
	struct CountingSink {
		count: Mutex<usize>,
	}

	impl CommandSink for CountingSink {
		fn dispatch(&self, _command_type: &str, _raw_payload: &str) {
			*self.count.lock() += 1;
		}
	}

	fn fixture() -> (Session, FakeConnectorController, FakeTelemetrySource) {
		let (connector, net) = FakeConnector::pair();
		let telemetry = FakeTelemetrySource::new();
		let session = Session::new(
			SessionConfig::new("A", "ws://e1"),
			Arc::new(connector),
			Arc::new(telemetry.clone()),
			Arc::new(NullCommandSink),
		);
		(session, net, telemetry)
	}

	#[test]
	fn new_session_is_idle_and_quiet() {
		let (session, net, telemetry) = fixture();
		assert_eq!(session.state(), SessionState::Idle);
		assert!(!session.is_connected());
		assert!(net.attempts().is_empty());
		assert_eq!(telemetry.registrations(), 0);
	}

	#[test]
	fn open_event_is_ignored_until_owned() {
		let (session, net, _telemetry) = fixture();
		session.start();
		// generation 1 is live; pretend generation 0 is a leftover
		session.shared.on_event(0, ConnectionEvent::Opened);
		assert_eq!(session.state(), SessionState::Initializing);
		assert_eq!(session.stats().stale_events, 1);

		net.open(0);
		assert_eq!(session.state(), SessionState::Running);
	}

	#[test]
	fn watch_sees_transitions() {
		let (session, net, _telemetry) = fixture();
		let rx = session.watch_state();
		session.start();
		assert_eq!(*rx.borrow(), SessionState::Initializing);
		net.open(0);
		assert_eq!(*rx.borrow(), SessionState::Running);
		session.stop();
		assert_eq!(*rx.borrow(), SessionState::Closed);
	}

	#[test]
	fn drop_stops_the_session() {
		let (session, net, telemetry) = fixture();
		session.start();
		net.open(0);
		drop(session);
		assert_eq!(net.close_calls(0), 1);
		assert_eq!(telemetry.active_subscriptions(), 0);
	}

	#[test]
	fn command_superseded_before_dispatch_is_discarded() {
		let (connector, net) = FakeConnector::pair();
		let sink = Arc::new(CountingSink::default());
		let session = Session::new(
			SessionConfig::new("A", "ws://e1"),
			Arc::new(connector),
			Arc::new(FakeTelemetrySource::new()),
			sink.clone(),
		);
		session.start();
		net.open(0);
		// accepted under generation 1, then the endpoint moves before dispatch
		session.update_endpoint("ws://e2");
		session.shared.dispatch_inbound(1, r#"{"type":"domShift","targetScene":"X"}"#);
		assert_eq!(*sink.count.lock(), 0);
		assert_eq!(session.stats().stale_events, 1);

		net.open(1);
		session.shared.dispatch_inbound(2, r#"{"type":"domShift","targetScene":"Y"}"#);
		assert_eq!(*sink.count.lock(), 1);
	}

	#[test]
	fn events_after_drop_are_harmless() {
		let (session, net, _telemetry) = fixture();
		session.start();
		drop(session);
		net.open(0);
		net.message(0, r#"{"type":"domShift","targetScene":"X"}"#);
		assert_eq!(net.sent(0).len(), 0);
	}
}
