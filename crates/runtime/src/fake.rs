//! In-memory collaborators for driving a session without a network or sensor.
//!
//! # Example
//!
//! ```ignore
//! let (connector, net) = FakeConnector::pair();
//! let telemetry = FakeTelemetrySource::new();
//! let session = Session::new(config, Arc::new(connector), Arc::new(telemetry.clone()), sink);
//!
//! session.start();
//! net.open(0);
//! telemetry.emit(OrientationSample::new(100, vec![1.0, 2.0, 3.0]));
//! assert_eq!(net.sent(0).len(), 2);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::connection::{ConnectError, ConnectionEvent, ConnectionHandle, Connector, EventSink};
use crate::telemetry::{OrientationSample, SampleSink, SamplingPriority, SubscriptionId, TelemetryError, TelemetrySource};

/// Everything the fake network has observed for one `open` call.
struct Attempt {
	endpoint: String,
	events: Arc<dyn EventSink>,
	sent: Vec<String>,
	close_calls: usize,
	live: bool,
}

#[derive(Default)]
struct NetState {
	attempts: Vec<Attempt>,
	max_live: usize,
	fail_next_open: Option<ConnectError>,
}

impl NetState {
	fn live_count(&self) -> usize {
		self.attempts.iter().filter(|a| a.live).count()
	}
}

/// [`Connector`] that records attempts instead of connecting.
pub struct FakeConnector {
	state: Arc<Mutex<NetState>>,
}

impl FakeConnector {
	/// Builds the connector and the controller used to inspect and drive it.
	pub fn pair() -> (Self, FakeConnectorController) {
		let state = Arc::new(Mutex::new(NetState::default()));
		(Self { state: Arc::clone(&state) }, FakeConnectorController { state })
	}
}

impl Connector for FakeConnector {
	fn open(&self, endpoint: &str, events: Arc<dyn EventSink>) -> Result<Box<dyn ConnectionHandle>, ConnectError> {
		let mut state = self.state.lock();
		if let Some(err) = state.fail_next_open.take() {
			return Err(err);
		}
		let index = state.attempts.len();
		state.attempts.push(Attempt {
			endpoint: endpoint.to_string(),
			events,
			sent: Vec::new(),
			close_calls: 0,
			live: true,
		});
		state.max_live = state.max_live.max(state.live_count());
		Ok(Box::new(FakeHandle {
			index,
			state: Arc::clone(&self.state),
		}))
	}
}

struct FakeHandle {
	index: usize,
	state: Arc<Mutex<NetState>>,
}

impl ConnectionHandle for FakeHandle {
	fn send(&self, text: String) {
		let mut state = self.state.lock();
		let attempt = &mut state.attempts[self.index];
		if attempt.live {
			attempt.sent.push(text);
		}
	}

	fn close(&self) {
		let mut state = self.state.lock();
		let attempt = &mut state.attempts[self.index];
		attempt.close_calls += 1;
		attempt.live = false;
	}
}

/// Test-side control over a [`FakeConnector`].
///
/// Attempts are addressed by their zero-based index in `open` order. Event
/// injection happens outside the fake's own lock, so sinks may re-enter it.
#[derive(Clone)]
pub struct FakeConnectorController {
	state: Arc<Mutex<NetState>>,
}

impl FakeConnectorController {
	/// Endpoints of every `open` call, in order.
	pub fn attempts(&self) -> Vec<String> {
		self.state.lock().attempts.iter().map(|a| a.endpoint.clone()).collect()
	}

	/// Frames sent on attempt `index`, raw.
	pub fn sent(&self, index: usize) -> Vec<String> {
		self.state.lock().attempts[index].sent.clone()
	}

	/// Frames sent on attempt `index`, parsed as JSON.
	pub fn sent_json(&self, index: usize) -> Vec<serde_json::Value> {
		self.sent(index)
			.iter()
			.map(|text| serde_json::from_str(text).expect("fake connection carried non-JSON text"))
			.collect()
	}

	/// Number of `close()` calls made on attempt `index`.
	pub fn close_calls(&self, index: usize) -> usize {
		self.state.lock().attempts[index].close_calls
	}

	/// Connections opened and neither closed locally nor ended by an injected event.
	pub fn live_connections(&self) -> usize {
		self.state.lock().live_count()
	}

	/// Highest number of simultaneously live connections ever observed.
	pub fn max_live_connections(&self) -> usize {
		self.state.lock().max_live
	}

	/// Makes the next `open` fail synchronously with `err`.
	pub fn fail_next_open(&self, err: ConnectError) {
		self.state.lock().fail_next_open = Some(err);
	}

	pub fn open(&self, index: usize) {
		self.inject(index, ConnectionEvent::Opened);
	}

	pub fn message(&self, index: usize, text: impl Into<String>) {
		self.inject(index, ConnectionEvent::Text(text.into()));
	}

	pub fn binary(&self, index: usize, bytes: Vec<u8>) {
		self.inject(index, ConnectionEvent::Binary(bytes));
	}

	pub fn close_remote(&self, index: usize, code: u16, reason: &str) {
		self.inject(
			index,
			ConnectionEvent::Closed {
				code,
				reason: reason.to_string(),
				remote: true,
			},
		);
	}

	pub fn error(&self, index: usize, cause: &str) {
		self.inject(index, ConnectionEvent::Errored(cause.to_string()));
	}

	/// Delivers `event` to the sink of attempt `index`.
	pub fn inject(&self, index: usize, event: ConnectionEvent) {
		let events = {
			let mut state = self.state.lock();
			let attempt = &mut state.attempts[index];
			if event.is_terminal() {
				attempt.live = false;
			}
			Arc::clone(&attempt.events)
		};
		events.deliver(event);
	}
}

#[derive(Default)]
struct SourceState {
	available: bool,
	next_id: u64,
	sinks: HashMap<SubscriptionId, (SamplingPriority, SampleSink)>,
	registrations: usize,
	unregistrations: usize,
}

/// [`TelemetrySource`] whose samples are pushed by the test.
#[derive(Clone)]
pub struct FakeTelemetrySource {
	state: Arc<Mutex<SourceState>>,
}

impl FakeTelemetrySource {
	pub fn new() -> Self {
		Self::with_availability(true)
	}

	/// A source reporting that the device has no orientation sensor.
	pub fn unavailable() -> Self {
		Self::with_availability(false)
	}

	fn with_availability(available: bool) -> Self {
		Self {
			state: Arc::new(Mutex::new(SourceState {
				available,
				..Default::default()
			})),
		}
	}

	/// Delivers `sample` to every active subscriber, outside the fake's lock.
	pub fn emit(&self, sample: OrientationSample) {
		let sinks: Vec<SampleSink> = self.state.lock().sinks.values().map(|(_, sink)| Arc::clone(sink)).collect();
		for sink in sinks {
			sink(sample.clone());
		}
	}

	pub fn active_subscriptions(&self) -> usize {
		self.state.lock().sinks.len()
	}

	/// Priorities of the active subscriptions.
	pub fn priorities(&self) -> Vec<SamplingPriority> {
		self.state.lock().sinks.values().map(|(priority, _)| *priority).collect()
	}

	pub fn registrations(&self) -> usize {
		self.state.lock().registrations
	}

	pub fn unregistrations(&self) -> usize {
		self.state.lock().unregistrations
	}
}

impl Default for FakeTelemetrySource {
	fn default() -> Self {
		Self::new()
	}
}

impl TelemetrySource for FakeTelemetrySource {
	fn is_available(&self) -> bool {
		self.state.lock().available
	}

	fn register(&self, priority: SamplingPriority, sink: SampleSink) -> Result<SubscriptionId, TelemetryError> {
		let mut state = self.state.lock();
		if !state.available {
			return Err(TelemetryError::Unavailable);
		}
		state.next_id += 1;
		let id = SubscriptionId(state.next_id);
		state.sinks.insert(id, (priority, sink));
		state.registrations += 1;
		Ok(id)
	}

	fn unregister(&self, subscription: SubscriptionId) {
		let mut state = self.state.lock();
		if state.sinks.remove(&subscription).is_some() {
			state.unregistrations += 1;
		}
	}
}

/// [`EventSink`] that records everything it receives.
#[derive(Default)]
pub struct RecordingEventSink {
	events: Mutex<Vec<ConnectionEvent>>,
	delivered: AtomicU64,
}

impl RecordingEventSink {
	pub fn events(&self) -> Vec<ConnectionEvent> {
		self.events.lock().clone()
	}

	pub fn delivered(&self) -> u64 {
		self.delivered.load(Ordering::SeqCst)
	}
}

impl EventSink for RecordingEventSink {
	fn deliver(&self, event: ConnectionEvent) {
		self.events.lock().push(event);
		self.delivered.fetch_add(1, Ordering::SeqCst);
	}
}
