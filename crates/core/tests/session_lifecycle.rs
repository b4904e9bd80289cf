//! Session lifecycle driven through in-memory collaborators.

use std::sync::Arc;

use parking_lot::Mutex;
use posecast::{CommandSink, OrientationSample, SamplingPriority, Session, SessionConfig, SessionState};
use posecast_runtime::ConnectError;
use posecast_runtime::fake::{FakeConnector, FakeConnectorController, FakeTelemetrySource};
use serde_json::json;

#[derive(Default)]
struct RecordingSink {
	commands: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
	fn commands(&self) -> Vec<(String, String)> {
		self.commands.lock().clone()
	}
}

impl CommandSink for RecordingSink {
	fn dispatch(&self, command_type: &str, raw_payload: &str) {
		self.commands.lock().push((command_type.to_string(), raw_payload.to_string()));
	}
}

struct Harness {
	session: Session,
	net: FakeConnectorController,
	telemetry: FakeTelemetrySource,
	sink: Arc<RecordingSink>,
}

fn harness_with(config: SessionConfig, telemetry: FakeTelemetrySource) -> Harness {
	let (connector, net) = FakeConnector::pair();
	let sink = Arc::new(RecordingSink::default());
	let session = Session::new(config, Arc::new(connector), Arc::new(telemetry.clone()), sink.clone());
	Harness {
		session,
		net,
		telemetry,
		sink,
	}
}

fn harness() -> Harness {
	harness_with(SessionConfig::new("A", "E1"), FakeTelemetrySource::new())
}

fn sample(ts: i64) -> OrientationSample {
	OrientationSample::new(ts, vec![1.0, 2.0, 3.0])
}

fn kinds(messages: &[serde_json::Value]) -> Vec<String> {
	messages.iter().map(|m| m["type"].as_str().unwrap_or_default().to_string()).collect()
}

#[test]
fn end_to_end_scenario() {
	let h = harness();

	h.session.start();
	assert_eq!(h.net.attempts(), vec!["E1"]);
	h.net.open(0);
	assert_eq!(h.session.state(), SessionState::Running);
	assert_eq!(h.net.sent_json(0), vec![json!({"type": "hello", "deviceId": "A"})]);

	h.telemetry.emit(sample(100));
	let sent = h.net.sent_json(0);
	assert_eq!(sent.len(), 2);
	assert_eq!(sent[1], json!({"type": "pose", "ts": 100, "rv": [1.0, 2.0, 3.0]}));

	h.net.close_remote(0, 1006, "");
	assert_eq!(h.session.state(), SessionState::Error);
	assert!(!h.session.is_connected());
	h.telemetry.emit(sample(200));
	h.telemetry.emit(sample(300));
	assert_eq!(h.net.sent(0).len(), 2);

	h.session.update_endpoint("E2");
	assert_eq!(h.net.attempts(), vec!["E1", "E2"]);
	assert_eq!(h.session.state(), SessionState::Initializing);

	h.session.stop();
	assert_eq!(h.session.state(), SessionState::Closed);
	assert_eq!(h.telemetry.active_subscriptions(), 0);
	assert_eq!(h.telemetry.unregistrations(), 1);
}

#[test]
fn start_twice_registers_and_connects_once() {
	let h = harness();
	assert_eq!(h.session.start(), SessionState::Initializing);
	assert_eq!(h.session.start(), SessionState::Initializing);
	assert_eq!(h.net.attempts().len(), 1);
	assert_eq!(h.telemetry.registrations(), 1);

	h.net.open(0);
	assert_eq!(h.session.start(), SessionState::Running);
	assert_eq!(h.net.attempts().len(), 1);
	assert_eq!(h.telemetry.registrations(), 1);
}

#[test]
fn capture_registers_at_game_priority() {
	let h = harness();
	h.session.start();
	assert_eq!(h.telemetry.priorities(), vec![SamplingPriority::Game]);
}

#[test]
fn configured_priority_is_used() {
	let h = harness_with(
		SessionConfig::new("A", "E1").with_priority(SamplingPriority::Ui),
		FakeTelemetrySource::new(),
	);
	h.session.start();
	assert_eq!(h.telemetry.priorities(), vec![SamplingPriority::Ui]);
}

#[test]
fn samples_outside_running_send_nothing() {
	let h = harness();
	h.telemetry.emit(sample(1));

	h.session.start();
	h.telemetry.emit(sample(2));
	assert!(h.net.sent(0).is_empty());

	h.net.open(0);
	h.net.error(0, "reset by peer");
	h.telemetry.emit(sample(3));
	assert_eq!(kinds(&h.net.sent_json(0)), vec!["hello"]);
	assert_eq!(h.session.stats().poses_sent, 0);
	assert_eq!(h.session.stats().samples_dropped, 2);
}

#[test]
fn short_samples_are_dropped_while_running() {
	let h = harness();
	h.session.start();
	h.net.open(0);
	h.telemetry.emit(OrientationSample::new(5, vec![0.1, 0.2]));
	assert_eq!(kinds(&h.net.sent_json(0)), vec!["hello"]);
	assert_eq!(h.session.stats().samples_dropped, 1);
}

#[test]
fn extra_components_are_truncated() {
	let h = harness();
	h.session.start();
	h.net.open(0);
	h.telemetry.emit(OrientationSample::new(42, vec![0.5, -0.5, 0.25, 0.625, 9.0]));
	assert_eq!(h.net.sent_json(0)[1], json!({"type": "pose", "ts": 42, "rv": [0.5, -0.5, 0.25]}));
}

#[test]
fn exactly_one_hello_per_open() {
	let h = harness();
	h.session.start();
	h.net.open(0);
	h.telemetry.emit(sample(1));
	h.telemetry.emit(sample(2));
	assert_eq!(kinds(&h.net.sent_json(0)), vec!["hello", "pose", "pose"]);
	assert_eq!(h.session.stats().hellos_sent, 1);
}

#[test]
fn device_id_update_while_running_resends_hello() {
	let h = harness();
	h.session.start();
	h.net.open(0);

	h.session.update_device_id("B");
	let sent = h.net.sent_json(0);
	assert_eq!(sent.len(), 2);
	assert_eq!(sent[1], json!({"type": "hello", "deviceId": "B"}));
	assert_eq!(h.session.state(), SessionState::Running);
	assert_eq!(h.net.attempts().len(), 1);

	h.telemetry.emit(sample(9));
	assert_eq!(kinds(&h.net.sent_json(0)), vec!["hello", "hello", "pose"]);
}

#[test]
fn device_id_update_before_open_is_used_by_first_hello() {
	let h = harness();
	h.session.start();
	h.session.update_device_id("B");
	assert!(h.net.sent(0).is_empty());
	h.net.open(0);
	assert_eq!(h.net.sent_json(0), vec![json!({"type": "hello", "deviceId": "B"})]);
}

#[test]
fn capabilities_are_advertised_in_hello() {
	let h = harness_with(
		SessionConfig::new("A", "E1").with_capabilities(["rotation_vector", "scene_shift"]),
		FakeTelemetrySource::new(),
	);
	h.session.start();
	h.net.open(0);
	assert_eq!(
		h.net.sent_json(0)[0],
		json!({"type": "hello", "deviceId": "A", "capabilities": ["rotation_vector", "scene_shift"]})
	);
}

#[test]
fn endpoint_update_while_running_closes_before_reopening() {
	let h = harness();
	h.session.start();
	h.net.open(0);

	assert_eq!(h.session.update_endpoint("E2"), SessionState::Initializing);
	assert_eq!(h.net.close_calls(0), 1);
	assert_eq!(h.net.attempts(), vec!["E1", "E2"]);
	assert_eq!(h.net.max_live_connections(), 1);
	assert!(!h.session.is_connected());

	h.net.open(1);
	assert_eq!(h.session.state(), SessionState::Running);
	assert_eq!(h.session.endpoint(), "E2");
	assert_eq!(kinds(&h.net.sent_json(1)), vec!["hello"]);
}

#[test]
fn stale_events_never_resurrect_an_old_attempt() {
	let h = harness();
	h.session.start();
	h.session.update_endpoint("E2");

	// the superseded attempt finishes late
	h.net.open(0);
	assert_eq!(h.session.state(), SessionState::Initializing);
	assert!(h.net.sent(0).is_empty());

	h.net.open(1);
	assert_eq!(h.session.state(), SessionState::Running);

	// and then dies, which must not affect the current one
	h.net.close_remote(0, 1000, "bye");
	h.net.error(0, "late failure");
	assert_eq!(h.session.state(), SessionState::Running);
	assert!(h.session.is_connected());
	assert_eq!(h.session.stats().stale_events, 3);
}

#[test]
fn messages_from_stale_attempt_are_not_dispatched() {
	let h = harness();
	h.session.start();
	h.net.open(0);
	h.session.update_endpoint("E2");
	h.net.message(0, r#"{"type":"domShift","targetScene":"OLD"}"#);
	assert!(h.sink.commands().is_empty());
}

#[test]
fn endpoint_update_while_idle_connects_to_the_new_endpoint() {
	let h = harness();
	assert_eq!(h.session.update_endpoint("E2"), SessionState::Initializing);
	assert_eq!(h.net.attempts(), vec!["E2"]);
	assert_eq!(h.telemetry.registrations(), 1);

	h.net.open(0);
	assert_eq!(h.session.state(), SessionState::Running);
	assert_eq!(kinds(&h.net.sent_json(0)), vec!["hello"]);

	// already active, so start() adds nothing
	h.session.start();
	assert_eq!(h.net.attempts().len(), 1);
	assert_eq!(h.telemetry.registrations(), 1);
}

#[test]
fn endpoint_update_recovers_from_error() {
	let h = harness();
	h.session.start();
	h.net.error(0, "refused");
	assert_eq!(h.session.state(), SessionState::Error);
	assert_eq!(h.net.close_calls(0), 1);

	h.session.update_endpoint("E2");
	h.net.open(1);
	assert_eq!(h.session.state(), SessionState::Running);
	assert_eq!(h.telemetry.registrations(), 1);
}

#[test]
fn start_after_error_reconnects_without_reregistering() {
	let h = harness();
	h.session.start();
	h.net.open(0);
	h.net.close_remote(0, 1011, "server restart");
	assert_eq!(h.telemetry.active_subscriptions(), 1);

	assert_eq!(h.session.start(), SessionState::Initializing);
	assert_eq!(h.net.attempts(), vec!["E1", "E1"]);
	assert_eq!(h.telemetry.registrations(), 1);
	// the remotely closed connection is not closed a second time
	assert_eq!(h.net.close_calls(0), 0);
}

#[test]
fn rejected_endpoint_moves_to_error() {
	let h = harness();
	h.net.fail_next_open(ConnectError::UnsupportedScheme("http".into()));
	assert_eq!(h.session.start(), SessionState::Error);
	assert!(h.net.attempts().is_empty());
	assert_eq!(h.telemetry.active_subscriptions(), 1);

	h.session.update_endpoint("E2");
	assert_eq!(h.net.attempts(), vec!["E2"]);
}

#[test]
fn missing_telemetry_is_fatal_configuration() {
	let h = harness_with(SessionConfig::new("A", "E1"), FakeTelemetrySource::unavailable());
	assert_eq!(h.session.state(), SessionState::Error);

	assert_eq!(h.session.start(), SessionState::Error);
	assert!(h.net.attempts().is_empty());

	h.session.stop();
	assert_eq!(h.session.state(), SessionState::Closed);
}

#[test]
fn stop_from_every_state_closes_exactly_once() {
	// idle
	let h = harness();
	h.session.stop();
	assert_eq!(h.session.state(), SessionState::Closed);

	// initializing
	let h = harness();
	h.session.start();
	h.session.stop();
	h.session.stop();
	assert_eq!(h.session.state(), SessionState::Closed);
	assert_eq!(h.net.close_calls(0), 1);
	assert_eq!(h.telemetry.active_subscriptions(), 0);

	// running
	let h = harness();
	h.session.start();
	h.net.open(0);
	h.session.stop();
	h.session.stop();
	assert_eq!(h.net.close_calls(0), 1);
	assert_eq!(h.telemetry.unregistrations(), 1);

	// error
	let h = harness();
	h.session.start();
	h.net.open(0);
	h.net.close_remote(0, 1006, "");
	h.session.stop();
	assert_eq!(h.session.state(), SessionState::Closed);
	assert_eq!(h.telemetry.active_subscriptions(), 0);
}

#[test]
fn closed_is_terminal() {
	let h = harness();
	h.session.start();
	h.session.stop();

	h.net.open(0);
	assert_eq!(h.session.state(), SessionState::Closed);
	assert_eq!(h.session.start(), SessionState::Closed);
	assert_eq!(h.session.update_endpoint("E2"), SessionState::Closed);
	h.session.update_device_id("B");
	h.telemetry.emit(sample(1));

	assert_eq!(h.session.state(), SessionState::Closed);
	assert_eq!(h.net.attempts().len(), 1);
	assert_eq!(h.session.endpoint(), "E1");
	assert_eq!(h.session.device_id(), "A");
	assert_eq!(h.telemetry.registrations(), 1);
}

#[test]
fn server_commands_reach_the_sink() {
	let h = harness();
	h.session.start();
	h.net.open(0);

	let raw = r#"{"type":"domShift","targetScene":"CITY_TWIN"}"#;
	h.net.message(0, raw);
	assert_eq!(h.sink.commands(), vec![("domShift".to_string(), raw.to_string())]);
	assert_eq!(h.session.stats().commands_dispatched, 1);
}

#[test]
fn malformed_server_messages_are_dropped_quietly() {
	let h = harness();
	h.session.start();
	h.net.open(0);

	h.net.message(0, "not json");
	h.net.message(0, r#"{"noType":true}"#);
	h.net.binary(0, vec![1, 2, 3]);

	assert!(h.sink.commands().is_empty());
	assert_eq!(h.session.state(), SessionState::Running);
	assert_eq!(h.session.stats().decode_failures, 2);
}

#[test]
fn scene_shift_request_requires_running() {
	let h = harness();
	assert!(!h.session.request_scene_shift("CITY_TWIN", "user"));
	h.session.start();
	assert!(!h.session.request_scene_shift("CITY_TWIN", "user"));

	h.net.open(0);
	assert!(h.session.request_scene_shift("CITY_TWIN", "user"));
	assert_eq!(
		h.net.sent_json(0)[1],
		json!({"type": "domShiftRequest", "deviceId": "A", "targetScene": "CITY_TWIN", "reason": "user"})
	);
}

#[test]
fn sink_may_call_back_into_session() {
	struct ShiftOnCommand {
		session: Mutex<Option<std::sync::Weak<Session>>>,
	}

	impl CommandSink for ShiftOnCommand {
		fn dispatch(&self, command_type: &str, _raw_payload: &str) {
			if let Some(session) = self.session.lock().as_ref().and_then(|weak| weak.upgrade()) {
				session.request_scene_shift(command_type, "echo");
			}
		}
	}

	let (connector, net) = FakeConnector::pair();
	let sink = Arc::new(ShiftOnCommand {
		session: Mutex::new(None),
	});
	let session = Arc::new(Session::new(
		SessionConfig::new("A", "E1"),
		Arc::new(connector),
		Arc::new(FakeTelemetrySource::new()),
		sink.clone(),
	));
	*sink.session.lock() = Some(Arc::downgrade(&session));

	session.start();
	net.open(0);
	net.message(0, r#"{"type":"ping"}"#);
	assert_eq!(kinds(&net.sent_json(0)), vec!["hello", "domShiftRequest"]);
}

#[test]
fn concurrent_reconfiguration_keeps_one_live_connection() {
	let h = harness();
	h.session.start();

	std::thread::scope(|scope| {
		scope.spawn(|| {
			for ts in 0..500 {
				h.telemetry.emit(sample(ts));
			}
		});
		scope.spawn(|| {
			for round in 0..50 {
				h.session.update_endpoint(format!("E{round}"));
				h.session.update_device_id(format!("D{round}"));
			}
		});
	});

	assert_eq!(h.net.max_live_connections(), 1);
	assert_eq!(h.net.live_connections(), 1);
	assert_eq!(h.net.attempts().len(), 51);
	h.session.stop();
	assert_eq!(h.net.live_connections(), 0);
}
