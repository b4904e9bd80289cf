//! Collaborator contracts and adapters for posecast sessions.
//!
//! The session state machine in `posecast` talks to two external parties:
//!
//! * a [`TelemetrySource`] that delivers orientation samples through a callback
//! * a [`Connector`] that opens bidirectional text channels and reports their
//!   lifecycle as [`ConnectionEvent`]s
//!
//! This crate defines both contracts and ships the concrete adapters used by the
//! CLI ([`WebSocketConnector`], [`SyntheticOrientationSource`]) plus in-memory
//! doubles in [`fake`] for driving a session deterministically in tests.
//!
//! Every callback-style method here may be invoked while the caller holds its
//! own lock, so implementations must never call back into a sink synchronously
//! from `register`, `unregister`, `open`, `send` or `close`.

pub mod connection;
pub mod fake;
pub mod synthetic;
pub mod telemetry;
pub mod websocket;

pub use connection::{ConnectError, ConnectionEvent, ConnectionHandle, Connector, EventSink};
pub use synthetic::SyntheticOrientationSource;
pub use telemetry::{OrientationSample, SampleSink, SamplingPriority, SubscriptionId, TelemetryError, TelemetrySource};
pub use websocket::WebSocketConnector;
