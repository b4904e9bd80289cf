//! Orientation telemetry streaming over a persistent WebSocket.
//!
//! A [`Session`] ties three collaborators together:
//!
//! * a [`TelemetrySource`] producing orientation samples
//! * a [`Connector`] producing one connection per attempt
//! * a [`CommandSink`] receiving decoded server commands
//!
//! and decides, through a single state machine, when samples are captured,
//! when a connection is attempted, and what goes on the wire.
//!
//! # Lifecycle
//!
//! ```text
//!            start()               opened                 close / error
//!   Idle ───────────► Initializing ───────► Running ──────────────────► Error
//!                         ▲   ▲                │                          │
//!                         │   └────────────────┘ endpoint update          │
//!                         └───────────────────────────────────────────────┘
//!                                        start() / endpoint update
//!
//!   any state ── stop() ──► Closed (terminal)
//! ```
//!
//! Samples are only forwarded while `Running`; everything else is dropped.
//! Failures surface only as state: observe them with [`Session::state`] or
//! [`Session::watch_state`].
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(
//!     SessionConfig::new("phone-7", "wss://infra.example.com/pose"),
//!     Arc::new(WebSocketConnector::from_current()?),
//!     Arc::new(SyntheticOrientationSource::new(Handle::current())),
//!     Arc::new(NullCommandSink),
//! );
//! session.start();
//! ```

pub mod codec;
pub mod config;
pub mod session;
pub mod sink;
pub mod state;

pub use codec::CodecError;
pub use config::SessionConfig;
pub use posecast_protocol::{ClientMessage, DomShift, ServerMessage};
pub use posecast_runtime::{
	ConnectionEvent, Connector, OrientationSample, SamplingPriority, TelemetrySource, WebSocketConnector,
};
pub use session::Session;
pub use sink::{CommandSink, NullCommandSink};
pub use state::{SessionState, SessionStats};
