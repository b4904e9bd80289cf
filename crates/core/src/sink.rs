//! Consumer side of inbound server commands.

/// Receives every successfully decoded server command.
///
/// Called once per message, outside the session lock, so implementations may
/// call back into the session. A message whose connection was replaced or
/// stopped before dispatch is discarded instead. Interpretation of the payload
/// is entirely the sink's concern.
pub trait CommandSink: Send + Sync {
	/// `command_type` is the message's `type`; `raw_payload` is the full JSON text.
	fn dispatch(&self, command_type: &str, raw_payload: &str);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCommandSink;

impl CommandSink for NullCommandSink {
	fn dispatch(&self, _command_type: &str, _raw_payload: &str) {}
}
