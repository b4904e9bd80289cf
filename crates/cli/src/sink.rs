use posecast::CommandSink;
use posecast_protocol::ServerMessage;
use tracing::{info, warn};

/// Logs every server command; `domShift` gets its fields pulled out.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCommandSink;

impl CommandSink for LoggingCommandSink {
	fn dispatch(&self, command_type: &str, raw_payload: &str) {
		if command_type != ServerMessage::DOM_SHIFT {
			info!(target = "posecast.cli", command = command_type, payload = raw_payload, "server command");
			return;
		}

		let shift = serde_json::from_str::<ServerMessage>(raw_payload)
			.ok()
			.and_then(|message| message.dom_shift());
		match shift {
			Some(shift) => info!(
				target = "posecast.cli",
				target_scene = %shift.target_scene,
				reason = shift.reason.as_deref().unwrap_or(""),
				"server requested scene shift"
			),
			None => warn!(target = "posecast.cli", payload = raw_payload, "malformed domShift"),
		}
	}
}
