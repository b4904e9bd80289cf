//! Messages sent from the device to the remote service.

use serde::{Deserialize, Serialize};

/// Outbound message union.
///
/// Internally tagged on `type`, so the discriminator is always the first key:
///
/// ```json
/// {"type":"hello","deviceId":"A"}
/// {"type":"pose","ts":100,"rv":[1.0,2.0,3.0]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
	/// Identity handshake, sent after every open and on identity change.
	Hello {
		device_id: String,
		/// Optional feature list; omitted from the wire when empty.
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		capabilities: Vec<String>,
	},
	/// One orientation sample.
	Pose {
		/// Capture timestamp in nanoseconds (monotonic clock of the source).
		ts: i64,
		/// First three components of the rotation vector.
		rv: [f32; 3],
	},
	/// Ask the remote side to move this device to another scene.
	DomShiftRequest {
		device_id: String,
		target_scene: String,
		reason: String,
	},
}

impl ClientMessage {
	/// Wire name of the message kind.
	pub fn kind(&self) -> &'static str {
		match self {
			ClientMessage::Hello { .. } => "hello",
			ClientMessage::Pose { .. } => "pose",
			ClientMessage::DomShiftRequest { .. } => "domShiftRequest",
		}
	}
}
