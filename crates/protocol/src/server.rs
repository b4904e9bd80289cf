//! Messages sent from the remote service to the device.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound command envelope.
///
/// Server commands are free-form apart from the `type` discriminator:
///
/// ```json
/// {"type":"domShift","targetScene":"CITY_TWIN"}
/// ```
///
/// Everything other than `type` is kept in [`ServerMessage::fields`] for the
/// consumer to interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
	/// Command discriminator.
	#[serde(rename = "type")]
	pub kind: String,
	/// Remaining command-specific fields.
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}

/// Typed view of a `domShift` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomShift {
	/// Scene the device should switch to. Older servers send `targetNode`.
	#[serde(alias = "targetNode")]
	pub target_scene: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

impl ServerMessage {
	/// Command type of a scene switch issued by the server.
	pub const DOM_SHIFT: &'static str = "domShift";

	/// Returns the typed `domShift` payload, if this is one and it is well formed.
	pub fn dom_shift(&self) -> Option<DomShift> {
		if self.kind != Self::DOM_SHIFT {
			return None;
		}
		serde_json::from_value(Value::Object(self.fields.clone())).ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn envelope_keeps_extra_fields() {
		let msg: ServerMessage = serde_json::from_str(r#"{"type":"config","rateHz":30,"mode":"low"}"#).unwrap();
		assert_eq!(msg.kind, "config");
		assert_eq!(msg.fields["rateHz"], 30);
		assert_eq!(msg.fields["mode"], "low");
		assert!(!msg.fields.contains_key("type"));
	}

	#[test]
	fn dom_shift_accepts_legacy_target_node() {
		let msg: ServerMessage = serde_json::from_str(r#"{"type":"domShift","targetNode":"CITY_TWIN"}"#).unwrap();
		let shift = msg.dom_shift().expect("domShift should decode");
		assert_eq!(shift.target_scene, "CITY_TWIN");
		assert_eq!(shift.reason, None);
	}

	#[test]
	fn dom_shift_view_is_none_for_other_commands() {
		let msg: ServerMessage = serde_json::from_str(r#"{"type":"config","targetScene":"X"}"#).unwrap();
		assert!(msg.dom_shift().is_none());
	}

	#[test]
	fn dom_shift_without_target_is_none() {
		let msg: ServerMessage = serde_json::from_str(r#"{"type":"domShift","reason":"x"}"#).unwrap();
		assert!(msg.dom_shift().is_none());
	}
}
