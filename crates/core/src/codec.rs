//! Encoding of outbound messages and decoding of server commands.

use posecast_protocol::{ClientMessage, ServerMessage};
use posecast_runtime::OrientationSample;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
	#[error("failed to encode {kind} message: {source}")]
	Encode {
		kind: &'static str,
		#[source]
		source: serde_json::Error,
	},
	#[error("inbound message is not valid JSON: {0}")]
	Json(#[source] serde_json::Error),
	#[error("inbound message is not a JSON object")]
	NotAnObject,
	#[error("inbound message has no string `type`")]
	MissingType,
}

/// Serializes an outbound message to its wire text.
pub fn encode(message: &ClientMessage) -> Result<String, CodecError> {
	serde_json::to_string(message).map_err(|source| CodecError::Encode {
		kind: message.kind(),
		source,
	})
}

/// Builds the `hello` handshake.
pub fn hello(device_id: &str, capabilities: &[String]) -> ClientMessage {
	ClientMessage::Hello {
		device_id: device_id.to_string(),
		capabilities: capabilities.to_vec(),
	}
}

/// Builds a `pose` from a sample.
///
/// Returns `None` for samples with fewer than three components or with
/// non-finite values, which cannot be represented on the wire.
pub fn pose(sample: &OrientationSample) -> Option<ClientMessage> {
	let rv = sample.vector3()?;
	if !rv.iter().all(|c| c.is_finite()) {
		return None;
	}
	Some(ClientMessage::Pose {
		ts: sample.timestamp_nanos,
		rv,
	})
}

/// Parses inbound text into a command envelope.
pub fn decode(text: &str) -> Result<ServerMessage, CodecError> {
	let value: Value = serde_json::from_str(text).map_err(CodecError::Json)?;
	let Value::Object(object) = value else {
		return Err(CodecError::NotAnObject);
	};
	match object.get("type") {
		Some(Value::String(kind)) if !kind.is_empty() => {}
		_ => return Err(CodecError::MissingType),
	}
	serde_json::from_value(Value::Object(object)).map_err(CodecError::Json)
}
