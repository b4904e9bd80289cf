//! Session construction parameters.

use posecast_runtime::SamplingPriority;

/// Identity and target of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
	/// Identity announced in every `hello`.
	pub device_id: String,
	/// `ws://` or `wss://` address of the remote service.
	pub endpoint: String,
	/// Feature list advertised in `hello`; empty keeps it off the wire.
	pub capabilities: Vec<String>,
	/// Rate requested from the telemetry source.
	pub priority: SamplingPriority,
}

impl SessionConfig {
	pub fn new(device_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
		Self {
			device_id: device_id.into(),
			endpoint: endpoint.into(),
			capabilities: Vec::new(),
			priority: SamplingPriority::Game,
		}
	}

	/// Sets the capabilities advertised in `hello`.
	pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.capabilities = capabilities.into_iter().map(Into::into).collect();
		self
	}

	/// Sets the telemetry sampling priority.
	pub fn with_priority(mut self, priority: SamplingPriority) -> Self {
		self.priority = priority;
		self
	}
}
