//! Telemetry source contract.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One orientation reading.
///
/// `components` is the raw rotation representation reported by the sensor; only
/// the first three are meaningful to the wire protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationSample {
	/// Monotonic capture timestamp in nanoseconds.
	pub timestamp_nanos: i64,
	pub components: Vec<f32>,
}

impl OrientationSample {
	pub fn new(timestamp_nanos: i64, components: impl Into<Vec<f32>>) -> Self {
		Self {
			timestamp_nanos,
			components: components.into(),
		}
	}

	/// First three components, or `None` when the reading is too short.
	pub fn vector3(&self) -> Option<[f32; 3]> {
		match self.components.as_slice() {
			[x, y, z, ..] => Some([*x, *y, *z]),
			_ => None,
		}
	}
}

/// Requested delivery rate for a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPriority {
	Normal,
	Ui,
	/// Rate used by streaming sessions.
	#[default]
	Game,
	Fastest,
}

impl SamplingPriority {
	/// Nominal interval between samples. `Fastest` means "as fast as the source can".
	pub fn interval(self) -> Duration {
		match self {
			SamplingPriority::Normal => Duration::from_millis(200),
			SamplingPriority::Ui => Duration::from_millis(60),
			SamplingPriority::Game => Duration::from_millis(20),
			SamplingPriority::Fastest => Duration::ZERO,
		}
	}
}

impl fmt::Display for SamplingPriority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SamplingPriority::Normal => write!(f, "normal"),
			SamplingPriority::Ui => write!(f, "ui"),
			SamplingPriority::Game => write!(f, "game"),
			SamplingPriority::Fastest => write!(f, "fastest"),
		}
	}
}

impl std::str::FromStr for SamplingPriority {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"normal" => Ok(SamplingPriority::Normal),
			"ui" => Ok(SamplingPriority::Ui),
			"game" => Ok(SamplingPriority::Game),
			"fastest" => Ok(SamplingPriority::Fastest),
			_ => Err(format!("unknown sampling priority: {s}")),
		}
	}
}

/// Opaque handle returned by [`TelemetrySource::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Callback receiving samples until the subscription is removed.
pub type SampleSink = Arc<dyn Fn(OrientationSample) + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
	#[error("orientation telemetry is not available on this device")]
	Unavailable,
	#[error("telemetry registration failed: {0}")]
	Registration(String),
}

/// Asynchronous producer of orientation samples.
pub trait TelemetrySource: Send + Sync {
	/// Whether the underlying capability exists at all.
	fn is_available(&self) -> bool;

	/// Starts delivering samples to `sink`. Must not call `sink` before returning.
	fn register(&self, priority: SamplingPriority, sink: SampleSink) -> Result<SubscriptionId, TelemetryError>;

	/// Stops delivery for `subscription`. Unknown ids are ignored.
	fn unregister(&self, subscription: SubscriptionId);
}
