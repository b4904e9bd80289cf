//! Synthetic orientation source.
//!
//! Stands in for a device rotation-vector sensor: each subscription gets its
//! own tokio task that emits a unit quaternion slowly spinning about a tilted
//! axis, encoded the way Android reports `TYPE_ROTATION_VECTOR`
//! (`[x·sin(θ/2), y·sin(θ/2), z·sin(θ/2), cos(θ/2)]`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::telemetry::{OrientationSample, SampleSink, SamplingPriority, SubscriptionId, TelemetryError, TelemetrySource};

/// Floor for `SamplingPriority::Fastest` so the task still yields.
const FASTEST_INTERVAL: Duration = Duration::from_millis(5);
/// Radians per second around the spin axis.
const ANGULAR_SPEED: f64 = 0.5;

pub struct SyntheticOrientationSource {
	runtime: Handle,
	epoch: Instant,
	next_id: AtomicU64,
	tasks: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl SyntheticOrientationSource {
	pub fn new(runtime: Handle) -> Self {
		Self {
			runtime,
			epoch: Instant::now(),
			next_id: AtomicU64::new(1),
			tasks: Mutex::new(HashMap::new()),
		}
	}

	/// Reading at `elapsed` since the source was created.
	pub fn sample_at(elapsed: Duration) -> OrientationSample {
		let theta = elapsed.as_secs_f64() * ANGULAR_SPEED;
		let (sin, cos) = (theta / 2.0).sin_cos();
		// normalised (1, 2, 2) / 3
		let axis = [1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0];
		let components = vec![(axis[0] * sin) as f32, (axis[1] * sin) as f32, (axis[2] * sin) as f32, cos as f32];
		let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
		OrientationSample::new(nanos, components)
	}
}

impl TelemetrySource for SyntheticOrientationSource {
	fn is_available(&self) -> bool {
		true
	}

	fn register(&self, priority: SamplingPriority, sink: SampleSink) -> Result<SubscriptionId, TelemetryError> {
		let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
		let period = priority.interval().max(FASTEST_INTERVAL);
		let epoch = self.epoch;

		let task = self.runtime.spawn(async move {
			let mut ticker = tokio::time::interval(period);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
			// first tick completes immediately
			ticker.tick().await;
			loop {
				ticker.tick().await;
				sink(SyntheticOrientationSource::sample_at(epoch.elapsed()));
			}
		});

		debug!(target = "posecast.telemetry", subscription = id.0, %priority, ?period, "synthetic source registered");
		self.tasks.lock().insert(id, task);
		Ok(id)
	}

	fn unregister(&self, subscription: SubscriptionId) {
		if let Some(task) = self.tasks.lock().remove(&subscription) {
			task.abort();
			debug!(target = "posecast.telemetry", subscription = subscription.0, "synthetic source unregistered");
		}
	}
}

impl Drop for SyntheticOrientationSource {
	fn drop(&mut self) {
		for (_, task) in self.tasks.lock().drain() {
			task.abort();
		}
	}
}
