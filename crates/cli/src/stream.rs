//! The `stream` command: one session driven by stdin until Ctrl-C or `quit`.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use posecast::{Session, SessionState, SessionStats};
use posecast_runtime::{SyntheticOrientationSource, WebSocketConnector};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::StreamSettings;
use crate::control::ControlCommand;
use crate::sink::LoggingCommandSink;

/// Snapshot printed by the `status` control command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
	pub state: SessionState,
	pub connected: bool,
	pub endpoint: String,
	pub device_id: String,
	pub generation: u64,
	pub stats: SessionStats,
}

impl StatusReport {
	pub fn capture(session: &Session) -> Self {
		Self {
			state: session.state(),
			connected: session.is_connected(),
			endpoint: session.endpoint(),
			device_id: session.device_id(),
			generation: session.generation(),
			stats: session.stats(),
		}
	}
}

pub async fn run(settings: StreamSettings) -> anyhow::Result<()> {
	let session = Session::new(
		settings.session.clone(),
		Arc::new(WebSocketConnector::from_current()?),
		Arc::new(SyntheticOrientationSource::new(Handle::current())),
		Arc::new(LoggingCommandSink),
	);

	info!(
		target = "posecast.cli",
		endpoint = %settings.session.endpoint,
		device_id = %settings.session.device_id,
		priority = %settings.session.priority,
		"starting stream"
	);
	session.start();

	let interrupted = async {
		match tokio::signal::ctrl_c().await {
			Ok(()) => info!(target = "posecast.cli", "interrupted"),
			Err(err) => {
				warn!(target = "posecast.cli", error = %err, "cannot listen for Ctrl-C");
				std::future::pending::<()>().await;
			}
		}
	};
	drive(&session, settings.retry, BufReader::new(tokio::io::stdin()), interrupted).await;

	session.stop();
	let report = StatusReport::capture(&session);
	info!(
		target = "posecast.cli",
		poses_sent = report.stats.poses_sent,
		commands = report.stats.commands_dispatched,
		attempts = report.stats.connection_attempts,
		"stream stopped"
	);
	Ok(())
}

/// Runs control input and caller-level retry until `shutdown` resolves or
/// a `quit` line arrives. Leaves the session running.
pub async fn drive<R, F>(session: &Session, retry: Option<Duration>, input: R, shutdown: F)
where
	R: AsyncBufRead + Unpin,
	F: Future<Output = ()>,
{
	let mut states = session.watch_state();
	let mut lines = input.lines();
	let mut stdin_open = true;
	let mut retry_at = retry_deadline(*states.borrow_and_update(), retry);
	tokio::pin!(shutdown);

	loop {
		tokio::select! {
			() = &mut shutdown => break,
			changed = states.changed() => {
				if changed.is_err() {
					break;
				}
				retry_at = retry_deadline(*states.borrow_and_update(), retry);
			}
			_ = tokio::time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
				retry_at = None;
				info!(target = "posecast.cli", "retrying");
				session.start();
			}
			line = lines.next_line(), if stdin_open => match line {
				Ok(Some(line)) => {
					if line.trim().is_empty() {
						continue;
					}
					match line.parse::<ControlCommand>() {
						Ok(command) => {
							if apply(session, command).is_break() {
								break;
							}
						}
						Err(err) => warn!(target = "posecast.cli", error = %err, "ignoring control line"),
					}
				}
				Ok(None) => stdin_open = false,
				Err(err) => {
					warn!(target = "posecast.cli", error = %err, "stdin unreadable, control commands disabled");
					stdin_open = false;
				}
			},
		}
	}
}

fn retry_deadline(state: SessionState, retry: Option<Duration>) -> Option<Instant> {
	match (state, retry) {
		(SessionState::Error, Some(delay)) => {
			warn!(target = "posecast.cli", retry_in = ?delay, "session failed");
			Some(Instant::now() + delay)
		}
		(SessionState::Error, None) => {
			warn!(target = "posecast.cli", "session failed; send `endpoint <url>` to reconnect");
			None
		}
		_ => None,
	}
}

/// Applies one control command to the session.
pub fn apply(session: &Session, command: ControlCommand) -> ControlFlow<()> {
	match command {
		ControlCommand::Endpoint(endpoint) => {
			let state = session.update_endpoint(endpoint);
			info!(target = "posecast.cli", %state, "endpoint changed");
		}
		ControlCommand::Device(device_id) => session.update_device_id(device_id),
		ControlCommand::Shift { target_scene, reason } => {
			if !session.request_scene_shift(&target_scene, &reason) {
				warn!(target = "posecast.cli", target_scene = %target_scene, state = %session.state(), "scene shift not sent");
			}
		}
		ControlCommand::Status => match serde_json::to_string(&StatusReport::capture(session)) {
			Ok(json) => println!("{json}"),
			Err(err) => warn!(target = "posecast.cli", error = %err, "cannot render status"),
		},
		ControlCommand::Quit => return ControlFlow::Break(()),
	}
	ControlFlow::Continue(())
}
