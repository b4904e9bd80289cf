//! Configuration file and settings resolution.
//!
//! Precedence, highest first: command-line flag, environment variable
//! (handled by clap), config file, built-in default.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use posecast::SessionConfig;
use posecast_runtime::SamplingPriority;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cli::StreamArgs;

pub const DEFAULT_DEVICE_ID: &str = "posecast-device";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("invalid config file {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
	#[error("no config directory on this platform; pass --config")]
	NoConfigDir,
	#[error("no endpoint configured; pass --endpoint, set POSECAST_ENDPOINT, or add \"endpoint\" to the config file")]
	MissingEndpoint,
}

/// Contents of `config.json`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PosecastConfig {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub endpoint: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub device_id: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub capabilities: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub priority: Option<SamplingPriority>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub retry_secs: Option<u64>,
}

impl PosecastConfig {
	/// Fills the keys that have a built-in default.
	pub fn with_defaults(mut self) -> Self {
		self.device_id.get_or_insert_with(|| DEFAULT_DEVICE_ID.to_string());
		self.priority.get_or_insert_with(SamplingPriority::default);
		self
	}
}

/// Everything `stream` needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
	pub session: SessionConfig,
	/// Delay before restarting a failed session; `None` disables retry.
	pub retry: Option<Duration>,
}

pub fn default_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("posecast").join("config.json"))
}

/// The explicit `--config` path, or the per-user default.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
	match explicit {
		Some(path) => Ok(path.to_path_buf()),
		None => default_path().ok_or(ConfigError::NoConfigDir),
	}
}

/// Loads the config file. A missing file yields the empty config.
pub fn load(path: &Path) -> Result<PosecastConfig, ConfigError> {
	let content = match std::fs::read_to_string(path) {
		Ok(content) => content,
		Err(err) if err.kind() == ErrorKind::NotFound => {
			debug!(target = "posecast.cli", path = %path.display(), "no config file, using defaults");
			return Ok(PosecastConfig::default());
		}
		Err(source) => {
			return Err(ConfigError::Read {
				path: path.to_path_buf(),
				source,
			});
		}
	};
	serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
		path: path.to_path_buf(),
		source,
	})
}

/// Layers command-line arguments over the file.
pub fn resolve(args: &StreamArgs, file: PosecastConfig) -> Result<StreamSettings, ConfigError> {
	let file = file.with_defaults();

	let endpoint = args.endpoint.clone().or(file.endpoint).ok_or(ConfigError::MissingEndpoint)?;
	let device_id = args
		.device_id
		.clone()
		.or(file.device_id)
		.unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string());
	let capabilities = if args.capabilities.is_empty() {
		file.capabilities
	} else {
		args.capabilities.clone()
	};
	let priority = args.priority.or(file.priority).unwrap_or_default();
	let retry = args
		.retry_secs
		.or(file.retry_secs)
		.filter(|secs| *secs > 0)
		.map(Duration::from_secs);

	Ok(StreamSettings {
		session: SessionConfig::new(device_id, endpoint)
			.with_capabilities(capabilities)
			.with_priority(priority),
		retry,
	})
}
