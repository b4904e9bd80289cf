use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use posecast_runtime::SamplingPriority;

#[derive(Parser, Debug)]
#[command(name = "posecast")]
#[command(about = "Stream device orientation to a remote service over WebSocket")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Config file (defaults to <config dir>/posecast/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Connect and stream orientation until Ctrl-C or `quit`
	///
	/// Control lines read from stdin: `endpoint <url>`, `device <id>`,
	/// `shift <scene> [reason...]`, `status`, `quit`.
	Stream(StreamArgs),

	/// Inspect the configuration file
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Args, Debug, Clone, Default)]
pub struct StreamArgs {
	/// WebSocket endpoint (ws:// or wss://)
	#[arg(long, env = "POSECAST_ENDPOINT", value_name = "URL")]
	pub endpoint: Option<String>,

	/// Identity announced in every hello
	#[arg(long, env = "POSECAST_DEVICE_ID", value_name = "ID")]
	pub device_id: Option<String>,

	/// Sensor sampling priority: normal, ui, game, fastest
	#[arg(long, value_name = "PRIORITY")]
	pub priority: Option<SamplingPriority>,

	/// Capability advertised in hello (repeatable)
	#[arg(long = "capability", value_name = "NAME")]
	pub capabilities: Vec<String>,

	/// Restart the session this many seconds after it fails
	#[arg(long, value_name = "SECS")]
	pub retry_secs: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
	/// Print the file configuration with defaults applied
	Show,
	/// Print the config file location
	Path,
}
