//! Line-oriented control commands read from stdin while streaming.

use std::str::FromStr;

use thiserror::Error;

/// Reason sent with `shift` when the line gives none.
pub const DEFAULT_SHIFT_REASON: &str = "operator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
	/// `endpoint <url>`
	Endpoint(String),
	/// `device <id>`
	Device(String),
	/// `shift <scene> [reason...]`
	Shift { target_scene: String, reason: String },
	Status,
	Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
	#[error("unknown command `{0}` (expected endpoint, device, shift, status, quit)")]
	Unknown(String),
	#[error("`{0}` needs an argument")]
	MissingArgument(&'static str),
	#[error("`{0}` takes no arguments")]
	UnexpectedArgument(&'static str),
}

impl FromStr for ControlCommand {
	type Err = ControlError;

	fn from_str(line: &str) -> Result<Self, Self::Err> {
		let line = line.trim();
		let (word, rest) = match line.split_once(char::is_whitespace) {
			Some((word, rest)) => (word, rest.trim()),
			None => (line, ""),
		};

		match word.to_lowercase().as_str() {
			"endpoint" => single_argument("endpoint", rest).map(ControlCommand::Endpoint),
			"device" => single_argument("device", rest).map(ControlCommand::Device),
			"shift" => {
				if rest.is_empty() {
					return Err(ControlError::MissingArgument("shift"));
				}
				let (scene, reason) = match rest.split_once(char::is_whitespace) {
					Some((scene, reason)) => (scene, reason.trim()),
					None => (rest, DEFAULT_SHIFT_REASON),
				};
				Ok(ControlCommand::Shift {
					target_scene: scene.to_string(),
					reason: reason.to_string(),
				})
			}
			"status" => no_argument("status", rest).map(|()| ControlCommand::Status),
			"quit" | "exit" => no_argument("quit", rest).map(|()| ControlCommand::Quit),
			_ => Err(ControlError::Unknown(word.to_string())),
		}
	}
}

fn single_argument(command: &'static str, rest: &str) -> Result<String, ControlError> {
	if rest.is_empty() {
		return Err(ControlError::MissingArgument(command));
	}
	Ok(rest.to_string())
}

fn no_argument(command: &'static str, rest: &str) -> Result<(), ControlError> {
	if rest.is_empty() {
		Ok(())
	} else {
		Err(ControlError::UnexpectedArgument(command))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_each_command() {
		assert_eq!(
			"endpoint wss://hub.example/pose".parse(),
			Ok(ControlCommand::Endpoint("wss://hub.example/pose".into()))
		);
		assert_eq!("device rig-9".parse(), Ok(ControlCommand::Device("rig-9".into())));
		assert_eq!("status".parse(), Ok(ControlCommand::Status));
		assert_eq!("quit".parse(), Ok(ControlCommand::Quit));
		assert_eq!("exit".parse(), Ok(ControlCommand::Quit));
	}

	#[test]
	fn shift_reason_keeps_spaces() {
		assert_eq!(
			"shift CITY_TWIN user asked for the city".parse(),
			Ok(ControlCommand::Shift {
				target_scene: "CITY_TWIN".into(),
				reason: "user asked for the city".into(),
			})
		);
	}

	#[test]
	fn shift_without_reason_uses_default() {
		assert_eq!(
			"shift LAB".parse(),
			Ok(ControlCommand::Shift {
				target_scene: "LAB".into(),
				reason: DEFAULT_SHIFT_REASON.into(),
			})
		);
	}

	#[test]
	fn surrounding_whitespace_and_case_are_ignored() {
		assert_eq!("  STATUS \n".parse(), Ok(ControlCommand::Status));
		assert_eq!("Device   rig-1  ".parse(), Ok(ControlCommand::Device("rig-1".into())));
	}

	#[test]
	fn bad_lines_are_reported() {
		assert_eq!("endpoint".parse::<ControlCommand>(), Err(ControlError::MissingArgument("endpoint")));
		assert_eq!("shift".parse::<ControlCommand>(), Err(ControlError::MissingArgument("shift")));
		assert_eq!("status now".parse::<ControlCommand>(), Err(ControlError::UnexpectedArgument("status")));
		assert_eq!("jump".parse::<ControlCommand>(), Err(ControlError::Unknown("jump".into())));
	}
}
