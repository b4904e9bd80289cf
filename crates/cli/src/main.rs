use clap::Parser;
use posecast_cli::cli::{Cli, Commands, ConfigAction};
use posecast_cli::{config, logging, stream};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = run(cli).await {
		error!(target = "posecast.cli", error = %err, "command failed");
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> anyhow::Result<()> {
	let path = config::config_path(cli.config.as_deref())?;
	match cli.command {
		Commands::Stream(args) => {
			let file = config::load(&path)?;
			let settings = config::resolve(&args, file)?;
			stream::run(settings).await
		}
		Commands::Config { action: ConfigAction::Path } => {
			println!("{}", path.display());
			Ok(())
		}
		Commands::Config { action: ConfigAction::Show } => {
			let effective = config::load(&path)?.with_defaults();
			println!("{}", serde_json::to_string_pretty(&effective)?);
			Ok(())
		}
	}
}
