mod config;
mod inspect;
mod log;
mod loopback;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::Config;
use inspect::InspectArgs;
use loopback::LoopbackArgs;

#[derive(Parser, Clone, Debug)]
#[command(name = "moqt", version, about = "Inspect and exercise the MOQT protocol engine")]
pub struct Cli {
	/// Load defaults from a TOML file with `[log]` and `[session]` sections.
	#[arg(long = "config", global = true)]
	config_file: Option<PathBuf>,

	#[command(flatten)]
	config: Config,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
	/// Decode hex encoded control frames, a data stream or a datagram.
	Inspect(InspectArgs),

	/// Run a client and server session against each other in memory and print the events.
	Loopback(LoopbackArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let config = match &cli.config_file {
		Some(path) => cli.config.merge(Config::from_file(path)?),
		None => cli.config,
	};
	config.log.init()?;

	tracing::debug!(?config, "loaded config");

	let lines = match cli.command {
		Command::Inspect(args) => inspect::inspect(&args, &config.session)?,
		Command::Loopback(args) => loopback::run(args, config.session).await?,
	};

	for line in lines {
		println!("{line}");
	}

	Ok(())
}
