mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Run the worker loop against the configured queue
	Server(tools::server::Subcommand),

	/// Plan and enqueue the source downloads a configured run needs
	EnqueueDownloads(tools::enqueue_downloads::Subcommand),

	/// Plan and enqueue the render jobs a configured run needs
	EnqueueRenders(tools::enqueue_renders::Subcommand),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new().filter_level(cli.verbose.log_level_filter()).format_timestamp(None).init();

	run(cli)
}

fn run(cli: Cli) -> Result<()> {
	match &cli.command {
		Commands::Server(arguments) => tools::server::run(arguments),
		Commands::EnqueueDownloads(arguments) => tools::enqueue_downloads::run(arguments),
		Commands::EnqueueRenders(arguments) => tools::enqueue_renders::run(arguments),
	}
}
