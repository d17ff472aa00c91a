use crate::tools::jobs_file::file_backed_queue;
use anyhow::Result;
use joerd_core::config::Config;
use joerd_core::progress::ProgressFactory;
use joerd_planner::DownloadPlanner;
use joerd_queue::{Dispatcher, build_queue};
use joerd_store::build_store;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct Subcommand {
	/// The path to the joerd configuration file
	#[arg(long)]
	config: PathBuf,

	/// Append planned jobs to this newline-delimited-JSON file instead of
	/// sending them to the configured queue
	#[arg(long)]
	jobs_file: Option<PathBuf>,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let config = Config::load(&arguments.config)?;
	let source_store = build_store(&config.source_store)?;

	let queue = match &arguments.jobs_file {
		Some(path) => file_backed_queue(path)?,
		None => build_queue(&config.cluster.queue)?,
	};

	let skip_existing = std::env::var_os("SKIP_EXISTING").is_some();
	let mut dispatcher = Dispatcher::new(queue, config.cluster.block_size);
	let progress = ProgressFactory::auto();

	let planner = DownloadPlanner::from_config(&config, source_store)?;
	planner.run(&mut dispatcher, &progress, skip_existing)
}

#[cfg(test)]
mod tests {
	use crate::tests::run_command;

	#[test]
	fn requires_a_config_path() {
		let err = run_command(vec!["joerd", "enqueue-downloads"]).unwrap_err().to_string();
		assert!(err.contains("--config"));
	}

	#[test]
	fn rejects_a_missing_config_file() {
		let err = run_command(vec!["joerd", "enqueue-downloads", "--config", "/nonexistent/config.yaml"]).unwrap_err().to_string();
		assert!(err.contains("Failed to load configuration"));
	}
}
