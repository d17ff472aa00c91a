use crate::tools::jobs_file::file_backed_queue;
use anyhow::Result;
use joerd_core::config::Config;
use joerd_core::progress::ProgressFactory;
use joerd_planner::RenderPlanner;
use joerd_queue::{GroupingDispatcher, build_queue};
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

	let mut dispatcher = GroupingDispatcher::new(queue, config.cluster.block_size, queue_batch_bytes());
	let progress = ProgressFactory::auto();

	let planner = RenderPlanner::from_config(&config, source_store)?;
	planner.run(&mut dispatcher, &progress)
}

/// Matches the wire format's own batch-size ceiling (§6), since a
/// `GroupingDispatcher` has to bound each grouped batch independently of
/// whatever the underlying queue's own per-message limit happens to be.
fn queue_batch_bytes() -> usize {
	256 * 1024
}
