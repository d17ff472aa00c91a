use crate::tools::jobs_file::read_jobs;
use anyhow::Result;
use joerd_core::JoerdError;
use joerd_core::config::Config;
use joerd_queue::build_queue;
use joerd_worker::Worker;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct Subcommand {
	/// The path to the joerd configuration file
	#[arg(long)]
	config: PathBuf,

	/// Process every job in this newline-delimited-JSON file once and exit,
	/// instead of polling the configured queue forever
	#[arg(long)]
	jobs_file: Option<PathBuf>,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let config = Config::load(&arguments.config)?;
	let worker = Worker::from_config(&config)?;

	match &arguments.jobs_file {
		Some(path) => run_from_file(&worker, path),
		None => {
			let queue = build_queue(&config.cluster.queue)?;
			worker.run(queue.as_ref())
		}
	}
}

fn run_from_file(worker: &Worker, path: &std::path::Path) -> Result<()> {
	let jobs = read_jobs(path)?;
	log::info!("processing {} jobs from {path:?}", jobs.len());

	for job in jobs {
		if let Err(err) = worker.process_job(job) {
			match JoerdError::kind_of(&err) {
				Some(kind) if kind.is_job_fatal() => log::error!("job failed, skipping: {kind}"),
				_ => return Err(err),
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use crate::tests::run_command;

	#[test]
	fn requires_a_config_path() {
		let err = run_command(vec!["joerd", "server"]).unwrap_err().to_string();
		assert!(err.contains("--config"));
	}

	#[test]
	fn rejects_a_missing_config_file() {
		let err = run_command(vec!["joerd", "server", "--config", "/nonexistent/config.yaml"]).unwrap_err().to_string();
		assert!(err.contains("Failed to load configuration"));
	}
}
