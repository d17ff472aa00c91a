//! `--jobs-file` support, shared by all three subcommands. The original
//! pipeline accepted this flag on every subcommand but never wired it to
//! anything; here it gives every subcommand a way to run against a local
//! newline-delimited-JSON file instead of a live queue backend, useful for
//! exercising a full download-then-render run without a cluster.

use anyhow::{Context, Result};
use joerd_core::job::Job;
use joerd_queue::{InProcessQueue, Queue};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A queue that appends one job per line to `path` instead of sending
/// anywhere, for `enqueue-downloads`/`enqueue-renders --jobs-file`.
pub fn file_backed_queue(path: &Path) -> Result<Arc<dyn Queue>> {
	let file = OpenOptions::new().create(true).append(true).open(path).with_context(|| format!("opening jobs file {path:?} for append"))?;
	let file = Mutex::new(file);
	Ok(Arc::new(InProcessQueue::new(Arc::new(move |job: &Job| {
		let mut line = serde_json::to_string(job)?;
		line.push('\n');
		file.lock().unwrap().write_all(line.as_bytes())?;
		Ok(())
	}))))
}

/// Reads every job out of a `--jobs-file`, for `server --jobs-file`.
pub fn read_jobs(path: &Path) -> Result<Vec<Job>> {
	let file = std::fs::File::open(path).with_context(|| format!("opening jobs file {path:?} for read"))?;
	BufReader::new(file)
		.lines()
		.filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
		.map(|line| {
			let line = line.context("reading a line from the jobs file")?;
			serde_json::from_str(&line).with_context(|| format!("parsing job line {line:?}"))
		})
		.collect()
}
