//! The job processing loop (§6), grounded in `original_source/joerd/
//! server.py`'s `Server` class: one worker owns every registered source and
//! output plugin plus the two stores, and turns each received message into
//! either a download (fetch, unpack, verify) or a render (materialize local
//! VRTs, composite, upload).

use crate::mock_source::MockSource;
use anyhow::{Context, Result, bail};
use joerd_compositor::CompositeSource;
use joerd_core::config::Config;
use joerd_core::job::{DownloadJob, Job, RenderBatchJob, RenderJob, SourceReference};
use joerd_core::{JoerdError, OutputTileKey};
use joerd_derive::context;
use joerd_download::{Downloader, download_tile};
use joerd_outputs::{OutputPlugin, build_output};
use joerd_queue::{Queue, QueueMessage, build_queue};
use joerd_sources::{SourcePlugin, build_source};
use joerd_store::{BlobStore, build_store};
use std::collections::HashMap;
use std::sync::Arc;

/// How many times a single URL is retried before a download job fails,
/// matching the baseline pipeline's default retry count.
const DEFAULT_TRIES: u32 = 5;

pub struct Worker {
	sources: HashMap<String, Arc<dyn SourcePlugin>>,
	outputs: HashMap<String, Arc<dyn OutputPlugin>>,
	store: Arc<dyn BlobStore>,
	source_store: Arc<dyn BlobStore>,
	downloader: Downloader,
	tries: u32,
	/// Where a `renderbatch`'s individually-failing tiles are re-enqueued
	/// (§9 Open Question 4), so one bad tile doesn't force redelivery of
	/// every tile in the batch it arrived in. The same queue the worker
	/// receives messages from.
	requeue: Arc<dyn Queue>,
	/// Disk-space reclaiming for `source_store`, disabled by default (§5).
	reclaim: joerd_core::ReclaimPolicy,
}

impl Worker {
	#[must_use]
	pub fn new(sources: HashMap<String, Arc<dyn SourcePlugin>>, outputs: HashMap<String, Arc<dyn OutputPlugin>>, store: Arc<dyn BlobStore>, source_store: Arc<dyn BlobStore>, downloader: Downloader, tries: u32, requeue: Arc<dyn Queue>, reclaim: joerd_core::ReclaimPolicy) -> Self {
		Worker { sources, outputs, store, source_store, downloader, tries, requeue, reclaim }
	}

	#[context("Failed to build a worker from configuration")]
	pub fn from_config(config: &Config) -> Result<Self> {
		let regions: Vec<_> = config.regions.values().copied().collect();

		let mut sources: HashMap<String, Arc<dyn SourcePlugin>> = HashMap::new();
		for (name, plugin) in &config.sources {
			sources.insert(plugin.kind.clone(), build_source(name, plugin)?);
		}

		let mut outputs: HashMap<String, Arc<dyn OutputPlugin>> = HashMap::new();
		for plugin in config.outputs.values() {
			let output = build_output(&plugin.kind, regions.clone())?;
			outputs.insert(output.name().to_string(), output);
		}

		let store = build_store(&config.store)?;
		let source_store = build_store(&config.source_store)?;
		let downloader = Downloader::new()?;
		let requeue = build_queue(&config.cluster.queue)?;

		Ok(Worker::new(sources, outputs, store, source_store, downloader, DEFAULT_TRIES, requeue, config.reclaim.clone()))
	}

	fn source_for(&self, data: &serde_json::Value) -> Result<&Arc<dyn SourcePlugin>> {
		let kind = data["type"].as_str().context("job data is missing a \"type\" field")?;
		self.sources.get(kind).with_context(|| format!("no source of type {kind:?} is configured"))
	}

	fn output_for(&self, data: &serde_json::Value) -> Result<&Arc<dyn OutputPlugin>> {
		let kind = data["type"].as_str().context("job data is missing a \"type\" field")?;
		self.outputs.get(kind).with_context(|| format!("no output of type {kind:?} is configured"))
	}

	/// Runs the full receive-process-ack loop against `queue` until it stops
	/// returning messages to process. A job-fatal error is logged and the
	/// message is left un-acked so the queue's own visibility timeout lets
	/// another worker retry it; anything else propagates and ends the loop
	/// (§6: "ack-on-success-only").
	pub fn run(&self, queue: &dyn Queue) -> Result<()> {
		loop {
			let messages = queue.receive_messages()?;
			if messages.is_empty() {
				return Ok(());
			}
			for message in messages {
				self.handle_message(message.as_ref())?;
			}
		}
	}

	fn handle_message(&self, message: &dyn QueueMessage) -> Result<()> {
		let job = message.job()?;
		match self.process_job(job) {
			Ok(()) => message.ack(),
			Err(err) => {
				if let Some(kind) = JoerdError::kind_of(&err) {
					log::error!("job failed, leaving message un-acked: {kind}");
					if kind.is_job_fatal() {
						return Ok(());
					}
				}
				Err(err)
			}
		}
	}

	pub fn process_job(&self, job: Job) -> Result<()> {
		match job {
			Job::Download(download) => self.process_download(download),
			Job::Render(render) => self.process_render(render),
			Job::Renderbatch(batch) => self.process_renderbatch(batch),
		}
	}

	/// `renderbatch` is expanded into its constituent tiles and each is
	/// rendered independently; a tile that fails is re-enqueued as its own
	/// `render` job rather than failing the whole message (§9 Open Question
	/// 4). Many of the batch's other tiles have likely already rendered and
	/// uploaded by the time one fails, so they must not be penalized by a
	/// batch-level redelivery that would redo all of them.
	fn process_renderbatch(&self, batch: RenderBatchJob) -> Result<()> {
		for render in batch.expand()? {
			if let Err(err) = self.process_render(render.clone()) {
				log::error!("render job in batch failed, re-enqueuing individually: {err:#}");
				self.requeue_render(render)?;
			}
		}
		Ok(())
	}

	/// Sends one tile back onto the queue as a standalone `render` job.
	fn requeue_render(&self, render: RenderJob) -> Result<()> {
		let job_json = serde_json::to_string(&Job::Render(render)).context("serializing a render job for re-enqueue")?;
		self.requeue.send_batch(vec![job_json]).context("re-enqueuing a failed render job")
	}

	/// `_run_job_download` in the baseline pipeline: rehydrate the tile,
	/// download every URL it names, unpack into the source store, then
	/// assert the unpack actually produced the output the tile promised.
	#[context("Failed to process a download job")]
	fn process_download(&self, job: DownloadJob) -> Result<()> {
		let source = self.source_for(&job.data)?;
		let tile = source.rehydrate(&job.data)?;

		let downloads = download_tile(tile.as_ref(), &self.downloader, self.tries)?;
		tile.unpack(&downloads, self.source_store.as_ref())?;

		if !self.source_store.exists(&tile.output_file()) {
			bail!(JoerdError::UnpackFailed { output_file: tile.output_file() });
		}

		self.reclaim_after_download(source.as_ref(), &tile.output_file())?;
		Ok(())
	}

	/// Runs the configured [`joerd_core::ReclaimPolicy`] against the source
	/// store once a download lands, so the store is kept under its
	/// `min_free_bytes` headroom as a matter of course rather than only once
	/// a later download fails with `OutOfSpace`. A no-op when the policy is
	/// disabled (the default) or the source store has no local filesystem
	/// root to reclaim from (a remote object store).
	fn reclaim_after_download(&self, source: &dyn SourcePlugin, just_downloaded: &str) -> Result<()> {
		if matches!(self.reclaim, joerd_core::ReclaimPolicy::Disabled) {
			return Ok(());
		}
		let Some(source_dir) = self.source_store.local_root() else {
			return Ok(());
		};

		let candidates: Vec<std::path::PathBuf> = source.existing_files()?.into_iter().map(std::path::PathBuf::from).collect();
		let keep = [std::path::PathBuf::from(just_downloaded)];
		self.reclaim.reclaim(source_dir, 0, &candidates, &keep)
	}

	/// `_download_local_vrts` in the baseline pipeline: fetches every path a
	/// render job's `SourceReference` names into a scratch directory, one
	/// file per path, and returns the rewritten local-path groups in the
	/// same nested shape. An empty group (a source with nothing
	/// contributing) is dropped rather than materialized.
	fn download_local_vrts(&self, reference: &SourceReference, tmp_dir: &std::path::Path) -> Result<Vec<Vec<String>>> {
		let mut groups = Vec::with_capacity(reference.vrts.len());
		for (group_idx, group) in reference.vrts.iter().enumerate() {
			if group.is_empty() {
				continue;
			}
			let mut local_paths = Vec::with_capacity(group.len());
			for (file_idx, path) in group.iter().enumerate() {
				let local_path = tmp_dir.join(format!("{group_idx}-{file_idx}-{}", sanitize_file_name(path)));
				self.source_store.get(path, &local_path).with_context(|| format!("fetching source file {path:?} for local compositing"))?;
				local_paths.push(local_path.to_string_lossy().into_owned());
			}
			groups.push(local_paths);
		}
		Ok(groups)
	}

	/// `_run_job_render` in the baseline pipeline: rehydrate the tile,
	/// materialize every referenced source's VRT groups locally, wrap each
	/// in a `MockSource` so the compositor never calls back into the real
	/// (network-backed) source, composite and encode, then upload the
	/// result(s).
	#[context("Failed to process a render job")]
	fn process_render(&self, job: RenderJob) -> Result<()> {
		let output = self.output_for(&job.data)?;
		let mut tile = output.rehydrate(&job.data)?;

		let tmp_dir = tempfile::tempdir().context("creating a scratch directory for a render job")?;

		let mut composite_sources: Vec<Box<dyn CompositeSource>> = Vec::new();
		for reference in &job.sources {
			let source = self
				.sources
				.get(reference.source.as_str())
				.with_context(|| format!("no source of type {:?} is configured", reference.source))?;
			let vrts = self.download_local_vrts(reference, tmp_dir.path())?;
			if vrts.is_empty() {
				continue;
			}
			composite_sources.push(Box::new(MockSource::new(source.clone(), vrts)));
		}

		tile.set_sources(composite_sources);
		tile.render(tmp_dir.path())?;
		self.store.upload_dir(tmp_dir.path())?;
		Ok(())
	}
}

/// Collapses a store path's separators so it is safe to use as one
/// component of a local scratch filename, e.g. `"srtm/N37W123.hgt"` ->
/// `"srtm_N37W123.hgt"`.
fn sanitize_file_name(path: &str) -> String {
	path.replace('/', "_")
}
