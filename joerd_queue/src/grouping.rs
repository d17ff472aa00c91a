use crate::dispatcher::Dispatcher;
use crate::json_sizer::JsonSizer;
use crate::traits::Queue;
use anyhow::Result;
use joerd_core::freeze::freeze;
use joerd_core::job::Job;
use std::collections::HashMap;
use std::sync::Arc;

/// A dispatcher that groups render jobs by their `sources` value before
/// batching, so that a batch of renders only ever touches the source files
/// a worker has already fetched — improving download-cache reuse across a
/// run (§6). Jobs other than grouped renders pass straight through to the
/// underlying [`Dispatcher`].
pub struct GroupingDispatcher {
	dispatcher: Dispatcher,
	limit: usize,
	batches: HashMap<String, (serde_json::Value, JsonSizer)>,
}

impl GroupingDispatcher {
	#[must_use]
	pub fn new(queue: Arc<dyn Queue>, max_batch_len: usize, limit: usize) -> Self {
		GroupingDispatcher {
			dispatcher: Dispatcher::new(queue, max_batch_len),
			limit,
			batches: HashMap::new(),
		}
	}

	pub fn append(&mut self, job: Job) -> Result<()> {
		match job {
			Job::Render(render_job) if !render_job.sources.is_empty() => {
				let sources = serde_json::to_value(&render_job.sources)?;
				self.append_render_batch(sources, render_job.data)?;
			}
			other => self.dispatcher.append(&other),
		}
		Ok(())
	}

	fn append_render_batch(&mut self, sources: serde_json::Value, data: serde_json::Value) -> Result<()> {
		let key = freeze(&sources);
		if !self.batches.contains_key(&key) {
			let sizer = JsonSizer::new(&sources, self.limit)?;
			self.batches.insert(key.clone(), (sources.clone(), sizer));
		}
		let (sources_for_flush, sizer) = self.batches.get_mut(&key).expect("just inserted");

		if let Some(flushed) = sizer.append(&*sources_for_flush, data)? {
			self.dispatcher.append(&flushed);
		}
		Ok(())
	}

	pub fn flush(&mut self) {
		for (sources, sizer) in self.batches.values_mut() {
			let flushed = sizer.flush(&*sources);
			self.dispatcher.append(&flushed);
		}
		self.batches.clear();
		self.dispatcher.flush();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use joerd_core::job::{RenderJob, SourceReference};
	use serde_json::json;

	struct NullQueue;
	impl Queue for NullQueue {
		fn max_batch_bytes(&self) -> usize {
			256 * 1024
		}
		fn max_batch_len(&self) -> usize {
			10
		}
		fn send_batch(&self, _jobs: Vec<String>) -> Result<()> {
			Ok(())
		}
		fn receive_messages(&self) -> Result<Vec<Box<dyn crate::traits::QueueMessage>>> {
			Ok(Vec::new())
		}
	}

	#[test]
	fn groups_renders_sharing_the_same_sources() {
		let queue = Arc::new(NullQueue);
		let mut dispatcher = GroupingDispatcher::new(queue, 10, 256 * 1024);

		let sources = vec![SourceReference {
			source: "srtm".to_string(),
			vrts: vec![vec!["srtm/N37W123.hgt".to_string()]],
		}];

		for x in 0..3 {
			dispatcher
				.append(Job::Render(RenderJob {
					data: json!({"type": "terrarium", "z": 8, "x": x, "y": 99}),
					sources: sources.clone(),
				}))
				.unwrap();
		}
		assert_eq!(dispatcher.batches.len(), 1);
		dispatcher.flush();
		assert!(dispatcher.batches.is_empty());
	}

	#[test]
	fn non_render_jobs_pass_through_untouched() {
		let queue = Arc::new(NullQueue);
		let mut dispatcher = GroupingDispatcher::new(queue, 10, 256 * 1024);
		dispatcher
			.append(Job::Download(joerd_core::job::DownloadJob {
				data: json!({"type": "srtm", "lat": 37, "lon": -123}),
			}))
			.unwrap();
		assert!(dispatcher.batches.is_empty());
	}
}
