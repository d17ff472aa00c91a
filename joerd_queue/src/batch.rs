use crate::traits::Queue;
use anyhow::{Result, ensure};
use joerd_core::job::Job;
use std::sync::Arc;

/// Accumulates serialized jobs up to the owning queue's size and count
/// limits, flushing a full batch to the queue automatically before it would
/// overflow either bound.
pub struct Batch {
	queue: Arc<dyn Queue>,
	max_bytes: usize,
	max_len: usize,
	items: Vec<String>,
	size: usize,
}

impl Batch {
	#[must_use]
	pub fn new(queue: Arc<dyn Queue>, max_len: usize) -> Self {
		let max_bytes = queue.max_batch_bytes();
		let max_len = max_len.min(queue.max_batch_len());
		Batch {
			queue,
			max_bytes,
			max_len,
			items: Vec::new(),
			// account for the wrapping `[` and `]` of the JSON array this
			// batch will eventually be serialized as.
			size: 2,
		}
	}

	pub fn append(&mut self, job: &Job) -> Result<()> {
		let job_json = serde_json::to_string(job)?;
		let job_len = job_json.len() + 1;
		ensure!(
			job_len + 1 < self.max_bytes,
			"cannot send job of size {job_len}, larger than the maximum job size {}",
			self.max_bytes
		);

		let next_batch_too_big = self.size + job_len > self.max_bytes;
		let next_batch_too_long = self.items.len() + 1 > self.max_len;
		if next_batch_too_big || next_batch_too_long {
			self.flush()?;
		}

		self.items.push(job_json);
		self.size += job_len;
		Ok(())
	}

	pub fn flush(&mut self) -> Result<()> {
		if !self.items.is_empty() {
			let items = std::mem::take(&mut self.items);
			self.queue.send_batch(items)?;
			self.size = 2;
		}
		Ok(())
	}
}
