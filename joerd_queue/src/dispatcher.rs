use crate::batch::Batch;
use crate::traits::Queue;
use joerd_core::job::Job;
use std::sync::Arc;

/// Queues up jobs and flushes them to the queue in batches, logging (but
/// never propagating) any failure to enqueue or flush — a single bad batch
/// should not abort an entire planning run.
pub struct Dispatcher {
	batch: Batch,
	idx: u64,
	next_log_idx: u64,
}

impl Dispatcher {
	#[must_use]
	pub fn new(queue: Arc<dyn Queue>, max_batch_len: usize) -> Self {
		Dispatcher {
			batch: Batch::new(queue, max_batch_len),
			idx: 0,
			next_log_idx: 0,
		}
	}

	pub fn append(&mut self, job: &Job) {
		if let Err(err) = self.batch.append(job) {
			log::warn!("failed to enqueue batch: {err:#}");
		}

		self.idx += 1;
		if self.idx >= self.next_log_idx {
			log::info!("dispatched {} jobs", self.idx);
			self.next_log_idx += 1000;
		}
	}

	pub fn flush(&mut self) {
		if let Err(err) = self.batch.flush() {
			log::warn!("failed to flush batch: {err:#}");
		}
		log::info!("dispatcher sent {} jobs in total", self.idx);
	}
}
