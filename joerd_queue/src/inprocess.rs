use crate::traits::{Queue, QueueMessage};
use anyhow::{Result, bail};
use joerd_core::JoerdError;
use joerd_core::job::Job;
use std::sync::Arc;

/// A queue that dispatches every job straight to a callback instead of
/// holding it anywhere — used for local/test runs where a worker lives in
/// the same process as the planner. Mirrors the baseline pipeline's fake
/// queue: batch size of one, and `receive_messages` is never valid to call
/// since nothing is ever held.
pub struct InProcessQueue {
	dispatch: Arc<dyn Fn(&Job) -> Result<()> + Send + Sync>,
}

impl InProcessQueue {
	#[must_use]
	pub fn new(dispatch: Arc<dyn Fn(&Job) -> Result<()> + Send + Sync>) -> Self {
		InProcessQueue { dispatch }
	}
}

impl Queue for InProcessQueue {
	fn max_batch_bytes(&self) -> usize {
		usize::MAX
	}

	fn max_batch_len(&self) -> usize {
		1
	}

	fn send_batch(&self, jobs: Vec<String>) -> Result<()> {
		for job_json in jobs {
			let job: Job = serde_json::from_str(&job_json)?;
			(self.dispatch)(&job)?;
		}
		Ok(())
	}

	fn receive_messages(&self) -> Result<Vec<Box<dyn QueueMessage>>> {
		bail!(JoerdError::QueueError {
			detail: "in-process queue does not hold messages".to_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use serde_json::json;

	#[test]
	fn send_batch_dispatches_each_job_directly() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let seen_clone = seen.clone();
		let queue = InProcessQueue::new(Arc::new(move |job: &Job| {
			seen_clone.lock().push(job.clone());
			Ok(())
		}));

		let job = Job::Download(joerd_core::job::DownloadJob {
			data: json!({"type": "srtm", "lat": 37, "lon": -123}),
		});
		queue.send_batch(vec![serde_json::to_string(&job).unwrap()]).unwrap();

		assert_eq!(seen.lock().len(), 1);
	}

	#[test]
	fn receive_messages_always_errors() {
		let queue = InProcessQueue::new(Arc::new(|_: &Job| Ok(())));
		assert!(queue.receive_messages().is_err());
	}
}
