use anyhow::Result;
use joerd_core::job::Job;

/// A destination for batches of serialized jobs, and a source of messages to
/// process. Implementations decide how batching at the wire level is
/// bounded; [`crate::Batch`] enforces those bounds before a batch is ever
/// handed to [`Queue::send_batch`].
pub trait Queue: Send + Sync {
	/// Maximum serialized size, in bytes, of one `send_batch` payload.
	fn max_batch_bytes(&self) -> usize;

	/// Maximum number of jobs in one `send_batch` payload.
	fn max_batch_len(&self) -> usize;

	/// Sends a batch of already-serialized job JSON strings as a single
	/// message.
	fn send_batch(&self, jobs: Vec<String>) -> Result<()>;

	/// Polls for messages ready to process. Not every queue implementation
	/// supports this (an in-process queue dispatches synchronously and has
	/// nothing to receive).
	fn receive_messages(&self) -> Result<Vec<Box<dyn QueueMessage>>>;
}

/// One received message: its parsed job body, and an acknowledgement that
/// must be called only after the job has been fully and successfully
/// processed (§6: "ack-on-success-only").
pub trait QueueMessage: Send {
	fn job(&self) -> Result<Job>;
	fn ack(&self) -> Result<()>;
}
