use crate::traits::{Queue, QueueMessage};
use anyhow::{Context, Result, ensure};
use joerd_core::job::Job;
use joerd_derive::context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::{Handle, Runtime};

#[derive(Clone, Debug, Deserialize)]
struct Options {
	endpoint: String,
	#[serde(default = "default_max_bytes")]
	max_bytes: usize,
	#[serde(default = "default_max_batch_len")]
	max_batch_len: usize,
}

// 256 KiB is the limit most message-queue backends enforce on a single
// message body; reserve a margin for the enclosing JSON array brackets and
// transport overhead.
fn default_max_bytes() -> usize {
	256 * 1024 - 1024
}

fn default_max_batch_len() -> usize {
	10
}

/// An HTTP-backed queue: jobs are POSTed as a JSON array to `{endpoint}/send`
/// and polled from `{endpoint}/receive`, acknowledged with a DELETE to
/// `{endpoint}/ack/{id}`. Generalizes the baseline pipeline's SQS-specific
/// queue to a plain HTTP contract so no cloud-vendor SDK is required.
pub struct RemoteQueue {
	endpoint: String,
	client: reqwest::Client,
	rt: Runtime,
	max_bytes: usize,
	max_batch_len: usize,
}

impl RemoteQueue {
	pub(crate) fn from_options(options: &Value) -> Result<Self> {
		let options: Options = serde_json::from_value(options.clone()).context("parsing remote queue options")?;
		Ok(RemoteQueue {
			endpoint: options.endpoint.trim_end_matches('/').to_string(),
			client: reqwest::Client::new(),
			rt: Runtime::new().context("starting async runtime for remote queue")?,
			max_bytes: options.max_bytes,
			max_batch_len: options.max_batch_len,
		})
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct RawMessage {
	id: String,
	body: String,
}

impl Queue for RemoteQueue {
	fn max_batch_bytes(&self) -> usize {
		self.max_bytes
	}

	fn max_batch_len(&self) -> usize {
		self.max_batch_len
	}

	#[context("Failed to send a batch of {} jobs to {endpoint}", jobs.len(), endpoint = self.endpoint)]
	fn send_batch(&self, jobs: Vec<String>) -> Result<()> {
		self.rt.block_on(async {
			let body = format!("[{}]", jobs.join(","));
			let response = self
				.client
				.post(format!("{}/send", self.endpoint))
				.header("Content-Type", "application/json")
				.body(body)
				.send()
				.await?;
			ensure!(response.status().is_success(), "enqueue failed with status {}", response.status());
			Ok(())
		})
	}

	#[context("Failed to receive messages from {endpoint}", endpoint = self.endpoint)]
	fn receive_messages(&self) -> Result<Vec<Box<dyn QueueMessage>>> {
		self.rt.block_on(async {
			let response = self.client.get(format!("{}/receive", self.endpoint)).send().await?;
			ensure!(response.status().is_success(), "receive failed with status {}", response.status());
			let raw: Vec<RawMessage> = response.json().await?;
			let handle = Handle::current();
			Ok(raw
				.into_iter()
				.map(|m| {
					Box::new(RemoteMessage {
						id: m.id,
						body: m.body,
						endpoint: self.endpoint.clone(),
						client: self.client.clone(),
						handle: handle.clone(),
					}) as Box<dyn QueueMessage>
				})
				.collect())
		})
	}
}

struct RemoteMessage {
	id: String,
	body: String,
	endpoint: String,
	client: reqwest::Client,
	handle: Handle,
}

impl QueueMessage for RemoteMessage {
	fn job(&self) -> Result<Job> {
		Ok(serde_json::from_str(&self.body)?)
	}

	fn ack(&self) -> Result<()> {
		let endpoint = self.endpoint.clone();
		let id = self.id.clone();
		let client = self.client.clone();
		self.handle.block_on(async move {
			let response = client.delete(format!("{endpoint}/ack/{id}")).send().await?;
			ensure!(response.status().is_success(), "ack failed with status {}", response.status());
			Ok(())
		})
	}
}
