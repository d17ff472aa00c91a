use anyhow::{Result, ensure};
use joerd_core::job::{Job, RenderBatchJob};
use serde_json::Value;

/// Accumulates `data` entries for a single `sources` key into a `renderbatch`
/// job, flushing it once adding another entry would exceed `limit` bytes
/// serialized.
pub struct JsonSizer {
	limit: usize,
	data: Vec<Value>,
	size: usize,
	initial_size: usize,
}

impl JsonSizer {
	pub fn new(sources: &Value, limit: usize) -> Result<Self> {
		let initial_size = serde_json::to_string(&job_for(sources, &[]))?.len();
		Ok(JsonSizer {
			limit,
			data: Vec::new(),
			size: initial_size,
			initial_size,
		})
	}

	/// Appends one tile's data. Returns a flushed `renderbatch` job if adding
	/// this entry would have overflowed the limit — it is flushed first and
	/// this entry starts the next batch.
	pub fn append(&mut self, sources: &Value, data: Value) -> Result<Option<Job>> {
		let data_size = serde_json::to_string(&data)?.len() + 1;
		ensure!(data_size < self.limit, "job too large for limit: {} >= {}", self.size + 1, self.limit);

		let mut flushed = None;
		if data_size + self.size > self.limit {
			flushed = Some(self.flush(sources));
		}

		self.data.push(data);
		self.size += data_size + 1;
		Ok(flushed)
	}

	pub fn flush(&mut self, sources: &Value) -> Job {
		let job = job_for(sources, &self.data);
		self.data.clear();
		self.size = self.initial_size;
		job
	}
}

fn job_for(sources: &Value, data: &[Value]) -> Job {
	Job::Renderbatch(RenderBatchJob {
		sources: sources.clone(),
		data: data.to_vec(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn flushes_once_limit_is_exceeded() {
		let sources = json!([{"source": "srtm", "vrts": [["a"]]}]);
		let mut sizer = JsonSizer::new(&sources, 80).unwrap();

		let mut flushes = 0;
		for z in 0..20 {
			if sizer.append(&sources, json!({"type": "terrarium", "z": z})).unwrap().is_some() {
				flushes += 1;
			}
		}
		assert!(flushes > 0);
	}

	#[test]
	fn oversized_entry_is_rejected() {
		let sources = json!([]);
		let mut sizer = JsonSizer::new(&sources, 10).unwrap();
		assert!(sizer.append(&sources, json!({"type": "terrarium", "z": 1, "x": 1, "y": 1})).is_err());
	}
}
