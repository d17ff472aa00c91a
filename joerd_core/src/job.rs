//! Queue message wire types (§6). A queue message body is a JSON array of
//! `Job` values; `Job` is internally tagged on the `"job"` field so the
//! three variants serialize exactly as the core specification's wire format
//! shows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One reference into the source store, as carried on a render job: the
/// owning source's registered name plus its `vrts_for` groups, each already
/// flattened to a list of store paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
	pub source: String,
	pub vrts: Vec<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
	/// The frozen `SourceTile` identity, source-specific in shape but always
	/// carrying a `type` discriminator naming the owning source plugin.
	pub data: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
	/// The frozen `OutputTile` identity, e.g. `{"type":"terrarium","z":13,"x":1308,"y":3165}`.
	pub data: Value,
	pub sources: Vec<SourceReference>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderBatchJob {
	pub sources: Value,
	pub data: Vec<Value>,
}

/// A single queue-message job, tagged on `"job"` exactly as the wire format
/// in the core specification's external interfaces section describes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "lowercase")]
pub enum Job {
	Download(DownloadJob),
	Render(RenderJob),
	Renderbatch(RenderBatchJob),
}

impl RenderBatchJob {
	/// Expands a grouped `renderbatch` message into its constituent
	/// single-tile `render` jobs, all sharing the same `sources` value. The
	/// worker never sees a `Renderbatch` job directly; it is always expanded
	/// first (§6: "A `renderbatch` is expanded worker-side into N single
	/// renders sharing `sources`").
	pub fn expand(self) -> anyhow::Result<Vec<RenderJob>> {
		let sources: Vec<SourceReference> = serde_json::from_value(self.sources)?;
		Ok(self
			.data
			.into_iter()
			.map(|data| RenderJob {
				data,
				sources: sources.clone(),
			})
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use serde_json::json;

	#[test]
	fn download_job_wire_format() {
		let job = Job::Download(DownloadJob {
			data: json!({"type": "srtm", "lat": 37, "lon": -123}),
		});
		let value = serde_json::to_value(&job).unwrap();
		assert_eq!(
			value,
			json!({"job": "download", "data": {"type": "srtm", "lat": 37, "lon": -123}})
		);
	}

	#[test]
	fn render_job_wire_format() {
		let job = Job::Render(RenderJob {
			data: json!({"type": "terrarium", "z": 13, "x": 1308, "y": 3165}),
			sources: vec![SourceReference {
				source: "srtm".to_string(),
				vrts: vec![vec!["srtm/N37W123.hgt".to_string()]],
			}],
		});
		let value = serde_json::to_value(&job).unwrap();
		assert_eq!(value["job"], json!("render"));
		assert_eq!(value["sources"][0]["source"], json!("srtm"));
	}

	#[test]
	fn renderbatch_expands_to_one_render_per_tile() {
		let batch = RenderBatchJob {
			sources: json!([{"source": "srtm", "vrts": [["a"]]}]),
			data: vec![json!({"type": "terrarium", "z": 1, "x": 0, "y": 0}), json!({"type": "terrarium", "z": 1, "x": 1, "y": 0})],
		};
		let renders = batch.expand().unwrap();
		assert_eq!(renders.len(), 2);
		assert_eq!(renders[0].sources, renders[1].sources);
		assert_ne!(renders[0].data, renders[1].data);
	}
}
