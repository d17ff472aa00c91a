//! Download planning (§4.8): for every configured region and output,
//! expand to concrete `(bbox, resolution)` pairs and ask every source which
//! of its own tiles contribute, deduplicating and optionally skipping what
//! the source store already has.

use anyhow::Result;
use joerd_core::config::Config;
use joerd_core::freeze::freeze;
use joerd_core::job::{DownloadJob, Job};
use joerd_core::progress::ProgressFactory;
use joerd_core::{BoundingBox, OutputTileKey, Region};
use joerd_derive::context;
use joerd_outputs::{OutputPlugin, build_output};
use joerd_queue::Dispatcher;
use joerd_sources::{SourcePlugin, build_source};
use joerd_store::BlobStore;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// A concrete `(bbox, resolution)` pair produced by `OutputPlugin::
/// expand_tile`, just detailed enough to pass to `SourcePlugin::
/// downloads_for` without materializing a full `OutputTile`.
struct ExpandedRegion {
	bbox: BoundingBox,
	resolution: f64,
}

impl OutputTileKey for ExpandedRegion {
	fn freeze_dry(&self) -> Value {
		unreachable!("download planning never freezes an ExpandedRegion itself")
	}

	fn latlon_bbox(&self) -> BoundingBox {
		self.bbox
	}

	fn max_resolution(&self) -> f64 {
		self.resolution
	}
}

pub struct DownloadPlanner {
	regions: Vec<Region>,
	outputs: Vec<Arc<dyn OutputPlugin>>,
	sources: Vec<Arc<dyn SourcePlugin>>,
	source_store: Arc<dyn BlobStore>,
}

impl DownloadPlanner {
	pub fn new(regions: Vec<Region>, outputs: Vec<Arc<dyn OutputPlugin>>, sources: Vec<Arc<dyn SourcePlugin>>, source_store: Arc<dyn BlobStore>) -> Self {
		DownloadPlanner { regions, outputs, sources, source_store }
	}

	/// Builds sources and outputs from their registered `{ type, ... }`
	/// configuration entries, in `config.ordered_source_names()` order so
	/// compositing order (§4.5) is fixed deterministically downstream.
	#[context("Failed to build a download planner from configuration")]
	pub fn from_config(config: &Config, source_store: Arc<dyn BlobStore>) -> Result<Self> {
		let regions: Vec<Region> = config.regions.values().copied().collect();

		let sources = config
			.ordered_source_names()
			.iter()
			.map(|name| build_source(name, &config.sources[name]))
			.collect::<Result<Vec<_>>>()?;

		let outputs = config
			.outputs
			.values()
			.map(|plugin| build_output(&plugin.kind, regions.clone()))
			.collect::<Result<Vec<_>>>()?;

		Ok(DownloadPlanner::new(regions, outputs, sources, source_store))
	}

	/// Runs the full planning pass, appending one `download` job per
	/// distinct `SourceTile` to `dispatcher`. `skip_existing` mirrors the
	/// `SKIP_EXISTING` environment variable (§6).
	pub fn run(&self, dispatcher: &mut Dispatcher, progress: &ProgressFactory, skip_existing: bool) -> Result<()> {
		for source in &self.sources {
			source.get_index()?;
		}

		let handle = progress.phase("download planning", 0);
		let mut seen: HashSet<String> = HashSet::new();
		let mut emitted = 0u64;

		for region in &self.regions {
			for output in &self.outputs {
				for (bbox, resolution) in output.expand_tile(region) {
					let pair = ExpandedRegion { bbox, resolution };
					for source in &self.sources {
						for tile in source.downloads_for(&pair)? {
							let key = freeze(&tile.freeze_dry());
							if !seen.insert(key) {
								continue;
							}
							if skip_existing && self.source_store.exists(&tile.output_file()) {
								continue;
							}
							dispatcher.append(&Job::Download(DownloadJob { data: tile.freeze_dry() }));
							emitted += 1;
							handle.inc(1);
						}
					}
				}
			}
		}

		dispatcher.flush();
		handle.finish();
		log::info!("download planning emitted {emitted} jobs");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use joerd_download::ScopedTempFile;
	use joerd_queue::{Queue, QueueMessage};
	use joerd_sources::SourceTileKey;
	use pretty_assertions::assert_eq;
	use serde_json::json;
	use std::path::Path;
	use std::sync::Mutex;

	struct TestTile {
		id: u32,
	}

	impl SourceTileKey for TestTile {
		fn urls(&self) -> Vec<String> {
			Vec::new()
		}

		fn output_file(&self) -> String {
			format!("test/{}.tif", self.id)
		}

		fn freeze_dry(&self) -> Value {
			json!({"type": "test", "id": self.id})
		}

		fn verify(&self, _path: &Path) -> bool {
			true
		}

		fn unpack(&self, _downloads: &[ScopedTempFile], _store: &dyn BlobStore) -> Result<()> {
			Ok(())
		}
	}

	struct TestSource {
		tile_ids: Vec<u32>,
	}

	impl SourcePlugin for TestSource {
		fn name(&self) -> &str {
			"test"
		}

		fn downloads_for(&self, _tile: &dyn OutputTileKey) -> Result<Vec<Box<dyn joerd_sources::SourceTileKey>>> {
			Ok(self.tile_ids.iter().map(|&id| Box::new(TestTile { id }) as Box<dyn joerd_sources::SourceTileKey>).collect())
		}

		fn vrts_for(&self, _tile: &dyn OutputTileKey) -> Result<Vec<Vec<Box<dyn joerd_sources::SourceTileKey>>>> {
			Ok(Vec::new())
		}

		fn filter_type(&self, _src_res: f64, _dst_res: f64) -> joerd_core::ResampleAlg {
			joerd_core::ResampleAlg::Bilinear
		}

		fn srs_epsg(&self) -> i32 {
			4326
		}

		fn rehydrate(&self, _data: &Value) -> Result<Box<dyn joerd_sources::SourceTileKey>> {
			unimplemented!("not exercised by download planning tests")
		}
	}

	struct TestOutput;

	impl OutputPlugin for TestOutput {
		fn name(&self) -> &str {
			"test-output"
		}

		fn generate_tiles(&self) -> Result<Vec<Box<dyn joerd_outputs::RenderTile>>> {
			Ok(Vec::new())
		}

		fn expand_tile(&self, region: &Region) -> Vec<(BoundingBox, f64)> {
			vec![(region.bbox, 1.0)]
		}

		fn rehydrate(&self, _data: &Value) -> Result<Box<dyn joerd_outputs::RenderTile>> {
			unimplemented!("not exercised by download planning tests")
		}
	}

	struct NullBlobStore {
		present: Vec<String>,
	}

	impl BlobStore for NullBlobStore {
		fn exists(&self, path: &str) -> bool {
			self.present.iter().any(|p| p == path)
		}

		fn get(&self, _path: &str, _local_path: &Path) -> Result<()> {
			unimplemented!()
		}

		fn upload_dir(&self, _local_dir: &Path) -> Result<()> {
			unimplemented!()
		}
	}

	struct RecordingQueue {
		sent: Mutex<Vec<String>>,
	}

	impl Queue for RecordingQueue {
		fn max_batch_bytes(&self) -> usize {
			256 * 1024
		}

		fn max_batch_len(&self) -> usize {
			10
		}

		fn send_batch(&self, jobs: Vec<String>) -> Result<()> {
			self.sent.lock().unwrap().extend(jobs);
			Ok(())
		}

		fn receive_messages(&self) -> Result<Vec<Box<dyn QueueMessage>>> {
			Ok(Vec::new())
		}
	}

	fn region() -> Region {
		Region::new(BoundingBox::new(-10.0, -10.0, 10.0, 10.0).unwrap(), 0..1)
	}

	#[test]
	fn emits_one_job_per_distinct_tile_and_dedupes() {
		let source = Arc::new(TestSource { tile_ids: vec![1, 2, 1] });
		let output = Arc::new(TestOutput);
		let store = Arc::new(NullBlobStore { present: Vec::new() });
		let planner = DownloadPlanner::new(vec![region()], vec![output], vec![source], store);

		let queue = Arc::new(RecordingQueue { sent: Mutex::new(Vec::new()) });
		let mut dispatcher = Dispatcher::new(queue.clone(), 10);
		let progress = ProgressFactory::new(false);

		planner.run(&mut dispatcher, &progress, false).unwrap();

		// three `downloads_for` hits, two distinct ids after dedup.
		assert_eq!(queue.sent.lock().unwrap().len(), 2);
	}

	#[test]
	fn skip_existing_omits_tiles_already_in_the_source_store() {
		let source = Arc::new(TestSource { tile_ids: vec![1, 2] });
		let output = Arc::new(TestOutput);
		let store = Arc::new(NullBlobStore { present: vec!["test/1.tif".to_string()] });
		let planner = DownloadPlanner::new(vec![region()], vec![output], vec![source], store);

		let queue = Arc::new(RecordingQueue { sent: Mutex::new(Vec::new()) });
		let mut dispatcher = Dispatcher::new(queue.clone(), 10);
		let progress = ProgressFactory::new(false);

		planner.run(&mut dispatcher, &progress, true).unwrap();

		let sent = queue.sent.lock().unwrap();
		assert_eq!(sent.len(), 1);
		let job: Value = serde_json::from_str(&sent[0]).unwrap();
		assert_eq!(job["data"]["id"], json!(2));
	}
}
