//! Render planning (§4.8): for every tile an output product enumerates, ask
//! every source (in compositing order) for its `vrts_for` groups, flatten
//! them into `SourceReference`s, and verify every path they name is already
//! present in the source store before a render job is ever queued.

use anyhow::{Result, bail};
use joerd_core::config::Config;
use joerd_core::job::{Job, RenderJob, SourceReference};
use joerd_core::progress::ProgressFactory;
use joerd_core::{BoundingBox, JoerdError, OutputTileKey, Region};
use joerd_derive::context;
use joerd_outputs::{OutputPlugin, RenderTile, build_output};
use joerd_queue::GroupingDispatcher;
use joerd_sources::{SourcePlugin, build_source};
use joerd_store::BlobStore;
use serde_json::Value;
use std::sync::Arc;

/// Bridges a `&dyn RenderTile` into the `&dyn OutputTileKey` that
/// `SourcePlugin::vrts_for` expects, by plain delegation rather than a
/// trait-object upcast — `RenderTile` only needs `OutputTileKey` as a
/// supertrait for its own default-method bookkeeping, and every method
/// called through it here is already available on the subtrait's vtable.
struct AsOutputTileKey<'a> {
	inner: &'a dyn RenderTile,
}

impl OutputTileKey for AsOutputTileKey<'_> {
	fn freeze_dry(&self) -> Value {
		self.inner.freeze_dry()
	}

	fn latlon_bbox(&self) -> BoundingBox {
		self.inner.latlon_bbox()
	}

	fn max_resolution(&self) -> f64 {
		self.inner.max_resolution()
	}
}

pub struct RenderPlanner {
	outputs: Vec<Arc<dyn OutputPlugin>>,
	sources: Vec<Arc<dyn SourcePlugin>>,
	source_store: Arc<dyn BlobStore>,
}

impl RenderPlanner {
	#[must_use]
	pub fn new(outputs: Vec<Arc<dyn OutputPlugin>>, sources: Vec<Arc<dyn SourcePlugin>>, source_store: Arc<dyn BlobStore>) -> Self {
		RenderPlanner { outputs, sources, source_store }
	}

	#[context("Failed to build a render planner from configuration")]
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

		Ok(RenderPlanner::new(outputs, sources, source_store))
	}

	/// Runs the full planning pass, appending one `render` job per output
	/// tile to `dispatcher`. A tile with no contributing source is an error
	/// (§4.8: "a render job with no sources would produce an all-nodata
	/// tile, which is never the intent of a configured run"), not a tile the
	/// run silently skips.
	pub fn run(&self, dispatcher: &mut GroupingDispatcher, progress: &ProgressFactory) -> Result<()> {
		let handle = progress.phase("render planning", 0);
		let mut emitted = 0u64;

		for output in &self.outputs {
			let tiles = output.generate_tiles()?;
			handle.set_len(handle.position() + tiles.len() as u64);

			for tile in &tiles {
				let mut refs: Vec<SourceReference> = Vec::new();
				let key = AsOutputTileKey { inner: tile.as_ref() };

				for source in &self.sources {
					let groups = source.vrts_for(&key)?;
					let mut vrts: Vec<Vec<String>> = Vec::new();

					for group in groups {
						let mut paths = Vec::with_capacity(group.len());
						for source_tile in &group {
							let path = source_tile.output_file();
							if !self.source_store.exists(&path) {
								bail!(JoerdError::MissingInput { path });
							}
							paths.push(path);
						}
						vrts.push(paths);
					}

					if !vrts.is_empty() {
						refs.push(SourceReference { source: source.name().to_string(), vrts });
					}
				}

				if refs.is_empty() {
					bail!("render tile {:?} has no contributing sources", tile.freeze_dry());
				}

				dispatcher.append(Job::Render(RenderJob { data: tile.freeze_dry(), sources: refs }))?;
				emitted += 1;
				handle.inc(1);
			}
		}

		dispatcher.flush();
		handle.finish();
		log::info!("render planning emitted {emitted} jobs");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use joerd_compositor::CompositeSource;
	use joerd_download::ScopedTempFile;
	use joerd_queue::{InProcessQueue, Queue};
	use joerd_sources::SourceTileKey;
	use serde_json::json;
	use std::path::Path;

	struct TestSourceTile {
		path: String,
	}

	impl SourceTileKey for TestSourceTile {
		fn urls(&self) -> Vec<String> {
			Vec::new()
		}

		fn output_file(&self) -> String {
			self.path.clone()
		}

		fn freeze_dry(&self) -> Value {
			json!({"type": "test", "path": self.path})
		}

		fn verify(&self, _path: &Path) -> bool {
			true
		}

		fn unpack(&self, _downloads: &[ScopedTempFile], _store: &dyn BlobStore) -> Result<()> {
			Ok(())
		}
	}

	struct TestSource {
		name: String,
		groups: Vec<Vec<String>>,
	}

	impl SourcePlugin for TestSource {
		fn name(&self) -> &str {
			&self.name
		}

		fn downloads_for(&self, _tile: &dyn OutputTileKey) -> Result<Vec<Box<dyn SourceTileKey>>> {
			Ok(Vec::new())
		}

		fn vrts_for(&self, _tile: &dyn OutputTileKey) -> Result<Vec<Vec<Box<dyn SourceTileKey>>>> {
			Ok(self
				.groups
				.iter()
				.map(|group| group.iter().map(|path| Box::new(TestSourceTile { path: path.clone() }) as Box<dyn SourceTileKey>).collect())
				.collect())
		}

		fn filter_type(&self, _src_res: f64, _dst_res: f64) -> joerd_core::ResampleAlg {
			joerd_core::ResampleAlg::Bilinear
		}

		fn srs_epsg(&self) -> i32 {
			4326
		}

		fn rehydrate(&self, _data: &Value) -> Result<Box<dyn SourceTileKey>> {
			unimplemented!("not exercised by render planning tests")
		}
	}

	struct TestRenderTile {
		id: u32,
	}

	impl OutputTileKey for TestRenderTile {
		fn freeze_dry(&self) -> Value {
			json!({"type": "test", "id": self.id})
		}

		fn latlon_bbox(&self) -> BoundingBox {
			BoundingBox::new(-1.0, -1.0, 1.0, 1.0).unwrap()
		}

		fn max_resolution(&self) -> f64 {
			1.0
		}
	}

	impl RenderTile for TestRenderTile {
		fn tile_name(&self) -> String {
			format!("{}", self.id)
		}

		fn set_sources(&mut self, _sources: Vec<Box<dyn CompositeSource>>) {
			unimplemented!("not exercised by render planning tests")
		}

		fn render(&self, _tmp_dir: &Path) -> Result<()> {
			unimplemented!("not exercised by render planning tests")
		}
	}

	struct TestOutput {
		tile_ids: Vec<u32>,
	}

	impl OutputPlugin for TestOutput {
		fn name(&self) -> &str {
			"test-output"
		}

		fn generate_tiles(&self) -> Result<Vec<Box<dyn RenderTile>>> {
			Ok(self.tile_ids.iter().map(|&id| Box::new(TestRenderTile { id }) as Box<dyn RenderTile>).collect())
		}

		fn expand_tile(&self, _region: &Region) -> Vec<(BoundingBox, f64)> {
			Vec::new()
		}

		fn rehydrate(&self, _data: &Value) -> Result<Box<dyn RenderTile>> {
			unimplemented!("not exercised by render planning tests")
		}
	}

	struct TestBlobStore {
		present: Vec<String>,
	}

	impl BlobStore for TestBlobStore {
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

	fn dispatcher() -> GroupingDispatcher {
		let queue: Arc<dyn Queue> = Arc::new(InProcessQueue::new(Arc::new(|_job| Ok(()))));
		GroupingDispatcher::new(queue, 10, 256 * 1024)
	}

	#[test]
	fn emits_a_render_job_with_every_contributing_source() {
		let source = Arc::new(TestSource { name: "srtm".to_string(), groups: vec![vec!["srtm/a.hgt".to_string()]] });
		let output = Arc::new(TestOutput { tile_ids: vec![1] });
		let store = Arc::new(TestBlobStore { present: vec!["srtm/a.hgt".to_string()] });
		let planner = RenderPlanner::new(vec![output], vec![source], store);

		let progress = ProgressFactory::new(false);
		let mut dispatcher = dispatcher();
		planner.run(&mut dispatcher, &progress).unwrap();
	}

	#[test]
	fn fails_when_a_tile_has_no_contributing_sources() {
		let source = Arc::new(TestSource { name: "srtm".to_string(), groups: Vec::new() });
		let output = Arc::new(TestOutput { tile_ids: vec![1] });
		let store = Arc::new(TestBlobStore { present: Vec::new() });
		let planner = RenderPlanner::new(vec![output], vec![source], store);

		let progress = ProgressFactory::new(false);
		let mut dispatcher = dispatcher();
		let err = planner.run(&mut dispatcher, &progress).unwrap_err();
		assert!(err.to_string().contains("no contributing sources"));
	}

	#[test]
	fn fails_when_a_referenced_source_file_is_missing() {
		let source = Arc::new(TestSource { name: "srtm".to_string(), groups: vec![vec!["srtm/missing.hgt".to_string()]] });
		let output = Arc::new(TestOutput { tile_ids: vec![1] });
		let store = Arc::new(TestBlobStore { present: Vec::new() });
		let planner = RenderPlanner::new(vec![output], vec![source], store);

		let progress = ProgressFactory::new(false);
		let mut dispatcher = dispatcher();
		let err = planner.run(&mut dispatcher, &progress).unwrap_err();
		assert!(JoerdError::kind_of(&err).is_some());
	}
}
