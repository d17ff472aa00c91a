//! Grounded in `original_source/joerd/server.py`'s `MockSource`: wraps a
//! registered source so the compositor sees a fixed set of already-local
//! VRT groups instead of calling back into the source's own `vrts_for`,
//! which would otherwise try to re-derive them from the network-backed
//! catalog on the worker's own clock.

use joerd_compositor::CompositeSource;
use joerd_core::OutputTileKey;
use joerd_core::types::ResampleAlg;
use joerd_sources::SourcePlugin;
use std::sync::Arc;

pub struct MockSource {
	source: Arc<dyn SourcePlugin>,
	vrts: Vec<Vec<String>>,
}

impl MockSource {
	#[must_use]
	pub fn new(source: Arc<dyn SourcePlugin>, vrts: Vec<Vec<String>>) -> Self {
		MockSource { source, vrts }
	}
}

impl CompositeSource for MockSource {
	fn srs_epsg(&self) -> i32 {
		self.source.srs_epsg()
	}

	fn filter_type(&self, src_res: f64, dst_res: f64) -> ResampleAlg {
		self.source.filter_type(src_res, dst_res)
	}

	fn vrts_for(&self, _tile: &dyn OutputTileKey) -> anyhow::Result<Vec<Vec<String>>> {
		Ok(self.vrts.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use joerd_core::BoundingBox;
	use joerd_sources::SourceTileKey;
	use serde_json::Value;

	struct StubSource;

	impl SourcePlugin for StubSource {
		fn name(&self) -> &str {
			"stub"
		}

		fn downloads_for(&self, _tile: &dyn OutputTileKey) -> anyhow::Result<Vec<Box<dyn SourceTileKey>>> {
			Ok(Vec::new())
		}

		fn vrts_for(&self, _tile: &dyn OutputTileKey) -> anyhow::Result<Vec<Vec<Box<dyn SourceTileKey>>>> {
			panic!("a MockSource must never forward vrts_for to the real source")
		}

		fn filter_type(&self, _src_res: f64, _dst_res: f64) -> ResampleAlg {
			ResampleAlg::Lanczos
		}

		fn srs_epsg(&self) -> i32 {
			4269
		}

		fn rehydrate(&self, _data: &Value) -> anyhow::Result<Box<dyn SourceTileKey>> {
			unimplemented!()
		}
	}

	struct StubTile;

	impl OutputTileKey for StubTile {
		fn freeze_dry(&self) -> Value {
			Value::Null
		}

		fn latlon_bbox(&self) -> BoundingBox {
			BoundingBox::new(-1.0, -1.0, 1.0, 1.0).unwrap()
		}

		fn max_resolution(&self) -> f64 {
			1.0
		}
	}

	#[test]
	fn vrts_for_returns_the_preloaded_local_paths_without_consulting_the_source() {
		let mock = MockSource::new(Arc::new(StubSource), vec![vec!["a.tif".to_string(), "b.tif".to_string()]]);
		let groups = mock.vrts_for(&StubTile).unwrap();
		assert_eq!(groups, vec![vec!["a.tif".to_string(), "b.tif".to_string()]]);
	}

	#[test]
	fn delegates_srs_and_filter_type_to_the_wrapped_source() {
		let mock = MockSource::new(Arc::new(StubSource), Vec::new());
		assert_eq!(mock.srs_epsg(), 4269);
		assert!(matches!(mock.filter_type(1.0, 1.0), ResampleAlg::Lanczos));
	}
}
