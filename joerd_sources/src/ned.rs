//! Regular (non-bathymetric) NED, recovered from
//! `original_source/joerd/source/ned.py`. Selects the subset of the catalog
//! whose region name does not contain "topobathy", and masks non-positive
//! elevations on unpack the way `NedBase::unpack` does by default.

use crate::ned_base::NedBase;
use crate::traits::{SourcePlugin, SourceTileKey};
use anyhow::{Context, Result};
use joerd_core::types::ResampleAlg;
use joerd_core::OutputTileKey;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct NedOptions {
	#[serde(default = "default_base_dir")]
	base_dir: String,
	url: String,
}

fn default_base_dir() -> String {
	"ned".to_string()
}

pub struct NedSource {
	inner: NedBase,
}

impl NedSource {
	pub fn from_options(name: &str, options: &Value) -> Result<Self> {
		let options: NedOptions = serde_json::from_value(options.clone()).context("parsing ned source options")?;
		Ok(NedSource { inner: NedBase::new(name, options.base_dir, options.url, false)? })
	}
}

impl SourcePlugin for NedSource {
	fn name(&self) -> &str {
		self.inner.name()
	}

	fn get_index(&self) -> Result<()> {
		self.inner.get_index()
	}

	fn downloads_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Box<dyn SourceTileKey>>> {
		self.inner.downloads_for(tile)
	}

	fn vrts_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Vec<Box<dyn SourceTileKey>>>> {
		self.inner.vrts_for(tile)
	}

	fn filter_type(&self, src_res: f64, dst_res: f64) -> ResampleAlg {
		self.inner.filter_type(src_res, dst_res)
	}

	fn srs_epsg(&self) -> i32 {
		self.inner.srs_epsg()
	}

	fn rehydrate(&self, data: &Value) -> Result<Box<dyn SourceTileKey>> {
		self.inner.rehydrate(data)
	}
}
