//! ETOPO1 (§4.3), recovered from `original_source/joerd/source/etopo1.py`: a
//! single global 1-arc-minute raster with no tiling at all.

use crate::traits::{SourcePlugin, SourceTileKey};
use crate::util::copy_with_nodata;
use anyhow::{Context, Result};
use joerd_core::types::ResampleAlg;
use joerd_core::OutputTileKey;
use joerd_download::ScopedTempFile;
use joerd_store::BlobStore;
use serde::Deserialize;
use serde_json::{Value, json};
use tempfile::tempdir;

const PRUNE_FACTOR: f64 = 20.0 * (1.0 / 60.0);
const TARGET_NAME: &str = "ETOPO1_Bed_g_geotiff.tif";

#[derive(Deserialize)]
struct Etopo1Options {
	#[serde(default = "default_base_dir")]
	base_dir: String,
	url: String,
}

fn default_base_dir() -> String {
	"etopo1".to_string()
}

pub struct Etopo1Source {
	name: String,
	base_dir: String,
	url: String,
}

impl Etopo1Source {
	pub fn from_options(name: &str, options: &Value) -> Result<Self> {
		let options: Etopo1Options = serde_json::from_value(options.clone()).context("parsing etopo1 source options")?;
		Ok(Etopo1Source { name: name.to_string(), base_dir: options.base_dir, url: options.url })
	}

	fn tile(&self) -> Etopo1Tile {
		Etopo1Tile { base_dir: self.base_dir.clone(), url: self.url.clone() }
	}
}

impl SourcePlugin for Etopo1Source {
	fn name(&self) -> &str {
		&self.name
	}

	fn downloads_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Box<dyn SourceTileKey>>> {
		if tile.max_resolution() > PRUNE_FACTOR {
			return Ok(Vec::new());
		}
		Ok(vec![Box::new(self.tile())])
	}

	fn vrts_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Vec<Box<dyn SourceTileKey>>>> {
		Ok(vec![self.downloads_for(tile)?])
	}

	fn filter_type(&self, _src_res: f64, _dst_res: f64) -> ResampleAlg {
		ResampleAlg::Lanczos
	}

	fn srs_epsg(&self) -> i32 {
		4326
	}

	fn rehydrate(&self, _data: &Value) -> Result<Box<dyn SourceTileKey>> {
		Ok(Box::new(self.tile()))
	}
}

struct Etopo1Tile {
	base_dir: String,
	url: String,
}

impl SourceTileKey for Etopo1Tile {
	fn urls(&self) -> Vec<String> {
		vec![self.url.clone()]
	}

	fn output_file(&self) -> String {
		format!("{}/{}", self.base_dir, TARGET_NAME)
	}

	fn freeze_dry(&self) -> Value {
		json!({"type": "etopo1"})
	}

	fn verify(&self, path: &std::path::Path) -> bool {
		std::fs::File::open(path).ok().and_then(|f| zip::ZipArchive::new(f).ok()).is_some()
	}

	fn unpack(&self, downloads: &[ScopedTempFile], store: &dyn BlobStore) -> Result<()> {
		let [archive] = downloads else {
			anyhow::bail!("etopo1 unpack expects exactly one downloaded archive");
		};
		let extract_dir = tempdir().context("creating etopo1 extraction scratch directory")?;
		let raster_path = crate::util::extract_zip_entry(archive.path(), TARGET_NAME, extract_dir.path())?;

		let upload_dir = tempdir().context("creating etopo1 upload staging directory")?;
		let dest = upload_dir.path().join(self.output_file());
		copy_with_nodata(&raster_path, "GTiff", &dest)?;
		store.upload_dir(upload_dir.path())
	}
}
