//! GMTED2010 (§4.3), recovered from `original_source/joerd/source/gmted.py`:
//! a static global grid of 30°×20° composite tiles at 7.5″ resolution (30″
//! at the poles), with no remote index to refresh.

use crate::traits::{SourcePlugin, SourceTileKey};
use crate::util::mask_non_positive;
use anyhow::{Context, Result};
use joerd_core::types::ResampleAlg;
use joerd_core::{BoundingBox, OutputTileKey};
use joerd_download::ScopedTempFile;
use joerd_store::BlobStore;
use serde::Deserialize;
use serde_json::{Value, json};
use tempfile::tempdir;

const PRUNE_FACTOR: f64 = 20.0 * (7.5 / 3600.0);
const BUFFER_DEGREES: f64 = 0.1;

#[derive(Deserialize)]
struct GmtedOptions {
	#[serde(default = "default_base_dir")]
	base_dir: String,
	url: String,
	xs: Vec<i32>,
	ys: Vec<i32>,
}

fn default_base_dir() -> String {
	"gmted".to_string()
}

pub struct GmtedSource {
	name: String,
	base_dir: String,
	url: String,
	xs: Vec<i32>,
	ys: Vec<i32>,
}

impl GmtedSource {
	pub fn from_options(name: &str, options: &Value) -> Result<Self> {
		let options: GmtedOptions = serde_json::from_value(options.clone()).context("parsing gmted source options")?;
		Ok(GmtedSource {
			name: name.to_string(),
			base_dir: options.base_dir,
			url: options.url,
			xs: options.xs,
			ys: options.ys,
		})
	}

	fn tile(&self, x: i32, y: i32) -> GmtedTile {
		GmtedTile { base_dir: self.base_dir.clone(), url: self.url.clone(), x, y }
	}
}

impl SourcePlugin for GmtedSource {
	fn name(&self) -> &str {
		&self.name
	}

	fn downloads_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Box<dyn SourceTileKey>>> {
		if tile.max_resolution() > PRUNE_FACTOR {
			return Ok(Vec::new());
		}
		let query = tile.latlon_bbox().buffer(BUFFER_DEGREES);
		let mut tiles: Vec<Box<dyn SourceTileKey>> = Vec::new();
		for &y in &self.ys {
			for &x in &self.xs {
				let bbox = BoundingBox::new(f64::from(x), f64::from(y), f64::from(x + 30), f64::from(y + 20))?;
				if query.intersects(&bbox) {
					tiles.push(Box::new(self.tile(x, y)));
				}
			}
		}
		Ok(tiles)
	}

	fn vrts_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Vec<Box<dyn SourceTileKey>>>> {
		Ok(vec![self.downloads_for(tile)?])
	}

	fn filter_type(&self, src_res: f64, dst_res: f64) -> ResampleAlg {
		if src_res > dst_res { ResampleAlg::Bilinear } else { ResampleAlg::Cubic }
	}

	fn srs_epsg(&self) -> i32 {
		4326
	}

	fn rehydrate(&self, data: &Value) -> Result<Box<dyn SourceTileKey>> {
		let x = data["x"].as_i64().context("gmted identity missing x")? as i32;
		let y = data["y"].as_i64().context("gmted identity missing y")? as i32;
		Ok(Box::new(self.tile(x, y)))
	}
}

struct GmtedTile {
	base_dir: String,
	url: String,
	x: i32,
	y: i32,
}

impl GmtedTile {
	fn resolution_code(&self) -> &'static str {
		if self.y == -90 { "300" } else { "075" }
	}

	fn file_name(&self) -> String {
		let xname = format!("{:03}{}", self.x.abs(), if self.x >= 0 { "E" } else { "W" });
		let yname = format!("{:02}{}", self.y.abs(), if self.y >= 0 { "N" } else { "S" });
		format!("{yname}{xname}_20101117_gmted_mea{}.tif", self.resolution_code())
	}
}

impl SourceTileKey for GmtedTile {
	fn urls(&self) -> Vec<String> {
		let dir = format!("{}{:03}", if self.x >= 0 { "E" } else { "W" }, self.x.abs());
		vec![format!("{}/{}darcsec/mea/{}/{}", self.url, self.resolution_code(), dir, self.file_name())]
	}

	fn output_file(&self) -> String {
		format!("{}/{}", self.base_dir, self.file_name())
	}

	fn freeze_dry(&self) -> Value {
		json!({"type": "gmted", "x": self.x, "y": self.y})
	}

	fn verify(&self, path: &std::path::Path) -> bool {
		gdal::Dataset::open(path).is_ok()
	}

	fn unpack(&self, downloads: &[ScopedTempFile], store: &dyn BlobStore) -> Result<()> {
		let [raster] = downloads else {
			anyhow::bail!("gmted unpack expects exactly one downloaded file");
		};
		let upload_dir = tempdir().context("creating gmted upload staging directory")?;
		let dest = upload_dir.path().join(self.output_file());
		mask_non_positive(raster.path(), "GTiff", &dest)?;
		store.upload_dir(upload_dir.path())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn file_name_matches_known_scenario() {
		let tile = GmtedTile { base_dir: "gmted".to_string(), url: "https://example.com".to_string(), x: -120, y: 30 };
		assert_eq!(tile.file_name(), "30N120W_20101117_gmted_mea075.tif");
	}

	#[test]
	fn polar_row_uses_the_coarse_resolution_code() {
		let tile = GmtedTile { base_dir: "gmted".to_string(), url: "https://example.com".to_string(), x: 0, y: -90 };
		assert_eq!(tile.file_name(), "90S000E_20101117_gmted_mea300.tif");
	}
}
