//! Great Lakes bathymetry (§4.3), recovered from
//! `original_source/joerd/source/greatlakes.py`: five fixed named lake
//! rasters in NAD83, each shifted by a per-lake vertical datum offset on
//! unpack rather than masked.

use crate::traits::{SourcePlugin, SourceTileKey};
use crate::util::datum_shift;
use anyhow::{Context, Result};
use joerd_core::types::ResampleAlg;
use joerd_core::{BoundingBox, OutputTileKey};
use joerd_download::ScopedTempFile;
use joerd_store::BlobStore;
use serde_json::{Value, json};
use tempfile::tempdir;

const PRUNE_FACTOR: f64 = 20.0 * (3.0 / 3600.0);
const BUFFER_DEGREES: f64 = 0.1;
const BASE_URL: &str = "https://www.ngdc.noaa.gov/mgg/greatlakes";

struct LakeInfo {
	name: &'static str,
	bbox: (f64, f64, f64, f64),
	datum_shift: f64,
}

const GREAT_LAKES: &[LakeInfo] = &[
	LakeInfo { name: "erie", bbox: (-83.5, 41.3, -78.8, 42.9), datum_shift: 173.5 },
	LakeInfo { name: "huron", bbox: (-84.8, 43.0, -79.7, 46.4), datum_shift: 176.0 },
	LakeInfo { name: "michigan", bbox: (-88.1, 41.5, -84.7, 46.1), datum_shift: 176.0 },
	LakeInfo { name: "ontario", bbox: (-79.9, 43.1, -76.0, 44.3), datum_shift: 74.2 },
	LakeInfo { name: "superior", bbox: (-92.3, 46.3, -84.2, 49.1), datum_shift: 183.2 },
];

pub struct GreatLakesSource {
	name: String,
}

impl GreatLakesSource {
	pub fn from_options(name: &str, _options: &Value) -> Result<Self> {
		Ok(GreatLakesSource { name: name.to_string() })
	}

	fn tile(&self, lake: &'static LakeInfo) -> GreatLakeTile {
		GreatLakeTile { lake }
	}
}

impl SourcePlugin for GreatLakesSource {
	fn name(&self) -> &str {
		&self.name
	}

	fn downloads_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Box<dyn SourceTileKey>>> {
		if tile.max_resolution() > PRUNE_FACTOR {
			return Ok(Vec::new());
		}
		let query = tile.latlon_bbox().buffer(BUFFER_DEGREES);
		let mut tiles: Vec<Box<dyn SourceTileKey>> = Vec::new();
		for lake in GREAT_LAKES {
			let (min_x, min_y, max_x, max_y) = lake.bbox;
			let bbox = BoundingBox::new(min_x, min_y, max_x, max_y)?;
			if query.intersects(&bbox) {
				tiles.push(Box::new(self.tile(lake)));
			}
		}
		Ok(tiles)
	}

	/// Each lake is its own non-overlapping raster, so every download lands
	/// in its own VRT group (mirrors the original's per-lake grouping).
	fn vrts_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Vec<Box<dyn SourceTileKey>>>> {
		Ok(self.downloads_for(tile)?.into_iter().map(|t| vec![t]).collect())
	}

	fn filter_type(&self, src_res: f64, dst_res: f64) -> ResampleAlg {
		if src_res > dst_res { ResampleAlg::Bilinear } else { ResampleAlg::Cubic }
	}

	fn srs_epsg(&self) -> i32 {
		4269
	}

	fn rehydrate(&self, data: &Value) -> Result<Box<dyn SourceTileKey>> {
		let name = data["lake"].as_str().context("great lakes identity missing lake")?;
		let lake = GREAT_LAKES
			.iter()
			.find(|l| l.name == name)
			.with_context(|| format!("unknown lake {name:?}"))?;
		Ok(Box::new(self.tile(lake)))
	}
}

struct GreatLakeTile {
	lake: &'static LakeInfo,
}

impl SourceTileKey for GreatLakeTile {
	fn urls(&self) -> Vec<String> {
		vec![format!("{BASE_URL}/{0}/data/geotiff/{0}_lld.geotiff.tar.gz", self.lake.name)]
	}

	fn output_file(&self) -> String {
		format!("greatlakes/{}_lld.tif", self.lake.name)
	}

	fn freeze_dry(&self) -> Value {
		json!({"type": "great_lakes", "lake": self.lake.name})
	}

	fn verify(&self, path: &std::path::Path) -> bool {
		std::fs::File::open(path).is_ok()
	}

	fn unpack(&self, downloads: &[ScopedTempFile], store: &dyn BlobStore) -> Result<()> {
		let [archive] = downloads else {
			anyhow::bail!("great lakes unpack expects exactly one downloaded archive");
		};
		let entry_name = format!("{0}_lld/{0}_lld.tif", self.lake.name);
		let extract_dir = tempdir().context("creating great lakes extraction scratch directory")?;
		let tif_path = crate::util::extract_tar_gz_entry(archive.path(), &entry_name, extract_dir.path())?;

		let upload_dir = tempdir().context("creating great lakes upload staging directory")?;
		let dest = upload_dir.path().join(self.output_file());
		datum_shift(&tif_path, "GTiff", &dest, self.lake.datum_shift)?;
		store.upload_dir(upload_dir.path())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn erie_carries_its_known_datum_shift() {
		let lake = GREAT_LAKES.iter().find(|l| l.name == "erie").unwrap();
		assert_eq!(lake.datum_shift, 173.5);
	}

	#[test]
	fn tile_url_matches_the_known_layout() {
		let source = GreatLakesSource { name: "great_lakes".to_string() };
		let tile = source.tile(&GREAT_LAKES[0]);
		assert_eq!(tile.urls(), vec!["https://www.ngdc.noaa.gov/mgg/greatlakes/erie/data/geotiff/erie_lld.geotiff.tar.gz".to_string()]);
	}
}
