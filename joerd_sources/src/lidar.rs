//! Country LiDAR (§4.3), recovered from
//! `original_source/joerd/source/d96tm.py` (Slovenia's D96/TM point-cloud
//! archive). Unlike the original, which builds its tile index from a remote
//! fishnet shapefile, this takes its catalog directly from configuration:
//! every entry's bbox and resolution is named up front, since LiDAR regions
//! are added by hand per deployment rather than discovered. Point clouds are
//! rasterized by shelling out to `pdal pipeline`, the same way
//! `joerd_compositor::vrt` shells out to `gdalbuildvrt`.

use crate::traits::{SourcePlugin, SourceTileKey};
use crate::util::mask_non_positive;
use anyhow::{Context, Result, ensure};
use joerd_core::types::ResampleAlg;
use joerd_core::{BoundingBox, OutputTileKey};
use joerd_download::ScopedTempFile;
use joerd_store::BlobStore;
use serde::Deserialize;
use serde_json::{Value, json};
use std::process::Command;
use tempfile::tempdir;

const PRUNE_FACTOR: f64 = 20.0;

#[derive(Clone, Deserialize)]
struct LidarEntryConfig {
	name: String,
	url: String,
	min_x: f64,
	min_y: f64,
	max_x: f64,
	max_y: f64,
	/// EPSG code of the point cloud's native coordinate reference, passed to
	/// `pdal pipeline` as the reader's `spatialreference`.
	src_epsg: i32,
	#[serde(default = "default_resolution")]
	resolution: f64,
	#[serde(default = "default_radius")]
	radius: f64,
}

fn default_resolution() -> f64 {
	1.0
}

fn default_radius() -> f64 {
	7.0
}

#[derive(Deserialize)]
struct LidarOptions {
	#[serde(default = "default_base_dir")]
	base_dir: String,
	entries: Vec<LidarEntryConfig>,
}

fn default_base_dir() -> String {
	"lidar".to_string()
}

pub struct LidarSource {
	name: String,
	base_dir: String,
	entries: Vec<LidarEntryConfig>,
}

impl LidarSource {
	pub fn from_options(name: &str, options: &Value) -> Result<Self> {
		let options: LidarOptions = serde_json::from_value(options.clone()).context("parsing lidar source options")?;
		Ok(LidarSource { name: name.to_string(), base_dir: options.base_dir, entries: options.entries })
	}

	fn tile(&self, entry: &LidarEntryConfig) -> LidarTile {
		LidarTile { base_dir: self.base_dir.clone(), entry: entry.clone() }
	}
}

impl SourcePlugin for LidarSource {
	fn name(&self) -> &str {
		&self.name
	}

	fn downloads_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Box<dyn SourceTileKey>>> {
		if tile.max_resolution() > PRUNE_FACTOR {
			return Ok(Vec::new());
		}
		let query = tile.latlon_bbox().buffer(0.0075);
		Ok(self
			.entries
			.iter()
			.filter(|entry| {
				BoundingBox::new(entry.min_x, entry.min_y, entry.max_x, entry.max_y)
					.map(|bbox| bbox.intersects(&query))
					.unwrap_or(false)
			})
			.map(|entry| Box::new(self.tile(entry)) as Box<dyn SourceTileKey>)
			.collect())
	}

	/// LiDAR coverage blocks are non-overlapping, so one VRT group covers all
	/// of them (mirrors `D96TM.vrts_for`).
	fn vrts_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Vec<Box<dyn SourceTileKey>>>> {
		Ok(vec![self.downloads_for(tile)?])
	}

	fn filter_type(&self, src_res: f64, dst_res: f64) -> ResampleAlg {
		if src_res > dst_res { ResampleAlg::Lanczos } else { ResampleAlg::Cubic }
	}

	fn srs_epsg(&self) -> i32 {
		self.entries.first().map(|e| e.src_epsg).unwrap_or(4326)
	}

	fn rehydrate(&self, data: &Value) -> Result<Box<dyn SourceTileKey>> {
		let name = data["name"].as_str().context("lidar identity missing name")?;
		let entry = self.entries.iter().find(|e| e.name == name).with_context(|| format!("unknown lidar entry {name:?}"))?;
		Ok(Box::new(self.tile(entry)))
	}
}

struct LidarTile {
	base_dir: String,
	entry: LidarEntryConfig,
}

impl SourceTileKey for LidarTile {
	fn urls(&self) -> Vec<String> {
		vec![self.entry.url.clone()]
	}

	fn output_file(&self) -> String {
		format!("{}/TMR_{}.tif", self.base_dir, self.entry.name)
	}

	fn freeze_dry(&self) -> Value {
		json!({"type": "lidar", "name": self.entry.name})
	}

	fn verify(&self, path: &std::path::Path) -> bool {
		path.extension().and_then(|ext| ext.to_str()).map(|ext| ext.eq_ignore_ascii_case("laz") || ext.eq_ignore_ascii_case("las")).unwrap_or(false)
	}

	fn unpack(&self, downloads: &[ScopedTempFile], store: &dyn BlobStore) -> Result<()> {
		let [las_file] = downloads else {
			anyhow::bail!("lidar unpack expects exactly one downloaded point cloud");
		};
		let scratch = tempdir().context("creating lidar rasterization scratch directory")?;
		let raster_path = scratch.path().join(format!("TMR_{}.tif", self.entry.name));
		let pipeline = json!({
			"pipeline": [
				{
					"type": "readers.las",
					"filename": las_file.path(),
					"spatialreference": format!("EPSG:{}", self.entry.src_epsg),
				},
				{
					"type": "writers.gdal",
					"resolution": self.entry.resolution,
					"radius": self.entry.radius,
					"filename": raster_path,
				},
			]
		});
		let pipeline_path = scratch.path().join(format!("TMR_{}.json", self.entry.name));
		std::fs::write(&pipeline_path, serde_json::to_vec(&pipeline)?).context("writing PDAL pipeline description")?;

		let status = Command::new("pdal").arg("pipeline").arg(&pipeline_path).status().context("running pdal pipeline")?;
		ensure!(status.success(), "pdal pipeline exited with {status}");

		let upload_dir = tempdir().context("creating lidar upload staging directory")?;
		let dest = upload_dir.path().join(self.output_file());
		mask_non_positive(&raster_path, "GTiff", &dest)?;
		store.upload_dir(upload_dir.path())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn entry() -> LidarEntryConfig {
		LidarEntryConfig {
			name: "15_46".to_string(),
			url: "https://example.com/b_01/D96TM/TMR_15_46.laz".to_string(),
			min_x: 15.67583333,
			min_y: 46.38861111,
			max_x: 15.74166667,
			max_y: 46.43305556,
			src_epsg: 3794,
			resolution: 1.0,
			radius: 7.0,
		}
	}

	#[test]
	fn output_file_is_named_after_the_entry() {
		let source = LidarSource { name: "lidar".to_string(), base_dir: "lidar".to_string(), entries: vec![entry()] };
		let tile = source.tile(&entry());
		assert_eq!(tile.output_file(), "lidar/TMR_15_46.tif");
	}

	#[test]
	fn verify_accepts_only_point_cloud_extensions() {
		let source = LidarSource { name: "lidar".to_string(), base_dir: "lidar".to_string(), entries: vec![entry()] };
		let tile = source.tile(&entry());
		assert!(tile.verify(std::path::Path::new("x.laz")));
		assert!(!tile.verify(std::path::Path::new("x.tif")));
	}
}
