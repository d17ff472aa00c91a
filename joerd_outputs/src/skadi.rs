//! The Skadi output product (§4.4): gzipped SRTMHGT tiles, one degree
//! square, on a fixed 1-arc-second grid independent of any zoom pyramid.

use crate::encode::encode_skadi_pixel;
use crate::skadi_math::{HALF_ARC_SEC, TILE_PX, parse_tile_name, tile_bbox, tile_name};
use crate::traits::{OutputPlugin, RenderTile};
use anyhow::{Context, Result};
use byteorder::{BigEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::GzEncoder;
use gdal::{DriverManager, spatial_ref::SpatialRef};
use joerd_compositor::{CompositeSource, compose};
use joerd_core::{BoundingBox, OutputTileKey, Region};
use serde_json::{Value, json};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct SkadiOutput {
	regions: Vec<Region>,
}

impl SkadiOutput {
	#[must_use]
	pub fn new(regions: Vec<Region>) -> Self {
		SkadiOutput { regions }
	}
}

impl OutputPlugin for SkadiOutput {
	fn name(&self) -> &str {
		"skadi"
	}

	fn generate_tiles(&self) -> Result<Vec<Box<dyn RenderTile>>> {
		let mut seen = std::collections::HashSet::new();
		let mut tiles: Vec<Box<dyn RenderTile>> = Vec::new();
		for region in &self.regions {
			let x0 = (region.bbox.min_x + 180.0).floor().max(0.0) as u32;
			let x1 = (region.bbox.max_x + 180.0).ceil().min(359.0) as u32;
			let y0 = (region.bbox.min_y + 90.0).floor().max(0.0) as u32;
			let y1 = (region.bbox.max_y + 90.0).ceil().min(179.0) as u32;
			for x in x0..=x1 {
				for y in y0..=y1 {
					if seen.insert((x, y)) {
						tiles.push(Box::new(SkadiTile { x, y, sources: Vec::new() }));
					}
				}
			}
		}
		Ok(tiles)
	}

	fn expand_tile(&self, region: &Region) -> Vec<(BoundingBox, f64)> {
		vec![(region.bbox, 1.0 / 3600.0)]
	}

	fn rehydrate(&self, data: &Value) -> Result<Box<dyn RenderTile>> {
		if let Some(name) = data["name"].as_str() {
			let (x, y) = parse_tile_name(name)?;
			return Ok(Box::new(SkadiTile { x, y, sources: Vec::new() }));
		}
		let x = data["x"].as_u64().context("skadi tile identity missing x")? as u32;
		let y = data["y"].as_u64().context("skadi tile identity missing y")? as u32;
		Ok(Box::new(SkadiTile { x, y, sources: Vec::new() }))
	}
}

pub struct SkadiTile {
	x: u32,
	y: u32,
	sources: Vec<Box<dyn CompositeSource>>,
}

impl OutputTileKey for SkadiTile {
	fn freeze_dry(&self) -> Value {
		json!({"type": "skadi", "name": tile_name(self.x, self.y), "x": self.x, "y": self.y})
	}

	fn latlon_bbox(&self) -> BoundingBox {
		tile_bbox(self.x, self.y)
	}

	fn max_resolution(&self) -> f64 {
		1.0 / 3600.0
	}
}

impl RenderTile for SkadiTile {
	fn tile_name(&self) -> String {
		tile_name(self.x, self.y)
	}

	fn set_sources(&mut self, sources: Vec<Box<dyn CompositeSource>>) {
		self.sources = sources;
	}

	fn render(&self, tmp_dir: &Path) -> Result<()> {
		let bbox = self.latlon_bbox();
		let px = 1.0 / 3600.0;
		let lon0 = bbox.min_x - HALF_ARC_SEC;
		let lat1 = bbox.max_y + HALF_ARC_SEC;

		let driver = DriverManager::get_driver_by_name("MEM").context("getting the MEM driver")?;
		let mut dst = driver
			.create_with_band_type::<f32, _>("", TILE_PX, TILE_PX, 1)
			.context("allocating the skadi destination raster")?;
		dst.set_spatial_ref(&SpatialRef::from_epsg(4326).context("resolving EPSG:4326")?)?;
		dst.set_geo_transform(&[lon0, px, 0.0, lat1, 0.0, -px])?;

		compose(self, &self.sources, &mut dst, px).context("compositing skadi tile")?;

		let elevations = dst.rasterband(1)?.read_band_as::<f32>()?;
		let mut raw = Vec::with_capacity(TILE_PX * TILE_PX * 2);
		for elevation in elevations.data() {
			raw.write_i16::<BigEndian>(encode_skadi_pixel(*elevation))?;
		}

		let name = self.tile_name();
		let sub_dir = tmp_dir.join(&name[0..3]);
		fs::create_dir_all(&sub_dir).context("creating the skadi output directory")?;
		let out_path = sub_dir.join(format!("{name}.hgt.gz"));
		let file = File::create(&out_path).with_context(|| format!("creating {out_path:?}"))?;
		let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
		encoder.write_all(&raw).context("writing gzipped SRTMHGT data")?;
		encoder.finish().context("finishing gzip stream")?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn rehydrate_from_name_recovers_coordinates() {
		let output = SkadiOutput::new(vec![]);
		let tile = output.rehydrate(&json!({"type": "skadi", "name": "N37W060"})).unwrap();
		assert_eq!(tile.tile_name(), "N37W060");
	}

	#[test]
	fn generate_tiles_covers_a_small_region() {
		let region = Region::new(BoundingBox::new(-60.5, 36.5, -59.5, 37.5).unwrap(), 0..1);
		let output = SkadiOutput::new(vec![region]);
		let tiles = output.generate_tiles().unwrap();
		let names: Vec<String> = tiles.iter().map(|t| t.tile_name()).collect();
		assert!(names.contains(&"N37W060".to_string()));
	}
}
