//! The terrarium output product (§4.4): Mapbox-style RGB-encoded elevation
//! PNG tiles on the Web Mercator pyramid.

use crate::encode::encode_terrarium_pixel;
use crate::mercator::{TILE_SIZE, latlon_bbox, lonlat_to_xy, mercator_bbox};
use crate::traits::{OutputPlugin, RenderTile};
use anyhow::{Context, Result};
use gdal::{DriverManager, raster::Buffer, spatial_ref::SpatialRef};
use joerd_compositor::{CompositeSource, compose};
use joerd_core::{BoundingBox, OutputTileKey, Region};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

pub struct TerrariumOutput {
	regions: Vec<Region>,
}

impl TerrariumOutput {
	#[must_use]
	pub fn new(regions: Vec<Region>) -> Self {
		TerrariumOutput { regions }
	}
}

impl OutputPlugin for TerrariumOutput {
	fn name(&self) -> &str {
		"terrarium"
	}

	fn generate_tiles(&self) -> Result<Vec<Box<dyn RenderTile>>> {
		let mut seen = std::collections::HashSet::new();
		let mut tiles: Vec<Box<dyn RenderTile>> = Vec::new();
		for region in &self.regions {
			for z in region.zoom_range.clone() {
				let n = 1u32 << z;
				let (x0, y0) = lonlat_to_xy(z, region.bbox.min_x, region.bbox.max_y);
				let (x1, y1) = lonlat_to_xy(z, region.bbox.max_x, region.bbox.min_y);
				for x in x0..=x1.min(n - 1) {
					for y in y0..=y1.min(n - 1) {
						if seen.insert((z, x, y)) {
							tiles.push(Box::new(TerrariumTile { z, x, y, sources: Vec::new() }));
						}
					}
				}
			}
		}
		Ok(tiles)
	}

	fn expand_tile(&self, region: &Region) -> Vec<(BoundingBox, f64)> {
		region
			.zoom_range
			.clone()
			.map(|z| (region.bbox, (latlon_bbox(z, 0, 0).max_x - latlon_bbox(z, 0, 0).min_x) / f64::from(TILE_SIZE)))
			.collect()
	}

	fn rehydrate(&self, data: &Value) -> Result<Box<dyn RenderTile>> {
		let z = data["z"].as_u64().context("terrarium tile identity missing z")? as u8;
		let x = data["x"].as_u64().context("terrarium tile identity missing x")? as u32;
		let y = data["y"].as_u64().context("terrarium tile identity missing y")? as u32;
		Ok(Box::new(TerrariumTile { z, x, y, sources: Vec::new() }))
	}
}

pub struct TerrariumTile {
	z: u8,
	x: u32,
	y: u32,
	sources: Vec<Box<dyn CompositeSource>>,
}

impl OutputTileKey for TerrariumTile {
	fn freeze_dry(&self) -> Value {
		json!({"type": "terrarium", "z": self.z, "x": self.x, "y": self.y})
	}

	fn latlon_bbox(&self) -> BoundingBox {
		latlon_bbox(self.z, self.x, self.y)
	}

	fn max_resolution(&self) -> f64 {
		let bbox = self.latlon_bbox();
		(bbox.max_x - bbox.min_x) / f64::from(TILE_SIZE)
	}
}

impl RenderTile for TerrariumTile {
	fn tile_name(&self) -> String {
		format!("{}/{}/{}", self.z, self.x, self.y)
	}

	fn set_sources(&mut self, sources: Vec<Box<dyn CompositeSource>>) {
		self.sources = sources;
	}

	fn render(&self, tmp_dir: &Path) -> Result<()> {
		let driver = DriverManager::get_driver_by_name("MEM").context("getting the MEM driver")?;
		let size = TILE_SIZE as usize;
		let mut dst = driver
			.create_with_band_type::<f32, _>("", size, size, 1)
			.context("allocating the terrarium destination raster")?;
		dst.set_spatial_ref(&SpatialRef::from_epsg(3857).context("resolving EPSG:3857")?)?;
		let (mx0, _my0, mx1, my1) = mercator_bbox(self.z, self.x, self.y);
		let px = (mx1 - mx0) / f64::from(TILE_SIZE);
		dst.set_geo_transform(&[mx0, px, 0.0, my1, 0.0, -px])?;

		compose(self, &self.sources, &mut dst, self.max_resolution()).context("compositing terrarium tile")?;

		let elevations = dst.rasterband(1)?.read_band_as::<f32>()?;
		let mut rgb = vec![0u8; size * size * 3];
		for (i, elevation) in elevations.data().iter().enumerate() {
			let [r, g, b] = encode_terrarium_pixel(*elevation);
			rgb[i * 3] = r;
			rgb[i * 3 + 1] = g;
			rgb[i * 3 + 2] = b;
		}

		let mem_driver = DriverManager::get_driver_by_name("MEM").context("getting the MEM driver")?;
		let mut rgb_ds = mem_driver.create_with_band_type::<u8, _>("", size, size, 3).context("allocating RGB raster")?;
		for band_index in 0..3 {
			let mut band = rgb_ds.rasterband(band_index + 1)?;
			let channel: Vec<u8> = (0..size * size).map(|i| rgb[i * 3 + band_index]).collect();
			let mut buffer = Buffer::new((size, size), channel);
			band.write((0, 0), (size, size), &mut buffer)?;
		}

		let png_driver = DriverManager::get_driver_by_name("PNG").context("getting the PNG driver")?;
		let out_path = tmp_dir.join(format!("{}.png", self.tile_name()));
		if let Some(parent) = out_path.parent() {
			fs::create_dir_all(parent).context("creating the terrarium output directory")?;
		}
		png_driver
			.create_copy(&rgb_ds, &out_path)
			.context("writing terrarium PNG")?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn generate_tiles_covers_the_region_at_each_zoom() {
		let region = Region::new(BoundingBox::new(-1.0, -1.0, 1.0, 1.0).unwrap(), 4..5);
		let output = TerrariumOutput::new(vec![region]);
		let tiles = output.generate_tiles().unwrap();
		assert!(!tiles.is_empty());
		for tile in &tiles {
			let data = tile.freeze_dry();
			assert_eq!(data["type"], json!("terrarium"));
			assert_eq!(data["z"], json!(4));
		}
	}

	#[test]
	fn rehydrate_recovers_the_same_identity() {
		let output = TerrariumOutput::new(vec![]);
		let tile = output.rehydrate(&json!({"type": "terrarium", "z": 13, "x": 1308, "y": 3165})).unwrap();
		assert_eq!(tile.freeze_dry(), json!({"type": "terrarium", "z": 13, "x": 1308, "y": 3165}));
	}
}
