//! The normal-map output product (§4.4): surface-normal RGB plus a
//! hypsometric-tint alpha channel, on the same Web Mercator pyramid as
//! terrarium.

use crate::encode::encode_normal_pixel;
use crate::mercator::{TILE_SIZE, latlon_bbox, lonlat_to_xy, mercator_bbox};
use crate::traits::{OutputPlugin, RenderTile};
use anyhow::{Context, Result};
use gdal::{DriverManager, raster::Buffer, spatial_ref::SpatialRef};
use joerd_compositor::{CompositeSource, compose};
use joerd_core::{BoundingBox, OutputTileKey, Region};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

pub struct NormalOutput {
	regions: Vec<Region>,
}

impl NormalOutput {
	#[must_use]
	pub fn new(regions: Vec<Region>) -> Self {
		NormalOutput { regions }
	}
}

impl OutputPlugin for NormalOutput {
	fn name(&self) -> &str {
		"normal"
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
							tiles.push(Box::new(NormalTile { z, x, y, sources: Vec::new() }));
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
		let z = data["z"].as_u64().context("normal tile identity missing z")? as u8;
		let x = data["x"].as_u64().context("normal tile identity missing x")? as u32;
		let y = data["y"].as_u64().context("normal tile identity missing y")? as u32;
		Ok(Box::new(NormalTile { z, x, y, sources: Vec::new() }))
	}
}

pub struct NormalTile {
	z: u8,
	x: u32,
	y: u32,
	sources: Vec<Box<dyn CompositeSource>>,
}

impl OutputTileKey for NormalTile {
	fn freeze_dry(&self) -> Value {
		json!({"type": "normal", "z": self.z, "x": self.x, "y": self.y})
	}

	fn latlon_bbox(&self) -> BoundingBox {
		latlon_bbox(self.z, self.x, self.y)
	}

	fn max_resolution(&self) -> f64 {
		let bbox = self.latlon_bbox();
		(bbox.max_x - bbox.min_x) / f64::from(TILE_SIZE)
	}
}

impl RenderTile for NormalTile {
	fn tile_name(&self) -> String {
		format!("{}/{}/{}", self.z, self.x, self.y)
	}

	fn set_sources(&mut self, sources: Vec<Box<dyn CompositeSource>>) {
		self.sources = sources;
	}

	fn render(&self, tmp_dir: &Path) -> Result<()> {
		let size = TILE_SIZE as usize;
		// Bleed margin beyond the nominal tile footprint so the gradient at
		// the tile's own edge still has real neighbor data to sample from,
		// rather than clamping onto the tile's own border pixel.
		let margin = 1i64;
		let mid_size = size + 2 * margin as usize;

		let driver = DriverManager::get_driver_by_name("MEM").context("getting the MEM driver")?;
		let mut dst = driver
			.create_with_band_type::<f32, _>("", mid_size, mid_size, 1)
			.context("allocating the normal destination raster")?;
		dst.set_spatial_ref(&SpatialRef::from_epsg(3857).context("resolving EPSG:3857")?)?;
		let (mx0, _my0, mx1, my1) = mercator_bbox(self.z, self.x, self.y);
		let px_m = (mx1 - mx0) / f64::from(TILE_SIZE);
		let mid_x0 = mx0 - margin as f64 * px_m;
		let mid_y1 = my1 + margin as f64 * px_m;
		dst.set_geo_transform(&[mid_x0, px_m, 0.0, mid_y1, 0.0, -px_m])?;

		compose(self, &self.sources, &mut dst, self.max_resolution()).context("compositing normal tile")?;

		let elevations = dst.rasterband(1)?.read_band_as::<f32>()?;
		let data = elevations.data();
		let at = |x: i64, y: i64| -> f32 {
			let x = (x + margin).clamp(0, mid_size as i64 - 1) as usize;
			let y = (y + margin).clamp(0, mid_size as i64 - 1) as usize;
			data[y * mid_size + x]
		};

		let mut rgba = vec![0u8; size * size * 4];
		for row in 0..size {
			for col in 0..size {
				let center = at(col as i64, row as i64);
				let west = at(col as i64 - 1, row as i64);
				let east = at(col as i64 + 1, row as i64);
				let south = at(col as i64, row as i64 + 1);
				let north = at(col as i64, row as i64 - 1);
				let pixel = encode_normal_pixel(center, west, east, south, north, px_m, px_m);
				let idx = (row * size + col) * 4;
				rgba[idx..idx + 4].copy_from_slice(&pixel);
			}
		}

		let mem_driver = DriverManager::get_driver_by_name("MEM").context("getting the MEM driver")?;
		let mut rgba_ds = mem_driver.create_with_band_type::<u8, _>("", size, size, 4).context("allocating RGBA raster")?;
		for band_index in 0..4 {
			let mut band = rgba_ds.rasterband(band_index + 1)?;
			let channel: Vec<u8> = (0..size * size).map(|i| rgba[i * 4 + band_index]).collect();
			let mut buffer = Buffer::new((size, size), channel);
			band.write((0, 0), (size, size), &mut buffer)?;
		}

		let png_driver = DriverManager::get_driver_by_name("PNG").context("getting the PNG driver")?;
		let out_path = tmp_dir.join(format!("{}.png", self.tile_name()));
		if let Some(parent) = out_path.parent() {
			fs::create_dir_all(parent).context("creating the normal output directory")?;
		}
		png_driver.create_copy(&rgba_ds, &out_path).context("writing normal PNG")?;
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
		let output = NormalOutput::new(vec![region]);
		let tiles = output.generate_tiles().unwrap();
		assert!(!tiles.is_empty());
		for tile in &tiles {
			let data = tile.freeze_dry();
			assert_eq!(data["type"], json!("normal"));
			assert_eq!(data["z"], json!(4));
		}
	}

	#[test]
	fn rehydrate_recovers_the_same_identity() {
		let output = NormalOutput::new(vec![]);
		let tile = output.rehydrate(&json!({"type": "normal", "z": 5, "x": 10, "y": 12})).unwrap();
		assert_eq!(tile.freeze_dry(), json!({"type": "normal", "z": 5, "x": 10, "y": 12}));
	}
}
