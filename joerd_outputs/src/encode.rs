//! Pixel encoders for the three output products. Pixel-level encoding
//! detail is explicitly out of the core's scope (§1); these are plausible,
//! tested implementations of the formulas recovered from
//! `original_source/joerd/output/{terrarium,normal,skadi}.py`, not a literal
//! port.

use joerd_core::types::FLT_NODATA;
use std::sync::OnceLock;

/// Mapbox Terrarium RGB encoding: `(elevation + 32768)` split across R (high
/// byte), G (low byte) and B (sub-meter fraction).
#[must_use]
pub fn encode_terrarium_pixel(elevation: f32) -> [u8; 3] {
	if is_nodata(elevation) {
		return [0, 0, 0];
	}
	let value = (f64::from(elevation) + 32768.0).clamp(0.0, 65535.99);
	let r = (value / 256.0) as u8;
	let g = (value as u32 % 256) as u8;
	let b = (value.fract() * 256.0) as u8;
	[r, g, b]
}

fn is_nodata(elevation: f32) -> bool {
	(elevation - FLT_NODATA).abs() < 1.0
}

/// The hypsometric height→alpha mapping table, generalized from
/// `_generate_mapping_table` in `normal.py`: finer buckets near sea level,
/// coarser at the extremes.
fn height_table() -> &'static [i32] {
	static TABLE: OnceLock<Vec<i32>> = OnceLock::new();
	TABLE.get_or_init(|| {
		let mut table = Vec::new();
		for i in 0..11 {
			table.push(-11000 + i * 1000);
		}
		table.extend([-100, -50, -20, -10, -1]);
		for i in 0..150 {
			table.push(20 * i);
		}
		for i in 0..60 {
			table.push(3000 + 50 * i);
		}
		for i in 0..29 {
			table.push(6000 + 100 * i);
		}
		table
	})
}

/// The hypsometric index for a given elevation, `255 - bisect_left(table,
/// height)`.
#[must_use]
pub fn hypsometric_alpha(elevation: f64) -> u8 {
	let table = height_table();
	let idx = table.partition_point(|&v| f64::from(v) < elevation);
	(255 - i32::try_from(idx).unwrap_or(255)).clamp(0, 255) as u8
}

/// Surface-normal RGB + hypsometric alpha for one pixel, given the elevation
/// at `(x, y)` and its four orthogonal neighbors (already nodata-substituted
/// by the caller) and the ground spacing in meters.
#[must_use]
pub fn encode_normal_pixel(center: f32, west: f32, east: f32, south: f32, north: f32, dx_m: f64, dy_m: f64) -> [u8; 4] {
	if is_nodata(center) {
		return [128, 128, 255, 0];
	}
	let dzdx = (f64::from(east) - f64::from(west)) / (2.0 * dx_m);
	let dzdy = (f64::from(north) - f64::from(south)) / (2.0 * dy_m);

	let (nx, ny, nz) = (-dzdx, -dzdy, 1.0);
	let len = (nx * nx + ny * ny + nz * nz).sqrt();
	let (nx, ny, nz) = (nx / len, ny / len, nz / len);

	let to_byte = |n: f64| ((n * 0.5 + 0.5) * 255.0).clamp(0.0, 255.0) as u8;
	[to_byte(nx), to_byte(ny), to_byte(nz), hypsometric_alpha(f64::from(center))]
}

/// Skadi's SRTMHGT encoding: elevation rounded to the nearest signed 16-bit
/// integer, `-32768` standing in for nodata.
#[must_use]
pub fn encode_skadi_pixel(elevation: f32) -> i16 {
	if is_nodata(elevation) {
		return -32768;
	}
	elevation.round().clamp(-32768.0, 32767.0) as i16
}
