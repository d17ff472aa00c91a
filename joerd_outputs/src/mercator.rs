//! Web Mercator tile math (§4.4), generalized from the teacher's
//! `TileCoord2::from_geo` with the ±85.051129° clip made an explicit
//! constant at the call site, per the distilled specification's testable
//! property list (§8).

use joerd_core::BoundingBox;
use joerd_core::types::{EARTH_RADIUS, MAX_MERCATOR_LAT};
use std::f64::consts::PI;

pub const TILE_SIZE: u32 = 256;

/// Circumference of the spherical Mercator world, in meters (`2 * pi * R`).
pub const WORLD_SIZE: f64 = 2.0 * PI * EARTH_RADIUS;

/// `lonlat_to_xy(z, lon, lat)`: clips latitude to `±MAX_MERCATOR_LAT`,
/// applies the standard spherical Mercator forward projection, and floors
/// into the `2^z × 2^z` grid.
#[must_use]
pub fn lonlat_to_xy(z: u8, lon: f64, lat: f64) -> (u32, u32) {
	let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
	let n = 2f64.powi(i32::from(z));

	let x = n * ((lon + 180.0) / 360.0);
	let lat_rad = lat.to_radians();
	let y = n * (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;

	let max_index = (n as u32).saturating_sub(1);
	(
		(x.floor() as i64).clamp(0, i64::from(max_index)) as u32,
		(y.floor() as i64).clamp(0, i64::from(max_index)) as u32,
	)
}

/// The tile's extent in meters in EPSG:3857: `(min_x, min_y, max_x, max_y)`.
#[must_use]
pub fn mercator_bbox(z: u8, x: u32, y: u32) -> (f64, f64, f64, f64) {
	let n = 2f64.powi(i32::from(z));
	let tile_size_m = WORLD_SIZE / n;
	let min_x = -WORLD_SIZE / 2.0 + f64::from(x) * tile_size_m;
	let max_x = min_x + tile_size_m;
	let max_y = WORLD_SIZE / 2.0 - f64::from(y) * tile_size_m;
	let min_y = max_y - tile_size_m;
	(min_x, min_y, max_x, max_y)
}

/// The tile's geographic bbox, the inverse spherical Mercator projection of
/// [`mercator_bbox`]'s corners.
#[must_use]
pub fn latlon_bbox(z: u8, x: u32, y: u32) -> BoundingBox {
	let (min_x, min_y, max_x, max_y) = mercator_bbox(z, x, y);
	let (lon_min, lat_min) = meters_to_lonlat(min_x, min_y);
	let (lon_max, lat_max) = meters_to_lonlat(max_x, max_y);
	BoundingBox::new(lon_min, lat_min, lon_max, lat_max).expect("mercator tile bbox is always well-formed")
}

fn meters_to_lonlat(x: f64, y: f64) -> (f64, f64) {
	let lon = x / WORLD_SIZE * 360.0;
	let lat = (PI / 2.0 - 2.0 * (-y / EARTH_RADIUS).exp().atan()).to_degrees();
	(lon, lat)
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	#[rstest]
	#[case(16, -122.39197, 37.79125, 10487, 25327)]
	#[case(16, 149.12446, -35.30816, 59915, 39645)]
	fn concrete_scenario_lonlat_to_xy(#[case] z: u8, #[case] lon: f64, #[case] lat: f64, #[case] x: u32, #[case] y: u32) {
		assert_eq!(lonlat_to_xy(z, lon, lat), (x, y));
	}

	#[rstest]
	#[case(0)]
	#[case(5)]
	#[case(14)]
	#[case(19)]
	fn corners_map_to_grid_corners(#[case] z: u8) {
		let n = 1u32 << z;
		assert_eq!(lonlat_to_xy(z, -180.0, 90.0), (0, 0));
		assert_eq!(lonlat_to_xy(z, 180.0, -90.0), (n - 1, n - 1));
	}

	#[rstest]
	#[case(0, 0, 0)]
	#[case(8, 41, 99)]
	#[case(13, 1308, 3165)]
	#[case(19, 400000, 300000)]
	fn mercator_round_trip_through_tile_center(#[case] z: u8, #[case] x: u32, #[case] y: u32) {
		let bbox = latlon_bbox(z, x, y);
		let (lon, lat) = bbox.center();
		assert_eq!(lonlat_to_xy(z, lon, lat), (x, y));
	}
}
