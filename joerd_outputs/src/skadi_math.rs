//! Skadi 1°×1° tile math (§4.4), recovered in behavior from
//! `original_source/joerd/output/skadi.py`.

use anyhow::{Result, bail};
use joerd_core::BoundingBox;

/// Pixel width/height of a Skadi tile, including the half-arc-second bleed
/// on every side (3600 arc-seconds per degree, plus one padding row/column).
pub const TILE_PX: usize = 3601;

/// Half an arc-second, in degrees.
pub const HALF_ARC_SEC: f64 = 1.0 / 3600.0 / 2.0;

/// Nominal zoom used when intersecting Skadi tiles against regions (§4.4).
pub const NOMINAL_ZOOM: f64 = 12.3;

/// The geographic bbox of Skadi tile `(x, y)`: one degree square starting at
/// `(x - 180, y - 90)`.
#[must_use]
pub fn tile_bbox(x: u32, y: u32) -> BoundingBox {
	let lon = f64::from(x) - 180.0;
	let lat = f64::from(y) - 90.0;
	BoundingBox::new(lon, lat, lon + 1.0, lat + 1.0).expect("skadi tile bbox is always well-formed")
}

/// `tile_name(x, y)`: the SRTMHGT-style name, e.g. `"N37W060"`.
#[must_use]
pub fn tile_name(x: u32, y: u32) -> String {
	let lon = f64::from(x) - 180.0;
	let lat = f64::from(y) - 90.0;
	let (ns, lat_abs) = if lat >= 0.0 { ('N', lat as u32) } else { ('S', (-lat) as u32) };
	let (ew, lon_abs) = if lon >= 0.0 { ('E', lon as u32) } else { ('W', (-lon) as u32) };
	format!("{ns}{lat_abs:02}{ew}{lon_abs:03}")
}

/// Inverse of [`tile_name`].
pub fn parse_tile_name(name: &str) -> Result<(u32, u32)> {
	let bytes = name.as_bytes();
	if bytes.len() != 7 {
		bail!("{name:?} is not a valid Skadi tile name");
	}
	let ns = bytes[0] as char;
	let lat_abs: i32 = name[1..3].parse()?;
	let ew = bytes[3] as char;
	let lon_abs: i32 = name[4..7].parse()?;

	let lat = match ns {
		'N' => lat_abs,
		'S' => -lat_abs,
		_ => bail!("{name:?} has an invalid N/S designator"),
	};
	let lon = match ew {
		'E' => lon_abs,
		'W' => -lon_abs,
		_ => bail!("{name:?} has an invalid E/W designator"),
	};

	Ok(((lon + 180) as u32, (lat + 90) as u32))
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn concrete_scenario_tile_name() {
		assert_eq!(tile_name(120, 127), "N37W060");
	}

	#[test]
	fn parse_is_the_inverse_of_tile_name_everywhere_in_range() {
		for x in (0..360).step_by(17) {
			for y in (0..180).step_by(13) {
				let name = tile_name(x, y);
				assert_eq!(parse_tile_name(&name).unwrap(), (x, y), "round trip failed for {name}");
			}
		}
	}
}
