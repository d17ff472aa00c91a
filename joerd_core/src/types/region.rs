use super::BoundingBox;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A spatial + zoom specification of what tiles a run must produce.
/// Immutable once loaded from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
	pub bbox: BoundingBox,
	#[serde(with = "zoom_range")]
	pub zoom_range: Range<u8>,
}

impl Region {
	#[must_use]
	pub fn new(bbox: BoundingBox, zoom_range: Range<u8>) -> Self {
		Region { bbox, zoom_range }
	}

	/// Half-open zoom membership: `zmin <= zoom < zmax`, combined with
	/// spatial overlap against `bbox`.
	#[must_use]
	pub fn intersects(&self, bbox: &BoundingBox, zoom: u8) -> bool {
		self.zoom_range.contains(&zoom) && self.bbox.intersects(bbox)
	}
}

/// `serde` doesn't know how to (de)serialize `Range<u8>` directly; represent
/// it as the two-element `[zmin, zmax]` array used in configuration (§6).
mod zoom_range {
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use std::ops::Range;

	pub fn serialize<S: Serializer>(range: &Range<u8>, s: S) -> Result<S::Ok, S::Error> {
		[range.start, range.end].serialize(s)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Range<u8>, D::Error> {
		let [start, end] = <[u8; 2]>::deserialize(d)?;
		Ok(start..end)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn intersects_checks_both_space_and_zoom() {
		let region = Region::new(BoundingBox::new(-10.0, -10.0, 10.0, 10.0).unwrap(), 8..10);
		let tile_bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
		assert!(region.intersects(&tile_bbox, 8));
		assert!(region.intersects(&tile_bbox, 9));
		assert!(!region.intersects(&tile_bbox, 10), "zoom_range is half-open");
		assert!(!region.intersects(&tile_bbox, 7));

		let far_bbox = BoundingBox::new(50.0, 50.0, 51.0, 51.0).unwrap();
		assert!(!region.intersects(&far_bbox, 8));
	}

	#[test]
	fn zoom_range_round_trips_through_json() {
		let region = Region::new(BoundingBox::new(-1.0, -1.0, 1.0, 1.0).unwrap(), 3..7);
		let json = serde_json::to_string(&region).unwrap();
		let back: Region = serde_json::from_str(&json).unwrap();
		assert_eq!(region, back);
	}
}
