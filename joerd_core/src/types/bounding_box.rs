use anyhow::{Result, ensure};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Debug};

/// A WGS84 bounding box `(min_x, min_y, max_x, max_y)` = `(west, south, east,
/// north)`, in degrees. Immutable once constructed: every mutating-looking
/// method returns a new value.
#[derive(Clone, Copy, PartialEq)]
pub struct BoundingBox {
	pub min_x: f64,
	pub min_y: f64,
	pub max_x: f64,
	pub max_y: f64,
}

/// (De)serializes as the `[left, bottom, right, top]` array form used in
/// configuration (§6) and on the wire, validating bounds the same way
/// [`BoundingBox::new`] does rather than trusting the four fields blindly.
impl Serialize for BoundingBox {
	fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
		[self.min_x, self.min_y, self.max_x, self.max_y].serialize(s)
	}
}

impl<'de> Deserialize<'de> for BoundingBox {
	fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
		let [min_x, min_y, max_x, max_y] = <[f64; 4]>::deserialize(d)?;
		BoundingBox::new(min_x, min_y, max_x, max_y).map_err(serde::de::Error::custom)
	}
}

impl BoundingBox {
	/// Builds a bounding box, clamping to the WGS84 domain `(-180..180,
	/// -90..90)` symmetrically in both bounds.
	pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
		let bbox = BoundingBox {
			min_x: min_x.clamp(-180.0, 180.0),
			min_y: min_y.clamp(-90.0, 90.0),
			max_x: max_x.clamp(-180.0, 180.0),
			max_y: max_y.clamp(-90.0, 90.0),
		};
		ensure!(
			bbox.min_x <= bbox.max_x,
			"min_x ({}) must be <= max_x ({})",
			bbox.min_x,
			bbox.max_x
		);
		ensure!(
			bbox.min_y <= bbox.max_y,
			"min_y ({}) must be <= max_y ({})",
			bbox.min_y,
			bbox.max_y
		);
		Ok(bbox)
	}

	#[must_use]
	pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
		(self.min_x, self.min_y, self.max_x, self.max_y)
	}

	/// True if the two boxes share any point, including a shared edge.
	/// Symmetric and reflexive by construction.
	#[must_use]
	pub fn intersects(&self, other: &BoundingBox) -> bool {
		self.min_x <= other.max_x && other.min_x <= self.max_x && self.min_y <= other.max_y && other.min_y <= self.max_y
	}

	/// Returns a new box expanded by `d` degrees in every direction, clamped
	/// back to the WGS84 domain.
	#[must_use]
	pub fn buffer(&self, d: f64) -> BoundingBox {
		BoundingBox {
			min_x: (self.min_x - d).clamp(-180.0, 180.0),
			min_y: (self.min_y - d).clamp(-90.0, 90.0),
			max_x: (self.max_x + d).clamp(-180.0, 180.0),
			max_y: (self.max_y + d).clamp(-90.0, 90.0),
		}
	}

	/// The center point `(lon, lat)`, used to verify the Mercator tile
	/// round-trip property: `lonlat_to_xy` of a tile's own center must
	/// recover that tile's coordinates.
	#[must_use]
	pub fn center(&self) -> (f64, f64) {
		((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
	}
}

impl Debug for BoundingBox {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "BoundingBox({}, {}, {}, {})", self.min_x, self.min_y, self.max_x, self.max_y)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn intersects_is_symmetric_and_reflexive() {
		let a = BoundingBox::new(-10.0, -10.0, 10.0, 10.0).unwrap();
		let b = BoundingBox::new(5.0, 5.0, 20.0, 20.0).unwrap();
		assert!(a.intersects(&b));
		assert!(b.intersects(&a));
		assert!(a.intersects(&a));
	}

	#[rstest]
	#[case(20.0, 20.0, 30.0, 30.0)] // north-east
	#[case(-30.0, 20.0, -20.0, 30.0)] // north-west
	#[case(20.0, -30.0, 30.0, -20.0)] // south-east
	#[case(-30.0, -30.0, -20.0, -20.0)] // south-west
	#[case(20.0, -5.0, 30.0, 5.0)] // east
	#[case(-30.0, -5.0, -20.0, 5.0)] // west
	#[case(-5.0, 20.0, 5.0, 30.0)] // north
	#[case(-5.0, -30.0, 5.0, -20.0)] // south
	fn non_intersecting_neighbors_return_false(#[case] min_x: f64, #[case] min_y: f64, #[case] max_x: f64, #[case] max_y: f64) {
		let center = BoundingBox::new(-10.0, -10.0, 10.0, 10.0).unwrap();
		let neighbor = BoundingBox::new(min_x, min_y, max_x, max_y).unwrap();
		assert!(!center.intersects(&neighbor));
	}

	#[test]
	fn shared_edge_intersects() {
		let a = BoundingBox::new(-10.0, -10.0, 0.0, 10.0).unwrap();
		let b = BoundingBox::new(0.0, -10.0, 10.0, 10.0).unwrap();
		assert!(a.intersects(&b));
	}

	#[test]
	fn buffer_expands_and_clamps() {
		let bbox = BoundingBox::new(-179.0, -89.0, 179.0, 89.0).unwrap();
		let buffered = bbox.buffer(5.0);
		assert_eq!(buffered.as_tuple(), (-180.0, -90.0, 180.0, 90.0));
	}
}
