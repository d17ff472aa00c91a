//! The shared tile-identity contract both source and output plugins are
//! built against (§3). Living here, rather than in `joerd_outputs`, lets
//! `joerd_sources` depend on the shape of an output tile (resolution, bbox)
//! without depending on any concrete output plugin.

use crate::types::BoundingBox;
use serde_json::Value;

/// Identifies one tile of a rendered output product: enough for a source
/// plugin to decide which of its own tiles contribute, without knowing
/// anything about how the output itself is encoded.
pub trait OutputTileKey: Send + Sync {
	/// The canonical JSON identity of this tile, as carried in a `render`
	/// job's `data` field.
	fn freeze_dry(&self) -> Value;

	/// The geographic footprint this tile covers, in WGS84 lon/lat degrees.
	fn latlon_bbox(&self) -> BoundingBox;

	/// The finest resolution, in degrees per pixel, this tile is rendered
	/// at. Source plugins compare their own native resolution against this
	/// to decide whether they're too coarse to matter.
	fn max_resolution(&self) -> f64;
}
