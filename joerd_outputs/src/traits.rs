//! The Output Plugin interface (§4.4).

use anyhow::Result;
use joerd_compositor::CompositeSource;
use joerd_core::{BoundingBox, OutputTileKey, Region};
use serde_json::Value;
use std::path::Path;

/// One concrete output tile, with the render-time behavior `OutputTileKey`
/// doesn't carry: a human-readable path fragment, the sources the worker
/// attached, and the encode-and-write step.
pub trait RenderTile: OutputTileKey {
	/// The tile's path fragment under the output store, e.g. `"13/1308/3165"`
	/// or `"N37/N37W060"`.
	fn tile_name(&self) -> String;

	/// Attaches the ordered list of sources (real or `MockSource`-wrapped)
	/// this tile composites from. Called once by the worker before
	/// `render`.
	fn set_sources(&mut self, sources: Vec<Box<dyn CompositeSource>>);

	/// Computes the destination grid, composites it (via
	/// `joerd_compositor::compose`), applies the pixel encoding, and writes
	/// the result(s) under `tmp_dir`.
	fn render(&self, tmp_dir: &Path) -> Result<()>;
}

/// A registered output product: knows how to enumerate its own tiles and
/// reconstruct one from a frozen identity.
pub trait OutputPlugin: Send + Sync {
	fn name(&self) -> &str;

	/// Every tile, across every configured region and zoom in its range,
	/// this output produces. Deduplicated.
	fn generate_tiles(&self) -> Result<Vec<Box<dyn RenderTile>>>;

	/// Translates a region into concrete `(bbox, resolution)` pairs used by
	/// download planning to query sources without enumerating every tile.
	fn expand_tile(&self, region: &Region) -> Vec<(BoundingBox, f64)>;

	/// Reconstructs a `RenderTile` from its frozen identity, without sources
	/// attached.
	fn rehydrate(&self, data: &Value) -> Result<Box<dyn RenderTile>>;
}
