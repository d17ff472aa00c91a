use anyhow::{Result, bail};
use joerd_core::{JoerdError, OutputTileKey, ResampleAlg};
use joerd_download::{Downloader, DownloadOptions, ScopedTempFile};
use joerd_store::BlobStore;
use serde_json::Value;

/// A single downloadable unit belonging to a source: a remote raster, an
/// archive, or a pair of matched archives (a data file plus a companion
/// water mask, for example). One `SourceTileKey` corresponds to one
/// `download` job on the wire.
pub trait SourceTileKey: Send + Sync {
	/// Every URL that must be fetched for this tile, in download order.
	fn urls(&self) -> Vec<String>;

	/// The store-relative path this tile's unpacked raster is written to.
	fn output_file(&self) -> String;

	/// The canonical JSON identity carried on a `download` job and inside a
	/// `render` job's `SourceReference`.
	fn freeze_dry(&self) -> Value;

	/// Verifies a fully downloaded file at `path` looks complete. Matches
	/// the baseline pipeline's `check.is_zip`/`check.is_gdal`/`check.is_tar_gz`
	/// family; `None` means "accept whatever downloaded".
	fn verify(&self, path: &std::path::Path) -> bool;

	/// Unpacks the downloaded files (one scoped temp file per `urls()`
	/// entry, in the same order) into `store` at `output_file()`.
	fn unpack(&self, downloads: &[ScopedTempFile], store: &dyn BlobStore) -> Result<()>;
}

/// A registered elevation data source: knows which of its own tiles
/// contribute to a given output tile, how those tiles should be grouped
/// into non-overlapping VRT groups, and how to resample when compositing.
pub trait SourcePlugin: Send + Sync {
	fn name(&self) -> &str;

	/// Refreshes this source's local catalog of available tiles, if it has
	/// one. A no-op for sources with a static catalog.
	fn get_index(&self) -> Result<()> {
		Ok(())
	}

	/// Every tile of this source that contributes to `tile`, deduplicated.
	fn downloads_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Box<dyn SourceTileKey>>>;

	/// `downloads_for`, grouped into VRT groups: tiles that may overlap
	/// within this source are split across groups so no two overlapping
	/// rasters land in the same GDAL VRT (which would silently drop one).
	fn vrts_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Vec<Box<dyn SourceTileKey>>>>;

	/// The resampling algorithm to use when warping this source's rasters
	/// from `src_res` to `dst_res` (degrees/pixel).
	fn filter_type(&self, src_res: f64, dst_res: f64) -> ResampleAlg;

	/// EPSG code of this source's native spatial reference.
	fn srs_epsg(&self) -> i32;

	/// Reconstructs a `SourceTileKey` from its frozen identity, without
	/// touching the network or the catalog.
	fn rehydrate(&self, data: &Value) -> Result<Box<dyn SourceTileKey>>;

	/// Store-relative paths of every tile of this source already present,
	/// used to report cache coverage. Defaults to empty for sources that
	/// don't track this locally.
	fn existing_files(&self) -> Result<Vec<String>> {
		Ok(Vec::new())
	}
}

/// Downloads every URL of a tile, in order, and returns them as stacked
/// scope guards — earlier guards outlive later ones, and all release on
/// every exit path including an early error return (§4.1's "scoped resource
/// acquisition across many URLs"). Each downloaded file is checked with
/// `tile.verify` once the transfer completes.
pub fn download_tile(tile: &dyn SourceTileKey, downloader: &Downloader, tries: u32) -> Result<Vec<ScopedTempFile>> {
	tile.urls()
		.iter()
		.map(|url| {
			let options = DownloadOptions::new().with_tries(tries);
			let downloaded = downloader.get(url, &options)?;
			if !tile.verify(downloaded.path()) {
				bail!(JoerdError::DownloadFailed { url: url.clone() });
			}
			Ok(downloaded)
		})
		.collect()
}
