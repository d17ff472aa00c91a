use anyhow::Result;
use std::path::Path;

/// Content-addressed-by-path storage, shared by the source store (canonical
/// unpacked rasters) and the output store (final product tiles). `exists`
/// never raises (§4.2: "`exists` never raises"); `get` and `upload_dir` fail
/// loudly on I/O errors.
pub trait BlobStore: Send + Sync {
	/// True if `path` is present in the store. Implementations must treat
	/// any lookup failure (not-found, forbidden-list) as `false` rather than
	/// propagating an error.
	fn exists(&self, path: &str) -> bool;

	/// Atomically makes the blob at `path` available at `local_path`.
	fn get(&self, path: &str, local_path: &Path) -> Result<()>;

	/// Recursively uploads everything beneath `local_dir`, preserving
	/// relative paths and setting `Content-Type` from extension for
	/// `.png`, `.tif`, `.xml`, `.gz`.
	fn upload_dir(&self, local_dir: &Path) -> Result<()>;

	/// The local filesystem root this store's paths resolve under, if it has
	/// one. `None` for stores with no on-disk footprint to reclaim (a remote
	/// HTTP store); used by [`crate::ReclaimPolicy`] to know where to delete
	/// from.
	fn local_root(&self) -> Option<&Path> {
		None
	}
}

/// Content-type guess used by every `upload_dir` implementation, matching
/// §4.2's explicit extension list: `.png`, `.tif`, `.xml`, `.gz`, and
/// everything else as an opaque octet stream.
#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
	match path.extension().and_then(|e| e.to_str()) {
		Some("png") => "image/png",
		Some("tif") => "image/tiff",
		Some("xml") => "application/xml",
		Some("gz") => "application/gzip",
		_ => "application/octet-stream",
	}
}
