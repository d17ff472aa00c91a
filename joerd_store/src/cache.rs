use crate::traits::BlobStore;
use anyhow::{Context, Result};
use joerd_derive::context;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Wraps an inner store but intercepts `get` for a configured whitelist of
/// path prefixes — the large, frequently-reused world rasters such as the
/// single global ETOPO1 (§4.2). On first `get` the file is copied into a
/// local cache directory; subsequent gets hard-link from the cache into the
/// destination, so repeated jobs on one host never re-fetch the same 446 MB
/// file. The teacher's hardlink-on-reuse idea is generalized here from a
/// hardcoded `'ETOPO1' in source` substring check to a configuration-driven
/// set of path prefixes.
pub struct CacheStore {
	inner: Arc<dyn BlobStore>,
	cache_dir: PathBuf,
	whitelist: HashSet<String>,
}

impl CacheStore {
	#[must_use]
	pub fn new(inner: Arc<dyn BlobStore>, cache_dir: impl Into<PathBuf>, whitelist: impl IntoIterator<Item = String>) -> Self {
		CacheStore {
			inner,
			cache_dir: cache_dir.into(),
			whitelist: whitelist.into_iter().collect(),
		}
	}

	fn is_cached_path(&self, path: &str) -> bool {
		self.whitelist.iter().any(|prefix| path.starts_with(prefix.as_str()))
	}
}

impl BlobStore for CacheStore {
	fn exists(&self, path: &str) -> bool {
		self.inner.exists(path)
	}

	#[context("Failed to fetch {path:?} through the cache store")]
	fn get(&self, path: &str, local_path: &Path) -> Result<()> {
		if !self.is_cached_path(path) {
			return self.inner.get(path, local_path);
		}

		let cache_path = self.cache_dir.join(path);
		if !cache_path.exists() {
			if let Some(parent) = cache_path.parent() {
				fs::create_dir_all(parent)?;
			}
			self.inner.get(path, &cache_path)?;
		}

		if let Some(parent) = local_path.parent() {
			fs::create_dir_all(parent)?;
		}
		// Hard-link rather than copy: the OS reference-counts the inode, so
		// there's no question of when it's safe to delete the local copy.
		match fs::hard_link(&cache_path, local_path) {
			Ok(()) => Ok(()),
			Err(_) => fs::copy(&cache_path, local_path).map(|_| ()).context("copying from cache after hard-link failed"),
		}
	}

	fn upload_dir(&self, local_dir: &Path) -> Result<()> {
		self.inner.upload_dir(local_dir)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::FilesystemStore;

	#[test]
	fn second_get_hard_links_from_cache() {
		let source_dir = tempfile::tempdir().unwrap();
		fs::write(source_dir.path().join("etopo1/ETOPO1_Bed_g_geotiff.tif"), b"world raster").unwrap();
		let inner = Arc::new(FilesystemStore::new(source_dir.path()));

		let cache_dir = tempfile::tempdir().unwrap();
		let store = CacheStore::new(inner, cache_dir.path(), ["etopo1/".to_string()]);

		let dest_dir = tempfile::tempdir().unwrap();
		let dest_a = dest_dir.path().join("job_a/etopo1.tif");
		let dest_b = dest_dir.path().join("job_b/etopo1.tif");

		store.get("etopo1/ETOPO1_Bed_g_geotiff.tif", &dest_a).unwrap();
		store.get("etopo1/ETOPO1_Bed_g_geotiff.tif", &dest_b).unwrap();

		assert_eq!(fs::read(&dest_a).unwrap(), b"world raster");
		assert_eq!(fs::read(&dest_b).unwrap(), b"world raster");
		assert!(cache_dir.path().join("etopo1/ETOPO1_Bed_g_geotiff.tif").exists());
	}

	#[test]
	fn non_whitelisted_path_bypasses_cache() {
		let source_dir = tempfile::tempdir().unwrap();
		fs::write(source_dir.path().join("srtm/N37W123.hgt"), b"srtm tile").unwrap();
		let inner = Arc::new(FilesystemStore::new(source_dir.path()));

		let cache_dir = tempfile::tempdir().unwrap();
		let store = CacheStore::new(inner, cache_dir.path(), ["etopo1/".to_string()]);

		let dest_dir = tempfile::tempdir().unwrap();
		let dest = dest_dir.path().join("n37w123.hgt");
		store.get("srtm/N37W123.hgt", &dest).unwrap();

		assert_eq!(fs::read(&dest).unwrap(), b"srtm tile");
		assert!(!cache_dir.path().join("srtm/N37W123.hgt").exists());
	}
}
