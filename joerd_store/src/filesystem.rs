use crate::traits::BlobStore;
use anyhow::{Context, Result};
use joerd_derive::context;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize)]
struct Options {
	#[serde(default = "default_base_dir")]
	base_dir: PathBuf,
}

fn default_base_dir() -> PathBuf {
	PathBuf::from(".")
}

/// `base_dir`-rooted filesystem store. Paths passed to `exists`/`get`/
/// `upload_dir` are relative to `base_dir`; parent directories are created
/// as needed on write.
#[derive(Debug)]
pub struct FilesystemStore {
	base_dir: PathBuf,
}

impl FilesystemStore {
	#[must_use]
	pub fn new(base_dir: impl Into<PathBuf>) -> Self {
		FilesystemStore { base_dir: base_dir.into() }
	}

	pub(crate) fn from_options(options: &Value) -> Result<Self> {
		let options: Options = serde_json::from_value(options.clone()).context("parsing filesystem store options")?;
		Ok(FilesystemStore::new(options.base_dir))
	}

	fn resolve(&self, path: &str) -> PathBuf {
		self.base_dir.join(path)
	}
}

impl BlobStore for FilesystemStore {
	fn exists(&self, path: &str) -> bool {
		self.resolve(path).exists()
	}

	#[context("Failed to copy {path:?} from filesystem store to {local_path:?}")]
	fn get(&self, path: &str, local_path: &Path) -> Result<()> {
		let source = self.resolve(path);
		if let Some(parent) = local_path.parent() {
			fs::create_dir_all(parent)?;
		}
		fs::copy(&source, local_path)?;
		Ok(())
	}

	#[context("Failed to upload directory {local_dir:?} to filesystem store rooted at {base_dir:?}", base_dir = self.base_dir)]
	fn upload_dir(&self, local_dir: &Path) -> Result<()> {
		copy_tree(local_dir, local_dir, &self.base_dir)
	}

	fn local_root(&self) -> Option<&Path> {
		Some(self.base_dir.as_path())
	}
}

/// Recursively copies every file beneath `root` (walked from `dir`) into
/// `dest_root`, preserving the path relative to `root`.
fn copy_tree(dir: &Path, root: &Path, dest_root: &Path) -> Result<()> {
	for entry in fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();
		if path.is_dir() {
			copy_tree(&path, root, dest_root)?;
		} else {
			let relative = path.strip_prefix(root).expect("walked path is under root");
			let dest = dest_root.join(relative);
			if let Some(parent) = dest.parent() {
				fs::create_dir_all(parent)?;
			}
			fs::copy(&path, &dest)?;
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn exists_never_raises_for_missing_path() {
		let dir = tempfile::tempdir().unwrap();
		let store = FilesystemStore::new(dir.path());
		assert!(!store.exists("nope/nothing.tif"));
	}

	#[test]
	fn get_copies_a_file() {
		let src_dir = tempfile::tempdir().unwrap();
		fs::write(src_dir.path().join("tile.tif"), b"data").unwrap();
		let store = FilesystemStore::new(src_dir.path());

		let dest_dir = tempfile::tempdir().unwrap();
		let dest = dest_dir.path().join("nested/tile.tif");
		store.get("tile.tif", &dest).unwrap();

		assert_eq!(fs::read(&dest).unwrap(), b"data");
	}

	#[test]
	fn upload_dir_preserves_relative_paths() {
		let src_dir = tempfile::tempdir().unwrap();
		fs::create_dir_all(src_dir.path().join("terrarium/8/41")).unwrap();
		fs::write(src_dir.path().join("terrarium/8/41/99.png"), b"png").unwrap();

		let out_dir = tempfile::tempdir().unwrap();
		let store = FilesystemStore::new(out_dir.path());
		store.upload_dir(src_dir.path()).unwrap();

		assert!(store.exists("terrarium/8/41/99.png"));
		assert_eq!(fs::read(out_dir.path().join("terrarium/8/41/99.png")).unwrap(), b"png");
	}
}
