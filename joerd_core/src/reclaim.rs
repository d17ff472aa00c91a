use crate::JoerdError;
use anyhow::{Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Disk-space reclaiming for the source store, left off by default (§5: "no
/// reclaiming is attempted" in the baseline pipeline). When enabled, a worker
/// that hits `OutOfSpace` deletes files not referenced by the vrt groups of
/// the job it is currently running until enough space is freed, rather than
/// failing immediately.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReclaimPolicy {
	#[default]
	Disabled,
	Enabled {
		min_free_bytes: u64,
	},
}

impl ReclaimPolicy {
	/// Ensures at least `needed_bytes` are free under `source_dir`, deleting
	/// files from `candidates` (in order, least-recently-needed first) that
	/// are not named in `keep`. Returns `Ok(())` once enough space is freed or
	/// if the policy is disabled or already satisfied; raises
	/// `JoerdError::OutOfSpace` if candidates run out first.
	pub fn reclaim(&self, source_dir: &Path, needed_bytes: u64, candidates: &[PathBuf], keep: &[PathBuf]) -> Result<()> {
		let min_free_bytes = match self {
			ReclaimPolicy::Disabled => return Ok(()),
			ReclaimPolicy::Enabled { min_free_bytes } => *min_free_bytes,
		};

		let target = needed_bytes.max(min_free_bytes);
		let mut freed: u64 = 0;

		for candidate in candidates {
			if freed >= target {
				break;
			}
			if keep.contains(candidate) {
				continue;
			}
			let path = source_dir.join(candidate);
			let Ok(metadata) = fs::metadata(&path) else { continue };
			if fs::remove_file(&path).is_ok() {
				freed += metadata.len();
			}
		}

		if freed < target {
			bail!(JoerdError::OutOfSpace { needed_bytes: target - freed });
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_to_disabled() {
		assert!(matches!(ReclaimPolicy::default(), ReclaimPolicy::Disabled));
	}

	#[test]
	fn deserializes_from_configuration() {
		let disabled: ReclaimPolicy = serde_json::from_str(r#"{"type":"disabled"}"#).unwrap();
		assert!(matches!(disabled, ReclaimPolicy::Disabled));

		let enabled: ReclaimPolicy = serde_json::from_str(r#"{"type":"enabled","min_free_bytes":1048576}"#).unwrap();
		assert!(matches!(enabled, ReclaimPolicy::Enabled { min_free_bytes: 1_048_576 }));
	}

	#[test]
	fn disabled_policy_never_deletes() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("srtm/N37W123.hgt");
		fs::create_dir_all(file.parent().unwrap()).unwrap();
		fs::write(&file, vec![0u8; 128]).unwrap();

		let policy = ReclaimPolicy::Disabled;
		policy
			.reclaim(dir.path(), 1_000_000, &[PathBuf::from("srtm/N37W123.hgt")], &[])
			.unwrap();

		assert!(file.exists());
	}

	#[test]
	fn enabled_policy_deletes_until_space_freed() {
		let dir = tempfile::tempdir().unwrap();
		for name in ["a.tif", "b.tif", "c.tif"] {
			fs::write(dir.path().join(name), vec![0u8; 100]).unwrap();
		}

		let policy = ReclaimPolicy::Enabled { min_free_bytes: 0 };
		let candidates = vec![PathBuf::from("a.tif"), PathBuf::from("b.tif"), PathBuf::from("c.tif")];
		policy.reclaim(dir.path(), 150, &candidates, &[]).unwrap();

		assert!(!dir.path().join("a.tif").exists());
		assert!(!dir.path().join("b.tif").exists());
		assert!(dir.path().join("c.tif").exists());
	}

	#[test]
	fn kept_paths_are_never_deleted() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("a.tif"), vec![0u8; 100]).unwrap();

		let policy = ReclaimPolicy::Enabled { min_free_bytes: 0 };
		let candidates = vec![PathBuf::from("a.tif")];
		let err = policy.reclaim(dir.path(), 50, &candidates, &[PathBuf::from("a.tif")]).unwrap_err();

		assert!(JoerdError::kind_of(&err).is_some());
		assert!(dir.path().join("a.tif").exists());
	}
}
