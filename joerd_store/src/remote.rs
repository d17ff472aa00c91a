use crate::traits::{BlobStore, content_type_for};
use anyhow::{Context, Result, bail, ensure};
use joerd_derive::context;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::runtime::Runtime;

#[derive(Clone, Debug, Deserialize)]
struct Options {
	base_url: String,
	#[serde(default = "default_retries")]
	retries: u32,
}

fn default_retries() -> u32 {
	5
}

/// A remote HTTP object store, implemented directly over `reqwest` rather
/// than a vendor SDK (§0.2: no cloud-vendor SDK appears anywhere in the
/// reference corpus). `exists` treats both a 404 (not found) and a 403
/// (forbidden, e.g. a bucket without list permission) as "not present",
/// matching §4.2's explicit clause.
pub struct RemoteStore {
	base_url: String,
	client: reqwest::Client,
	retries: u32,
	rt: Runtime,
}

impl RemoteStore {
	pub(crate) fn from_options(options: &Value) -> Result<Self> {
		let options: Options = serde_json::from_value(options.clone()).context("parsing remote store options")?;
		Ok(RemoteStore {
			base_url: options.base_url.trim_end_matches('/').to_string(),
			client: reqwest::Client::new(),
			retries: options.retries,
			rt: Runtime::new().context("starting async runtime for remote store")?,
		})
	}

	fn url_for(&self, path: &str) -> String {
		format!("{}/{}", self.base_url, path.trim_start_matches('/'))
	}

	async fn exists_async(&self, path: &str) -> bool {
		match self.client.head(self.url_for(path)).send().await {
			Ok(response) => {
				!matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::FORBIDDEN) && response.status().is_success()
			}
			Err(_) => false,
		}
	}

	async fn get_async(&self, path: &str, local_path: &Path) -> Result<()> {
		let response = self.client.get(self.url_for(path)).send().await?;
		ensure!(response.status().is_success(), "GET {} failed with status {}", path, response.status());
		let bytes = response.bytes().await?;
		if let Some(parent) = local_path.parent() {
			fs::create_dir_all(parent)?;
		}
		fs::write(local_path, &bytes)?;
		Ok(())
	}

	async fn put_with_retry(&self, path: &str, body: Vec<u8>, content_type: &'static str) -> Result<()> {
		let mut attempt = 0;
		loop {
			attempt += 1;
			let result = self
				.client
				.put(self.url_for(path))
				.header("Content-Type", content_type)
				.body(body.clone())
				.send()
				.await;

			match result {
				Ok(response) if response.status().is_success() => return Ok(()),
				Ok(response) if attempt >= self.retries => {
					bail!("PUT {} failed permanently with status {}", path, response.status());
				}
				Err(err) if attempt >= self.retries => return Err(err.into()),
				_ => {
					let backoff = Duration::from_secs(1 << attempt.min(6));
					tokio::time::sleep(backoff).await;
				}
			}
		}
	}
}

impl BlobStore for RemoteStore {
	fn exists(&self, path: &str) -> bool {
		self.rt.block_on(self.exists_async(path))
	}

	#[context("Failed to fetch {path:?} from remote store")]
	fn get(&self, path: &str, local_path: &Path) -> Result<()> {
		self.rt.block_on(self.get_async(path, local_path))
	}

	#[context("Failed to upload directory {local_dir:?} to remote store")]
	fn upload_dir(&self, local_dir: &Path) -> Result<()> {
		self.rt.block_on(async {
			for (relative, path) in walk_files(local_dir, local_dir) {
				let body = fs::read(&path)?;
				let content_type = content_type_for(&path);
				self.put_with_retry(&relative, body, content_type).await?;
			}
			Ok(())
		})
	}
}

/// Returns `(relative_path_as_forward_slashes, absolute_path)` for every
/// file beneath `root`, walked recursively from `dir`.
fn walk_files(dir: &Path, root: &Path) -> Vec<(String, std::path::PathBuf)> {
	let mut out = Vec::new();
	let Ok(entries) = fs::read_dir(dir) else { return out };
	for entry in entries.flatten() {
		let path = entry.path();
		if path.is_dir() {
			out.extend(walk_files(&path, root));
		} else {
			let relative = path
				.strip_prefix(root)
				.unwrap_or(&path)
				.to_string_lossy()
				.replace('\\', "/");
			out.push((relative, path));
		}
	}
	out
}
