use crate::options::DownloadOptions;
use crate::scoped::ScopedTempFile;
use anyhow::{Context, Result, bail};
use futures::StreamExt;
use joerd_core::JoerdError;
use joerd_derive::context;
use reqwest::StatusCode;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use tempfile::NamedTempFile;
use tokio::runtime::Runtime;

/// Downloads files over HTTP(S) with resume-on-retry and optional
/// content verification, following the baseline pipeline's `download.get`
/// algorithm: track how many bytes have landed locally, resume with a
/// `Range` header whenever the server advertised `Accept-Ranges: bytes`,
/// and otherwise restart from scratch.
pub struct Downloader {
	client: reqwest::Client,
	rt: Runtime,
}

impl Downloader {
	pub fn new() -> Result<Self> {
		Ok(Downloader {
			client: reqwest::Client::builder().build().context("building download client")?,
			rt: Runtime::new().context("starting async runtime for downloader")?,
		})
	}

	#[context("Failed to download {url:?}")]
	pub fn get(&self, url: &str, options: &DownloadOptions) -> Result<ScopedTempFile> {
		self.rt.block_on(self.get_async(url, options))
	}

	async fn get_async(&self, url: &str, options: &DownloadOptions) -> Result<ScopedTempFile> {
		let mut tmp = NamedTempFile::new().context("creating temporary download file")?;

		let mut filepos: u64 = 0;
		let mut filesize: Option<u64> = None;
		let mut tries: u32 = 0;
		let mut last_successful_try: u32 = 0;
		let mut accept_range = false;

		loop {
			if filesize.is_some() && filepos >= filesize.unwrap() {
				break;
			}

			if tries >= options.tries {
				bail!(JoerdError::DownloadFailed { url: url.to_string() });
			}
			if tries > last_successful_try {
				let delay = options.backoff.delay_for(tries - last_successful_try);
				if !delay.is_zero() {
					tokio::time::sleep(delay).await;
				}
			}
			tries += 1;

			let mut request = self.client.get(url).timeout(options.timeout);
			if accept_range && filepos > 0 {
				log::info!("continuing download (try {}/{}) at {} bytes: {}", tries, options.tries, filepos, url);
				request = request.header("Range", format!("bytes={}-", filepos));
			} else {
				log::info!("downloading (try {}/{}) {}", tries, options.tries, url);
				filepos = 0;
				let file = tmp.as_file_mut();
				file.set_len(0)?;
				file.seek(SeekFrom::Start(0))?;
			}

			let response = match request.send().await {
				Ok(response) => response,
				Err(err) => {
					log::debug!("download attempt failed: {err}");
					continue;
				}
			};

			if !response.status().is_success() && response.status() != StatusCode::PARTIAL_CONTENT {
				log::debug!("download attempt got status {}", response.status());
				continue;
			}

			if filesize.is_none() {
				filesize = response.content_length();
			}
			accept_range = response
				.headers()
				.get("accept-ranges")
				.and_then(|v| v.to_str().ok())
				.is_some_and(|v| v.eq_ignore_ascii_case("bytes"));

			let mut stream = response.bytes_stream();
			let old_filepos = filepos;
			while let Some(chunk) = stream.next().await {
				match chunk {
					Ok(bytes) => {
						if let Err(err) = tmp.as_file_mut().write_all(&bytes) {
							log::debug!("writing downloaded chunk failed: {err}");
							break;
						}
						filepos += bytes.len() as u64;
					}
					Err(err) => {
						log::debug!("download stream error: {err}");
						break;
					}
				}
			}

			if filepos > old_filepos {
				last_successful_try = tries;
			}

			if filesize.is_none() {
				if let Some(verifier) = &options.verifier {
					if verifier(tmp.path()) {
						break;
					}
				} else {
					// unknown length and no verifier: a completed read of the
					// stream is all we can go on.
					break;
				}
			}
		}

		if let Some(verifier) = &options.verifier {
			if !verifier(tmp.path()) {
				bail!(JoerdError::DownloadFailed { url: url.to_string() });
			}
		}

		tmp.as_file_mut().seek(SeekFrom::Start(0))?;
		Ok(ScopedTempFile::new(tmp))
	}
}

impl Default for Downloader {
	fn default() -> Self {
		Downloader::new().expect("default downloader construction should not fail")
	}
}
