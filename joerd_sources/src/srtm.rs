//! SRTM (§4.3), recovered from `original_source/joerd/source/srtm.py`: a 1°
//! grid of 1-arc-second tiles, each shipped with a companion water-mask
//! archive that is always fetched and merged in.

use crate::traits::{SourcePlugin, SourceTileKey};
use crate::util::mask_raw;
use anyhow::{Context, Result, bail};
use joerd_core::types::ResampleAlg;
use joerd_core::{BoundingBox, OutputTileKey};
use joerd_download::{Downloader, DownloadOptions, ScopedTempFile};
use joerd_store::BlobStore;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::RwLock;
use tempfile::tempdir;

const PRUNE_FACTOR: f64 = 20.0 * (1.0 / 3600.0);
const BUFFER_DEGREES: f64 = 0.01;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SrtmEntry {
	link: String,
	fname: String,
	min_x: i32,
	min_y: i32,
}

impl SrtmEntry {
	fn bbox(&self) -> BoundingBox {
		BoundingBox::new(f64::from(self.min_x), f64::from(self.min_y), f64::from(self.min_x + 1), f64::from(self.min_y + 1))
			.expect("a 1x1 degree SRTM cell is always well-formed")
	}
}

fn file_pattern() -> &'static Regex {
	static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
	PATTERN.get_or_init(|| Regex::new(r"^([NS])([0-9]{2})([EW])([0-9]{3})\.SRTMGL1\.hgt\.zip$").expect("static pattern"))
}

fn parse_entry(link: &str) -> Option<SrtmEntry> {
	let caps = file_pattern().captures(link)?;
	let ns = &caps[1];
	let mut lat: i32 = caps[2].parse().ok()?;
	let ew = &caps[3];
	let mut lon: i32 = caps[4].parse().ok()?;
	if ns == "S" {
		lat = -lat;
	}
	if ew == "W" {
		lon = -lon;
	}
	let fname = link.replace(".SRTMGL1.hgt.zip", ".hgt");
	Some(SrtmEntry { link: link.to_string(), fname, min_x: lon, min_y: lat })
}

#[derive(Deserialize)]
struct SrtmOptions {
	#[serde(default = "default_base_dir")]
	base_dir: String,
	url: String,
	mask_url: String,
}

fn default_base_dir() -> String {
	"srtm".to_string()
}

pub struct SrtmSource {
	name: String,
	base_dir: String,
	url: String,
	mask_url: String,
	downloader: Downloader,
	catalog: RwLock<Option<Vec<SrtmEntry>>>,
}

impl SrtmSource {
	pub fn from_options(name: &str, options: &Value) -> Result<Self> {
		let options: SrtmOptions = serde_json::from_value(options.clone()).context("parsing srtm source options")?;
		Ok(SrtmSource {
			name: name.to_string(),
			base_dir: options.base_dir,
			url: options.url,
			mask_url: options.mask_url,
			downloader: Downloader::new().context("creating an SRTM index downloader")?,
			catalog: RwLock::new(None),
		})
	}

	fn refresh_catalog(&self) -> Result<()> {
		let listing = self.downloader.get(&self.url, &DownloadOptions::new())?;
		let html = std::fs::read_to_string(listing.path()).context("reading SRTM directory listing")?;
		let href_pattern = Regex::new(r#"href="([^"]+)""#).expect("static pattern");
		let entries: Vec<SrtmEntry> = href_pattern
			.captures_iter(&html)
			.filter_map(|cap| parse_entry(&cap[1]))
			.collect();
		*self.catalog.write().expect("catalog lock poisoned") = Some(entries);
		Ok(())
	}

	fn catalog_snapshot(&self) -> Result<Vec<SrtmEntry>> {
		if self.catalog.read().expect("catalog lock poisoned").is_none() {
			self.refresh_catalog()?;
		}
		Ok(self.catalog.read().expect("catalog lock poisoned").clone().unwrap_or_default())
	}
}

impl SourcePlugin for SrtmSource {
	fn name(&self) -> &str {
		&self.name
	}

	fn get_index(&self) -> Result<()> {
		self.refresh_catalog()
	}

	fn downloads_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Box<dyn SourceTileKey>>> {
		if tile.max_resolution() > PRUNE_FACTOR {
			return Ok(Vec::new());
		}
		let query = tile.latlon_bbox().buffer(BUFFER_DEGREES);
		Ok(self
			.catalog_snapshot()?
			.into_iter()
			.filter(|entry| entry.bbox().intersects(&query))
			.map(|entry| Box::new(SrtmTile {
				base_dir: self.base_dir.clone(),
				url: self.url.clone(),
				mask_url: self.mask_url.clone(),
				entry,
			}) as Box<dyn SourceTileKey>)
			.collect())
	}

	fn vrts_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Vec<Box<dyn SourceTileKey>>>> {
		Ok(vec![self.downloads_for(tile)?])
	}

	fn filter_type(&self, src_res: f64, dst_res: f64) -> ResampleAlg {
		if src_res > dst_res { ResampleAlg::Lanczos } else { ResampleAlg::Cubic }
	}

	fn srs_epsg(&self) -> i32 {
		4326
	}

	fn rehydrate(&self, data: &Value) -> Result<Box<dyn SourceTileKey>> {
		let fname = data["fname"].as_str().context("srtm identity missing fname")?.to_string();
		let link = data["link"].as_str().context("srtm identity missing link")?.to_string();
		let min_x = data["min_x"].as_i64().context("srtm identity missing min_x")? as i32;
		let min_y = data["min_y"].as_i64().context("srtm identity missing min_y")? as i32;
		Ok(Box::new(SrtmTile {
			base_dir: self.base_dir.clone(),
			url: self.url.clone(),
			mask_url: self.mask_url.clone(),
			entry: SrtmEntry { link, fname, min_x, min_y },
		}))
	}
}

struct SrtmTile {
	base_dir: String,
	url: String,
	mask_url: String,
	entry: SrtmEntry,
}

impl SourceTileKey for SrtmTile {
	fn urls(&self) -> Vec<String> {
		let mask_link = self.entry.link.replace(".SRTMGL1.hgt", ".SRTMSWBD.raw");
		vec![format!("{}/{}", self.url, self.entry.link), format!("{}/{}", self.mask_url, mask_link)]
	}

	fn output_file(&self) -> String {
		format!("{}/{}", self.base_dir, self.entry.fname)
	}

	fn freeze_dry(&self) -> Value {
		json!({
			"type": "srtm",
			"link": self.entry.link,
			"fname": self.entry.fname,
			"min_x": self.entry.min_x,
			"min_y": self.entry.min_y,
		})
	}

	fn verify(&self, path: &std::path::Path) -> bool {
		std::fs::File::open(path).ok().and_then(|f| zip::ZipArchive::new(f).ok()).is_some()
	}

	fn unpack(&self, downloads: &[ScopedTempFile], store: &dyn BlobStore) -> Result<()> {
		let [data_zip, mask_zip] = downloads else {
			bail!("srtm unpack expects exactly one data archive and one mask archive");
		};
		let scratch = tempdir().context("creating srtm unpack scratch directory")?;
		let data_path = crate::util::extract_zip_entry(data_zip.path(), &self.entry.fname, scratch.path())?;
		let mask_name = self.entry.fname.replace(".hgt", ".raw");
		let mask_path = crate::util::extract_zip_entry(mask_zip.path(), &mask_name, scratch.path())?;

		let upload_dir = tempdir().context("creating srtm upload staging directory")?;
		let dest = upload_dir.path().join(self.output_file());
		mask_raw(&data_path, &mask_path, 255, "SRTMHGT", &dest)?;
		store.upload_dir(upload_dir.path())
	}
}
