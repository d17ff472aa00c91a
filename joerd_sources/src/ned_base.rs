//! Shared NED (National Elevation Dataset) machinery (§4.3), recovered from
//! `original_source/joerd/source/ned_base.py`. The normal and topobathy
//! variants (`ned.rs`, `ned_topobathy.rs`) differ only in their filename
//! pattern and whether the unpack step masks non-positive elevations.
//!
//! The original lists its catalog over FTP (`ftplib`); USGS has since
//! retired that mirror in favor of HTTPS, so this lists the same directory
//! over HTTP the way `srtm.rs` does, rather than pulling in an FTP client
//! with no other use in this workspace.

use crate::traits::{SourcePlugin, SourceTileKey};
use crate::util::{extract_zip_entry, mask_non_positive};
use anyhow::{Context, Result};
use itertools::Itertools;
use joerd_core::types::ResampleAlg;
use joerd_core::{BoundingBox, OutputTileKey};
use joerd_download::{Downloader, DownloadOptions, ScopedTempFile};
use joerd_store::BlobStore;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::RwLock;
use tempfile::tempdir;

pub const PRUNE_FACTOR: f64 = 20.0 * (1.0 / (3600.0 * 9.0));
const BUFFER_DEGREES: f64 = 0.0025;

#[derive(Clone, Debug, PartialEq)]
pub struct NedEntry {
	pub state_code: String,
	pub region_name: String,
	pub year: i32,
	pub north: f64,
	pub west: f64,
}

impl NedEntry {
	fn bbox(&self) -> BoundingBox {
		BoundingBox::new(self.west, self.north - 0.25, self.west + 0.25, self.north).expect("a NED quarter-degree cell is always well-formed")
	}

	fn base_name(&self) -> String {
		let fmt_lat = |v: f64| {
			let (prefix, abs) = if v >= 0.0 { ("n", v) } else { ("s", -v) };
			format!("{}{:02}x{:02}", prefix, abs.trunc() as i32, (abs.fract() * 100.0).round() as i32)
		};
		let fmt_lon = |v: f64| {
			let (prefix, abs) = if v >= 0.0 { ("e", v) } else { ("w", -v) };
			format!("{}{:03}x{:02}", prefix, abs.trunc() as i32, (abs.fract() * 100.0).round() as i32)
		};
		format!("ned19_{}_{}_{}_{}_{}", fmt_lat(self.north), fmt_lon(self.west), self.state_code, self.region_name, self.year)
	}

	pub fn zip_name(&self) -> String {
		format!("{}.zip", self.base_name())
	}

	pub fn img_name(&self) -> String {
		format!("{}.img", self.base_name())
	}
}

pub fn parse_entry(fname: &str, pattern: &Regex) -> Option<NedEntry> {
	let caps = pattern.captures(fname)?;
    let y_deg: f64 = caps[2].parse().ok()?;
	let y_frac: f64 = caps[3].parse().ok()?;
	let mut north = y_deg + y_frac / 100.0;
	if &caps[1] == "s" {
		north = -north;
	}
	let x_deg: f64 = caps[5].parse().ok()?;
	let x_frac: f64 = caps[6].parse().ok()?;
	let mut west = x_deg + x_frac / 100.0;
	if &caps[4] == "w" {
		west = -west;
	}
	Some(NedEntry {
		north,
		west,
		state_code: caps[7].to_string(),
		region_name: caps[8].to_string(),
		year: caps[9].parse().ok()?,
	})
}

pub struct NedBase {
	name: String,
	base_dir: String,
	url: String,
	is_topobathy: bool,
	downloader: Downloader,
	catalog: RwLock<Option<Vec<NedEntry>>>,
}

impl NedBase {
	/// `is_topobathy` selects which half of the catalog this source serves:
	/// region names containing "topobathy" for the bathymetric variant, every
	/// other region name for the regular elevation variant (§4.3's
	/// `NORMAL_PATTERN`/`TOPOBATHY_PATTERN` split).
	pub fn new(name: &str, base_dir: String, url: String, is_topobathy: bool) -> Result<Self> {
		Ok(NedBase {
			name: name.to_string(),
			base_dir,
			url,
			is_topobathy,
			downloader: Downloader::new().context("creating a NED index downloader")?,
			catalog: RwLock::new(None),
		})
	}

	fn matches(&self, entry: &NedEntry) -> bool {
		entry.region_name.contains("topobathy") == self.is_topobathy
	}

	fn refresh_catalog(&self) -> Result<()> {
		let listing = self.downloader.get(&self.url, &DownloadOptions::new())?;
		let html = std::fs::read_to_string(listing.path()).context("reading NED directory listing")?;
		let href_pattern = Regex::new(r#"href="([^"]+)""#).expect("static pattern");
		let universal = universal_pattern();
		let entries: Vec<NedEntry> = href_pattern.captures_iter(&html).filter_map(|cap| parse_entry(&cap[1], universal)).collect();
		*self.catalog.write().expect("catalog lock poisoned") = Some(entries);
		Ok(())
	}

	fn catalog_snapshot(&self) -> Result<Vec<NedEntry>> {
		if self.catalog.read().expect("catalog lock poisoned").is_none() {
			self.refresh_catalog()?;
		}
		Ok(self.catalog.read().expect("catalog lock poisoned").clone().unwrap_or_default())
	}

	fn tile(&self, entry: NedEntry) -> NedTile {
		NedTile { base_dir: self.base_dir.clone(), url: self.url.clone(), is_topobathy: self.is_topobathy, entry }
	}
}

fn universal_pattern() -> &'static Regex {
	static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
	PATTERN.get_or_init(|| {
		Regex::new(r"^ned19_([ns])([0-9]{2})x([0257][05])_([ew])([0-9]{3})x([0257][05])_([a-z]{2})_([a-z0-9_]+)_(20[0-9]{2})\.zip$")
			.expect("static pattern")
	})
}

impl SourcePlugin for NedBase {
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
			.filter(|entry| self.matches(entry) && entry.bbox().intersects(&query))
			.map(|entry| Box::new(self.tile(entry)) as Box<dyn SourceTileKey>)
			.collect())
	}

	/// Groups by `(state_code, region_name)`, alphabetically, because NED
	/// collection runs can overlap at their edges (§4.3).
	fn vrts_for(&self, tile: &dyn OutputTileKey) -> Result<Vec<Vec<Box<dyn SourceTileKey>>>> {
		let tiles = self.downloads_for(tile)?;
		let mut entries: Vec<NedEntry> = tiles
			.iter()
			.map(|t| {
				let any = t as &dyn std::any::Any;
				any.downcast_ref::<NedTile>().expect("downloads_for only returns NedTile").entry.clone()
			})
			.collect();
		entries.sort_by(|a, b| (&a.state_code, &a.region_name).cmp(&(&b.state_code, &b.region_name)));

		Ok(entries
			.into_iter()
			.chunk_by(|e| (e.state_code.clone(), e.region_name.clone()))
			.into_iter()
			.map(|(_, group)| group.map(|entry| Box::new(self.tile(entry)) as Box<dyn SourceTileKey>).collect())
			.collect())
	}

	fn filter_type(&self, src_res: f64, dst_res: f64) -> ResampleAlg {
		if src_res > dst_res { ResampleAlg::Lanczos } else { ResampleAlg::Cubic }
	}

	fn srs_epsg(&self) -> i32 {
		4326
	}

	fn rehydrate(&self, data: &Value) -> Result<Box<dyn SourceTileKey>> {
		let entry = NedEntry {
			state_code: data["state_code"].as_str().context("NED identity missing state_code")?.to_string(),
			region_name: data["region_name"].as_str().context("NED identity missing region_name")?.to_string(),
			year: data["year"].as_i64().context("NED identity missing year")? as i32,
			north: data["north"].as_f64().context("NED identity missing north")?,
			west: data["west"].as_f64().context("NED identity missing west")?,
		};
		Ok(Box::new(self.tile(entry)))
	}
}

struct NedTile {
	base_dir: String,
	url: String,
	is_topobathy: bool,
	entry: NedEntry,
}

impl SourceTileKey for NedTile {
	fn urls(&self) -> Vec<String> {
		vec![format!("{}/{}", self.url, self.entry.zip_name())]
	}

	fn output_file(&self) -> String {
		format!("{}/{}", self.base_dir, self.entry.img_name())
	}

	fn freeze_dry(&self) -> Value {
		json!({
			"type": if self.is_topobathy { "ned_topobathy" } else { "ned" },
			"state_code": self.entry.state_code,
			"region_name": self.entry.region_name,
			"year": self.entry.year,
			"north": self.entry.north,
			"west": self.entry.west,
		})
	}

	fn verify(&self, path: &std::path::Path) -> bool {
		std::fs::File::open(path).ok().and_then(|f| zip::ZipArchive::new(f).ok()).is_some()
	}

	fn unpack(&self, downloads: &[ScopedTempFile], store: &dyn BlobStore) -> Result<()> {
		let [archive] = downloads else {
			anyhow::bail!("NED unpack expects exactly one downloaded archive");
		};
		let extract_dir = tempdir().context("creating NED extraction scratch directory")?;
		let img_path = extract_zip_entry(archive.path(), &self.entry.img_name(), extract_dir.path())?;

		let upload_dir = tempdir().context("creating NED upload staging directory")?;
		let dest = upload_dir.path().join(self.output_file());
		if self.is_topobathy {
			crate::util::copy_with_nodata(&img_path, "HFA", &dest)?;
		} else {
			mask_non_positive(&img_path, "HFA", &dest)?;
		}
		store.upload_dir(upload_dir.path())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn concrete_scenario_parses_nw_corner_and_base_name() {
		let entry = parse_entry("ned19_n37x75_w105x25_co_denver_2015.zip", universal_pattern()).unwrap();
		assert_eq!(entry.north, 37.75);
		assert_eq!(entry.west, -105.25);
		assert_eq!(entry.state_code, "co");
		assert_eq!(entry.region_name, "denver");
		assert_eq!(entry.year, 2015);
		assert_eq!(entry.bbox(), BoundingBox::new(-105.25, 37.5, -105.0, 37.75).unwrap());
	}

	#[test]
	fn base_name_round_trips_through_zip_name() {
		let entry = NedEntry { state_code: "co".to_string(), region_name: "denver".to_string(), year: 2015, north: 37.75, west: -105.25 };
		assert_eq!(entry.zip_name(), "ned19_n37x75_w105x25_co_denver_2015.zip");
		let parsed = parse_entry(&entry.zip_name(), universal_pattern()).unwrap();
		assert_eq!(parsed, entry);
	}
}
