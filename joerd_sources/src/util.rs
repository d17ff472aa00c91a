//! Shared `unpack` building blocks: archive extraction and the small set of
//! raster post-processing steps (nodata stamping, water-mask merge, vertical
//! datum shift) that several source plugins need, generalized from
//! `original_source/joerd/mask.py` and the per-source `unpack` methods.

use anyhow::{Context, Result, bail, ensure};
use gdal::{Dataset, DriverManager};
use joerd_core::types::FLT_NODATA;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Extracts one named entry from a zip archive into `dest_dir`, returning
/// its path.
pub fn extract_zip_entry(zip_path: &Path, entry_name: &str, dest_dir: &Path) -> Result<PathBuf> {
	std::fs::create_dir_all(dest_dir)?;
	let file = File::open(zip_path).with_context(|| format!("opening zip archive {zip_path:?}"))?;
	let mut archive = zip::ZipArchive::new(file).with_context(|| format!("reading zip archive {zip_path:?}"))?;
	let mut entry = archive
		.by_name(entry_name)
		.with_context(|| format!("{entry_name:?} not found in {zip_path:?}"))?;

	let dest_path = dest_dir.join(entry_name);
	if let Some(parent) = dest_path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	let mut out = File::create(&dest_path)?;
	std::io::copy(&mut entry, &mut out)?;
	Ok(dest_path)
}

/// Extracts one named entry from a gzip-compressed tar archive into
/// `dest_dir`, returning its path.
pub fn extract_tar_gz_entry(tar_gz_path: &Path, entry_name: &str, dest_dir: &Path) -> Result<PathBuf> {
	std::fs::create_dir_all(dest_dir)?;
	let file = File::open(tar_gz_path).with_context(|| format!("opening tar.gz archive {tar_gz_path:?}"))?;
	let decoder = flate2::read::GzDecoder::new(file);
	let mut archive = tar::Archive::new(decoder);

	for entry in archive.entries()? {
		let mut entry = entry?;
		let path = entry.path()?.to_path_buf();
		if path == Path::new(entry_name) {
			let dest_path = dest_dir.join(entry_name);
			if let Some(parent) = dest_path.parent() {
				std::fs::create_dir_all(parent)?;
			}
			entry.unpack(&dest_path)?;
			return Ok(dest_path);
		}
	}
	bail!("{entry_name:?} not found in {tar_gz_path:?}");
}

/// Opens `src_path`, rewrites its single band to `dest_path` in the given
/// GDAL driver with `FLT_NODATA` as the nodata sentinel, applying `adjust`
/// to every pixel value before it's written (identity for a plain copy).
fn rewrite_band(src_path: &Path, driver_name: &str, dest_path: &Path, adjust: impl Fn(f32) -> f32) -> Result<()> {
	if let Some(parent) = dest_path.parent() {
		std::fs::create_dir_all(parent)?;
	}

	let src = Dataset::open(src_path).with_context(|| format!("opening raster {src_path:?}"))?;
	let (width, height) = src.raster_size();
	let geo_transform = src.geo_transform()?;
	let spatial_ref = src.spatial_ref().ok();
	let src_band = src.rasterband(1)?;
	let src_nodata = src_band.no_data_value().map(|v| v as f32);

	let band = src_band.read_band_as::<f32>()?;
	let mut data = band.data().clone();
	for value in &mut data {
		if let Some(nodata) = src_nodata {
			if (*value - nodata).abs() < f32::EPSILON {
				*value = FLT_NODATA;
				continue;
			}
		}
		*value = adjust(*value);
	}

	let driver = DriverManager::get_driver_by_name(driver_name)?;
	let mut dst = driver.create_with_band_type::<f32, _>(dest_path, width, height, 1)?;
	dst.set_geo_transform(&geo_transform)?;
	if let Some(srs) = &spatial_ref {
		dst.set_spatial_ref(srs)?;
	}
	let mut out_band = dst.rasterband(1)?;
	out_band.set_no_data_value(Some(f64::from(FLT_NODATA)))?;
	let mut buffer = gdal::raster::Buffer::new((width, height), data);
	out_band.write((0, 0), (width, height), &mut buffer)?;
	dst.flush_cache()?;
	Ok(())
}

/// Copies a raster, stamping nodata with `FLT_NODATA` but otherwise leaving
/// values untouched. Used by sources whose unpack step is "just convert the
/// container format" (GMTED).
pub fn copy_with_nodata(src_path: &Path, driver_name: &str, dest_path: &Path) -> Result<()> {
	rewrite_band(src_path, driver_name, dest_path, |v| v)
}

/// Shifts every valid pixel by `shift` meters, for datasets whose vertical
/// datum differs from the target's (Great Lakes bathymetry).
pub fn datum_shift(src_path: &Path, driver_name: &str, dest_path: &Path, shift: f64) -> Result<()> {
	let shift = shift as f32;
	rewrite_band(src_path, driver_name, dest_path, move |v| v + shift)
}

/// Masks every pixel at or below zero to nodata, for rasters whose source
/// encodes "no land data here" as zero rather than a real sentinel (GMTED,
/// and NED's non-topobathy variant), generalized from `joerd.mask.negative`.
pub fn mask_non_positive(src_path: &Path, driver_name: &str, dest_path: &Path) -> Result<()> {
	if let Some(parent) = dest_path.parent() {
		std::fs::create_dir_all(parent)?;
	}

	let src = Dataset::open(src_path).with_context(|| format!("opening raster {src_path:?}"))?;
	let (width, height) = src.raster_size();
	let geo_transform = src.geo_transform()?;
	let spatial_ref = src.spatial_ref().ok();
	let src_band = src.rasterband(1)?;
	let src_nodata = src_band.no_data_value().map(|v| v as f32);

	let band = src_band.read_band_as::<f32>()?;
	let mut data = band.data().clone();
	for value in &mut data {
		let is_source_nodata = src_nodata.is_some_and(|nodata| (*value - nodata).abs() < f32::EPSILON);
		if *value <= 0.0 || is_source_nodata {
			*value = FLT_NODATA;
		}
	}

	let driver = DriverManager::get_driver_by_name(driver_name)?;
	let mut dst = driver.create_with_band_type::<f32, _>(dest_path, width, height, 1)?;
	dst.set_geo_transform(&geo_transform)?;
	if let Some(srs) = &spatial_ref {
		dst.set_spatial_ref(srs)?;
	}
	let mut out_band = dst.rasterband(1)?;
	out_band.set_no_data_value(Some(f64::from(FLT_NODATA)))?;
	let mut buffer = gdal::raster::Buffer::new((width, height), data);
	out_band.write((0, 0), (width, height), &mut buffer)?;
	dst.flush_cache()?;
	Ok(())
}

/// Merges a raw water-mask byte grid into a raster, setting any pixel whose
/// mask byte equals `mask_value` to nodata. `mask_path` must hold exactly
/// `width * height` bytes in the same row-major order as the data raster.
pub fn mask_raw(data_path: &Path, mask_path: &Path, mask_value: u8, driver_name: &str, dest_path: &Path) -> Result<()> {
	if let Some(parent) = dest_path.parent() {
		std::fs::create_dir_all(parent)?;
	}

	let src = Dataset::open(data_path).with_context(|| format!("opening raster {data_path:?}"))?;
	let (width, height) = src.raster_size();
	let geo_transform = src.geo_transform()?;
	let spatial_ref = src.spatial_ref().ok();

	let mut mask_bytes = Vec::new();
	File::open(mask_path)
		.with_context(|| format!("opening water mask {mask_path:?}"))?
		.read_to_end(&mut mask_bytes)?;
	ensure!(
		mask_bytes.len() == width * height,
		"water mask {mask_path:?} has {} bytes, expected {}",
		mask_bytes.len(),
		width * height
	);

	let band = src.rasterband(1)?.read_band_as::<f32>()?;
	let mut data = band.data().clone();
	for (value, &mask) in data.iter_mut().zip(mask_bytes.iter()) {
		if mask == mask_value {
			*value = FLT_NODATA;
		}
	}

	let driver = DriverManager::get_driver_by_name(driver_name)?;
	let mut dst = driver.create_with_band_type::<f32, _>(dest_path, width, height, 1)?;
	dst.set_geo_transform(&geo_transform)?;
	if let Some(srs) = &spatial_ref {
		dst.set_spatial_ref(srs)?;
	}
	let mut out_band = dst.rasterband(1)?;
	out_band.set_no_data_value(Some(f64::from(FLT_NODATA)))?;
	let mut buffer = gdal::raster::Buffer::new((width, height), data);
	out_band.write((0, 0), (width, height), &mut buffer)?;
	dst.flush_cache()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn make_raster(path: &Path, data: Vec<f32>, nodata: Option<f64>) {
		let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
		let mut ds = driver.create_with_band_type::<f32, _>(path, 2, 2, 1).unwrap();
		ds.set_geo_transform(&[-10.0, 1.0, 0.0, 10.0, 0.0, -1.0]).unwrap();
		let mut band = ds.rasterband(1).unwrap();
		if let Some(nodata) = nodata {
			band.set_no_data_value(Some(nodata)).unwrap();
		}
		let mut buffer = gdal::raster::Buffer::new((2, 2), data);
		band.write((0, 0), (2, 2), &mut buffer).unwrap();
		ds.flush_cache().unwrap();
	}

	fn read_all(path: &Path) -> Vec<f32> {
		let ds = Dataset::open(path).unwrap();
		ds.rasterband(1).unwrap().read_band_as::<f32>().unwrap().data().clone()
	}

	#[test]
	fn copy_with_nodata_stamps_sentinel_in_place_of_source_nodata() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("src.tif");
		let dst = dir.path().join("dst.tif");
		make_raster(&src, vec![1.0, -9999.0, 3.0, 4.0], Some(-9999.0));

		copy_with_nodata(&src, "GTiff", &dst).unwrap();

		let data = read_all(&dst);
		assert_eq!(data, vec![1.0, FLT_NODATA, 3.0, 4.0]);
	}

	#[test]
	fn mask_non_positive_blanks_zero_and_negative_pixels() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("src.tif");
		let dst = dir.path().join("dst.tif");
		make_raster(&src, vec![5.0, 0.0, -1.0, -9999.0], Some(-9999.0));

		mask_non_positive(&src, "GTiff", &dst).unwrap();

		let data = read_all(&dst);
		assert_eq!(data, vec![5.0, FLT_NODATA, FLT_NODATA, FLT_NODATA]);
	}

	#[test]
	fn datum_shift_adds_offset_to_valid_pixels_only() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("src.tif");
		let dst = dir.path().join("dst.tif");
		make_raster(&src, vec![100.0, -9999.0, 50.0, 0.0], Some(-9999.0));

		datum_shift(&src, "GTiff", &dst, 176.0).unwrap();

		let data = read_all(&dst);
		assert_eq!(data, vec![276.0, FLT_NODATA, 226.0, 176.0]);
	}

	#[test]
	fn mask_raw_blanks_pixels_flagged_as_water() {
		let dir = tempfile::tempdir().unwrap();
		let data_path = dir.path().join("data.tif");
		let mask_path = dir.path().join("mask.raw");
		let dst = dir.path().join("dst.tif");
		make_raster(&data_path, vec![1.0, 2.0, 3.0, 4.0], None);
		std::fs::write(&mask_path, [0u8, 255, 0, 255]).unwrap();

		mask_raw(&data_path, &mask_path, 255, "GTiff", &dst).unwrap();

		let data = read_all(&dst);
		assert_eq!(data, vec![1.0, FLT_NODATA, 3.0, FLT_NODATA]);
	}
}
