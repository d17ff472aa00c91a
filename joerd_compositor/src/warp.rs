//! Raw-GDAL single-band warp, grounded in the teacher's
//! `from_gdal::dem::Instance::reproject_to_float_dataset`: the same
//! `GDALCreateWarpOptions`/`GDALChunkAndWarpMulti` call sequence, generalized
//! to warp into a destination dataset that already exists (the output tile's
//! grid) instead of always allocating a fresh one, and to take the resampling
//! algorithm as a parameter rather than hardcoding `Bilinear`.

use anyhow::{Result, bail};
use gdal::{Dataset, DriverManager, GeoTransform};
use joerd_core::types::{FLT_NODATA, ResampleAlg};

fn as_gdal(alg: ResampleAlg) -> u32 {
	use gdal_sys::GDALResampleAlg::*;
	match alg {
		ResampleAlg::NearestNeighbour => GRA_NearestNeighbour,
		ResampleAlg::Bilinear => GRA_Bilinear,
		ResampleAlg::Cubic => GRA_Cubic,
		ResampleAlg::CubicSpline => GRA_CubicSpline,
		ResampleAlg::Lanczos => GRA_Lanczos,
		ResampleAlg::Average => GRA_Average,
	}
}

/// Creates a 1-band Float32 in-memory dataset with the same size, spatial
/// reference and geotransform as `like`, filled with `FLT_NODATA`.
pub fn mem_like(like: &Dataset) -> Result<Dataset> {
	let (width, height) = like.raster_size();
	let driver = DriverManager::get_driver_by_name("MEM")?;
	let mut dst = driver.create_with_band_type::<f32, _>("mem", width, height, 1)?;
	if let Some(srs) = like.spatial_ref() {
		dst.set_spatial_ref(&srs)?;
	}
	let gt: GeoTransform = like.geo_transform()?;
	dst.set_geo_transform(&gt)?;
	let mut band = dst.rasterband(1)?;
	band.set_no_data_value(Some(f64::from(FLT_NODATA)))?;
	let mut buffer = gdal::raster::Buffer::new((width, height), vec![FLT_NODATA; width * height]);
	band.write((0, 0), (width, height), &mut buffer)?;
	dst.flush_cache()?;
	Ok(dst)
}

/// Reprojects every band-1 pixel of `src` into `dst`'s existing grid, using
/// `resample` as the warp algorithm. `dst` must already carry a spatial
/// reference and geotransform (as returned by [`mem_like`]).
pub fn warp_into(src: &Dataset, dst: &mut Dataset, resample: ResampleAlg) -> Result<()> {
	let h_src_ds = src.c_dataset();
	let h_dst_ds = dst.c_dataset();

	unsafe {
		use gdal_sys::{
			CPLErr, CPLGetLastErrorMsg, CPLMalloc, CSLSetNameValue, GDALChunkAndWarpMulti, GDALCreateGenImgProjTransformer2,
			GDALCreateWarpOperation, GDALCreateWarpOptions, GDALDestroyGenImgProjTransformer, GDALDestroyWarpOperation,
			GDALGenImgProjTransform, GDALWarpOperationH, GDALWarpOptions,
		};

		let mut options: GDALWarpOptions = *GDALCreateWarpOptions();
		options.hSrcDS = h_src_ds;
		options.hDstDS = h_dst_ds;

		CSLSetNameValue(options.papszWarpOptions, c"NUM_THREADS".as_ptr(), c"ALL_CPUS".as_ptr());
		options.padfSrcNoDataReal = CPLMalloc(std::mem::size_of::<f64>()).cast::<f64>();
		options.padfSrcNoDataReal.write(f64::from(FLT_NODATA));
		options.padfDstNoDataReal = CPLMalloc(std::mem::size_of::<f64>()).cast::<f64>();
		options.padfDstNoDataReal.write(f64::from(FLT_NODATA));

		options.nBandCount = 1;
		let n = std::mem::size_of::<i32>();
		options.panSrcBands = CPLMalloc(n).cast::<i32>();
		options.panDstBands = CPLMalloc(n).cast::<i32>();
		options.panSrcBands.write(1);
		options.panDstBands.write(1);

		options.eResampleAlg = as_gdal(resample);
		options.dfWarpMemoryLimit = 512.0 * 1024.0 * 1024.0;

		options.pTransformerArg = GDALCreateGenImgProjTransformer2(h_src_ds, h_dst_ds, core::ptr::null_mut());
		options.pfnTransformer = Some(GDALGenImgProjTransform);

		let operation: GDALWarpOperationH = GDALCreateWarpOperation(&raw const options);
		let (width, height) = dst.raster_size();
		let rv = GDALChunkAndWarpMulti(operation, 0, 0, i32::try_from(width).unwrap(), i32::try_from(height).unwrap());

		GDALDestroyWarpOperation(operation);
		GDALDestroyGenImgProjTransformer(options.pTransformerArg);

		if rv != CPLErr::CE_None {
			bail!("warp failed: {:?}", CPLGetLastErrorMsg());
		}
	}

	dst.flush_cache()?;
	Ok(())
}

/// Copies every pixel of `layer` into `dst` wherever `layer`'s value is not
/// `FLT_NODATA` (§4.5 algorithm step 2.a.iv).
pub fn overwrite_where_not_nodata(dst: &mut Dataset, layer: &Dataset) -> Result<()> {
	let (width, height) = dst.raster_size();
	assert_eq!((width, height), layer.raster_size(), "layer and destination grids must match");

	let layer_data = layer.rasterband(1)?.read_band_as::<f32>()?;
	let mut dst_band = dst.rasterband(1)?;
	let mut data = dst_band.read_band_as::<f32>()?.data().clone();

	let mut changed = false;
	for (dst_px, layer_px) in data.iter_mut().zip(layer_data.data().iter()) {
		if (*layer_px - FLT_NODATA).abs() > f32::EPSILON {
			*dst_px = *layer_px;
			changed = true;
		}
	}

	if changed {
		let mut buffer = gdal::raster::Buffer::new((width, height), data);
		dst_band.write((0, 0), (width, height), &mut buffer)?;
		dst.flush_cache()?;
	}
	Ok(())
}
