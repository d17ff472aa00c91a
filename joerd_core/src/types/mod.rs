mod bounding_box;
mod region;

pub use bounding_box::BoundingBox;
pub use region::Region;

/// A "nice round" sentinel nodata value: `-3.0e38`. All of its precision
/// bits are zero, so it stays stable under the rounding a reprojection pass
/// introduces — the slightest truncation can't turn a nodata pixel into
/// "some" data.
pub const FLT_NODATA: f32 = -3.0e38;

/// WGS84 semi-major axis, in meters, used as the spherical Mercator radius.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// The latitude, in degrees, beyond which the spherical Mercator projection
/// is undefined. `lonlat_to_xy` clips to this bound before projecting.
pub const MAX_MERCATOR_LAT: f64 = 85.051_129;

/// Resampling strategy for a raster warp, chosen per source by comparing
/// source and destination resolution. Kept free of any GDAL dependency here
/// so source plugins can select one without pulling in `gdal_sys`; the
/// compositor maps each variant onto the matching `gdal_sys::GDALResampleAlg`
/// constant at the point of use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResampleAlg {
	NearestNeighbour,
	Bilinear,
	Cubic,
	CubicSpline,
	Lanczos,
	Average,
}
