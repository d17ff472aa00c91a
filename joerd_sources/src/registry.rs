use crate::etopo1::Etopo1Source;
use crate::gmted::GmtedSource;
use crate::great_lakes::GreatLakesSource;
use crate::lidar::LidarSource;
use crate::ned::NedSource;
use crate::ned_topobathy::NedTopobathySource;
use crate::srtm::SrtmSource;
use crate::traits::SourcePlugin;
use anyhow::{Result, bail};
use joerd_core::PluginConfig;
use std::sync::Arc;

/// Builds a registered `SourcePlugin` from its configuration entry, matching
/// the `build_store`/`build_queue`/`build_output` registry pattern used
/// throughout this workspace.
pub fn build_source(name: &str, config: &PluginConfig) -> Result<Arc<dyn SourcePlugin>> {
	match config.kind.as_str() {
		"srtm" => Ok(Arc::new(SrtmSource::from_options(name, &config.options)?)),
		"gmted" => Ok(Arc::new(GmtedSource::from_options(name, &config.options)?)),
		"etopo1" => Ok(Arc::new(Etopo1Source::from_options(name, &config.options)?)),
		"ned" => Ok(Arc::new(NedSource::from_options(name, &config.options)?)),
		"ned_topobathy" => Ok(Arc::new(NedTopobathySource::from_options(name, &config.options)?)),
		"great_lakes" => Ok(Arc::new(GreatLakesSource::from_options(name, &config.options)?)),
		"lidar" => Ok(Arc::new(LidarSource::from_options(name, &config.options)?)),
		other => bail!("unknown source type {other:?}"),
	}
}
