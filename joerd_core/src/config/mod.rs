//! Configuration loading (§6, §0.3): a hierarchical YAML document, loaded
//! once at process start and never mutated. Each `sources`/`outputs`/`store`/
//! `source_store`/`cluster.queue` entry carries a `type` string plus
//! arbitrary plugin-specific options, which each plugin's registry factory
//! parses for itself on registration — this crate does not know the shape
//! of any individual plugin's options.

use crate::ReclaimPolicy;
use crate::types::Region;
use anyhow::Context;
use joerd_derive::context;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// A `{ type, <plugin-specific fields> }` declaration, used for sources,
/// outputs, stores and the queue. `options` captures everything besides
/// `type` so unknown keys round-trip without a central schema.
#[derive(Clone, Debug, Deserialize)]
pub struct PluginConfig {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(flatten)]
	pub options: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClusterConfig {
	pub queue: PluginConfig,
	#[serde(default = "default_block_size")]
	pub block_size: usize,
}

fn default_block_size() -> usize {
	10
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LoggingConfig {
	#[serde(default)]
	pub config: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub regions: HashMap<String, Region>,
	pub sources: HashMap<String, PluginConfig>,
	/// Compositing order for `sources`, least-detailed first (§4.5: "sources
	/// are composited in the order supplied by the job"). A `HashMap`'s
	/// iteration order can't carry that, so it's named explicitly here;
	/// entries missing from this list fall back to alphabetical order after
	/// every named source, so an incomplete list still produces a
	/// deterministic (if not necessarily intentional) ordering rather than
	/// panicking.
	#[serde(default)]
	pub source_order: Vec<String>,
	pub outputs: HashMap<String, PluginConfig>,
	pub store: PluginConfig,
	pub source_store: PluginConfig,
	pub cluster: ClusterConfig,
	#[serde(default)]
	pub logging: LoggingConfig,
	/// Disk-space reclaiming for the source store (§5), off by default.
	#[serde(default)]
	pub reclaim: ReclaimPolicy,
}

impl Config {
	/// Loads and parses the configuration file. Any failure here — I/O or
	/// deserialization — is a fatal [`crate::JoerdError::ConfigError`]; the
	/// caller must never attempt to recover from it.
	#[context("Failed to load configuration from {path:?}")]
	pub fn load(path: &Path) -> anyhow::Result<Config> {
		let text = std::fs::read_to_string(path).context("reading configuration file")?;
		let config: Config = serde_yaml_ng::from_str(&text).context("parsing configuration YAML")?;
		Ok(config)
	}

	/// `source_order`, followed by every remaining source name in
	/// alphabetical order. Used by the planner to fix a deterministic
	/// compositing order across `sources`, a `HashMap` with no order of its
	/// own.
	#[must_use]
	pub fn ordered_source_names(&self) -> Vec<String> {
		let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
		let mut names: Vec<String> = self
			.source_order
			.iter()
			.filter(|name| self.sources.contains_key(name.as_str()))
			.filter(|name| seen.insert(name.as_str()))
			.cloned()
			.collect();

		let mut rest: Vec<String> = self.sources.keys().filter(|name| !seen.contains(name.as_str())).cloned().collect();
		rest.sort();
		names.extend(rest);
		names
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn loads_a_minimal_configuration() {
		let yaml = r"
regions:
  california:
    bbox: [-124.56, 32.4, -114.15, 42.03]
    zoom_range: [8, 10]
sources:
  srtm:
    type: srtm
    url: https://example.com/srtm
outputs:
  terrarium:
    type: terrarium
store:
  type: filesystem
  base_dir: /tmp/out
source_store:
  type: filesystem
  base_dir: /tmp/src
cluster:
  queue:
    type: in-process
";
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.yaml");
		std::fs::write(&path, yaml).unwrap();

		let config = Config::load(&path).unwrap();
		assert_eq!(config.regions.len(), 1);
		assert_eq!(config.sources["srtm"].kind, "srtm");
		assert_eq!(config.cluster.block_size, 10);
	}

	#[test]
	fn missing_file_is_a_config_error() {
		let err = Config::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
		assert!(err.to_string().contains("Failed to load configuration"));
	}

	fn plugin(kind: &str) -> PluginConfig {
		PluginConfig { kind: kind.to_string(), options: serde_json::Value::Null }
	}

	#[test]
	fn ordered_source_names_honors_explicit_order_then_falls_back_alphabetically() {
		let mut sources = HashMap::new();
		sources.insert("gmted".to_string(), plugin("gmted"));
		sources.insert("srtm".to_string(), plugin("srtm"));
		sources.insert("etopo1".to_string(), plugin("etopo1"));
		let config = Config {
			regions: HashMap::new(),
			sources,
			source_order: vec!["etopo1".to_string(), "srtm".to_string()],
			outputs: HashMap::new(),
			store: plugin("filesystem"),
			source_store: plugin("filesystem"),
			cluster: ClusterConfig { queue: plugin("in-process"), block_size: 10 },
			logging: LoggingConfig::default(),
			reclaim: ReclaimPolicy::default(),
		};
		assert_eq!(config.ordered_source_names(), vec!["etopo1", "srtm", "gmted"]);
	}
}
