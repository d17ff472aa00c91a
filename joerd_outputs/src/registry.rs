//! Output plugin registry by string type (§9's "Plugin registry by string
//! name" flag, applied to outputs the same way `joerd_store`/`joerd_queue`
//! apply it to stores and queues).

use crate::normal::NormalOutput;
use crate::skadi::SkadiOutput;
use crate::terrarium::TerrariumOutput;
use crate::traits::OutputPlugin;
use anyhow::{Result, bail};
use joerd_core::Region;
use std::sync::Arc;

/// Builds an output plugin from its `{ type, ... }` configuration entry and
/// the regions it is responsible for. None of the three built-in products
/// take options beyond their assigned regions.
pub fn build_output(kind: &str, regions: Vec<Region>) -> Result<Arc<dyn OutputPlugin>> {
	match kind {
		"terrarium" => Ok(Arc::new(TerrariumOutput::new(regions))),
		"normal" => Ok(Arc::new(NormalOutput::new(regions))),
		"skadi" => Ok(Arc::new(SkadiOutput::new(regions))),
		other => bail!("unknown output type {other:?}"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unknown_output_type_is_rejected() {
		let err = build_output("nonexistent", vec![]).unwrap_err();
		assert!(err.to_string().contains("nonexistent"));
	}

	#[test]
	fn each_builtin_output_registers() {
		for kind in ["terrarium", "normal", "skadi"] {
			let output = build_output(kind, vec![]).unwrap();
			assert_eq!(output.name(), kind);
		}
	}
}
