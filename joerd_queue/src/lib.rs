mod batch;
mod dispatcher;
mod grouping;
mod inprocess;
mod json_sizer;
mod remote;
mod traits;

pub use batch::Batch;
pub use dispatcher::Dispatcher;
pub use grouping::GroupingDispatcher;
pub use inprocess::InProcessQueue;
pub use remote::RemoteQueue;
pub use traits::{Queue, QueueMessage};

use anyhow::{Result, bail};
use joerd_core::config::PluginConfig;
use std::sync::Arc;

pub fn build_queue(config: &PluginConfig) -> Result<Arc<dyn Queue>> {
	match config.kind.as_str() {
		"remote" => Ok(Arc::new(RemoteQueue::from_options(&config.options)?)),
		other => bail!("unknown queue type {other:?}; in-process queues are constructed directly, not from configuration"),
	}
}
