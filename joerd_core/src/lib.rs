//! Data model, configuration and ambient plumbing shared across the Joerd
//! workspace: regions, bounding boxes, job wire types, canonical grouping
//! keys, configuration loading, structured errors and progress reporting.

pub mod config;
pub mod error;
pub mod freeze;
pub mod job;
pub mod progress;
pub mod reclaim;
pub mod tile;
pub mod types;

pub use config::Config;
pub use error::JoerdError;
pub use reclaim::ReclaimPolicy;
pub use tile::OutputTileKey;
pub use types::{BoundingBox, Region, ResampleAlg};
