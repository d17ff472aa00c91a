//! Download and render planning (§4.8): expands a loaded [`joerd_core::
//! config::Config`] into the `download` and `render` jobs a worker fleet
//! consumes, without itself touching a queue backend's wire format.

mod download;
mod render;

pub use download::DownloadPlanner;
pub use render::RenderPlanner;
