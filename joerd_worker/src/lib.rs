//! The worker's job processing loop (§6): one `Worker` per process, built
//! from the same [`joerd_core::config::Config`] the planners read, pulling
//! messages off a queue until it goes quiet.

mod mock_source;
mod worker;

pub use mock_source::MockSource;
pub use worker::Worker;
