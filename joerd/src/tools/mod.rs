pub mod enqueue_downloads;
pub mod enqueue_renders;
pub mod server;

mod jobs_file;
