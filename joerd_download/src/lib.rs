mod downloader;
mod options;
mod scoped;

pub use downloader::Downloader;
pub use options::{Backoff, DownloadOptions, Verifier};
pub use scoped::ScopedTempFile;
