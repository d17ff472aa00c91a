//! Structured error kinds, replacing the stringified-stack-trace error
//! surfacing of the original implementation (§9). Call sites attach context
//! with [`joerd_derive::context`]; the worker's message loop downcasts via
//! [`JoerdError::kind_of`] to decide whether a failure is job-fatal or
//! worker-fatal.

use std::fmt;

/// The error kinds enumerated in the core specification's error handling
/// design. Each variant carries just enough to log a useful message; the
/// wrapped `anyhow::Error` chain carries the rest of the context.
#[derive(Debug)]
pub enum JoerdError {
	/// Exhausted retries or verification failed while downloading a URL.
	DownloadFailed { url: String },
	/// Archive corruption, a missing expected member, or a reprojection
	/// error while unpacking a downloaded source tile.
	UnpackFailed { output_file: String },
	/// A render job referenced a source-store path that could not be
	/// fetched.
	MissingInput { path: String },
	/// A transient send/receive failure on the queue that persisted after
	/// internal retries.
	QueueError { detail: String },
	/// A fatal configuration problem, surfaced at startup.
	ConfigError { detail: String },
	/// The disk-reclaiming policy could not free enough space.
	OutOfSpace { needed_bytes: u64 },
}

impl fmt::Display for JoerdError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			JoerdError::DownloadFailed { url } => write!(f, "download failed: {url}"),
			JoerdError::UnpackFailed { output_file } => {
				write!(f, "unpack failed for {output_file}")
			}
			JoerdError::MissingInput { path } => write!(f, "missing input: {path}"),
			JoerdError::QueueError { detail } => write!(f, "queue error: {detail}"),
			JoerdError::ConfigError { detail } => write!(f, "configuration error: {detail}"),
			JoerdError::OutOfSpace { needed_bytes } => {
				write!(f, "out of space: needed {needed_bytes} more bytes")
			}
		}
	}
}

impl std::error::Error for JoerdError {}

impl JoerdError {
	/// Look up a `JoerdError` anywhere in an `anyhow::Error`'s cause chain.
	///
	/// Used at the worker's per-message boundary to distinguish job-fatal
	/// kinds (logged, message left un-acked) from nothing-recoverable kinds
	/// (`ConfigError` is never expected here; it is handled at startup and
	/// never reaches the worker loop).
	pub fn kind_of(err: &anyhow::Error) -> Option<&JoerdError> {
		err.chain().find_map(|cause| cause.downcast_ref::<JoerdError>())
	}

	/// True for kinds that abort only the offending job, never the worker
	/// process itself (everything except a hypothetical unrecoverable
	/// resource exhaustion, which this workspace treats identically to
	/// `OutOfSpace`: fatal for the job, not for the worker).
	#[must_use]
	pub fn is_job_fatal(&self) -> bool {
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::Context;

	#[test]
	fn kind_of_finds_wrapped_error() {
		let base: anyhow::Error = JoerdError::DownloadFailed {
			url: "https://example.com/tile.zip".to_string(),
		}
		.into();
		let wrapped = base.context("while fetching SRTM tile N37W123");

		match JoerdError::kind_of(&wrapped) {
			Some(JoerdError::DownloadFailed { url }) => assert_eq!(url, "https://example.com/tile.zip"),
			other => panic!("expected DownloadFailed, got {other:?}"),
		}
	}

	#[test]
	fn kind_of_returns_none_for_plain_errors() {
		let err = anyhow::anyhow!("something else went wrong");
		assert!(JoerdError::kind_of(&err).is_none());
	}
}
