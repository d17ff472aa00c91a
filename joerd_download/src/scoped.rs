use std::ops::Deref;
use std::path::Path;
use tempfile::NamedTempFile;

/// An RAII handle to a downloaded file: the backing temp file is deleted
/// when the handle (and every clone of its path) goes out of scope. Callers
/// that need several source files for one job hold a `Vec<ScopedTempFile>`
/// and the guards unwind together.
pub struct ScopedTempFile {
	inner: NamedTempFile,
}

impl ScopedTempFile {
	pub(crate) fn new(inner: NamedTempFile) -> Self {
		ScopedTempFile { inner }
	}

	#[must_use]
	pub fn path(&self) -> &Path {
		self.inner.path()
	}
}

impl Deref for ScopedTempFile {
	type Target = Path;

	fn deref(&self) -> &Path {
		self.path()
	}
}

impl AsRef<Path> for ScopedTempFile {
	fn as_ref(&self) -> &Path {
		self.path()
	}
}
