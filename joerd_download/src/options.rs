use std::path::Path;
use std::time::Duration;

/// Checks a fully (or, for unknown-length responses, partially) downloaded
/// file and returns true if it looks complete and correct.
pub type Verifier = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Backs off between retry attempts. `Exponential` matches the baseline
/// pipeline's default: double the wait each attempt, capped at `max_secs`.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
	Exponential { max_secs: u64 },
	None,
}

impl Backoff {
	#[must_use]
	pub fn exponential() -> Self {
		Backoff::Exponential { max_secs: 600 }
	}

	/// Delay before the `try_num`-th retry (1-indexed: the first retry is
	/// `try_num == 1`).
	#[must_use]
	pub fn delay_for(&self, try_num: u32) -> Duration {
		match self {
			Backoff::None => Duration::ZERO,
			Backoff::Exponential { max_secs } => {
				let secs = (1u64.checked_shl(try_num).unwrap_or(u64::MAX)).saturating_sub(1);
				Duration::from_secs(secs.min(*max_secs))
			}
		}
	}
}

impl Default for Backoff {
	fn default() -> Self {
		Backoff::exponential()
	}
}

/// Controls a single `Downloader::get` call, mirroring the baseline
/// pipeline's per-source download options (tries, timeout, verifier,
/// backoff).
pub struct DownloadOptions {
	pub tries: u32,
	pub timeout: Duration,
	pub backoff: Backoff,
	pub verifier: Option<Verifier>,
}

impl DownloadOptions {
	#[must_use]
	pub fn new() -> Self {
		DownloadOptions {
			tries: 10,
			timeout: Duration::from_secs(60),
			backoff: Backoff::default(),
			verifier: None,
		}
	}

	#[must_use]
	pub fn with_verifier(mut self, verifier: Verifier) -> Self {
		self.verifier = Some(verifier);
		self
	}

	#[must_use]
	pub fn with_tries(mut self, tries: u32) -> Self {
		self.tries = tries;
		self
	}

	#[must_use]
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	#[must_use]
	pub fn with_backoff(mut self, backoff: Backoff) -> Self {
		self.backoff = backoff;
		self
	}
}

impl Default for DownloadOptions {
	fn default() -> Self {
		DownloadOptions::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exponential_backoff_doubles_and_caps() {
		let backoff = Backoff::Exponential { max_secs: 600 };
		assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
		assert_eq!(backoff.delay_for(2), Duration::from_secs(3));
		assert_eq!(backoff.delay_for(3), Duration::from_secs(7));
		assert_eq!(backoff.delay_for(20), Duration::from_secs(600));
	}
}
