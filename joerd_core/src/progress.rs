//! Progress reporting (§0.2), generalized from the teacher's single-container
//! `ProgressTrait`/`get_progress_bar` pair to the per-phase reporting this
//! workspace needs: index refresh, download planning, render planning and
//! worker dispatch all want their own counter without stepping on each
//! other's terminal line.
//!
//! The shape mirrors the teacher's progress module closely: a `Handle` is the
//! `Arc<Mutex<Inner>>` counter the teacher's `ProgressBar` already uses,
//! `Factory` is the thing callers ask for a new phase's handle from, and a
//! "dummy" handle (used under `#[cfg(test)]` and whenever the process isn't
//! attached to a terminal) drops every update on the floor.

use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct Inner {
	phase: String,
	len: u64,
	pos: u64,
	start: Instant,
	last_draw: Instant,
	live: bool,
}

/// A handle to one phase's progress counter. Cheap to clone; every clone
/// updates the same underlying counter.
#[derive(Clone)]
pub struct ProgressHandle {
	inner: Arc<Mutex<Inner>>,
}

impl ProgressHandle {
	fn new(phase: &str, len: u64, live: bool) -> Self {
		let handle = ProgressHandle {
			inner: Arc::new(Mutex::new(Inner {
				phase: phase.to_string(),
				len,
				pos: 0,
				start: Instant::now(),
				last_draw: Instant::now(),
				live,
			})),
		};
		handle.redraw(true);
		handle
	}

	/// Advance the counter by `n` and log an `info`-level milestone at most
	/// once per second or once per percentage point, whichever comes first
	/// (§7: "Progress is logged periodically during planning (time-or-
	/// percent-interval, whichever comes first)").
	pub fn inc(&self, n: u64) {
		let mut inner = self.inner.lock().unwrap();
		inner.pos = inner.pos.saturating_add(n).min(inner.len.max(inner.pos + n));
		inner.redraw_throttled();
	}

	pub fn set_len(&self, len: u64) {
		self.inner.lock().unwrap().len = len;
	}

	pub fn finish(&self) {
		let mut inner = self.inner.lock().unwrap();
		inner.pos = inner.len;
		inner.redraw_force();
	}

	fn redraw(&self, force: bool) {
		let mut inner = self.inner.lock().unwrap();
		if force {
			inner.redraw_force();
		} else {
			inner.redraw_throttled();
		}
	}

	#[must_use]
	pub fn position(&self) -> u64 {
		self.inner.lock().unwrap().pos
	}
}

impl Inner {
	fn redraw_throttled(&mut self) {
		if self.last_draw.elapsed() < Duration::from_secs(1) {
			return;
		}
		self.redraw_force();
	}

	fn redraw_force(&mut self) {
		self.last_draw = Instant::now();
		if !self.live {
			return;
		}
		let percent = if self.len == 0 { 100 } else { (self.pos * 100 / self.len.max(1)).min(100) };
		log::info!("{}: {}/{} ({percent}%)", self.phase, self.pos, self.len);
		let _ = io::stderr().flush();
	}
}

/// Creates phase-scoped progress handles. A single `ProgressFactory` is
/// constructed once per CLI invocation and handed to planning/worker code so
/// that each phase (index refresh, download planning, render planning) gets
/// its own counter rather than sharing one global position.
#[derive(Clone)]
pub struct ProgressFactory {
	live: bool,
}

impl ProgressFactory {
	/// `live` is normally `stderr().is_terminal()`; tests and non-interactive
	/// runs (piped output, CI) pass `false` to suppress the periodic log
	/// lines entirely rather than spamming a log file.
	#[must_use]
	pub fn new(live: bool) -> Self {
		ProgressFactory { live }
	}

	/// Auto-detects terminal attachment, matching the teacher's
	/// `get_progress_bar` default behavior.
	#[must_use]
	pub fn auto() -> Self {
		ProgressFactory::new(io::stderr().is_terminal())
	}

	#[must_use]
	pub fn phase(&self, name: &str, len: u64) -> ProgressHandle {
		ProgressHandle::new(name, len, self.live)
	}
}

impl Default for ProgressFactory {
	fn default() -> Self {
		ProgressFactory::new(false)
	}
}
