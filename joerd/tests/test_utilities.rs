#![allow(unused)]

use assert_cmd::{Command, cargo};

#[cfg(windows)]
pub const BINARY_NAME: &str = "joerd.exe";
#[cfg(not(windows))]
pub const BINARY_NAME: &str = "joerd";

/// Helper to create a Command for the joerd binary.
pub fn joerd_cmd() -> Command {
	Command::new(cargo::cargo_bin!())
}
