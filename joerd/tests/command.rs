mod test_utilities;

use predicates::str;
use test_utilities::{BINARY_NAME, joerd_cmd};

#[test]
fn no_arguments_prints_usage_and_fails() {
	joerd_cmd()
		.assert()
		.failure()
		.code(2)
		.stdout(str::is_empty())
		.stderr(str::contains(format!("Usage: {BINARY_NAME} [OPTIONS] <COMMAND>")));
}

#[test]
fn version_flag_prints_the_binary_name() {
	joerd_cmd().arg("-V").assert().success().stdout(str::starts_with(BINARY_NAME));
}

#[test]
fn help_flag_lists_every_subcommand() {
	joerd_cmd()
		.arg("--help")
		.assert()
		.success()
		.stdout(str::contains("server").and(str::contains("enqueue-downloads")).and(str::contains("enqueue-renders")));
}

#[test]
fn server_subcommand_requires_config() {
	joerd_cmd().arg("server").assert().failure().code(2).stderr(str::contains("--config"));
}

#[test]
fn enqueue_downloads_subcommand_requires_config() {
	joerd_cmd().arg("enqueue-downloads").assert().failure().code(2).stderr(str::contains("--config"));
}

#[test]
fn enqueue_renders_subcommand_requires_config() {
	joerd_cmd().arg("enqueue-renders").assert().failure().code(2).stderr(str::contains("--config"));
}

#[test]
fn server_subcommand_surfaces_a_missing_config_file() {
	joerd_cmd()
		.args(["server", "--config", "/nonexistent/joerd.yaml"])
		.assert()
		.failure()
		.stderr(str::contains("Failed to load configuration"));
}
