// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Death tests
//!
//! A death test checks that some code terminates the process. The test binary
//! re-runs itself filtered down to the single calling test, with an environment
//! variable telling the child to execute the body instead of spawning again.
//! The parent then inspects how the child exited.
//!
//! ```ignore
//! #[test]
//! fn test_double_lock_aborts() {
//!     let death = assert_aborts("test_double_lock_aborts", || {
//!         let mutex = Mutex::new();
//!         mutex.lock();
//!         mutex.lock();
//!     });
//!     assert!(death.stderr.contains("mutex lock"));
//! }
//! ```

use std::{
	env,
	os::unix::process::ExitStatusExt,
	process::{self, Command, ExitStatus},
};

use tracing::debug;

/// Set in the child process to the name of the test it has to run.
pub const DEATH_TEST_ENV: &str = "REIFYDB_DEATH_TEST";

/// What the child process left behind.
#[derive(Debug)]
pub struct Death {
	pub status: ExitStatus,
	pub stderr: String,
	pub stdout: String,
}

impl Death {
	/// The signal that terminated the child, if any.
	pub fn signal(&self) -> Option<i32> {
		self.status.signal()
	}
}

/// Returns `true` inside the child spawned for `test_name`.
pub fn is_death_child(test_name: &str) -> bool {
	env::var(DEATH_TEST_ENV).is_ok_and(|name| name == test_name)
}

/// Runs `body` in a child process and returns how that process died.
///
/// `test_name` must be the path of the calling test as the test harness knows
/// it (the bare function name for integration tests). If `body` returns, the
/// child exits with status 0.
pub fn run_in_child<F>(test_name: &str, body: F) -> Death
where
	F: FnOnce(),
{
	run_in_child_with_env(test_name, &[], body)
}

/// Like [`run_in_child`], with `envs` added to the child's environment. Use it
/// for code that reads its configuration from the environment at first use.
pub fn run_in_child_with_env<F>(test_name: &str, envs: &[(&str, &str)], body: F) -> Death
where
	F: FnOnce(),
{
	if is_death_child(test_name) {
		body();
		process::exit(0);
	}

	let exe = env::current_exe().expect("failed to locate current test binary");
	debug!(test = test_name, exe = %exe.display(), ?envs, "spawning death test child");

	let output = Command::new(exe)
		.arg(test_name)
		.arg("--exact")
		.arg("--nocapture")
		.arg("--test-threads=1")
		.envs(envs.iter().copied())
		.env(DEATH_TEST_ENV, test_name)
		.output()
		.expect("failed to spawn death test child");

	Death {
		status: output.status,
		stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
		stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
	}
}

/// Runs `body` in a child process and asserts the child was killed by `SIGABRT`.
///
/// # Panics
/// Panics if the child exited any other way
pub fn assert_aborts<F>(test_name: &str, body: F) -> Death
where
	F: FnOnce(),
{
	let death = run_in_child(test_name, body);
	assert_eq!(
		death.signal(),
		Some(libc::SIGABRT),
		"expected {test_name} to abort, child exited with {:?}\nstderr:\n{}",
		death.status,
		death.stderr
	);
	death
}

/// Runs `body` in a child process and asserts the child exited normally.
pub fn assert_survives<F>(test_name: &str, body: F) -> Death
where
	F: FnOnce(),
{
	assert_survives_with_env(test_name, &[], body)
}

/// [`assert_survives`] with extra environment variables for the child.
pub fn assert_survives_with_env<F>(test_name: &str, envs: &[(&str, &str)], body: F) -> Death
where
	F: FnOnce(),
{
	let death = run_in_child_with_env(test_name, envs, body);
	assert!(
		death.status.success(),
		"expected {test_name} to survive, child exited with {:?}\nstderr:\n{}",
		death.status,
		death.stderr
	);
	death
}
