// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Error types and the fatal-abort path.
//!
//! Almost every error in this crate is a bug in the caller or a broken OS
//! primitive, so it is never handed back to the caller. Instead it flows into
//! [`fatal`], which logs it and aborts the process. The only recoverable error
//! is [`SyncError::AlreadyConfigured`].

use std::{
	io::{self, Write},
	process,
};

use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	/// An OS-level primitive call failed.
	#[error("pthread {operation}: {source}")]
	Os {
		operation: &'static str,
		#[source]
		source: io::Error,
	},

	/// The calling thread tried to lock a mutex it already holds.
	#[error("{operation}: mutex already held by the calling thread")]
	Recursive {
		operation: &'static str,
	},

	/// The calling thread tried to release a mutex it does not hold.
	#[error("{operation}: mutex not held by the calling thread")]
	NotOwner {
		operation: &'static str,
	},

	/// An operation requiring the mutex to be held was called without it.
	#[error("{operation}: mutex must be held by the calling thread")]
	NotHeld {
		operation: &'static str,
	},

	#[error("instrumentation has already been configured for this process")]
	AlreadyConfigured,
}

impl SyncError {
	/// Maps a non-zero pthread return code to an error.
	///
	/// Error-checking mutexes report misuse through `EDEADLK` and `EPERM`;
	/// those are surfaced as programming errors rather than OS failures.
	pub(crate) fn from_code(operation: &'static str, code: i32) -> Self {
		match code {
			libc::EDEADLK => SyncError::Recursive {
				operation,
			},
			libc::EPERM => SyncError::NotOwner {
				operation,
			},
			code => SyncError::Os {
				operation,
				source: io::Error::from_raw_os_error(code),
			},
		}
	}

	/// Returns `true` for errors caused by misusing a lock.
	pub fn is_programming_error(&self) -> bool {
		matches!(self, SyncError::Recursive { .. } | SyncError::NotOwner { .. } | SyncError::NotHeld { .. })
	}
}

/// Turns a pthread return code into a `Result`.
pub(crate) fn check(operation: &'static str, code: i32) -> Result<(), SyncError> {
	if code == 0 {
		Ok(())
	} else {
		Err(SyncError::from_code(operation, code))
	}
}

/// Reports `err` and aborts the process.
///
/// The message goes to stderr unconditionally so the failure is visible even
/// when no tracing subscriber is installed.
#[cold]
#[inline(never)]
pub fn fatal(err: SyncError) -> ! {
	error!(error = %err, programming_error = err.is_programming_error(), "fatal synchronization error");
	let _ = writeln!(io::stderr().lock(), "sync {err}");
	process::abort()
}

/// Unwraps `result` or aborts through [`fatal`].
pub(crate) fn or_abort<T>(result: Result<T, SyncError>) -> T {
	match result {
		Ok(value) => value,
		Err(err) => fatal(err),
	}
}
