// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{fmt, marker::PhantomData, time::Duration};

use super::Mutex;

/// Holds a [`Mutex`] for the rest of the enclosing scope.
///
/// The lock is released when the guard is dropped, including during panic
/// unwinding. The guard is `!Send`: a mutex must be released by the thread
/// that acquired it.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct ScopedLock<'a> {
	mutex: &'a Mutex,
	_not_send: PhantomData<*const ()>,
}

// SAFETY: sharing `&ScopedLock` only exposes `&Mutex`, which is `Sync`.
unsafe impl Sync for ScopedLock<'_> {}

impl<'a> ScopedLock<'a> {
	pub fn new(mutex: &'a Mutex) -> Self {
		mutex.lock();
		Self::acquired(mutex)
	}

	/// Locks with `label`, using the mutex's default threshold.
	pub fn labeled(mutex: &'a Mutex, label: &'static str) -> Self {
		mutex.lock_labeled(label);
		Self::acquired(mutex)
	}

	pub fn with_threshold(mutex: &'a Mutex, label: &'static str, threshold: Duration) -> Self {
		mutex.lock_with(Some(label), threshold);
		Self::acquired(mutex)
	}

	/// The guarded mutex.
	pub fn mutex(&self) -> &'a Mutex {
		self.mutex
	}

	fn acquired(mutex: &'a Mutex) -> Self {
		Self {
			mutex,
			_not_send: PhantomData,
		}
	}
}

impl Drop for ScopedLock<'_> {
	fn drop(&mut self) {
		self.mutex.unlock();
	}
}

impl fmt::Debug for ScopedLock<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ScopedLock").field("mutex", self.mutex).finish()
	}
}
