// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Condition variable bound to a single [`Mutex`].

use std::{fmt, sync::Arc, time::Duration};

use crate::{
	error::{SyncError, fatal, or_abort},
	mutex::Mutex,
	sys::RawCondvar,
};

mod sealed {
	pub trait Sealed {}
}

/// A reference to the [`Mutex`] a [`CondVar`] is bound to.
///
/// Implemented for `&Mutex`, where the borrow checker keeps the mutex alive,
/// and for `Arc<Mutex>`, where the condition variable shares ownership.
pub trait MutexRef: sealed::Sealed {
	fn mutex(&self) -> &Mutex;
}

impl sealed::Sealed for &Mutex {}

impl MutexRef for &Mutex {
	fn mutex(&self) -> &Mutex {
		self
	}
}

impl sealed::Sealed for Arc<Mutex> {}

impl MutexRef for Arc<Mutex> {
	fn mutex(&self) -> &Mutex {
		self
	}
}

/// A condition variable permanently bound to one [`Mutex`].
///
/// Waiting requires the calling thread to hold that mutex. Wakeups may be
/// spurious, so waits belong in a loop that re-checks the awaited condition:
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use reifydb_sync::{CondVar, Mutex, ScopedLock};
///
/// let mutex = Mutex::new();
/// let ready = AtomicBool::new(true);
/// let condvar = CondVar::new(&mutex);
///
/// let _guard = ScopedLock::new(&mutex);
/// while !ready.load(Ordering::Relaxed) {
///     condvar.wait();
/// }
/// ```
pub struct CondVar<M: MutexRef> {
	mutex: M,
	raw: RawCondvar,
}

impl<M: MutexRef> CondVar<M> {
	pub fn new(mutex: M) -> Self {
		Self {
			mutex,
			raw: or_abort(RawCondvar::new()),
		}
	}

	/// The mutex this condition variable is bound to.
	pub fn mutex(&self) -> &Mutex {
		self.mutex.mutex()
	}

	/// Releases the mutex, blocks until signaled and reacquires the mutex.
	///
	/// The mutex's diagnostic label and threshold carry over to the critical
	/// section that resumes after the wait.
	pub fn wait(&self) {
		self.wait_inner(None);
	}

	/// Like [`wait`](Self::wait), relabeling the resumed critical section.
	pub fn wait_labeled(&self, label: &'static str) {
		self.wait_inner(Some(label));
	}

	/// Like [`wait`](Self::wait), giving up once `timeout` has elapsed.
	///
	/// Returns `true` if woken before the deadline and `false` on timeout. The
	/// mutex is held again in both cases.
	pub fn timed_wait(&self, timeout: Duration) -> bool {
		self.timed_wait_inner(timeout, None)
	}

	/// Like [`timed_wait`](Self::timed_wait), relabeling the resumed critical
	/// section.
	pub fn timed_wait_labeled(&self, timeout: Duration, label: &'static str) -> bool {
		self.timed_wait_inner(timeout, Some(label))
	}

	/// Wakes at least one waiting thread, if any.
	pub fn signal(&self) {
		or_abort(self.raw.signal());
	}

	/// Wakes every waiting thread.
	pub fn broadcast(&self) {
		or_abort(self.raw.broadcast());
	}

	fn wait_inner(&self, label: Option<&'static str>) {
		let mutex = self.held("condvar wait");
		let suspended = mutex.suspend();
		// SAFETY: this condition variable is only ever used with `mutex`.
		let result = unsafe { self.raw.wait(mutex.raw()) };
		mutex.resume(suspended, label);
		or_abort(result);
	}

	fn timed_wait_inner(&self, timeout: Duration, label: Option<&'static str>) -> bool {
		let mutex = self.held("condvar timedwait");
		let suspended = mutex.suspend();
		// SAFETY: this condition variable is only ever used with `mutex`.
		let result = unsafe { self.raw.wait_timeout(mutex.raw(), timeout) };
		mutex.resume(suspended, label);
		or_abort(result)
	}

	fn held(&self, operation: &'static str) -> &Mutex {
		let mutex = self.mutex.mutex();
		if !mutex.is_held() {
			fatal(SyncError::NotHeld {
				operation,
			});
		}
		mutex
	}
}

impl<M: MutexRef> fmt::Debug for CondVar<M> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CondVar").field("mutex", self.mutex.mutex()).finish_non_exhaustive()
	}
}
