// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! POSIX threads implementation.
//!
//! Both primitives are boxed: a pthread object must keep its address once it
//! has been initialized, while the owning Rust value is free to move.

use std::{cell::UnsafeCell, io, mem, ptr, time::Duration};

use crate::error::{SyncError, check, fatal};

const NANOS_PER_SEC: u64 = 1_000_000_000;

pub(crate) struct RawMutex {
	inner: Box<UnsafeCell<libc::pthread_mutex_t>>,
}

// SAFETY: pthread mutexes are designed to be shared between threads.
unsafe impl Send for RawMutex {}
// SAFETY: see above.
unsafe impl Sync for RawMutex {}

impl RawMutex {
	/// Creates a mutex in `PTHREAD_MUTEX_ERRORCHECK` mode.
	pub(crate) fn new() -> Result<Self, SyncError> {
		let mutex = Self {
			inner: Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER)),
		};

		// SAFETY: `attr` is initialized before use and destroyed before it
		// goes out of scope; `mutex.raw()` points at boxed, unshared storage.
		unsafe {
			let mut attr = mem::MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
			check("init mutexattr", libc::pthread_mutexattr_init(attr.as_mut_ptr()))?;
			let init = check(
				"set mutexattr",
				libc::pthread_mutexattr_settype(attr.as_mut_ptr(), libc::PTHREAD_MUTEX_ERRORCHECK),
			)
			.and_then(|()| check("init mutex", libc::pthread_mutex_init(mutex.raw(), attr.as_ptr())));
			let destroy = check("destroy mutexattr", libc::pthread_mutexattr_destroy(attr.as_mut_ptr()));
			init?;
			destroy?;
		}

		Ok(mutex)
	}

	pub(crate) fn lock(&self) -> Result<(), SyncError> {
		// SAFETY: the mutex was initialized in `new` and is not yet destroyed.
		check("mutex lock", unsafe { libc::pthread_mutex_lock(self.raw()) })
	}

	/// Returns `Ok(false)` if another thread holds the mutex.
	pub(crate) fn try_lock(&self) -> Result<bool, SyncError> {
		// SAFETY: see `lock`.
		match unsafe { libc::pthread_mutex_trylock(self.raw()) } {
			0 => Ok(true),
			libc::EBUSY => Ok(false),
			code => Err(SyncError::from_code("mutex trylock", code)),
		}
	}

	pub(crate) fn unlock(&self) -> Result<(), SyncError> {
		// SAFETY: see `lock`. Unlocking from a non-owner is reported as
		// `EPERM` by an error-checking mutex.
		check("mutex unlock", unsafe { libc::pthread_mutex_unlock(self.raw()) })
	}

	fn raw(&self) -> *mut libc::pthread_mutex_t {
		self.inner.get()
	}
}

impl Drop for RawMutex {
	fn drop(&mut self) {
		// SAFETY: nobody can hold a reference to `self` any more. Destroying a
		// locked mutex fails with `EBUSY`, which is fatal.
		if let Err(err) = check("destroy mutex", unsafe { libc::pthread_mutex_destroy(self.raw()) }) {
			fatal(err);
		}
	}
}

pub(crate) struct RawCondvar {
	inner: Box<UnsafeCell<libc::pthread_cond_t>>,
}

// SAFETY: pthread condition variables are designed to be shared between threads.
unsafe impl Send for RawCondvar {}
// SAFETY: see above.
unsafe impl Sync for RawCondvar {}

impl RawCondvar {
	pub(crate) fn new() -> Result<Self, SyncError> {
		let condvar = Self {
			inner: Box::new(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER)),
		};
		// SAFETY: boxed, unshared storage; default (realtime clock) attributes.
		check("init condvar", unsafe { libc::pthread_cond_init(condvar.raw(), ptr::null()) })?;
		Ok(condvar)
	}

	/// Atomically releases `mutex` and blocks until woken, then reacquires it.
	///
	/// # Safety
	///
	/// Every wait on this condition variable must use the same `mutex`.
	pub(crate) unsafe fn wait(&self, mutex: &RawMutex) -> Result<(), SyncError> {
		// SAFETY: both objects are initialized; mutex pairing is upheld by the caller.
		check("condvar wait", unsafe { libc::pthread_cond_wait(self.raw(), mutex.raw()) })
	}

	/// Like [`wait`](Self::wait), bounded by a wall-clock deadline of now plus
	/// `timeout`. Returns `Ok(false)` if the deadline passed first.
	///
	/// # Safety
	///
	/// Same contract as [`wait`](Self::wait).
	pub(crate) unsafe fn wait_timeout(&self, mutex: &RawMutex, timeout: Duration) -> Result<bool, SyncError> {
		let deadline = realtime_deadline(timeout)?;
		// SAFETY: see `wait`.
		match unsafe { libc::pthread_cond_timedwait(self.raw(), mutex.raw(), &deadline) } {
			0 => Ok(true),
			libc::ETIMEDOUT => Ok(false),
			code => Err(SyncError::from_code("condvar timedwait", code)),
		}
	}

	pub(crate) fn signal(&self) -> Result<(), SyncError> {
		// SAFETY: initialized in `new`.
		check("signal", unsafe { libc::pthread_cond_signal(self.raw()) })
	}

	pub(crate) fn broadcast(&self) -> Result<(), SyncError> {
		// SAFETY: initialized in `new`.
		check("broadcast", unsafe { libc::pthread_cond_broadcast(self.raw()) })
	}

	fn raw(&self) -> *mut libc::pthread_cond_t {
		self.inner.get()
	}
}

impl Drop for RawCondvar {
	fn drop(&mut self) {
		// SAFETY: nobody can be waiting, since waiting requires a reference.
		if let Err(err) = check("destroy condvar", unsafe { libc::pthread_cond_destroy(self.raw()) }) {
			fatal(err);
		}
	}
}

/// Computes `CLOCK_REALTIME` now plus `timeout`, saturating at the largest
/// representable instant.
fn realtime_deadline(timeout: Duration) -> Result<libc::timespec, SyncError> {
	// SAFETY: timespec is plain old data; all-zero is a valid value.
	let mut now: libc::timespec = unsafe { mem::zeroed() };
	// SAFETY: `now` is a valid, writable timespec.
	if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } != 0 {
		return Err(SyncError::Os {
			operation: "clock gettime",
			source: io::Error::last_os_error(),
		});
	}

	let nanos = now.tv_nsec as u64 + u64::from(timeout.subsec_nanos());
	let secs = i64::try_from(timeout.as_secs())
		.unwrap_or(i64::MAX)
		.saturating_add((nanos / NANOS_PER_SEC) as i64)
		.saturating_add(now.tv_sec as i64);

	// SAFETY: see above.
	let mut deadline: libc::timespec = unsafe { mem::zeroed() };
	match libc::time_t::try_from(secs).ok() {
		Some(secs) => {
			deadline.tv_sec = secs;
			deadline.tv_nsec = (nanos % NANOS_PER_SEC) as libc::c_long;
		}
		None => {
			deadline.tv_sec = libc::time_t::MAX;
			deadline.tv_nsec = (NANOS_PER_SEC - 1) as libc::c_long;
		}
	}
	Ok(deadline)
}
