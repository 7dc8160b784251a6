// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Error-checking exclusive lock.
//!
//! [`Mutex`] guards no data of its own: callers pair it with whatever state it
//! protects and bracket critical sections with [`Mutex::lock`] and
//! [`Mutex::unlock`], or with a [`ScopedLock`].
//!
//! Misuse never returns an error. Locking a mutex the calling thread already
//! holds, unlocking one it does not hold, or failing [`Mutex::assert_held`]
//! aborts the process, as does any failure of the underlying OS primitive.

use std::{
	cell::UnsafeCell,
	fmt, io,
	panic::{self, AssertUnwindSafe},
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::{Duration, Instant},
};

use tracing::error;

use crate::{
	config::{COMPILED_IN, Instrumentation},
	diagnostic::{DiagnosticSink, Report, ReportKind},
	error::{SyncError, fatal, or_abort},
	sys::RawMutex,
};

mod guard;
pub(crate) mod owner;

pub use guard::ScopedLock;

/// Diagnostic state of the current critical section.
///
/// Only the owning thread reads or writes it, and only while holding the lock.
#[derive(Debug, Clone, Copy)]
struct HoldState {
	label: Option<&'static str>,
	threshold: Duration,
	locked_at: Option<Instant>,
}

/// Diagnostic settings saved across a condition variable wait.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Suspended {
	label: Option<&'static str>,
	threshold: Duration,
}

/// An exclusive, non-reentrant lock with owner tracking.
pub struct Mutex {
	raw: RawMutex,
	owner: AtomicU64,
	hold: UnsafeCell<HoldState>,
	sink: Option<Arc<dyn DiagnosticSink>>,
	threshold: Duration,
}

// SAFETY: `hold` is only touched by the thread that currently owns `raw`, so
// the lock itself serializes every access to it.
unsafe impl Sync for Mutex {}

impl Mutex {
	/// Creates an unlocked mutex using the process-wide [`Instrumentation`].
	pub fn new() -> Self {
		Self::with_instrumentation(Instrumentation::global())
	}

	/// Creates an unlocked mutex reporting according to `instrumentation`.
	pub fn with_instrumentation(instrumentation: &Instrumentation) -> Self {
		Self {
			raw: or_abort(RawMutex::new()),
			owner: AtomicU64::new(owner::NONE),
			hold: UnsafeCell::new(HoldState {
				label: None,
				threshold: instrumentation.threshold(),
				locked_at: None,
			}),
			sink: instrumentation.active_sink(),
			threshold: instrumentation.threshold(),
		}
	}

	/// Blocks until the lock is acquired. No diagnostics are recorded.
	pub fn lock(&self) {
		self.lock_with(None, self.threshold);
	}

	/// Blocks until the lock is acquired, reporting under `label` with the
	/// default threshold.
	pub fn lock_labeled(&self, label: &'static str) {
		self.lock_with(Some(label), self.threshold);
	}

	/// Blocks until the lock is acquired.
	///
	/// With instrumentation enabled and a `label` given, a report is emitted if
	/// acquiring took longer than `threshold`, and another on
	/// [`unlock`](Self::unlock) if the lock was held longer than `threshold`.
	pub fn lock_with(&self, label: Option<&'static str>, threshold: Duration) {
		let me = owner::current();
		if self.owner.load(Ordering::Relaxed) == me {
			fatal(SyncError::Recursive {
				operation: "mutex lock",
			});
		}

		let started = (self.sink().is_some() && label.is_some()).then(Instant::now);
		or_abort(self.raw.lock());
		self.after_lock(me, label, threshold, started);
	}

	/// Acquires the lock if it is free. Never blocks.
	pub fn try_lock(&self) -> bool {
		self.try_lock_with(None, self.threshold)
	}

	/// Like [`try_lock`](Self::try_lock), recording `label` and `threshold` for
	/// the hold-time report on success.
	pub fn try_lock_with(&self, label: Option<&'static str>, threshold: Duration) -> bool {
		let me = owner::current();
		if self.owner.load(Ordering::Relaxed) == me {
			fatal(SyncError::Recursive {
				operation: "mutex trylock",
			});
		}

		if !or_abort(self.raw.try_lock()) {
			return false;
		}
		self.after_lock(me, label, threshold, None);
		true
	}

	/// Releases the lock. A hold-time report, if one is due, is delivered once
	/// the lock is free again.
	pub fn unlock(&self) {
		if !self.is_held() {
			fatal(SyncError::NotOwner {
				operation: "mutex unlock",
			});
		}
		let report = self.before_unlock();
		or_abort(self.raw.unlock());
		self.deliver(report);
	}

	/// Aborts the process unless the calling thread holds the lock.
	pub fn assert_held(&self) {
		if !self.is_held() {
			fatal(SyncError::NotHeld {
				operation: "assert held",
			});
		}
	}

	/// Whether the calling thread holds the lock.
	pub fn is_held(&self) -> bool {
		self.owner.load(Ordering::Relaxed) == owner::current()
	}

	/// Whether slow-lock reports are produced by this mutex.
	pub fn is_instrumented(&self) -> bool {
		self.sink().is_some()
	}

	pub(crate) fn raw(&self) -> &RawMutex {
		&self.raw
	}

	/// Ends the bookkeeping for the current critical section ahead of a
	/// condition variable wait. The caller must hold the lock.
	pub(crate) fn suspend(&self) -> Suspended {
		let suspended = if self.sink().is_some() {
			// SAFETY: the calling thread holds the lock.
			let hold = unsafe { &*self.hold.get() };
			Suspended {
				label: hold.label,
				threshold: hold.threshold,
			}
		} else {
			Suspended {
				label: None,
				threshold: self.threshold,
			}
		};
		let report = self.before_unlock();
		self.deliver(report);
		suspended
	}

	/// Starts a new critical section after a condition variable wait
	/// reacquired the lock. Without a new `label` the previous one is kept.
	pub(crate) fn resume(&self, suspended: Suspended, label: Option<&'static str>) {
		self.after_lock(owner::current(), label.or(suspended.label), suspended.threshold, None);
	}

	fn sink(&self) -> Option<&Arc<dyn DiagnosticSink>> {
		if COMPILED_IN {
			self.sink.as_ref()
		} else {
			None
		}
	}

	/// Records ownership and, when instrumented, the start of the hold. A wait
	/// report is produced from `started` (taken before blocking) to now, once
	/// all bookkeeping is in place.
	fn after_lock(&self, me: u64, label: Option<&'static str>, threshold: Duration, started: Option<Instant>) {
		self.owner.store(me, Ordering::Relaxed);

		if self.sink().is_none() {
			return;
		}

		// SAFETY: the calling thread has just acquired the lock.
		let hold = unsafe { &mut *self.hold.get() };
		hold.label = label;
		hold.threshold = threshold;
		hold.locked_at = None;

		let Some(label) = label else {
			return;
		};
		let acquired = Instant::now();
		hold.locked_at = Some(acquired);

		let report = started
			.map(|started| acquired.duration_since(started))
			.filter(|waited| *waited > threshold)
			.map(|waited| Report::new(label, ReportKind::Wait, waited));
		self.deliver(report);
	}

	/// Clears the bookkeeping and owner, returning the hold report if one is
	/// due. The caller delivers it.
	fn before_unlock(&self) -> Option<Report> {
		let mut report = None;
		if self.sink().is_some() {
			// SAFETY: the calling thread holds the lock.
			let hold = unsafe { &mut *self.hold.get() };
			if let (Some(label), Some(locked_at)) = (hold.label.take(), hold.locked_at.take()) {
				let held = locked_at.elapsed();
				if held > hold.threshold {
					report = Some(Report::new(label, ReportKind::Hold, held));
				}
			}
		}
		self.owner.store(owner::NONE, Ordering::Relaxed);
		report
	}

	/// Hands `report` to the sink. A panicking sink is logged and ignored.
	fn deliver(&self, report: Option<Report>) {
		let (Some(report), Some(sink)) = (report, self.sink()) else {
			return;
		};
		if panic::catch_unwind(AssertUnwindSafe(|| sink.report(&report))).is_err() {
			error!(label = report.label, kind = %report.kind, "diagnostic sink panicked, report dropped");
		}
	}
}

impl Default for Mutex {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for Mutex {
	fn drop(&mut self) {
		if *self.owner.get_mut() != owner::NONE {
			fatal(SyncError::Os {
				operation: "destroy mutex",
				source: io::Error::from_raw_os_error(libc::EBUSY),
			});
		}
	}
}

impl fmt::Debug for Mutex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Mutex")
			.field("locked", &(self.owner.load(Ordering::Relaxed) != owner::NONE))
			.field("held_by_current_thread", &self.is_held())
			.field("instrumented", &self.is_instrumented())
			.finish()
	}
}
