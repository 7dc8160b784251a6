// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Error-checking locking primitives for ReifyDB.
//!
//! This crate provides:
//! - [`Mutex`]: an exclusive, non-reentrant lock that tracks its owner
//! - [`ScopedLock`]: holds a [`Mutex`] until the end of the enclosing scope
//! - [`CondVar`]: a condition variable bound to a single [`Mutex`]
//!
//! All three wrap POSIX thread primitives. Misuse (locking twice from the same
//! thread, unlocking from a thread that does not hold the lock, waiting
//! without holding it) and any OS failure abort the process.
//!
//! # Instrumentation
//!
//! A labeled acquisition is timed. If acquiring took longer than the threshold
//! passed at lock time, or the lock is then held longer than it, a
//! [`diagnostic::Report`] is delivered to the mutex's
//! [`diagnostic::DiagnosticSink`]. Reporting is configured per mutex through
//! [`Instrumentation`] and compiled out entirely without the `instrument`
//! feature.
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use reifydb_sync::{CondVar, Mutex, ScopedLock};
//!
//! let mutex = Mutex::new();
//! let condvar = CondVar::new(&mutex);
//!
//! {
//!     let _guard = ScopedLock::labeled(&mutex, "flush");
//!     mutex.assert_held();
//!     let _signaled = condvar.timed_wait(Duration::from_millis(1));
//!     assert!(mutex.is_held());
//! }
//!
//! assert!(!mutex.is_held());
//! ```

#![cfg_attr(not(debug_assertions), deny(warnings))]

pub mod condvar;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod mutex;
mod sys;

pub use condvar::{CondVar, MutexRef};
pub use config::{DEFAULT_THRESHOLD, Instrumentation, configure};
pub use error::SyncError;
pub use mutex::{Mutex, ScopedLock};
