// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Slow and long-held lock reports.
//!
//! A labeled lock acquisition is timed twice: how long the caller waited to
//! get the lock, and how long it then held it. Whenever either exceeds the
//! threshold passed at lock time, a [`Report`] is handed to the mutex's
//! [`DiagnosticSink`].

use std::{fmt, time::Duration};

use chrono::{DateTime, Local};

mod sink;

pub use sink::{RecordingSink, StderrSink, TracingSink};

/// What a [`Report`] measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
	/// Time spent blocked before the lock was acquired.
	Wait,
	/// Time the lock was held before it was released.
	Hold,
}

impl ReportKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ReportKind::Wait => "wait",
			ReportKind::Hold => "hold",
		}
	}
}

impl fmt::Display for ReportKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single slow-lock observation.
#[derive(Debug, Clone)]
pub struct Report {
	/// Wall-clock time the report was produced.
	pub timestamp: DateTime<Local>,
	/// Label supplied by the caller when locking.
	pub label: &'static str,
	pub kind: ReportKind,
	pub elapsed: Duration,
}

impl Report {
	pub(crate) fn new(label: &'static str, kind: ReportKind, elapsed: Duration) -> Self {
		Self {
			timestamp: Local::now(),
			label,
			kind,
			elapsed,
		}
	}

	/// Elapsed time in fractional milliseconds.
	pub fn elapsed_ms(&self) -> f64 {
		self.elapsed.as_secs_f64() * 1000.0
	}
}

impl fmt::Display for Report {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let action = match self.kind {
			ReportKind::Wait => "wait lock",
			ReportKind::Hold => "locked",
		};
		write!(
			f,
			"{} [Mutex] {} {} {:.3} ms",
			self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
			self.label,
			action,
			self.elapsed_ms()
		)
	}
}

/// Destination for [`Report`]s.
///
/// Sinks are called on the thread that owns the lock. Wait reports arrive
/// right after acquisition and hold reports right after release, except
/// ahead of a condition variable wait, where the lock is still held. A sink
/// must not lock the reporting mutex. A panic inside `report` is caught and
/// logged, and the report is dropped.
pub trait DiagnosticSink: Send + Sync {
	fn report(&self, report: &Report);

	/// Short name used in debug output.
	fn name(&self) -> &'static str {
		"custom"
	}
}
