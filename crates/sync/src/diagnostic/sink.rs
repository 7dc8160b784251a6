// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::io::{self, Write};

use parking_lot::Mutex;
use tracing::warn;

use super::{DiagnosticSink, Report, ReportKind};

/// Emits reports as `tracing` warnings on target `reifydb_sync::diagnostic`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
	fn report(&self, report: &Report) {
		match report.kind {
			ReportKind::Wait => warn!(
				target: "reifydb_sync::diagnostic",
				label = report.label,
				kind = %report.kind,
				elapsed_ms = report.elapsed_ms(),
				"slow mutex acquisition"
			),
			ReportKind::Hold => warn!(
				target: "reifydb_sync::diagnostic",
				label = report.label,
				kind = %report.kind,
				elapsed_ms = report.elapsed_ms(),
				"mutex held too long"
			),
		}
	}

	fn name(&self) -> &'static str {
		"tracing"
	}
}

/// Writes one line per report to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
	fn report(&self, report: &Report) {
		let _ = writeln!(io::stderr().lock(), "{report}");
	}

	fn name(&self) -> &'static str {
		"stderr"
	}
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
	reports: Mutex<Vec<Report>>,
}

impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a copy of everything recorded so far.
	pub fn reports(&self) -> Vec<Report> {
		self.reports.lock().clone()
	}

	/// Removes and returns everything recorded so far.
	pub fn take(&self) -> Vec<Report> {
		std::mem::take(&mut *self.reports.lock())
	}

	pub fn len(&self) -> usize {
		self.reports.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.reports.lock().is_empty()
	}

	/// Number of recorded reports of the given kind.
	pub fn count(&self, kind: ReportKind) -> usize {
		self.reports.lock().iter().filter(|r| r.kind == kind).count()
	}
}

impl DiagnosticSink for RecordingSink {
	fn report(&self, report: &Report) {
		self.reports.lock().push(report.clone());
	}

	fn name(&self) -> &'static str {
		"recording"
	}
}
