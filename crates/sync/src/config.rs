// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Instrumentation configuration.
//!
//! Every [`Mutex`](crate::Mutex) captures an [`Instrumentation`] when it is
//! created and never looks at the configuration again. Mutexes built with
//! [`Mutex::new`](crate::Mutex::new) use the process-wide default, which is
//! either installed explicitly with [`configure`] or read from the
//! environment on first use:
//!
//! - `REIFYDB_SYNC_INSTRUMENT`: `1`, `true` or `on` enables reporting
//! - `REIFYDB_SYNC_THRESHOLD_US`: default threshold in microseconds
//! - `REIFYDB_SYNC_SINK`: `tracing` (default) or `stderr`
//!
//! Unparseable values fall back to the defaults and are logged once.
//!
//! Building without the `instrument` feature compiles all of it away.

use std::{env, fmt, sync::Arc, time::Duration};

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::{
	diagnostic::{DiagnosticSink, StderrSink, TracingSink},
	error::SyncError,
};

/// Threshold used when the caller does not pass one.
pub const DEFAULT_THRESHOLD: Duration = Duration::from_micros(5000);

pub const ENV_INSTRUMENT: &str = "REIFYDB_SYNC_INSTRUMENT";
pub const ENV_THRESHOLD_US: &str = "REIFYDB_SYNC_THRESHOLD_US";
pub const ENV_SINK: &str = "REIFYDB_SYNC_SINK";

/// `true` when the crate was built with the `instrument` feature.
pub(crate) const COMPILED_IN: bool = cfg!(feature = "instrument");

static GLOBAL: OnceCell<Instrumentation> = OnceCell::new();

/// Slow-lock reporting settings.
#[derive(Clone)]
pub struct Instrumentation {
	enabled: bool,
	threshold: Duration,
	sink: Arc<dyn DiagnosticSink>,
}

impl Instrumentation {
	/// Reporting switched off.
	pub fn disabled() -> Self {
		Self {
			enabled: false,
			threshold: DEFAULT_THRESHOLD,
			sink: Arc::new(TracingSink),
		}
	}

	/// Reporting switched on, delivering to `sink`.
	pub fn enabled(sink: Arc<dyn DiagnosticSink>) -> Self {
		Self {
			enabled: true,
			threshold: DEFAULT_THRESHOLD,
			sink,
		}
	}

	/// Reads the configuration from the `REIFYDB_SYNC_*` environment variables.
	pub fn from_env() -> Self {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Reads the configuration through `lookup`, which maps a variable name to
	/// its value. Invalid values fall back to the defaults with a warning.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let (instrumentation, rejected) = Self::load(lookup);
		log_rejected(&rejected);
		instrumentation
	}

	/// The process-wide default.
	pub fn global() -> &'static Instrumentation {
		if let Some(instrumentation) = GLOBAL.get() {
			return instrumentation;
		}

		// nothing may log inside the cell initializer, a subscriber that
		// creates a Mutex would re-enter it
		let mut rejected = None;
		let instrumentation = GLOBAL.get_or_init(|| {
			let (instrumentation, values) = Self::load(|key| env::var(key).ok());
			rejected = Some(values);
			instrumentation
		});
		if let Some(rejected) = rejected {
			log_rejected(&rejected);
			debug!(?instrumentation, "loaded sync instrumentation from environment");
		}
		instrumentation
	}

	fn load(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<Rejected>) {
		let mut rejected = Vec::new();

		let enabled = lookup(ENV_INSTRUMENT).is_some_and(|v| parse_flag(&v));

		let threshold = match lookup(ENV_THRESHOLD_US) {
			Some(raw) => match raw.trim().parse::<u64>() {
				Ok(micros) => Duration::from_micros(micros),
				Err(_) => {
					rejected.push(Rejected {
						variable: ENV_THRESHOLD_US,
						value: raw,
					});
					DEFAULT_THRESHOLD
				}
			},
			None => DEFAULT_THRESHOLD,
		};

		let sink: Arc<dyn DiagnosticSink> = match lookup(ENV_SINK).as_deref().map(str::trim) {
			Some("stderr") => Arc::new(StderrSink),
			Some("tracing") | None => Arc::new(TracingSink),
			Some(other) => {
				rejected.push(Rejected {
					variable: ENV_SINK,
					value: other.to_string(),
				});
				Arc::new(TracingSink)
			}
		};

		let instrumentation = Self {
			enabled,
			threshold,
			sink,
		};
		(instrumentation, rejected)
	}

	pub fn with_threshold(mut self, threshold: Duration) -> Self {
		self.threshold = threshold;
		self
	}

	pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
		self.sink = sink;
		self
	}

	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	/// Whether reports will actually be produced.
	pub fn is_enabled(&self) -> bool {
		COMPILED_IN && self.enabled
	}

	pub fn threshold(&self) -> Duration {
		self.threshold
	}

	/// Name of the configured sink, see [`DiagnosticSink::name`].
	pub fn sink_name(&self) -> &'static str {
		self.sink.name()
	}

	/// The sink, or `None` if reporting is off.
	pub(crate) fn active_sink(&self) -> Option<Arc<dyn DiagnosticSink>> {
		self.is_enabled().then(|| self.sink.clone())
	}
}

impl Default for Instrumentation {
	fn default() -> Self {
		Self::disabled()
	}
}

impl fmt::Debug for Instrumentation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instrumentation")
			.field("enabled", &self.enabled)
			.field("compiled_in", &COMPILED_IN)
			.field("threshold", &self.threshold)
			.field("sink", &self.sink.name())
			.finish()
	}
}

/// Installs the process-wide default.
///
/// Fails with [`SyncError::AlreadyConfigured`] once a default exists, whether
/// it was installed here or loaded from the environment by an earlier
/// [`Mutex::new`](crate::Mutex::new).
pub fn configure(instrumentation: Instrumentation) -> Result<(), SyncError> {
	GLOBAL.set(instrumentation).map_err(|_| SyncError::AlreadyConfigured)
}

/// An environment value that could not be used.
#[derive(Debug)]
struct Rejected {
	variable: &'static str,
	value: String,
}

fn log_rejected(rejected: &[Rejected]) {
	for Rejected { variable, value } in rejected {
		warn!(variable, value = %value, "ignoring invalid sync instrumentation setting, using the default");
	}
}

fn parse_flag(value: &str) -> bool {
	matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes")
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;
	use crate::diagnostic::RecordingSink;

	fn from_vars(vars: &[(&str, &str)]) -> Instrumentation {
		let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		Instrumentation::from_lookup(|key| vars.get(key).cloned())
	}

	#[test]
	fn test_parse_flag() {
		assert!(parse_flag("1"));
		assert!(parse_flag(" TRUE "));
		assert!(parse_flag("on"));
		assert!(!parse_flag("0"));
		assert!(!parse_flag("off"));
		assert!(!parse_flag(""));
	}

	#[test]
	fn test_disabled_has_no_sink() {
		let instrumentation = Instrumentation::disabled();
		assert!(!instrumentation.is_enabled());
		assert!(instrumentation.active_sink().is_none());
		assert_eq!(instrumentation.threshold(), DEFAULT_THRESHOLD);
	}

	#[test]
	fn test_enabled_follows_feature() {
		let instrumentation = Instrumentation::enabled(Arc::new(RecordingSink::new()))
			.with_threshold(Duration::from_millis(1));
		assert_eq!(instrumentation.is_enabled(), COMPILED_IN);
		assert_eq!(instrumentation.active_sink().is_some(), COMPILED_IN);
		assert_eq!(instrumentation.threshold(), Duration::from_millis(1));

		let instrumentation = instrumentation.with_enabled(false);
		assert!(!instrumentation.is_enabled());
	}

	#[test]
	fn test_configure_only_once() {
		let _ = Instrumentation::global();
		let err = configure(Instrumentation::disabled()).unwrap_err();
		assert!(matches!(err, SyncError::AlreadyConfigured));
	}

	#[test]
	fn test_lookup_defaults_when_unset() {
		let instrumentation = from_vars(&[]);
		assert!(!instrumentation.is_enabled(), "reporting should be off without {ENV_INSTRUMENT}");
		assert_eq!(instrumentation.threshold(), DEFAULT_THRESHOLD);
		assert_eq!(instrumentation.sink_name(), "tracing");
	}

	#[test]
	fn test_lookup_enable_flag() {
		assert_eq!(from_vars(&[(ENV_INSTRUMENT, "1")]).is_enabled(), COMPILED_IN);
		assert_eq!(from_vars(&[(ENV_INSTRUMENT, "yes")]).is_enabled(), COMPILED_IN);
		assert!(!from_vars(&[(ENV_INSTRUMENT, "0")]).is_enabled());
		assert!(!from_vars(&[(ENV_INSTRUMENT, "maybe")]).is_enabled());
	}

	#[test]
	fn test_lookup_threshold() {
		let instrumentation = from_vars(&[(ENV_THRESHOLD_US, " 250 ")]);
		assert_eq!(instrumentation.threshold(), Duration::from_micros(250));
	}

	#[test]
	fn test_lookup_invalid_threshold_falls_back() {
		for raw in ["", "-5", "10ms", "1.5"] {
			let instrumentation = from_vars(&[(ENV_THRESHOLD_US, raw)]);
			assert_eq!(instrumentation.threshold(), DEFAULT_THRESHOLD, "threshold {raw:?} should be rejected");
		}
	}

	#[test]
	fn test_lookup_sink_selection() {
		assert_eq!(from_vars(&[(ENV_SINK, "stderr")]).sink_name(), "stderr");
		assert_eq!(from_vars(&[(ENV_SINK, "tracing")]).sink_name(), "tracing");
		assert_eq!(from_vars(&[(ENV_SINK, "syslog")]).sink_name(), "tracing", "unknown sinks fall back to tracing");
	}

	#[test]
	fn test_load_collects_rejected_values() {
		let (instrumentation, rejected) = Instrumentation::load(|key| match key {
			ENV_THRESHOLD_US => Some("soon".to_string()),
			ENV_SINK => Some("syslog".to_string()),
			_ => None,
		});
		assert_eq!(instrumentation.threshold(), DEFAULT_THRESHOLD);

		let variables: Vec<_> = rejected.iter().map(|r| r.variable).collect();
		assert_eq!(variables, [ENV_THRESHOLD_US, ENV_SINK]);
		assert_eq!(rejected[1].value, "syslog");
	}

	#[test]
	fn test_debug_names_sink() {
		let rendered = format!("{:?}", Instrumentation::enabled(Arc::new(RecordingSink::new())));
		assert!(rendered.contains("sink: \"recording\""), "{rendered}");
	}
}
