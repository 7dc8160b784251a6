// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per-thread identity used for owner tracking.

use std::sync::atomic::{AtomicU64, Ordering};

/// No owner.
pub(crate) const NONE: u64 = 0;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
	static TOKEN: u64 = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Non-zero token unique to the calling thread for the life of the process.
pub(crate) fn current() -> u64 {
	TOKEN.with(|token| *token)
}
