// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! OS primitives backing [`Mutex`](crate::Mutex) and [`CondVar`](crate::CondVar).

cfg_if::cfg_if! {
	if #[cfg(unix)] {
		mod pthread;
		pub(crate) use pthread::{RawCondvar, RawMutex};
	} else {
		compile_error!("reifydb-sync requires a POSIX threads platform");
	}
}
