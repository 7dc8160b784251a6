// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Test support for the ReifyDB synchronization primitives.

pub mod death;
pub mod logging;
pub mod util;

pub use death::{assert_aborts, assert_survives, assert_survives_with_env, run_in_child_with_env};
pub use logging::init_logging;
pub use util::wait::{wait_for, wait_for_condition};
