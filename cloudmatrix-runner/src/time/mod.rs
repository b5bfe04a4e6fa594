// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time utilities for the polling orchestrator.

mod rolling_deadline;

pub(crate) use rolling_deadline::*;
