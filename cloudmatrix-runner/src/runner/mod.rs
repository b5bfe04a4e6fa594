// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The polling orchestrator.
//!
//! The main structure in this module is [`MatrixRunner`].

mod imp;

pub use imp::*;
