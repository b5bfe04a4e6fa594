// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for cloudmatrix: expanding a device/OS/locale/
//! orientation selection into concrete test-run variants, dispatching them
//! to a remote execution backend, and aggregating the eventually-consistent
//! results bucket into an ordered, de-duplicated stream of per-configuration
//! events.
//!
//! The flow of a run: a [`matrix::Configuration`] expands into
//! [`matrix::ConfigurationInstance`]s, [`backend::submit_matrix`] hands them
//! to the execution backend, and a [`runner::MatrixRunner`] polls the
//! results bucket until every instance resolves, emitting
//! [`reporter::RunEvent`]s along the way.

pub mod backend;
pub mod bucket;
pub mod cancel;
pub mod errors;
pub mod matrix;
pub mod registry;
pub mod reporter;
pub mod results;
pub mod runner;
mod time;
