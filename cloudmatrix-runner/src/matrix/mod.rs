// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The combinatorial configuration model.
//!
//! A [`Configuration`] selects values across four independent
//! [`Dimension`]s; [`expand_instances`] turns a configuration into the
//! ordered list of [`ConfigurationInstance`]s that the execution backend
//! actually runs.

mod configuration;
mod dimension;
mod instance;

pub use configuration::*;
pub use dimension::*;
pub use instance::*;
