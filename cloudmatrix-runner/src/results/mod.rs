// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result aggregation: the per-run store of configuration outcomes and the
//! publish-time payload transform.

mod payload;
mod store;

pub use payload::*;
pub use store::*;
