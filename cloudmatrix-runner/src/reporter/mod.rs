// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event contract between the runner and the embedding UI.
//!
//! The main types here are [`RunEvent`] and [`RunEventKind`].

mod events;

pub use events::*;
