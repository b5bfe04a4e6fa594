// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The results bucket: path classification, the object-store collaborator
//! interface, and the per-cycle loader.
//!
//! The object store is eventually consistent and pull-only. A listing may
//! omit very recently written objects; the loader compensates by polling and
//! by treating only *content changes* as new data.

mod classify;
mod loader;

pub use classify::*;
pub use loader::*;

use bytes::Bytes;
use std::io;

/// The object-store collaborator used to read the results bucket.
///
/// `read_range` returns at most `len` bytes starting at `start`; a short
/// read means the object ends within the requested range. Reads past the end
/// of an object return an empty buffer, not an error.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Lists every object path in the bucket.
    async fn list(&self, bucket: &str) -> io::Result<Vec<String>>;

    /// Reads a byte range of one object.
    async fn read_range(&self, bucket: &str, path: &str, start: u64, len: u64)
    -> io::Result<Bytes>;
}
