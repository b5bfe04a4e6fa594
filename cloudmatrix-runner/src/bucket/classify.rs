// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of remote object paths.
//!
//! The execution backend writes results under
//! `<encodedInstance>/<DONE|PROGRESS|name.results|name.png>`. This module
//! turns one listed path into a typed [`FileMetadata`] record. Classification
//! is pure and allocation-light: it runs once per listed object per poll
//! cycle.

use smol_str::SmolStr;

/// Name of the zero-content object marking an instance's execution as
/// finished.
pub const DONE_MARKER: &str = "DONE";

/// Name of the append-only progress log object.
pub const PROGRESS_MARKER: &str = "PROGRESS";

/// What kind of remote object a path denotes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FileType {
    /// A folder placeholder (path ends with `/`).
    Folder,

    /// A completion marker.
    Done,

    /// A progress log.
    Progress,

    /// A raw result payload (`.results`).
    Result,

    /// A screenshot image (`.png`, `.bmp`, `.jpg`).
    Screenshot,

    /// An application package (`.apk`).
    Apk,

    /// Anything else.
    Unknown,
}

/// The classification of one remote object path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileMetadata {
    path: String,
    file_type: FileType,
    instance_key: Option<SmolStr>,
    leaf_name: String,
}

impl FileMetadata {
    /// The full object path as listed.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The object's type.
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// The encoded configuration-instance key this object belongs to, if
    /// any. Top-level objects (no `/` in the path) have none.
    pub fn instance_key(&self) -> Option<&SmolStr> {
        self.instance_key.as_ref()
    }

    /// The leaf name: the segment after the last `/`, or for folders the
    /// path without its trailing slash.
    pub fn leaf_name(&self) -> &str {
        &self.leaf_name
    }
}

/// Classifies a single remote object path.
pub fn classify(path: &str) -> FileMetadata {
    if let Some(stripped) = path.strip_suffix('/') {
        return FileMetadata {
            path: path.to_owned(),
            file_type: FileType::Folder,
            instance_key: None,
            leaf_name: stripped.to_owned(),
        };
    }

    let (instance_key, leaf) = match path.rsplit_once('/') {
        Some((parent, leaf)) => {
            // The key is the path segment immediately before the last `/`.
            let key = parent.rsplit('/').next().unwrap_or(parent);
            (Some(SmolStr::new(key)), leaf)
        }
        None => (None, path),
    };

    let file_type = if leaf == DONE_MARKER && instance_key.is_some() {
        FileType::Done
    } else if leaf == PROGRESS_MARKER && instance_key.is_some() {
        FileType::Progress
    } else if leaf.ends_with(".results") {
        FileType::Result
    } else if leaf.ends_with(".png") || leaf.ends_with(".bmp") || leaf.ends_with(".jpg") {
        FileType::Screenshot
    } else if leaf.ends_with(".apk") {
        FileType::Apk
    } else {
        FileType::Unknown
    };

    FileMetadata {
        path: path.to_owned(),
        file_type,
        instance_key,
        leaf_name: leaf.to_owned(),
    }
}
