// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by cloudmatrix-runner.

use crate::{matrix::DimensionKind, registry::RunId};
use std::io;
use thiserror::Error;

/// An error that occurs when a dimension mutation names a value outside the
/// dimension's full domain.
///
/// This indicates a caller bug (stale catalog or typo), not an environmental
/// condition.
#[derive(Clone, Debug, Error)]
#[error("unknown {dimension} value `{value}`")]
pub struct UnknownDimensionValue {
    dimension: DimensionKind,
    value: String,
}

impl UnknownDimensionValue {
    pub(crate) fn new(dimension: DimensionKind, value: impl Into<String>) -> Self {
        Self {
            dimension,
            value: value.into(),
        }
    }
}

/// An error that occurs while parsing an encoded or display instance string.
#[derive(Clone, Debug, Error)]
pub enum InstanceParseError {
    /// The input did not split into one token per dimension.
    #[error(
        "`{input}` splits into {actual} `{delimiter}`-separated values, expected {expected}"
    )]
    WrongValueCount {
        /// The input string.
        input: String,
        /// The delimiter the input was split on.
        delimiter: &'static str,
        /// The number of dimensions.
        expected: usize,
        /// The number of tokens found.
        actual: usize,
    },

    /// A token matched no value in the corresponding dimension's full domain.
    #[error("no known {dimension} value matches `{token}`")]
    UnknownToken {
        /// The dimension the token was parsed against.
        dimension: DimensionKind,
        /// The offending token.
        token: String,
    },
}

/// An error that occurs when a remote screenshot file name does not match
/// the `<test>-<step>.<ext>` contract.
#[derive(Clone, Debug, Error)]
#[error("screenshot name `{name}` does not match `<test>-<step>.<ext>`")]
pub struct ScreenshotNameError {
    name: String,
}

impl ScreenshotNameError {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The offending file name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An error that occurs when a run id is registered twice.
///
/// This is fatal and non-retryable: it indicates a re-entrant trigger in the
/// caller, not an environmental condition.
#[derive(Clone, Debug, Error)]
#[error("run `{run_id}` is already registered")]
pub struct RunAlreadyRegistered {
    run_id: RunId,
}

impl RunAlreadyRegistered {
    pub(crate) fn new(run_id: RunId) -> Self {
        Self { run_id }
    }

    /// The run id that was registered twice.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }
}

/// An error returned by the test-execution backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected the submission.
    #[error("backend rejected the submission: {message}")]
    Rejected {
        /// The backend's stated reason.
        message: String,
    },

    /// Transport-level failure talking to the backend.
    #[error("backend transport error")]
    Transport(#[from] io::Error),
}
