// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test-execution backend collaborator.
//!
//! The backend is an opaque two-call contract: submit a configuration
//! instance for execution, and cancel a previously submitted execution.
//! Everything else (progress, results, screenshots) arrives through the
//! results bucket, never through this interface.

use crate::{errors::BackendError, matrix::ConfigurationInstance, results::ResultStore};
use smol_str::SmolStr;
use std::fmt;
use tracing::warn;

/// The backend's identifier for one submitted execution.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ExecutionId(SmolStr);

impl ExecutionId {
    /// Creates an execution id.
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// The id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One instance's submission request.
#[derive(Clone, Debug)]
pub struct SubmitSpec<'a> {
    /// Remote path of the application package under test.
    pub application_apk: &'a str,

    /// Remote path of the test package.
    pub test_apk: &'a str,

    /// The bucket the backend should write results into.
    pub results_bucket: &'a str,

    /// The configuration instance to execute.
    pub instance: &'a ConfigurationInstance,
}

/// The remote test-execution backend.
#[allow(async_fn_in_trait)]
pub trait ExecutionBackend {
    /// Submits one configuration instance for execution.
    async fn submit(
        &self,
        project_id: &str,
        spec: &SubmitSpec<'_>,
    ) -> Result<ExecutionId, BackendError>;

    /// Cancels a previously submitted execution.
    async fn cancel(
        &self,
        project_id: &str,
        execution_id: &ExecutionId,
    ) -> Result<(), BackendError>;
}

/// Submits every instance of a matrix, recording backend rejections as
/// triggering errors in the result store.
///
/// Submission errors never abort the matrix: the remaining instances are
/// still submitted, and the rejected ones surface through the normal
/// per-configuration event flow with a triggering-error stop reason.
pub async fn submit_matrix<B: ExecutionBackend>(
    backend: &B,
    project_id: &str,
    application_apk: &str,
    test_apk: &str,
    results_bucket: &str,
    instances: &[ConfigurationInstance],
    results: &mut ResultStore,
) -> Vec<(ConfigurationInstance, Option<ExecutionId>)> {
    let mut submitted = Vec::with_capacity(instances.len());
    for instance in instances {
        let spec = SubmitSpec {
            application_apk,
            test_apk,
            results_bucket,
            instance,
        };
        match backend.submit(project_id, &spec).await {
            Ok(execution_id) => {
                submitted.push((instance.clone(), Some(execution_id)));
            }
            Err(error) => {
                warn!(instance = %instance.encoded(), %error, "submission rejected");
                results.mark_triggering_error(&instance.encoded());
                submitted.push((instance.clone(), None));
            }
        }
    }
    submitted
}

/// Cancels an execution, best-effort: exactly one retry on failure, then
/// gives up silently. Never surfaces an error to the caller.
pub async fn cancel_with_retry<B: ExecutionBackend>(
    backend: &B,
    project_id: &str,
    execution_id: &ExecutionId,
) {
    for attempt in 1..=2 {
        match backend.cancel(project_id, execution_id).await {
            Ok(()) => return,
            Err(error) => {
                warn!(%execution_id, attempt, %error, "cancel request failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{expand_instances, test_catalog};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyBackend {
        cancel_calls: AtomicUsize,
        failing_cancels: usize,
    }

    impl ExecutionBackend for FlakyBackend {
        async fn submit(
            &self,
            _project_id: &str,
            spec: &SubmitSpec<'_>,
        ) -> Result<ExecutionId, BackendError> {
            // Reject anything scheduled on the Nexus 9.
            if spec.instance.encoded().starts_with("N9") {
                return Err(BackendError::Rejected {
                    message: "unsupported device".to_owned(),
                });
            }
            Ok(ExecutionId::new(spec.instance.encoded()))
        }

        async fn cancel(
            &self,
            _project_id: &str,
            _execution_id: &ExecutionId,
        ) -> Result<(), BackendError> {
            let attempt = self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failing_cancels {
                return Err(BackendError::Rejected {
                    message: "busy".to_owned(),
                });
            }
            Ok(())
        }
    }

    fn two_device_instances() -> Vec<ConfigurationInstance> {
        let mut configuration = test_catalog::configuration("matrix");
        configuration.device_mut().enable(["N6", "N9"]).unwrap();
        configuration.api_level_mut().enable(["21"]).unwrap();
        configuration.locale_mut().enable(["en"]).unwrap();
        configuration.orientation_mut().enable(["portrait"]).unwrap();
        expand_instances(&configuration)
    }

    #[tokio::test]
    async fn rejected_submissions_become_triggering_errors() {
        let backend = FlakyBackend {
            cancel_calls: AtomicUsize::new(0),
            failing_cancels: 0,
        };
        let mut results = ResultStore::new();
        let submitted = submit_matrix(
            &backend,
            "project",
            "gs://apks/app.apk",
            "gs://apks/app-test.apk",
            "results",
            &two_device_instances(),
            &mut results,
        )
        .await;

        assert_eq!(submitted.len(), 2);
        assert!(submitted[0].1.is_some());
        assert!(submitted[1].1.is_none());
        assert!(results.get("N9-21-en-portrait").unwrap().is_triggering_error());
        assert!(results.get("N6-21-en-portrait").is_none());
    }

    #[tokio::test]
    async fn cancel_retries_exactly_once_then_gives_up() {
        let backend = FlakyBackend {
            cancel_calls: AtomicUsize::new(0),
            failing_cancels: 5,
        };
        cancel_with_retry(&backend, "project", &ExecutionId::new("exec-1")).await;
        assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancel_stops_after_a_successful_retry() {
        let backend = FlakyBackend {
            cancel_calls: AtomicUsize::new(0),
            failing_cancels: 1,
        };
        cancel_with_retry(&backend, "project", &ExecutionId::new("exec-1")).await;
        assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 2);
    }
}
