// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide registry of live matrix runs.
//!
//! Every run owns a [`RunContext`]: its configuration, its results bucket
//! and its cancellation token. The registry hands out shared references and
//! guards against double registration, which indicates a re-entrant trigger
//! in the caller. Entries must be removed with
//! [`RunRegistry::unregister`] once a run ends, so a long-lived process
//! does not accumulate dead runs.

use crate::{
    cancel::{CancellationHandle, CancellationWatch, cancellation_token},
    errors::RunAlreadyRegistered,
    matrix::Configuration,
};
use smol_str::SmolStr;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

/// The caller-assigned identity of one matrix run.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RunId(SmolStr);

impl RunId {
    /// Creates a run id.
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// The id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything scoped to one matrix run.
#[derive(Debug)]
pub struct RunContext {
    run_id: RunId,
    configuration: Configuration,
    results_bucket: String,
    cancellation: CancellationHandle,
    cancellation_watch: CancellationWatch,
}

impl RunContext {
    /// Creates a context for one run.
    pub fn new(
        run_id: RunId,
        configuration: Configuration,
        results_bucket: impl Into<String>,
    ) -> Self {
        let (cancellation, cancellation_watch) = cancellation_token();
        Self {
            run_id,
            configuration,
            results_bucket: results_bucket.into(),
            cancellation,
            cancellation_watch,
        }
    }

    /// The run's id.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// The configuration this run executes.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The bucket the backend writes results into.
    pub fn results_bucket(&self) -> &str {
        &self.results_bucket
    }

    /// Cancels the run. Idempotent.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// A watch on this run's cancellation token, for handing to the
    /// polling task.
    pub fn cancellation_watch(&self) -> CancellationWatch {
        self.cancellation_watch.clone()
    }
}

/// The process-wide run-id to context map.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<RunId, Arc<RunContext>>>,
}

impl RunRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a run, returning the shared context.
    ///
    /// Registering an id that is already live is fatal and not retried.
    pub fn register(&self, context: RunContext) -> Result<Arc<RunContext>, RunAlreadyRegistered> {
        let mut runs = self.runs.lock().expect("run registry lock poisoned");
        if runs.contains_key(&context.run_id) {
            return Err(RunAlreadyRegistered::new(context.run_id.clone()));
        }
        let context = Arc::new(context);
        runs.insert(context.run_id.clone(), Arc::clone(&context));
        Ok(context)
    }

    /// Looks up a live run.
    pub fn get(&self, run_id: &RunId) -> Option<Arc<RunContext>> {
        self.runs
            .lock()
            .expect("run registry lock poisoned")
            .get(run_id)
            .cloned()
    }

    /// Removes a run, returning its context if it was registered.
    pub fn unregister(&self, run_id: &RunId) -> Option<Arc<RunContext>> {
        self.runs
            .lock()
            .expect("run registry lock poisoned")
            .remove(run_id)
    }

    /// The number of live runs.
    pub fn len(&self) -> usize {
        self.runs.lock().expect("run registry lock poisoned").len()
    }

    /// Whether no run is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::test_catalog;
    use pretty_assertions::assert_eq;

    #[test]
    fn double_registration_is_fatal() {
        let registry = RunRegistry::new();
        let run_id = RunId::new("run-1");
        registry
            .register(RunContext::new(
                run_id.clone(),
                test_catalog::configuration("first"),
                "bucket-1",
            ))
            .unwrap();

        let err = registry
            .register(RunContext::new(
                run_id.clone(),
                test_catalog::configuration("second"),
                "bucket-2",
            ))
            .unwrap_err();
        assert_eq!(err.run_id(), &run_id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_frees_the_id_for_reuse() {
        let registry = RunRegistry::new();
        let run_id = RunId::new("run-1");
        registry
            .register(RunContext::new(
                run_id.clone(),
                test_catalog::configuration("first"),
                "bucket-1",
            ))
            .unwrap();
        assert!(registry.unregister(&run_id).is_some());
        assert!(registry.is_empty());
        assert!(registry.unregister(&run_id).is_none());

        registry
            .register(RunContext::new(
                run_id,
                test_catalog::configuration("again"),
                "bucket-1",
            ))
            .unwrap();
    }

    #[test]
    fn cancellation_flows_through_the_context() {
        let registry = RunRegistry::new();
        let run_id = RunId::new("run-1");
        let context = registry
            .register(RunContext::new(
                run_id.clone(),
                test_catalog::configuration("c"),
                "bucket",
            ))
            .unwrap();
        let watch = context.cancellation_watch();
        assert!(!watch.is_cancelled());

        registry.get(&run_id).unwrap().cancel();
        assert!(watch.is_cancelled());
        assert!(context.is_cancelled());
    }
}
