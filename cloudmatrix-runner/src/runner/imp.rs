// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    bucket::{BucketLoader, ObjectStore},
    cancel::CancellationWatch,
    matrix::{Configuration, ConfigurationInstance, expand_instances},
    registry::RunId,
    reporter::{RunEvent, RunEventKind, RunStats, StopReason},
    results::{ResultStore, prepare_for_publish},
    time::rolling_deadline,
};
use chrono::Local;
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::time::Duration;
use tracing::debug;

/// How long a run may go without *any* data before timing out.
pub const INITIAL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// The rolling window granted every time the bucket yields new data.
pub const DYNAMIC_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// The fixed pause between poll cycles.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Builder for [`MatrixRunner`].
#[derive(Clone, Debug)]
pub struct MatrixRunnerBuilder {
    initial_timeout: Duration,
    dynamic_timeout: Duration,
    poll_interval: Duration,
}

impl Default for MatrixRunnerBuilder {
    fn default() -> Self {
        Self {
            initial_timeout: INITIAL_TIMEOUT,
            dynamic_timeout: DYNAMIC_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl MatrixRunnerBuilder {
    /// Creates a builder with the default timeout policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial timeout.
    pub fn set_initial_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.initial_timeout = timeout;
        self
    }

    /// Sets the rolling extension granted on new data.
    pub fn set_dynamic_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.dynamic_timeout = timeout;
        self
    }

    /// Sets the pause between poll cycles.
    pub fn set_poll_interval(&mut self, interval: Duration) -> &mut Self {
        self.poll_interval = interval;
        self
    }

    /// Builds a runner for one matrix run.
    ///
    /// The result store may be pre-populated: instances the backend
    /// rejected at submit time arrive here already carrying their
    /// triggering-error flag.
    pub fn build<S: ObjectStore>(
        &self,
        run_id: RunId,
        configuration: &Configuration,
        client: S,
        results_bucket: impl Into<String>,
        results: ResultStore,
        cancellation: CancellationWatch,
    ) -> MatrixRunner<S> {
        let expected = expand_instances(configuration);
        let display_names = expected
            .iter()
            .map(|instance| (instance.encoded(), instance.display()))
            .collect();
        MatrixRunner {
            run_id,
            expected,
            display_names,
            loader: BucketLoader::new(client, results_bucket),
            results,
            cancellation,
            initial_timeout: self.initial_timeout,
            dynamic_timeout: self.dynamic_timeout,
            poll_interval: self.poll_interval,
        }
    }
}

/// The polling orchestrator for one matrix run.
///
/// Owns the run's [`ResultStore`] and [`BucketLoader`] and is the sole
/// producer of [`RunEvent`]s for the run. Driven by [`execute`], which polls
/// the bucket on a fixed cadence under a rolling deadline and turns store
/// state into de-duplicated, ordered configuration-level events.
///
/// [`execute`]: MatrixRunner::execute
#[derive(Debug)]
pub struct MatrixRunner<S> {
    run_id: RunId,
    expected: Vec<ConfigurationInstance>,
    display_names: IndexMap<SmolStr, String>,
    loader: BucketLoader<S>,
    results: ResultStore,
    cancellation: CancellationWatch,
    initial_timeout: Duration,
    dynamic_timeout: Duration,
    poll_interval: Duration,
}

impl<S: ObjectStore> MatrixRunner<S> {
    /// Runs the poll loop to completion and returns the final statistics.
    ///
    /// The callback is invoked synchronously for every event; the final
    /// event is always [`RunEventKind::Flush`], whether the run completed,
    /// timed out or was cancelled.
    pub async fn execute<F>(mut self, mut callback: F) -> RunStats
    where
        F: FnMut(RunEvent) + Send,
    {
        let mut emit = move |kind: RunEventKind| {
            callback(RunEvent {
                timestamp: Local::now(),
                kind,
            });
        };

        let mut stats = RunStats {
            expected: self.expected.len(),
            ..RunStats::default()
        };

        emit(RunEventKind::RunStarted {
            run_id: self.run_id.clone(),
            expected_instances: self.expected.iter().map(|i| i.display()).collect(),
        });
        for instance in &self.expected {
            emit(RunEventKind::ConfigurationScheduled {
                name: instance.display(),
            });
        }

        let mut deadline = rolling_deadline(self.initial_timeout);
        loop {
            if self.cancellation.is_cancelled() {
                debug!(run_id = %self.run_id, "run cancelled, stopping poll loop");
                break;
            }

            let outcome = self.loader.load_cycle(&mut self.results).await;
            if outcome.new_data {
                deadline.extend(self.dynamic_timeout);
            }

            // First sighting of an instance in the bucket.
            for key in self.results.keys() {
                if self.results.try_mark_pending(&key) {
                    stats.started += 1;
                    emit(RunEventKind::ConfigurationStarted {
                        name: self.display_name_for(&key),
                    });
                }
            }

            // Progress updates, except for instances already stopped.
            for (key, progress) in outcome.progress_updates {
                if !self.results.is_marked_finished(&key) {
                    emit(RunEventKind::ConfigurationProgress {
                        name: self.display_name_for(&key),
                        progress,
                    });
                }
            }

            // Payloads publish before terminal stops: a stop must never
            // overtake a payload that is already available locally.
            let payload_ready: Vec<SmolStr> = self
                .results
                .results()
                .filter(|(key, result)| {
                    result.payload().is_some() && !self.results.is_published(key)
                })
                .map(|(key, _)| key.clone())
                .collect();
            for key in payload_ready {
                if self.results.try_mark_published(&key) {
                    let name = self.display_name_for(&key);
                    let raw = self
                        .results
                        .get(&key)
                        .and_then(|result| result.payload())
                        .unwrap_or_default();
                    let payload = prepare_for_publish(raw, &name);
                    emit(RunEventKind::RawResultPayload { name, payload });
                }
            }

            let newly_terminal: Vec<(SmolStr, StopReason)> = self
                .results
                .results()
                .filter(|(key, _)| !self.results.is_marked_finished(key))
                .filter_map(|(key, result)| {
                    result
                        .terminal_state()
                        .map(|state| (key.clone(), StopReason::from(state)))
                })
                .collect();
            for (key, reason) in newly_terminal {
                if self.results.try_mark_finished(&key) {
                    stats.on_stopped(reason);
                    debug!(key = %key, reason = reason.to_static_str(), "configuration stopped");
                    emit(RunEventKind::ConfigurationStopped {
                        name: self.display_name_for(&key),
                        reason,
                        current_stats: stats,
                    });
                }
            }

            if self.results.terminal_count() >= self.expected.len() {
                debug!(run_id = %self.run_id, "all expected instances resolved");
                break;
            }
            if deadline.is_expired() {
                debug!(run_id = %self.run_id, "run deadline passed");
                break;
            }

            tokio::select! {
                () = tokio::time::sleep(self.poll_interval) => {}
                () = self.cancellation.cancelled() => {}
            }
        }

        // Terminal reconciliation. Cancellation suppresses timeout
        // reporting; the caller has already told the UI. Instances that
        // already stopped keep their original reason: the one-shot finished
        // set guards against a second terminal event.
        let cancelled = self.cancellation.is_cancelled();
        if !cancelled && self.results.terminal_count() < self.expected.len() {
            for instance in &self.expected {
                let key = instance.encoded();
                if self.results.try_mark_finished(&key) {
                    stats.on_stopped(StopReason::TimedOut);
                    emit(RunEventKind::ConfigurationStopped {
                        name: instance.display(),
                        reason: StopReason::TimedOut,
                        current_stats: stats,
                    });
                }
            }
        }

        emit(RunEventKind::Flush { run_stats: stats });
        stats
    }

    fn display_name_for(&self, key: &str) -> String {
        match self.display_names.get(key) {
            Some(name) => name.clone(),
            None => {
                // A key the expansion didn't predict; report it raw rather
                // than dropping its events.
                debug!(key, "unexpected instance key in bucket");
                key.to_owned()
            }
        }
    }
}
