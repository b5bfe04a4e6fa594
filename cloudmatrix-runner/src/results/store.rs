// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-memory result aggregation store.
//!
//! A [`ResultStore`] maps encoded configuration-instance keys to
//! [`ConfigurationResult`]s and owns the one-shot bookkeeping that makes
//! every UI-facing transition idempotent across repeated polls. It is owned
//! exclusively by a single run's polling task, so it needs no internal
//! locking; cross-run isolation comes from giving every run its own store.

use crate::errors::ScreenshotNameError;
use debug_ignore::DebugIgnore;
use image::DynamicImage;
use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;
use std::sync::Arc;

/// Progress text beginning with this literal prefix marks the instance as an
/// infrastructure failure. Written by the execution backend; compatibility
/// sensitive.
pub const INFRASTRUCTURE_FAILURE_PREFIX: &str = "Infrastructure Failure:";

/// A listener invoked synchronously after a screenshot is recorded, with
/// the screenshot's file name.
pub type ScreenshotListener = Arc<dyn Fn(&str) + Send + Sync>;

/// The (test, step) lookup key derived from a screenshot file name.
///
/// Screenshot leaves follow `<testClass>.<testMethod>-<step>.<ext>`; the
/// test part is everything before the last `-`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ScreenshotKey {
    test: SmolStr,
    step: SmolStr,
}

impl ScreenshotKey {
    /// Builds a key from a test identifier and step name.
    pub fn new(test: impl Into<SmolStr>, step: impl Into<SmolStr>) -> Self {
        Self {
            test: test.into(),
            step: step.into(),
        }
    }

    /// Parses a key out of a screenshot leaf name.
    pub fn parse(leaf_name: &str) -> Result<Self, ScreenshotNameError> {
        let stem = leaf_name
            .rsplit_once('.')
            .map(|(stem, _ext)| stem)
            .ok_or_else(|| ScreenshotNameError::new(leaf_name))?;
        let (test, step) = stem
            .rsplit_once('-')
            .ok_or_else(|| ScreenshotNameError::new(leaf_name))?;
        if test.is_empty() || step.is_empty() {
            return Err(ScreenshotNameError::new(leaf_name));
        }
        Ok(Self::new(test, step))
    }

    /// The test identifier (`testClass.testMethod`).
    pub fn test(&self) -> &str {
        &self.test
    }

    /// The step name.
    pub fn step(&self) -> &str {
        &self.step
    }
}

/// The terminal state of a configuration instance.
///
/// Derived from the observed remote facts with a fixed precedence: a DONE
/// marker wins over an infrastructure-failure progress line observed in the
/// same poll cycle, which in turn wins over a triggering error.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TerminalState {
    /// A DONE marker was observed.
    Finished,

    /// The progress text reported an infrastructure failure.
    InfrastructureFailure,

    /// The backend rejected this instance at submit time.
    TriggeringError,
}

/// The accumulated result for one configuration instance.
///
/// Created on first sighting of any file belonging to the instance, then
/// mutated incrementally as progress, result and screenshot files appear.
/// Never destroyed for the duration of the run.
#[derive(Debug, Default)]
pub struct ConfigurationResult {
    progress: String,
    complete: bool,
    infrastructure_failure: bool,
    triggering_error: bool,
    payload: Option<String>,
    screenshots: DebugIgnore<IndexMap<SmolStr, DynamicImage>>,
    screenshots_by_step: IndexMap<ScreenshotKey, SmolStr>,
    listeners: DebugIgnore<Vec<ScreenshotListener>>,
}

impl ConfigurationResult {
    /// The latest progress text.
    pub fn progress(&self) -> &str {
        &self.progress
    }

    /// Whether a DONE marker has been observed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether the progress text reported an infrastructure failure.
    pub fn is_infrastructure_failure(&self) -> bool {
        self.infrastructure_failure
    }

    /// Whether the backend rejected this instance at submit time.
    pub fn is_triggering_error(&self) -> bool {
        self.triggering_error
    }

    /// The raw result payload, if one has been recorded.
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// The terminal state, if any flag has been observed.
    pub fn terminal_state(&self) -> Option<TerminalState> {
        if self.complete {
            Some(TerminalState::Finished)
        } else if self.infrastructure_failure {
            Some(TerminalState::InfrastructureFailure)
        } else if self.triggering_error {
            Some(TerminalState::TriggeringError)
        } else {
            None
        }
    }

    /// Looks up a screenshot by file name.
    pub fn screenshot(&self, name: &str) -> Option<&DynamicImage> {
        self.screenshots.get(name)
    }

    /// Looks up a screenshot by (test, step).
    pub fn screenshot_for_step(&self, test: &str, step: &str) -> Option<&DynamicImage> {
        let name = self.screenshots_by_step.get(&ScreenshotKey::new(test, step))?;
        self.screenshots.get(name)
    }

    /// The recorded screenshot file names, in arrival order.
    pub fn screenshot_names(&self) -> impl Iterator<Item = &SmolStr> + '_ {
        self.screenshots.keys()
    }

    /// Registers a listener notified after each screenshot insertion.
    pub fn subscribe_screenshots(&mut self, listener: ScreenshotListener) {
        self.listeners.push(listener);
    }

    fn notify_screenshot(&self, name: &str) {
        for listener in self.listeners.iter() {
            listener(name);
        }
    }
}

/// Per-run aggregation of configuration results, keyed by encoded instance
/// string.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: IndexMap<SmolStr, ConfigurationResult>,
    // One-shot sets for the idempotent UI-facing transitions.
    marked_pending: IndexSet<SmolStr>,
    marked_finished: IndexSet<SmolStr>,
    published: IndexSet<SmolStr>,
}

impl ResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the result for a key, creating a fresh one on first sighting.
    pub fn get_or_create(&mut self, key: &str) -> &mut ConfigurationResult {
        self.results.entry(SmolStr::new(key)).or_default()
    }

    /// Looks up a result without creating it.
    pub fn get(&self, key: &str) -> Option<&ConfigurationResult> {
        self.results.get(key)
    }

    /// The known instance keys, in first-sighting order.
    pub fn keys(&self) -> Vec<SmolStr> {
        self.results.keys().cloned().collect()
    }

    /// Iterates over all results in first-sighting order.
    pub fn results(&self) -> impl Iterator<Item = (&SmolStr, &ConfigurationResult)> + '_ {
        self.results.iter()
    }

    /// The number of known instances.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no instance has been sighted yet.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Records the latest progress text for a key.
    ///
    /// Returns true only if the text differs from what was previously
    /// stored. A poll that re-reads identical progress must not count as new
    /// data, otherwise a stale-but-repeated listing would extend the run
    /// timeout forever.
    pub fn set_progress(&mut self, key: &str, text: &str) -> bool {
        let result = self.get_or_create(key);
        if result.progress == text {
            return false;
        }
        result.progress = text.to_owned();
        true
    }

    /// Marks a key as an infrastructure failure.
    pub fn mark_infrastructure_failure(&mut self, key: &str) {
        self.get_or_create(key).infrastructure_failure = true;
    }

    /// Marks a key as rejected by the backend at submit time.
    pub fn mark_triggering_error(&mut self, key: &str) {
        self.get_or_create(key).triggering_error = true;
    }

    /// Marks a key complete. Completion is authoritative: it is a property
    /// of the remote DONE marker, never inferred from payload presence.
    pub fn mark_complete(&mut self, key: &str) {
        self.get_or_create(key).complete = true;
    }

    /// Records the result payload for a key, once.
    ///
    /// Returns true only the first time a payload is recorded; later result
    /// files for the same key never overwrite it.
    pub fn set_result_payload(&mut self, key: &str, text: &str) -> bool {
        let result = self.get_or_create(key);
        if result.payload.is_some() {
            return false;
        }
        result.payload = Some(text.to_owned());
        true
    }

    /// Records a screenshot under its file name, once per name.
    ///
    /// Fails loudly if the name does not match the screenshot naming
    /// contract; nothing is recorded in that case. Registered screenshot
    /// listeners are notified after the insertion, not before.
    pub fn add_screenshot(
        &mut self,
        key: &str,
        name: &str,
        image: DynamicImage,
    ) -> Result<bool, ScreenshotNameError> {
        let step_key = ScreenshotKey::parse(name)?;
        let result = self.get_or_create(key);
        if result.screenshots.contains_key(name) {
            return Ok(false);
        }
        result.screenshots.insert(SmolStr::new(name), image);
        result.screenshots_by_step.insert(step_key, SmolStr::new(name));
        result.notify_screenshot(name);
        Ok(true)
    }

    /// Whether a screenshot with this exact file name is already recorded.
    pub fn has_screenshot(&self, key: &str, name: &str) -> bool {
        self.results
            .get(key)
            .is_some_and(|result| result.screenshots.contains_key(name))
    }

    /// The number of instances for which no further progress is expected.
    pub fn terminal_count(&self) -> usize {
        self.results
            .values()
            .filter(|result| result.terminal_state().is_some())
            .count()
    }

    /// Marks a key as reported pending in the UI. Returns true only the
    /// first time.
    pub fn try_mark_pending(&mut self, key: &str) -> bool {
        self.marked_pending.insert(SmolStr::new(key))
    }

    /// Marks a key's terminal state as reported. Returns true only the
    /// first time: an instance never gets a second terminal event.
    pub fn try_mark_finished(&mut self, key: &str) -> bool {
        self.marked_finished.insert(SmolStr::new(key))
    }

    /// Whether a terminal event has already been reported for this key.
    pub fn is_marked_finished(&self, key: &str) -> bool {
        self.marked_finished.contains(key)
    }

    /// Marks a key's payload as published. Returns true only the first time.
    pub fn try_mark_published(&mut self, key: &str) -> bool {
        self.published.insert(SmolStr::new(key))
    }

    /// Whether a payload publish has already been recorded for this key.
    pub fn is_published(&self, key: &str) -> bool {
        self.published.contains(key)
    }
}
