// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-cycle bucket loader.
//!
//! One call to [`BucketLoader::load_cycle`] takes a single listing snapshot
//! and runs three passes over it -- progress, result payloads, screenshots.
//! All three passes observe the same snapshot, so a result file and its DONE
//! marker are never read from different listings. Each pass is independently
//! fallible: a read failure is logged and retried naturally on the next poll
//! cycle.

use super::{FileType, ObjectStore, classify};
use crate::results::{INFRASTRUCTURE_FAILURE_PREFIX, ResultStore};
use smol_str::SmolStr;
use tracing::{debug, warn};

/// Chunk size for ranged reads. Reads loop while the last chunk came back
/// full, so objects larger than one chunk (or still being appended) are
/// picked up whole.
pub const READ_CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// What one poll cycle observed.
#[derive(Clone, Debug, Default)]
pub struct LoadOutcome {
    /// Whether any pass observed genuinely new data. DONE-marker detection
    /// alone does not count; only content changes and newly appended files
    /// do.
    pub new_data: bool,

    /// Progress texts that changed this cycle, keyed by encoded instance,
    /// in listing order.
    pub progress_updates: Vec<(SmolStr, String)>,
}

/// Reads the results bucket into a [`ResultStore`], one cycle at a time.
#[derive(Debug)]
pub struct BucketLoader<S> {
    client: S,
    bucket: String,
}

impl<S: ObjectStore> BucketLoader<S> {
    /// Creates a loader for one run's results bucket.
    pub fn new(client: S, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// The bucket this loader reads.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Runs one poll cycle against a fresh listing snapshot.
    pub async fn load_cycle(&self, results: &mut ResultStore) -> LoadOutcome {
        let listing = match self.client.list(&self.bucket).await {
            Ok(listing) => listing,
            Err(error) => {
                warn!(bucket = %self.bucket, %error, "bucket listing failed, skipping cycle");
                return LoadOutcome::default();
            }
        };
        let files: Vec<_> = listing.iter().map(|path| classify(path)).collect();

        let mut outcome = LoadOutcome::default();
        let progress_changed = self.progress_pass(&files, results, &mut outcome).await;
        let payloads_changed = self.result_pass(&files, results).await;
        let screenshots_changed = self.screenshot_pass(&files, results).await;
        outcome.new_data = progress_changed || payloads_changed || screenshots_changed;
        outcome
    }

    /// Reads every progress log, records content changes, and marks DONE
    /// instances complete.
    async fn progress_pass(
        &self,
        files: &[super::FileMetadata],
        results: &mut ResultStore,
        outcome: &mut LoadOutcome,
    ) -> bool {
        let mut changed = false;
        for file in files {
            if file.file_type() != FileType::Progress {
                continue;
            }
            let Some(key) = file.instance_key() else {
                continue;
            };
            let bytes = match self.read_full(file.path()).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!(path = file.path(), %error, "progress read failed");
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&bytes);
            if results.set_progress(key, &text) {
                changed = true;
                if text.starts_with(INFRASTRUCTURE_FAILURE_PREFIX) {
                    results.mark_infrastructure_failure(key);
                }
                outcome.progress_updates.push((key.clone(), text.into_owned()));
            }
        }

        // Completion comes from the marker file, not from payload presence,
        // and is not new data by itself.
        for file in files {
            if file.file_type() == FileType::Done {
                if let Some(key) = file.instance_key() {
                    results.mark_complete(key);
                }
            }
        }
        changed
    }

    /// Reads result payloads for instances that don't have one yet.
    async fn result_pass(&self, files: &[super::FileMetadata], results: &mut ResultStore) -> bool {
        let mut changed = false;
        for file in files {
            if file.file_type() != FileType::Result {
                continue;
            }
            let Some(key) = file.instance_key() else {
                continue;
            };
            if results.get(key).is_some_and(|result| result.payload().is_some()) {
                continue;
            }
            match self.read_full(file.path()).await {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    changed |= results.set_result_payload(key, &text);
                }
                Err(error) => {
                    warn!(path = file.path(), %error, "result read failed");
                }
            }
        }
        changed
    }

    /// Reads and decodes screenshots not yet recorded under their exact
    /// file names.
    async fn screenshot_pass(
        &self,
        files: &[super::FileMetadata],
        results: &mut ResultStore,
    ) -> bool {
        let mut changed = false;
        for file in files {
            if file.file_type() != FileType::Screenshot {
                continue;
            }
            let Some(key) = file.instance_key() else {
                continue;
            };
            if results.has_screenshot(key, file.leaf_name()) {
                continue;
            }
            let bytes = match self.read_full(file.path()).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!(path = file.path(), %error, "screenshot read failed");
                    continue;
                }
            };
            let image = match image::load_from_memory(&bytes) {
                Ok(image) => image,
                Err(error) => {
                    warn!(path = file.path(), %error, "screenshot decode failed, skipping");
                    continue;
                }
            };
            match results.add_screenshot(key, file.leaf_name(), image) {
                Ok(inserted) => changed |= inserted,
                Err(error) => {
                    warn!(path = file.path(), %error, "skipping misnamed screenshot");
                }
            }
        }
        changed
    }

    /// Reads an object in chunks, looping while the last chunk came back
    /// full-sized.
    async fn read_full(&self, path: &str) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        loop {
            let chunk = self
                .client
                .read_range(&self.bucket, path, buf.len() as u64, READ_CHUNK_SIZE)
                .await?;
            buf.extend_from_slice(&chunk);
            if (chunk.len() as u64) < READ_CHUNK_SIZE {
                break;
            }
        }
        debug!(path, len = buf.len(), "read object");
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::testing::{MemoryObjectStore, png_bytes};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const BUCKET: &str = "cloudmatrix-results";
    const KEY: &str = "N6-21-en-portrait";

    #[tokio::test]
    async fn identical_progress_is_not_new_data() {
        let bucket = MemoryObjectStore::new();
        bucket.put_text("N6-21-en-portrait/PROGRESS", "Starting...");
        let loader = BucketLoader::new(bucket, BUCKET);
        let mut results = ResultStore::new();

        let first = loader.load_cycle(&mut results).await;
        assert!(first.new_data);
        assert_eq!(first.progress_updates.len(), 1);
        assert_eq!(first.progress_updates[0].1, "Starting...");

        let second = loader.load_cycle(&mut results).await;
        assert!(!second.new_data, "re-reading identical content is not new data");
        assert!(second.progress_updates.is_empty());
    }

    #[tokio::test]
    async fn appended_progress_counts_as_new_data() {
        let bucket = MemoryObjectStore::new();
        bucket.put_text("N6-21-en-portrait/PROGRESS", "Starting...");
        let loader = BucketLoader::new(Arc::clone(&bucket), BUCKET);
        let mut results = ResultStore::new();

        loader.load_cycle(&mut results).await;
        bucket.put_text("N6-21-en-portrait/PROGRESS", "Starting...\nInstalling APK");
        let outcome = loader.load_cycle(&mut results).await;
        assert!(outcome.new_data);
        assert_eq!(results.get(KEY).unwrap().progress(), "Starting...\nInstalling APK");
    }

    #[tokio::test]
    async fn done_marker_completes_but_is_not_new_data() {
        let bucket = MemoryObjectStore::new();
        bucket.put_text("N6-21-en-portrait/DONE", "");
        let loader = BucketLoader::new(bucket, BUCKET);
        let mut results = ResultStore::new();

        let outcome = loader.load_cycle(&mut results).await;
        assert!(!outcome.new_data);
        assert!(results.get(KEY).unwrap().is_complete());
    }

    #[tokio::test]
    async fn infrastructure_failure_prefix_sets_the_flag() {
        let bucket = MemoryObjectStore::new();
        bucket.put_text(
            "N6-21-en-portrait/PROGRESS",
            "Infrastructure Failure: device offline",
        );
        let loader = BucketLoader::new(bucket, BUCKET);
        let mut results = ResultStore::new();

        loader.load_cycle(&mut results).await;
        assert!(results.get(KEY).unwrap().is_infrastructure_failure());
    }

    #[tokio::test]
    async fn result_payload_is_read_once() {
        let bucket = MemoryObjectStore::new();
        bucket.put_text("N6-21-en-portrait/x.results", "INSTRUMENTATION_CODE: -1");
        let loader = BucketLoader::new(Arc::clone(&bucket), BUCKET);
        let mut results = ResultStore::new();

        assert!(loader.load_cycle(&mut results).await.new_data);

        // A rewritten result file is ignored once a payload is recorded.
        bucket.put_text("N6-21-en-portrait/x.results", "tampered");
        assert!(!loader.load_cycle(&mut results).await.new_data);
        assert_eq!(results.get(KEY).unwrap().payload(), Some("INSTRUMENTATION_CODE: -1"));
    }

    #[tokio::test]
    async fn screenshots_are_decoded_and_recorded_once() {
        let bucket = MemoryObjectStore::new();
        bucket.put("N6-21-en-portrait/a.FooTest.t-s1.png", png_bytes());
        let loader = BucketLoader::new(bucket, BUCKET);
        let mut results = ResultStore::new();

        assert!(loader.load_cycle(&mut results).await.new_data);
        assert!(!loader.load_cycle(&mut results).await.new_data);
        assert!(results.get(KEY).unwrap().screenshot("a.FooTest.t-s1.png").is_some());
    }

    #[tokio::test]
    async fn undecodable_screenshot_is_skipped() {
        let bucket = MemoryObjectStore::new();
        bucket.put("N6-21-en-portrait/a.FooTest.t-s1.png", b"not a png".to_vec());
        let loader = BucketLoader::new(bucket, BUCKET);
        let mut results = ResultStore::new();

        let outcome = loader.load_cycle(&mut results).await;
        assert!(!outcome.new_data);
        assert!(results.get(KEY).is_none_or(|r| r.screenshot_names().count() == 0));
    }

    #[tokio::test]
    async fn a_failing_pass_does_not_abort_the_others() {
        let bucket = MemoryObjectStore::new();
        bucket.put_text("N6-21-en-portrait/PROGRESS", "Starting...");
        bucket.put_text("N6-21-en-portrait/x.results", "payload");
        bucket.fail_reads_for("N6-21-en-portrait/PROGRESS");
        let loader = BucketLoader::new(Arc::clone(&bucket), BUCKET);
        let mut results = ResultStore::new();

        let outcome = loader.load_cycle(&mut results).await;
        assert!(outcome.new_data, "result pass still observed new data");
        assert_eq!(results.get(KEY).unwrap().payload(), Some("payload"));
        assert_eq!(results.get(KEY).unwrap().progress(), "");

        // The progress read heals on a later cycle.
        bucket.clear_read_failures();
        let outcome = loader.load_cycle(&mut results).await;
        assert!(outcome.new_data);
        assert_eq!(results.get(KEY).unwrap().progress(), "Starting...");
    }

    #[tokio::test]
    async fn listing_failure_yields_an_empty_cycle() {
        let bucket = MemoryObjectStore::new();
        bucket.put_text("N6-21-en-portrait/PROGRESS", "Starting...");
        bucket.fail_listing(true);
        let loader = BucketLoader::new(bucket, BUCKET);
        let mut results = ResultStore::new();

        let outcome = loader.load_cycle(&mut results).await;
        assert!(!outcome.new_data);
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn large_objects_are_read_in_chunks() {
        let bucket = MemoryObjectStore::new();
        let mut big = vec![b'x'; READ_CHUNK_SIZE as usize];
        big.extend_from_slice(b"tail");
        bucket.put("N6-21-en-portrait/PROGRESS", big.clone());
        let loader = BucketLoader::new(bucket, BUCKET);
        let mut results = ResultStore::new();

        loader.load_cycle(&mut results).await;
        assert_eq!(results.get(KEY).unwrap().progress().len(), big.len());
    }
}
