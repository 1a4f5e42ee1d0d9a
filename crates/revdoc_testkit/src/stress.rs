//! Stress helpers for revdoc.
//!
//! These drive a [`DocStore`] under repeated and concurrent saves.

use crate::fixtures::scenarios;
use revdoc_core::{CoreError, DocStore, Document};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Failures that were slug or code conflicts.
    pub conflicts: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, conflicts: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            conflicts,
            duration,
            ops_per_second,
        }
    }

    /// Logs a summary of the run.
    pub fn log_summary(&self, name: &str) {
        tracing::info!(
            name,
            total = self.total_ops,
            successful = self.successful_ops,
            failed = self.failed_ops,
            conflicts = self.conflicts,
            duration = ?self.duration,
            ops_per_second = self.ops_per_second,
            "stress run finished"
        );
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Number of distinct documents.
    pub document_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            document_count: 100,
        }
    }
}

#[derive(Default)]
struct Tally {
    successful: AtomicUsize,
    failed: AtomicUsize,
    conflicts: AtomicUsize,
}

impl Tally {
    fn record<T>(&self, result: Result<T, CoreError>) {
        match result {
            Ok(_) => {
                self.successful.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                if matches!(e, CoreError::Conflict { .. }) {
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                }
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn finish(&self, start: Instant) -> StressTestResult {
        StressTestResult::new(
            self.successful.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.conflicts.load(Ordering::Relaxed),
            start.elapsed(),
        )
    }
}

/// Repeatedly re-saves `document_count` page documents, growing each one's
/// revision chain.
pub fn stress_sequential_updates(store: &DocStore, config: &StressConfig) -> StressTestResult {
    scenarios::page_doctype(store);
    let mut docs: Vec<Document> = (0..config.document_count)
        .map(|i| scenarios::page_document(&format!("doc-{i}"), &format!("Doc {i}")))
        .collect();

    let tally = Tally::default();
    let start = Instant::now();
    if docs.is_empty() {
        return tally.finish(start);
    }

    for i in 0..config.operations {
        let idx = i % docs.len();
        let doc = &mut docs[idx];
        doc.set("title", format!("Doc {idx} v{i}"));
        tally.record(store.save_document(doc));
    }

    tally.finish(start)
}

/// Saves distinct page documents from several threads at once.
pub fn stress_concurrent_creates(store: Arc<DocStore>, config: &StressConfig) -> StressTestResult {
    scenarios::page_doctype(&store);
    let tally = Arc::new(Tally::default());
    let ops_per_thread = config.operations / config.threads.max(1);
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let tally = Arc::clone(&tally);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let mut doc = scenarios::page_document(&format!("t{t}-{i}"), "Concurrent");
                    tally.record(store.save_document(&mut doc));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    tally.finish(start)
}

/// Has every thread try to create a document under the same slug.
///
/// Exactly one save can win; every other attempt must fail with a conflict.
pub fn stress_slug_contention(store: Arc<DocStore>, config: &StressConfig) -> StressTestResult {
    scenarios::page_doctype(&store);
    let tally = Arc::new(Tally::default());
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let tally = Arc::clone(&tally);
            thread::spawn(move || {
                let mut doc = scenarios::page_document("contested", &format!("Writer {t}"));
                tally.record(store.save_document(&mut doc));
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    tally.finish(start)
}
