//! As-you-type querying: debouncing, off-thread execution and stale-result discard.
//!
//! Searches are cheap, so superseded work is allowed to finish; its result is
//! simply dropped on arrival if a newer one has already been delivered.

use crate::error::SearchError;
use crate::service::{LiveResults, SimilarityService};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// Caller-side filter admitting only results newer than the last delivered one.
#[derive(Debug, Default)]
pub struct StaleGuard {
    delivered: AtomicU64,
}

impl StaleGuard {
    pub fn new() -> Self { Self::default() }

    /// Returns true and records `seq` if it is newer than everything delivered so far.
    pub fn accept(&self, seq: u64) -> bool {
        self.delivered.fetch_max(seq, Ordering::AcqRel) < seq
    }

    pub fn last_delivered(&self) -> u64 { self.delivered.load(Ordering::Acquire) }
}

/// Runs live searches on the blocking pool so callers on the async side never stall.
#[derive(Clone)]
pub struct LiveSearcher {
    service: Arc<SimilarityService>,
}

impl LiveSearcher {
    pub fn new(service: Arc<SimilarityService>) -> Self { Self { service } }

    pub fn service(&self) -> &Arc<SimilarityService> { &self.service }

    /// Reserve the next sequence number without searching yet.
    pub fn next_seq(&self) -> u64 { self.service.next_seq() }

    pub async fn search(&self, text: String) -> Result<LiveResults, SearchError> {
        let seq = self.service.next_seq();
        self.search_seq(seq, text).await
    }

    pub async fn search_seq(&self, seq: u64, text: String) -> Result<LiveResults, SearchError> {
        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || service.live_search_seq(seq, &text)).await {
            Ok(res) => res,
            Err(e) => {
                // a panicked search degrades to "no suggestions"
                tracing::error!(seq, error = %e, "live search task failed");
                Ok(LiveResults { seq, issues: Vec::new() })
            }
        }
    }
}

/// Consume keystroke drafts and emit live results once input has been quiet
/// for `quiet`. Every search is numbered when issued; results that arrive
/// after a newer one was forwarded are dropped. Returns when `drafts` closes
/// and all issued searches have settled, or as soon as `results` has no receiver.
pub async fn debounce_live(
    searcher: LiveSearcher,
    mut drafts: mpsc::Receiver<String>,
    results: mpsc::Sender<LiveResults>,
    quiet: Duration,
) {
    let guard = Arc::new(StaleGuard::new());
    let mut pending: Option<(String, Instant)> = None;
    let mut inflight = tokio::task::JoinSet::new();
    let mut receiver_gone = false;

    loop {
        let deadline = pending.as_ref().map(|(_, at)| *at);
        tokio::select! {
            _ = results.closed() => {
                receiver_gone = true;
                break;
            }
            draft = drafts.recv() => match draft {
                Some(text) => pending = Some((text, Instant::now() + quiet)),
                None => break,
            },
            _ = async { sleep_until(deadline.unwrap_or_else(Instant::now)).await }, if deadline.is_some() => {
                let Some((text, _)) = pending.take() else { continue };
                let seq = searcher.next_seq();
                let searcher = searcher.clone();
                let guard = Arc::clone(&guard);
                let tx = results.clone();
                inflight.spawn(async move {
                    match searcher.search_seq(seq, text).await {
                        Ok(res) => {
                            if guard.accept(res.seq) {
                                if tx.send(res).await.is_err() {
                                    tracing::debug!(seq, "live results receiver closed");
                                }
                            } else {
                                tracing::debug!(seq = res.seq, "discarding stale live result");
                            }
                        }
                        Err(e) => tracing::debug!(seq, error = %e, "live search unavailable"),
                    }
                });
            }
        }
    }
    if receiver_gone {
        tracing::debug!(inflight = inflight.len(), "live results receiver closed, stopping debounce");
        inflight.abort_all();
        while inflight.join_next().await.is_some() {}
        return;
    }
    // flush a draft that was still waiting out its quiet period
    if let Some((text, at)) = pending.take() {
        sleep_until(at).await;
        let seq = searcher.next_seq();
        if let Ok(res) = searcher.search_seq(seq, text).await {
            if guard.accept(res.seq) && results.send(res).await.is_err() {
                tracing::debug!(seq, "live results receiver closed");
            }
        }
    }
    while inflight.join_next().await.is_some() {}
}
