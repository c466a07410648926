//! "Did this solve it?" responses from the analysis screen.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A user's verdict on the suggestions they were shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub solved: bool,
    /// Knowledge-base ticket the verdict refers to, when the UI knows it
    #[serde(default)]
    pub ticket_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackOutcome {
    pub status: &'static str,
    /// Not solved: a support ticket should be opened for a human
    pub escalated: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackCounts {
    pub solved: u64,
    pub not_solved: u64,
}

/// Running tally of feedback since startup.
#[derive(Debug, Default)]
pub struct FeedbackLedger {
    solved: AtomicU64,
    not_solved: AtomicU64,
}

impl FeedbackLedger {
    pub fn new() -> Self { Self::default() }

    pub fn record(&self, fb: &Feedback) -> FeedbackOutcome {
        let ticket_id = fb.ticket_id.as_deref().unwrap_or("-");
        if fb.solved {
            self.solved.fetch_add(1, Ordering::Relaxed);
            tracing::info!(ticket_id, "feedback: solved");
        } else {
            self.not_solved.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(ticket_id, "feedback: not solved, escalating to a support ticket");
        }
        FeedbackOutcome { status: "success", escalated: !fb.solved }
    }

    pub fn counts(&self) -> FeedbackCounts {
        FeedbackCounts { solved: self.solved.load(Ordering::Relaxed), not_solved: self.not_solved.load(Ordering::Relaxed) }
    }
}
