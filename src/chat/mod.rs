use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod document;
pub mod general;
pub mod intent;

pub use document::DocumentChat;
pub use general::GeneralChat;
pub use intent::{IntentClassifier, KeywordClassifier};

/// What happened to a submitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, nothing sent.
    Ignored,
    /// Another send (or a history load) is in flight; nothing appended, nothing sent.
    Busy,
    /// No document is open.
    NoActiveDocument,
    Answered,
    /// Document question with no documents known; answered locally.
    NoDocuments,
    /// The backend call failed; the error was appended to the transcript.
    Failed,
    /// The reply arrived after the user switched documents and was dropped.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    Declined,
    NoActiveDocument,
}

/// Asks the user to confirm a destructive action.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

#[async_trait]
impl Confirm for bool {
    async fn confirm(&self, _prompt: &str) -> bool {
        *self
    }
}

pub(crate) fn error_text(err: &dyn std::error::Error) -> String {
    format!("❌ Error: {}", err)
}

/// Holds an orchestrator's busy flag; dropping it releases the flag on every exit path.
pub(crate) struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    pub(crate) fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
