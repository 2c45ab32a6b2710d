use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{BusyGuard, ClearOutcome, Confirm, SendOutcome, error_text};
use crate::api::{ApiError, DocumentApi};
use crate::models::ChatMessage;

pub const CLEAR_PROMPT: &str = "Hapus history chat untuk dokumen ini?";

#[derive(Debug, Default)]
struct Conversation {
    pdf_id: Option<String>,
    /// Bumped on every `open`, including re-opening the same document.
    generation: u64,
    transcript: Vec<ChatMessage>,
    loading_history: bool,
}

/// Chat scoped to one document at a time.
///
/// Opening a document drops the transcript. Replies and history that arrive after a
/// later `open` are discarded, even when the same document was opened again.
pub struct DocumentChat {
    api: Arc<dyn DocumentApi>,
    conversation: RwLock<Conversation>,
    busy: AtomicBool,
}

impl DocumentChat {
    pub fn new(api: Arc<dyn DocumentApi>) -> Self {
        Self { api, conversation: RwLock::new(Conversation::default()), busy: AtomicBool::new(false) }
    }

    pub async fn active(&self) -> Option<String> {
        self.conversation.read().await.pdf_id.clone()
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.conversation.read().await.transcript.clone()
    }

    pub async fn is_loading_history(&self) -> bool {
        self.conversation.read().await.loading_history
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Makes `pdf_id` the active document and loads its history.
    pub async fn open(&self, pdf_id: &str) {
        let generation = {
            let mut conv = self.conversation.write().await;
            conv.pdf_id = Some(pdf_id.to_string());
            conv.generation += 1;
            conv.transcript.clear();
            conv.loading_history = true;
            conv.generation
        };
        let history = self.api.get_pdf_chat_history(pdf_id).await;

        let mut conv = self.conversation.write().await;
        if conv.generation != generation {
            debug!(pdf_id, "history arrived after another open");
            return;
        }
        match history {
            Ok(messages) => {
                debug!(pdf_id, messages = messages.len(), "document history loaded");
                conv.transcript = messages;
            }
            Err(e) => warn!(pdf_id, error = %e, "document history unavailable"),
        }
        conv.loading_history = false;
    }

    pub async fn send(&self, text: &str) -> SendOutcome {
        let question = text.trim();
        if question.is_empty() {
            return SendOutcome::Ignored;
        }
        let Some(_busy) = BusyGuard::try_acquire(&self.busy) else {
            return SendOutcome::Busy;
        };

        let (pdf_id, generation) = {
            let mut conv = self.conversation.write().await;
            let Some(pdf_id) = conv.pdf_id.clone() else {
                return SendOutcome::NoActiveDocument;
            };
            if conv.loading_history {
                return SendOutcome::Busy;
            }
            conv.transcript.push(ChatMessage::user(question));
            (pdf_id, conv.generation)
        };

        let result = self.api.chat_with_pdf(&pdf_id, question).await;

        let mut conv = self.conversation.write().await;
        if conv.generation != generation {
            info!(pdf_id = %pdf_id, "reply dropped, conversation was reopened");
            return SendOutcome::Discarded;
        }
        match result {
            Ok(reply) => {
                if !reply.is_empty() {
                    conv.transcript.push(ChatMessage::assistant(reply));
                }
                SendOutcome::Answered
            }
            Err(e) => {
                warn!(pdf_id = %pdf_id, error = %e, "document chat failed");
                conv.transcript.push(ChatMessage::assistant(error_text(&e)));
                SendOutcome::Failed
            }
        }
    }

    /// Clears the active document's server history after confirmation, then empties the transcript.
    pub async fn clear(&self, confirm: &dyn Confirm) -> Result<ClearOutcome, ApiError> {
        let (pdf_id, generation) = {
            let conv = self.conversation.read().await;
            let Some(pdf_id) = conv.pdf_id.clone() else {
                return Ok(ClearOutcome::NoActiveDocument);
            };
            (pdf_id, conv.generation)
        };
        if !confirm.confirm(CLEAR_PROMPT).await {
            return Ok(ClearOutcome::Declined);
        }
        self.api.clear_pdf_chat_history(&pdf_id).await?;
        let mut conv = self.conversation.write().await;
        if conv.generation == generation {
            conv.transcript.clear();
        }
        info!(pdf_id = %pdf_id, "document history cleared");
        Ok(ClearOutcome::Cleared)
    }
}
