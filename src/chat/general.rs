use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{BusyGuard, ClearOutcome, Confirm, IntentClassifier, KeywordClassifier, SendOutcome, error_text};
use crate::api::{ApiError, DocumentApi};
use crate::models::{ChatMessage, Document};
use crate::registry::DocumentRegistry;

pub const WELCOME_MESSAGE: &str = "Hi there! 👋 What would you like to know about your documents?";
pub const NO_DOCUMENTS_MESSAGE: &str =
    "📭 Belum ada dokumen yang diunggah. Silakan unggah PDF terlebih dahulu di halaman Documents, lalu tanyakan lagi.";
/// Prefix of answers produced from the document-augmented prompt.
pub const DOCUMENT_CONTEXT_MARKER: &str = "📚 **Berdasarkan dokumen Anda:**\n\n";
pub const CLEAR_PROMPT: &str = "Hapus semua riwayat chat?";

fn welcome() -> ChatMessage {
    ChatMessage::assistant(WELCOME_MESSAGE)
}

fn or_dash(v: Option<&str>) -> &str {
    v.filter(|s| !s.trim().is_empty()).unwrap_or("-")
}

fn join_or_dash(v: &[String]) -> String {
    if v.is_empty() { "-".into() } else { v.join(", ") }
}

/// Serialises every known document's metadata ahead of the user's question.
pub fn build_context_prompt(documents: &[Document], question: &str) -> String {
    let mut prompt = format!(
        "Kamu adalah asisten dokumen. Berikut daftar dokumen milik pengguna ({} dokumen):\n\n",
        documents.len()
    );
    for (i, doc) in documents.iter().enumerate() {
        let analysis = doc.analysis.clone().unwrap_or_default();
        let pages = analysis.page_count.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        let _ = writeln!(prompt, "{}. Nama: {}", i + 1, doc.display_name());
        if let Some(title) = analysis.title.as_deref().filter(|t| !t.trim().is_empty()) {
            let _ = writeln!(prompt, "   Judul: {}", title);
        }
        let _ = writeln!(prompt, "   Kategori: {}", or_dash(analysis.category.as_deref()));
        let _ = writeln!(prompt, "   Ringkasan: {}", or_dash(analysis.summary.as_deref()));
        let _ = writeln!(prompt, "   Kata kunci: {}", join_or_dash(&analysis.keywords));
        let _ = writeln!(prompt, "   Topik utama: {}", join_or_dash(&analysis.main_topics));
        let _ = writeln!(prompt, "   Jumlah halaman: {}", pages);
        let _ = writeln!(prompt, "   Diunggah: {}", doc.uploaded_label("%Y-%m-%d"));
        prompt.push('\n');
    }
    let _ = write!(
        prompt,
        "Pertanyaan pengguna: {}\n\nJawab berdasarkan informasi dokumen di atas. \
         Gunakan format markdown yang rapi dengan poin-poin bila perlu.",
        question
    );
    prompt
}

/// The general assistant conversation.
///
/// One send at a time; a second submit while a request is in flight is a no-op.
pub struct GeneralChat {
    api: Arc<dyn DocumentApi>,
    registry: Arc<RwLock<DocumentRegistry>>,
    classifier: Box<dyn IntentClassifier>,
    transcript: RwLock<Vec<ChatMessage>>,
    busy: AtomicBool,
}

impl GeneralChat {
    pub fn new(api: Arc<dyn DocumentApi>, registry: Arc<RwLock<DocumentRegistry>>) -> Self {
        Self {
            api,
            registry,
            classifier: Box::new(KeywordClassifier::new()),
            transcript: RwLock::new(vec![welcome()]),
            busy: AtomicBool::new(false),
        }
    }

    pub fn with_classifier(mut self, classifier: impl IntentClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.read().await.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Welcome message followed by the persisted history. A failed load keeps only the welcome.
    pub async fn load_history(&self) {
        let mut transcript = vec![welcome()];
        match self.api.get_chat_history().await {
            Ok(history) => {
                debug!(messages = history.len(), "chat history loaded");
                transcript.extend(history);
            }
            Err(e) => warn!(error = %e, "chat history unavailable"),
        }
        *self.transcript.write().await = transcript;
    }

    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }
        let Some(_busy) = BusyGuard::try_acquire(&self.busy) else {
            debug!("send rejected, request in flight");
            return SendOutcome::Busy;
        };

        self.push(ChatMessage::user(text)).await;

        let result = if self.classifier.is_document_related(text) {
            let documents = self.registry.read().await.documents().to_vec();
            if documents.is_empty() {
                info!("document question with no documents");
                self.push(ChatMessage::assistant(NO_DOCUMENTS_MESSAGE)).await;
                return SendOutcome::NoDocuments;
            }
            let prompt = build_context_prompt(&documents, text);
            debug!(documents = documents.len(), "sending document-context prompt");
            self.api
                .chat_general(&prompt, Some(text))
                .await
                .map(|answer| format!("{}{}", DOCUMENT_CONTEXT_MARKER, answer))
        } else {
            self.api.chat_general(text, None).await
        };

        match result {
            Ok(answer) => {
                self.push(ChatMessage::assistant(answer)).await;
                SendOutcome::Answered
            }
            Err(e) => {
                warn!(error = %e, "chat failed");
                self.push(ChatMessage::assistant(error_text(&e))).await;
                SendOutcome::Failed
            }
        }
    }

    /// Clears server history after confirmation. The transcript only resets if the server agrees.
    pub async fn clear(&self, confirm: &dyn Confirm) -> Result<ClearOutcome, ApiError> {
        if !confirm.confirm(CLEAR_PROMPT).await {
            return Ok(ClearOutcome::Declined);
        }
        self.api.clear_chat_history().await?;
        *self.transcript.write().await = vec![welcome()];
        info!("chat history cleared");
        Ok(ClearOutcome::Cleared)
    }

    async fn push(&self, message: ChatMessage) {
        self.transcript.write().await.push(message);
    }
}
