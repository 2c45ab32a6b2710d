//! In-memory [`DocumentApi`] for orchestrator tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::{ApiError, ApiOp, DocumentApi};
use crate::models::{ChatMessage, Document, UploadFile};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upload(String),
    List,
    Detail(String),
    Delete(String),
    Search(String),
    Chat { message: String, original: Option<String> },
    AskAll(String),
    PdfChat { pdf_id: String, question: String },
    History,
    ClearHistory,
    PdfHistory(String),
    ClearPdfHistory(String),
}

#[derive(Default)]
pub struct FakeApi {
    pub documents: Mutex<Vec<Document>>,
    pub uploaded: Mutex<Option<Document>>,
    pub chat_reply: Mutex<String>,
    pub pdf_reply: Mutex<String>,
    pub history: Mutex<Vec<ChatMessage>>,
    pub pdf_history: Mutex<HashMap<String, Vec<ChatMessage>>>,
    pub failing: Mutex<HashSet<ApiOp>>,
    pub calls: Mutex<Vec<Call>>,
    /// When set, chat and upload calls wait for a notification before answering.
    pub hold: Option<Arc<Notify>>,
}

impl FakeApi {
    pub fn new() -> Self {
        let fake = Self::default();
        *fake.chat_reply.lock().unwrap() = "ok".into();
        *fake.pdf_reply.lock().unwrap() = "ok".into();
        fake
    }

    pub fn held() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let fake = Self { hold: Some(gate.clone()), ..Self::new() };
        (fake, gate)
    }

    pub fn with_documents(docs: Vec<Document>) -> Self {
        let fake = Self::new();
        *fake.documents.lock().unwrap() = docs;
        fake
    }

    pub fn fail(&self, op: ApiOp) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, op: ApiOp, call: Call) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(&op) {
            return Err(ApiError::Status { op, status: 500, message: op.fallback_message().into() });
        }
        Ok(())
    }

    async fn gate(&self) {
        if let Some(gate) = &self.hold {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl DocumentApi for FakeApi {
    async fn upload_pdf(&self, file: &UploadFile) -> Result<Document, ApiError> {
        self.record(ApiOp::Upload, Call::Upload(file.file_name.clone()))?;
        self.gate().await;
        self.uploaded
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Decode { op: ApiOp::Upload, detail: "no upload result".into() })
    }

    async fn list_pdfs(&self) -> Result<Vec<Document>, ApiError> {
        self.record(ApiOp::List, Call::List)?;
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn get_pdf_detail(&self, id: &str) -> Result<Document, ApiError> {
        self.record(ApiOp::Detail, Call::Detail(id.into()))?;
        self.documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| ApiError::Status { op: ApiOp::Detail, status: 404, message: "not found".into() })
    }

    async fn delete_pdf(&self, file_name: &str) -> Result<(), ApiError> {
        self.record(ApiOp::Delete, Call::Delete(file_name.into()))?;
        self.documents.lock().unwrap().retain(|d| d.file_name != file_name);
        Ok(())
    }

    async fn search_pdfs(&self, query: &str) -> Result<Vec<Document>, ApiError> {
        self.record(ApiOp::Search, Call::Search(query.into()))?;
        let q = query.to_lowercase();
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.search_haystack().to_lowercase().contains(&q))
            .cloned()
            .collect())
    }

    async fn chat_general(&self, message: &str, original_message: Option<&str>) -> Result<String, ApiError> {
        let call = Call::Chat { message: message.into(), original: original_message.map(str::to_string) };
        let recorded = self.record(ApiOp::Chat, call);
        self.gate().await;
        recorded?;
        Ok(self.chat_reply.lock().unwrap().clone())
    }

    async fn ask_all_pdfs(&self, question: &str) -> Result<String, ApiError> {
        self.record(ApiOp::AskAll, Call::AskAll(question.into()))?;
        Ok(self.chat_reply.lock().unwrap().clone())
    }

    async fn chat_with_pdf(&self, pdf_id: &str, question: &str) -> Result<String, ApiError> {
        let call = Call::PdfChat { pdf_id: pdf_id.into(), question: question.into() };
        let recorded = self.record(ApiOp::PdfChat, call);
        self.gate().await;
        recorded?;
        Ok(self.pdf_reply.lock().unwrap().clone())
    }

    async fn get_chat_history(&self) -> Result<Vec<ChatMessage>, ApiError> {
        self.record(ApiOp::History, Call::History)?;
        Ok(self.history.lock().unwrap().clone())
    }

    async fn clear_chat_history(&self) -> Result<(), ApiError> {
        self.record(ApiOp::ClearHistory, Call::ClearHistory)?;
        self.history.lock().unwrap().clear();
        Ok(())
    }

    async fn get_pdf_chat_history(&self, pdf_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.record(ApiOp::PdfHistory, Call::PdfHistory(pdf_id.into()))?;
        Ok(self.pdf_history.lock().unwrap().get(pdf_id).cloned().unwrap_or_default())
    }

    async fn clear_pdf_chat_history(&self, pdf_id: &str) -> Result<(), ApiError> {
        self.record(ApiOp::ClearPdfHistory, Call::ClearPdfHistory(pdf_id.into()))?;
        self.pdf_history.lock().unwrap().remove(pdf_id);
        Ok(())
    }
}
