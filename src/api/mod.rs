use async_trait::async_trait;
use std::fmt;

use crate::models::{ChatMessage, Document, UploadFile};

pub mod http;
mod wire;

#[cfg(test)]
pub mod fake;

pub use http::HttpGateway;

/// Remote operation an [`ApiError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    Upload,
    List,
    Detail,
    Delete,
    Search,
    Chat,
    PdfChat,
    AskAll,
    History,
    ClearHistory,
    PdfHistory,
    ClearPdfHistory,
}

impl ApiOp {
    /// Message shown when the server does not provide one.
    pub fn fallback_message(self) -> &'static str {
        match self {
            ApiOp::Upload => "Upload failed",
            ApiOp::List => "Failed to fetch PDFs",
            ApiOp::Detail => "Failed to fetch PDF detail",
            ApiOp::Delete => "Failed to delete PDF",
            ApiOp::Search => "Failed to search PDFs",
            ApiOp::Chat => "Failed to chat with AI",
            ApiOp::PdfChat => "Failed to chat with PDF",
            ApiOp::AskAll => "Failed to ask all PDFs",
            ApiOp::History => "Failed to fetch chat history",
            ApiOp::ClearHistory => "Failed to clear chat history",
            ApiOp::PdfHistory => "Failed to fetch PDF chat history",
            ApiOp::ClearPdfHistory => "Failed to clear PDF chat history",
        }
    }
}

impl fmt::Display for ApiOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fallback_message())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Status { op: ApiOp, status: u16, message: String },
    #[error("{message}")]
    Rejected { op: ApiOp, message: String },
    #[error("{op}: {source}")]
    Transport {
        op: ApiOp,
        #[source]
        source: reqwest::Error,
    },
    #[error("{op}: unexpected response: {detail}")]
    Decode { op: ApiOp, detail: String },
}

impl ApiError {
    pub fn op(&self) -> ApiOp {
        match self {
            ApiError::Status { op, .. }
            | ApiError::Rejected { op, .. }
            | ApiError::Transport { op, .. }
            | ApiError::Decode { op, .. } => *op,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Every remote call the application makes goes through this trait.
///
/// Calls are single-attempt; retrying is up to the caller.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn upload_pdf(&self, file: &UploadFile) -> Result<Document, ApiError>;
    async fn list_pdfs(&self) -> Result<Vec<Document>, ApiError>;
    async fn get_pdf_detail(&self, id: &str) -> Result<Document, ApiError>;
    async fn delete_pdf(&self, file_name: &str) -> Result<(), ApiError>;
    async fn search_pdfs(&self, query: &str) -> Result<Vec<Document>, ApiError>;

    /// `message` is what the model sees; `original_message`, when given, is what history stores.
    async fn chat_general(&self, message: &str, original_message: Option<&str>) -> Result<String, ApiError>;
    async fn ask_all_pdfs(&self, question: &str) -> Result<String, ApiError>;
    async fn chat_with_pdf(&self, pdf_id: &str, question: &str) -> Result<String, ApiError>;

    async fn get_chat_history(&self) -> Result<Vec<ChatMessage>, ApiError>;
    async fn clear_chat_history(&self) -> Result<(), ApiError>;
    async fn get_pdf_chat_history(&self, pdf_id: &str) -> Result<Vec<ChatMessage>, ApiError>;
    async fn clear_pdf_chat_history(&self, pdf_id: &str) -> Result<(), ApiError>;
}
