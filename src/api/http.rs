use async_trait::async_trait;
use reqwest::{Client, Response, multipart};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::wire::{
    AskAllReply, DocumentsPayload, Envelope, GeneralChatReply, GeneralChatRequest, HistoryPayload,
    PdfChatReply, QuestionRequest, server_message,
};
use super::{ApiError, ApiOp, DocumentApi};
use crate::models::{ChatMessage, Document, UploadFile};
use crate::session::SessionId;

/// reqwest-backed [`DocumentApi`]. The session id is fixed at construction.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: Url,
    client: Client,
    session: SessionId,
}

impl HttpGateway {
    pub fn new(base_url: &str, session: SessionId) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("invalid API base url: {}", base_url);
        }
        Ok(Self { base_url, client: Client::new(), session })
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn session_history_url(&self) -> Url {
        let mut url = self.endpoint(&["api", "ai", "history"]);
        url.query_pairs_mut().append_pair("sessionId", self.session.as_str());
        url
    }
}

fn transport(op: ApiOp) -> impl FnOnce(reqwest::Error) -> ApiError {
    move |source| {
        warn!(%op, error = %source, "request failed");
        ApiError::Transport { op, source }
    }
}

async fn status_error(op: ApiOp, resp: Response) -> ApiError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = server_message(&body).unwrap_or_else(|| op.fallback_message().to_string());
    warn!(%op, status, %message, "server returned an error");
    ApiError::Status { op, status, message }
}

async fn read_data<T: DeserializeOwned>(op: ApiOp, resp: Response) -> Result<T, ApiError> {
    if !resp.status().is_success() {
        return Err(status_error(op, resp).await);
    }
    let bytes = resp.bytes().await.map_err(transport(op))?;
    let envelope: Envelope<T> = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::Decode { op, detail: e.to_string() })?;
    match envelope {
        Envelope::Bare(data) | Envelope::Wrapped { success: true, data: Some(data), .. } => Ok(data),
        Envelope::Wrapped { success: true, data: None, .. } => {
            Err(ApiError::Decode { op, detail: "missing data".into() })
        }
        Envelope::Wrapped { success: false, message, .. } => Err(ApiError::Rejected {
            op,
            message: message.unwrap_or_else(|| op.fallback_message().to_string()),
        }),
    }
}

/// For endpoints whose body carries nothing beyond an acknowledgement.
async fn expect_ok(op: ApiOp, resp: Response) -> Result<(), ApiError> {
    if !resp.status().is_success() {
        return Err(status_error(op, resp).await);
    }
    let body = resp.text().await.map_err(transport(op))?;
    let v: Option<serde_json::Value> = serde_json::from_str(&body).ok();
    if let Some(false) = v.as_ref().and_then(|v| v.get("success")).and_then(|s| s.as_bool()) {
        let message = server_message(&body).unwrap_or_else(|| op.fallback_message().to_string());
        return Err(ApiError::Rejected { op, message });
    }
    Ok(())
}

#[async_trait]
impl DocumentApi for HttpGateway {
    async fn upload_pdf(&self, file: &UploadFile) -> Result<Document, ApiError> {
        let op = ApiOp::Upload;
        debug!(file = %file.file_name, bytes = file.bytes.len(), "uploading pdf");
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(transport(op))?;
        let form = multipart::Form::new().part("pdf", part);
        let resp = self
            .client
            .post(self.endpoint(&["api", "pdf", "upload"]))
            .multipart(form)
            .send()
            .await
            .map_err(transport(op))?;
        read_data(op, resp).await
    }

    async fn list_pdfs(&self) -> Result<Vec<Document>, ApiError> {
        let op = ApiOp::List;
        let resp = self
            .client
            .get(self.endpoint(&["api", "pdf", "list"]))
            .send()
            .await
            .map_err(transport(op))?;
        let docs = read_data::<DocumentsPayload>(op, resp).await?.into_vec();
        debug!(count = docs.len(), "listed pdfs");
        Ok(docs)
    }

    async fn get_pdf_detail(&self, id: &str) -> Result<Document, ApiError> {
        let op = ApiOp::Detail;
        let resp = self
            .client
            .get(self.endpoint(&["api", "pdf", "detail", id]))
            .send()
            .await
            .map_err(transport(op))?;
        read_data(op, resp).await
    }

    async fn delete_pdf(&self, file_name: &str) -> Result<(), ApiError> {
        let op = ApiOp::Delete;
        debug!(file_name, "deleting pdf");
        let resp = self
            .client
            .delete(self.endpoint(&["api", "pdf", "delete", file_name]))
            .send()
            .await
            .map_err(transport(op))?;
        expect_ok(op, resp).await
    }

    async fn search_pdfs(&self, query: &str) -> Result<Vec<Document>, ApiError> {
        let op = ApiOp::Search;
        let mut url = self.endpoint(&["api", "pdf", "search"]);
        url.query_pairs_mut().append_pair("q", query);
        let resp = self.client.get(url).send().await.map_err(transport(op))?;
        Ok(read_data::<DocumentsPayload>(op, resp).await?.into_vec())
    }

    async fn chat_general(&self, message: &str, original_message: Option<&str>) -> Result<String, ApiError> {
        let op = ApiOp::Chat;
        let body = GeneralChatRequest {
            message,
            session_id: self.session.as_str(),
            original_message: original_message.filter(|m| !m.is_empty()),
        };
        debug!(prompt_len = message.len(), augmented = body.original_message.is_some(), "general chat");
        let resp = self
            .client
            .post(self.endpoint(&["api", "ai", "chat"]))
            .json(&body)
            .send()
            .await
            .map_err(transport(op))?;
        Ok(read_data::<GeneralChatReply>(op, resp).await?.response)
    }

    async fn ask_all_pdfs(&self, question: &str) -> Result<String, ApiError> {
        let op = ApiOp::AskAll;
        let body = QuestionRequest { question, session_id: self.session.as_str() };
        let resp = self
            .client
            .post(self.endpoint(&["api", "ai", "ask-all"]))
            .json(&body)
            .send()
            .await
            .map_err(transport(op))?;
        Ok(read_data::<AskAllReply>(op, resp).await?.answer)
    }

    async fn chat_with_pdf(&self, pdf_id: &str, question: &str) -> Result<String, ApiError> {
        let op = ApiOp::PdfChat;
        let body = QuestionRequest { question, session_id: self.session.as_str() };
        debug!(pdf_id, "pdf chat");
        let resp = self
            .client
            .post(self.endpoint(&["api", "pdf", "chat", pdf_id]))
            .json(&body)
            .send()
            .await
            .map_err(transport(op))?;
        Ok(read_data::<PdfChatReply>(op, resp).await?.reply)
    }

    async fn get_chat_history(&self) -> Result<Vec<ChatMessage>, ApiError> {
        let op = ApiOp::History;
        let resp = self.client.get(self.session_history_url()).send().await.map_err(transport(op))?;
        Ok(read_data::<HistoryPayload>(op, resp).await?.into_vec())
    }

    async fn clear_chat_history(&self) -> Result<(), ApiError> {
        let op = ApiOp::ClearHistory;
        let resp = self.client.delete(self.session_history_url()).send().await.map_err(transport(op))?;
        expect_ok(op, resp).await
    }

    async fn get_pdf_chat_history(&self, pdf_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let op = ApiOp::PdfHistory;
        let resp = self
            .client
            .get(self.endpoint(&["api", "pdf", "history", pdf_id]))
            .send()
            .await
            .map_err(transport(op))?;
        Ok(read_data::<HistoryPayload>(op, resp).await?.into_vec())
    }

    async fn clear_pdf_chat_history(&self, pdf_id: &str) -> Result<(), ApiError> {
        let op = ApiOp::ClearPdfHistory;
        let resp = self
            .client
            .delete(self.endpoint(&["api", "pdf", "history", pdf_id]))
            .send()
            .await
            .map_err(transport(op))?;
        expect_ok(op, resp).await
    }
}
