use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, Document};

/// The backend wraps most payloads as `{success, data, message}` but not all of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped {
        success: bool,
        data: Option<T>,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(T),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum DocumentsPayload {
    List(Vec<Document>),
    Keyed {
        #[serde(alias = "pdfs", alias = "files", alias = "results")]
        documents: Vec<Document>,
    },
}

impl DocumentsPayload {
    pub(crate) fn into_vec(self) -> Vec<Document> {
        match self {
            DocumentsPayload::List(v) | DocumentsPayload::Keyed { documents: v } => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum HistoryPayload {
    Keyed {
        #[serde(alias = "history")]
        messages: Vec<ChatMessage>,
    },
    List(Vec<ChatMessage>),
}

impl HistoryPayload {
    pub(crate) fn into_vec(self) -> Vec<ChatMessage> {
        match self {
            HistoryPayload::Keyed { messages: v } | HistoryPayload::List(v) => v,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeneralChatRequest<'a> {
    pub message: &'a str,
    pub session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_message: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionRequest<'a> {
    pub question: &'a str,
    pub session_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeneralChatReply {
    #[serde(alias = "reply", alias = "answer")]
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PdfChatReply {
    #[serde(default, alias = "response")]
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AskAllReply {
    #[serde(alias = "response", alias = "reply")]
    pub answer: String,
}

/// Pulls a human-readable message out of an error body, if there is one.
pub(crate) fn server_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|k| v.get(*k).and_then(|m| m.as_str()))
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}
