use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const PDF_MIME: &str = "application/pdf";

/// AI-generated metadata attached to a document by the backend. Read-only on this side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub main_topics: Vec<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub original_name: String,
    /// Missing on some legacy records; those sort after every dated document.
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_size_formatted: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub analysis: Option<Analysis>,
}

impl Document {
    pub fn display_name(&self) -> &str {
        if self.original_name.is_empty() { &self.file_name } else { &self.original_name }
    }

    /// Upload time in `format`, or `-` when the server did not report one.
    pub fn uploaded_label(&self, format: &str) -> String {
        self.uploaded_at.map(|t| t.format(format).to_string()).unwrap_or_else(|| "-".into())
    }

    /// Text the registry filter matches against.
    pub fn search_haystack(&self) -> String {
        let mut parts: Vec<&str> = vec![self.display_name()];
        if let Some(a) = &self.analysis {
            parts.extend(a.title.as_deref());
            parts.extend(a.summary.as_deref());
            parts.extend(a.category.as_deref());
            parts.extend(a.keywords.iter().map(String::as_str));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One transcript entry. Accepts both `sender/text` and `role/content` wire shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "WireMessage")]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub body: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn user(body: impl Into<String>) -> Self {
        Self { speaker: Speaker::User, body: body.into(), timestamp: Some(Utc::now()) }
    }

    pub fn assistant(body: impl Into<String>) -> Self {
        Self { speaker: Speaker::Assistant, body: body.into(), timestamp: Some(Utc::now()) }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireMessage {
    Role {
        role: String,
        content: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    Sender {
        sender: String,
        text: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    Internal {
        speaker: Speaker,
        body: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc))
}

fn speaker_from_wire(tag: &str) -> Speaker {
    if tag.eq_ignore_ascii_case("user") { Speaker::User } else { Speaker::Assistant }
}

impl From<WireMessage> for ChatMessage {
    fn from(w: WireMessage) -> Self {
        match w {
            WireMessage::Role { role, content, timestamp } => Self {
                speaker: speaker_from_wire(&role),
                body: content,
                timestamp: parse_timestamp(timestamp),
            },
            WireMessage::Sender { sender, text, timestamp } => Self {
                speaker: speaker_from_wire(&sender),
                body: text,
                timestamp: parse_timestamp(timestamp),
            },
            WireMessage::Internal { speaker, body, timestamp } => Self {
                speaker,
                body,
                timestamp: parse_timestamp(timestamp),
            },
        }
    }
}

/// A local file ready to be sent as a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.pdf".into());
        let content_type = content_type_for(path).to_string();
        Ok(Self { file_name, content_type, bytes })
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type.eq_ignore_ascii_case(PDF_MIME)
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => PDF_MIME,
        Some("txt") => "text/plain",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    pub(crate) fn doc(id: &str, name: &str, day: u32) -> Document {
        Document {
            id: id.into(),
            file_name: format!("{}-{}", day, name),
            original_name: name.into(),
            uploaded_at: Some(Utc.with_ymd_and_hms(2025, 1, day, 8, 0, 0).unwrap()),
            file_size_formatted: "1.2 MB".into(),
            url: format!("https://files.example/{}", name),
            analysis: None,
        }
    }

    #[test]
    fn document_parses_camel_case_with_analysis() {
        let v = serde_json::json!({
            "id": "abc",
            "fileName": "1700-Laporan.pdf",
            "originalName": "Laporan.pdf",
            "uploadedAt": "2025-03-01T10:00:00Z",
            "fileSizeFormatted": "2 MB",
            "url": "https://s3/x",
            "analysis": {"title": "Laporan Q1", "keywords": ["keuangan"], "mainTopics": ["budget"], "pageCount": 12}
        });
        let d: Document = serde_json::from_value(v).unwrap();
        assert_eq!(d.display_name(), "Laporan.pdf");
        let a = d.analysis.as_ref().unwrap();
        assert_eq!(a.page_count, Some(12));
        assert_eq!(a.main_topics, vec!["budget".to_string()]);
        assert!(d.search_haystack().contains("keuangan"));
    }

    #[test]
    fn missing_upload_time_stays_unknown() {
        let d: Document = serde_json::from_value(serde_json::json!({"id": "x", "fileName": "x.pdf"})).unwrap();
        assert_eq!(d.uploaded_at, None);
        assert_eq!(d.uploaded_label("%Y-%m-%d"), "-");
        assert_eq!(doc("1", "a.pdf", 9).uploaded_label("%Y-%m-%d"), "2025-01-09");
    }

    #[test]
    fn display_name_falls_back_to_file_name() {
        let mut d = doc("1", "a.pdf", 1);
        d.original_name.clear();
        assert_eq!(d.display_name(), "1-a.pdf");
    }

    #[test]
    fn both_message_shapes_become_one() {
        let old: ChatMessage = serde_json::from_value(serde_json::json!({"sender": "bot", "text": "hi"})).unwrap();
        assert_eq!(old.speaker, Speaker::Assistant);
        assert_eq!(old.body, "hi");
        assert!(old.timestamp.is_none());

        let new: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "user", "content": "halo", "timestamp": "2025-03-01T10:00:00.000Z"
        })).unwrap();
        assert_eq!(new.speaker, Speaker::User);
        assert_eq!(new.body, "halo");
        assert!(new.timestamp.is_some());
    }

    #[test]
    fn internal_shape_survives_serialization() {
        let m = ChatMessage::assistant("ok");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["speaker"], "assistant");
        let back: ChatMessage = serde_json::from_value(v).unwrap();
        assert_eq!(back.body, "ok");
        assert_eq!(back.speaker, Speaker::Assistant);
    }

    #[tokio::test]
    async fn upload_file_mime_from_extension() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join("Report.PDF");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();

        let f = UploadFile::from_path(&pdf).await.unwrap();
        assert!(f.is_pdf());
        assert_eq!(f.file_name, "Report.PDF");
        assert!(!UploadFile::from_path(&txt).await.unwrap().is_pdf());
    }
}
