/// Decides whether a chat message is about the user's documents.
pub trait IntentClassifier: Send + Sync {
    fn is_document_related(&self, text: &str) -> bool;
}

impl<F> IntentClassifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_document_related(&self, text: &str) -> bool {
        self(text)
    }
}

/// Indonesian and English terms for documents, listing, searching and summarising.
pub const DOCUMENT_KEYWORDS: &[&str] = &[
    "dokumen", "document", "berkas", "file", "pdf", "laporan",
    "daftar", "list", "cari", "search", "temukan", "find",
    "ringkas", "rangkum", "summary", "summarize", "summarise",
    "kategori", "category", "topik", "topic", "kata kunci", "keyword",
    "unggah", "upload",
];

/// Substring match against a fixed keyword list, after lower-casing.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self::with_keywords(DOCUMENT_KEYWORDS.iter().copied())
    }

    pub fn with_keywords<'a>(keywords: impl IntoIterator<Item = &'a str>) -> Self {
        Self { keywords: keywords.into_iter().map(str::to_lowercase).collect() }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self { Self::new() }
}

impl IntentClassifier for KeywordClassifier {
    fn is_document_related(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}
