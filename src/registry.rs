use tracing::{debug, info};

use crate::api::{ApiError, DocumentApi};
use crate::models::Document;

pub const PAGE_SIZE: usize = 5;

/// One page of a (filtered) document list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, already clamped.
    pub page: usize,
    pub total_pages: usize,
    /// Offset of `items[0]` in the full list, for continuous row numbering.
    pub start_index: usize,
}

/// Slices `items` into the requested page, clamping `page` into `[1, total_pages]`.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));
    let start_index = (page - 1) * page_size;
    let end = (start_index + page_size).min(items.len());
    Page { items: items[start_index.min(end)..end].to_vec(), page, total_pages, start_index }
}

/// Case-insensitive substring filter over name, title, summary, category and keywords.
pub fn filter<'a>(docs: &'a [Document], query: &str) -> Vec<&'a Document> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return docs.iter().collect();
    }
    docs.iter().filter(|d| d.search_haystack().to_lowercase().contains(&needle)).collect()
}

/// Local mirror of the server's document list.
///
/// Mutations are optimistic and only reconciled by the next [`DocumentRegistry::refresh`].
#[derive(Debug, Clone)]
pub struct DocumentRegistry {
    documents: Vec<Document>,
    query: String,
    active_page: usize,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self { documents: Vec::new(), query: String::new(), active_page: 1 }
    }

    pub fn from_documents(mut documents: Vec<Document>) -> Self {
        sort_newest_first(&mut documents);
        Self { documents, query: String::new(), active_page: 1 }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn active_page(&self) -> usize {
        self.active_page
    }

    /// Replaces the cache with the server's list, newest upload first.
    pub async fn refresh(&mut self, api: &dyn DocumentApi) -> Result<(), ApiError> {
        let mut documents = api.list_pdfs().await?;
        sort_newest_first(&mut documents);
        debug!(count = documents.len(), "document registry refreshed");
        self.documents = documents;
        self.active_page = self.active_page().min(self.total_pages().max(1));
        Ok(())
    }

    /// Changing the query jumps back to the first page.
    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query != self.query {
            self.query = query;
            self.active_page = 1;
        }
    }

    pub fn filtered(&self) -> Vec<&Document> {
        filter(&self.documents, &self.query)
    }

    pub fn total_pages(&self) -> usize {
        self.filtered().len().div_ceil(PAGE_SIZE)
    }

    /// Moves to `page`, clamped to the available range. Returns the page actually selected.
    pub fn go_to_page(&mut self, page: usize) -> usize {
        self.active_page = page.clamp(1, self.total_pages().max(1));
        self.active_page
    }

    /// The active page of the filtered list.
    pub fn current_page(&self) -> Page<&Document> {
        paginate(&self.filtered(), self.active_page, PAGE_SIZE)
    }

    /// Deletes on the server first; the cache only changes if that succeeds.
    pub async fn remove(&mut self, api: &dyn DocumentApi, id: &str) -> Result<Document, RemoveError> {
        let file_name = self.get(id).ok_or_else(|| RemoveError::Unknown(id.to_string()))?.file_name.clone();
        api.delete_pdf(&file_name).await?;
        let pos = self.documents.iter().position(|d| d.id == id).ok_or_else(|| RemoveError::Unknown(id.to_string()))?;
        let removed = self.documents.remove(pos);
        self.active_page = self.active_page().min(self.total_pages().max(1));
        info!(id, file_name = %removed.file_name, "document removed");
        Ok(removed)
    }

    /// Prepends a freshly uploaded document and shows the first page.
    pub fn add(&mut self, doc: Document) {
        debug!(id = %doc.id, "document added");
        self.documents.insert(0, doc);
        self.active_page = 1;
    }
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Undated documents go last; `None` orders below every `Some`.
fn sort_newest_first(documents: &mut [Document]) {
    documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
}

#[derive(Debug, thiserror::Error)]
pub enum RemoveError {
    #[error("document {0} is not in the list")]
    Unknown(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiOp;
    use crate::api::fake::{Call, FakeApi};
    use crate::models::Analysis;
    use crate::models::tests::doc;

    fn numbered(n: usize) -> Vec<Document> {
        (1..=n).map(|i| doc(&i.to_string(), &format!("doc{}.pdf", i), i as u32)).collect()
    }

    #[test]
    fn empty_query_returns_everything() {
        let docs = numbered(4);
        assert_eq!(filter(&docs, "").len(), 4);
        assert_eq!(filter(&docs, "   ").len(), 4);
    }

    #[test]
    fn filter_matches_analysis_fields_case_insensitively() {
        let mut docs = numbered(3);
        docs[1].analysis = Some(Analysis {
            title: Some("Rencana Anggaran".into()),
            category: Some("Keuangan".into()),
            keywords: vec!["APBDes".into(), "dana desa".into()],
            ..Default::default()
        });
        let by_kw = filter(&docs, "apbdes");
        assert_eq!(by_kw.len(), 1);
        assert_eq!(by_kw[0].id, "2");
        assert_eq!(filter(&docs, "KEUANGAN").len(), 1);
        assert_eq!(filter(&docs, "DOC3").len(), 1);
        assert!(filter(&docs, "nothing-like-this").is_empty());
        for d in filter(&docs, "doc") {
            assert!(docs.contains(d));
        }
    }

    #[test]
    fn paginate_sizes_and_clamps() {
        let items: Vec<u32> = (0..12).collect();
        let p = paginate(&items, 1, PAGE_SIZE);
        assert_eq!(p.items, &[0, 1, 2, 3, 4]);
        assert_eq!(p.total_pages, 3);

        let last = paginate(&items, 3, PAGE_SIZE);
        assert_eq!(last.items, &[10, 11]);
        assert_eq!(last.start_index, 10);

        let beyond = paginate(&items, 99, PAGE_SIZE);
        assert_eq!(beyond.page, 3);
        assert_eq!(beyond.items, &[10, 11]);

        let below = paginate(&items, 0, PAGE_SIZE);
        assert_eq!(below.page, 1);
        assert_eq!(below.items.len(), 5);
    }

    #[test]
    fn paginate_totals_follow_ceil() {
        for n in 0..23usize {
            let items: Vec<usize> = (0..n).collect();
            for page in 0..8 {
                let p = paginate(&items, page, PAGE_SIZE);
                assert!(p.items.len() <= PAGE_SIZE);
                assert_eq!(p.total_pages, (n + PAGE_SIZE - 1) / PAGE_SIZE);
                if n > 0 {
                    assert!(!p.items.is_empty());
                }
            }
        }
    }

    #[test]
    fn paginate_empty_list_is_page_one() {
        let items: Vec<u8> = Vec::new();
        let p = paginate(&items, 4, PAGE_SIZE);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert!(p.items.is_empty());
    }

    #[tokio::test]
    async fn refresh_sorts_newest_first() {
        let api = FakeApi::with_documents(vec![doc("a", "a.pdf", 3), doc("b", "b.pdf", 9), doc("c", "c.pdf", 1)]);
        let mut reg = DocumentRegistry::new();
        reg.refresh(&api).await.unwrap();
        let ids: Vec<&str> = reg.documents().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn undated_documents_sort_last() {
        let mut undated = doc("u", "u.pdf", 1);
        undated.uploaded_at = None;
        let api = FakeApi::with_documents(vec![undated, doc("a", "a.pdf", 3), doc("b", "b.pdf", 9)]);
        let mut reg = DocumentRegistry::new();
        reg.refresh(&api).await.unwrap();
        let ids: Vec<&str> = reg.documents().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "u"]);
    }

    #[tokio::test]
    async fn refresh_failure_keeps_cache() {
        let api = FakeApi::with_documents(vec![doc("a", "a.pdf", 3)]);
        let mut reg = DocumentRegistry::from_documents(vec![doc("z", "z.pdf", 1)]);
        api.fail(ApiOp::List);
        assert!(reg.refresh(&api).await.is_err());
        assert_eq!(reg.documents()[0].id, "z");
    }

    #[test]
    fn add_prepends_and_resets_page() {
        let mut reg = DocumentRegistry::from_documents(numbered(12));
        reg.go_to_page(3);
        assert_eq!(reg.active_page(), 3);
        reg.add(doc("new", "Baru.pdf", 28));
        assert_eq!(reg.documents()[0].id, "new");
        assert_eq!(reg.active_page(), 1);
        let page = reg.current_page();
        assert_eq!(page.page, 1);
        assert_eq!(page.items[0].id, "new");
    }

    #[test]
    fn default_registry_starts_on_page_one() {
        let reg = DocumentRegistry::default();
        assert_eq!(reg.active_page(), 1);
        let page = reg.current_page();
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn current_page_continues_numbering() {
        let mut reg = DocumentRegistry::from_documents(numbered(7));
        reg.go_to_page(2);
        let page = reg.current_page();
        assert_eq!(page.start_index, PAGE_SIZE);
        // newest first: days 7..1, so page two holds days 2 and 1
        let ids: Vec<&str> = page.items.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn query_change_resets_page_and_pages_clamp() {
        let mut reg = DocumentRegistry::from_documents(numbered(11));
        assert_eq!(reg.go_to_page(7), 3);
        reg.set_query("doc1");
        assert_eq!(reg.active_page(), 1);
        // doc1, doc10, doc11
        let page = reg.current_page();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.start_index, 0);
    }

    #[tokio::test]
    async fn remove_deletes_by_file_name() {
        let api = FakeApi::with_documents(numbered(2));
        let mut reg = DocumentRegistry::from_documents(numbered(2));
        let removed = reg.remove(&api, "1").await.unwrap();
        assert_eq!(removed.id, "1");
        assert!(reg.get("1").is_none());
        assert_eq!(api.calls(), vec![Call::Delete("1-doc1.pdf".into())]);
    }

    #[tokio::test]
    async fn failed_remove_leaves_registry_unchanged() {
        let api = FakeApi::with_documents(numbered(3));
        api.fail(ApiOp::Delete);
        let mut reg = DocumentRegistry::from_documents(numbered(3));
        let before = reg.documents().to_vec();
        let err = reg.remove(&api, "2").await.unwrap_err();
        assert!(matches!(err, RemoveError::Api(_)));
        assert_eq!(reg.documents(), before.as_slice());
        assert_eq!(reg.get("2"), before.iter().find(|d| d.id == "2"));
    }

    #[tokio::test]
    async fn remove_unknown_id_makes_no_call() {
        let api = FakeApi::new();
        let mut reg = DocumentRegistry::from_documents(numbered(1));
        assert!(matches!(reg.remove(&api, "nope").await, Err(RemoveError::Unknown(_))));
        assert!(api.calls().is_empty());
    }
}
