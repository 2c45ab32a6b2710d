use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::{ApiError, DocumentApi};
use crate::chat::{ClearOutcome, Confirm, DocumentChat, GeneralChat, SendOutcome};
use crate::models::{ChatMessage, Document, Speaker, UploadFile};
use crate::registry::DocumentRegistry;
use crate::settings::EffectiveSettings;
use crate::upload::{UploadCoordinator, UploadPhase};

/// Everything a command needs, resolved once at startup.
pub struct App {
    api: Arc<dyn DocumentApi>,
    registry: Arc<RwLock<DocumentRegistry>>,
    settings: EffectiveSettings,
    confirm: StdinConfirm,
}

impl App {
    pub fn new(api: Arc<dyn DocumentApi>, settings: EffectiveSettings) -> Self {
        let confirm = StdinConfirm { assume_yes: settings.assume_yes };
        Self { api, registry: Arc::new(RwLock::new(DocumentRegistry::new())), settings, confirm }
    }

    pub fn banner(&self) {
        println!("☁️  CloudDocs ChatAI");
        println!("Kelola dokumen Anda dan berinteraksi dengan AI.");
        println!("API: {}", self.settings.api_base_url);
        println!();
        println!("Mulai dengan `clouddocs documents`, `clouddocs upload <file.pdf>` atau `clouddocs chat`.");
    }

    pub async fn documents(&self, query: Option<String>, page: usize) -> anyhow::Result<()> {
        let mut registry = self.registry.write().await;
        registry.refresh(self.api.as_ref()).await?;
        registry.set_query(query.unwrap_or_default());
        registry.go_to_page(page);
        let current = registry.current_page();
        if current.items.is_empty() {
            println!("No documents uploaded yet.");
            return Ok(());
        }
        for (i, doc) in current.items.iter().enumerate() {
            print_row(current.start_index + i + 1, doc);
        }
        if current.total_pages > 1 {
            println!("\nPage {} of {}", current.page, current.total_pages);
        }
        Ok(())
    }

    pub async fn upload(&self, path: Option<&Path>) -> anyhow::Result<()> {
        let file = match path {
            Some(p) => Some(UploadFile::from_path(p).await?),
            None => None,
        };
        let coordinator = UploadCoordinator::new(
            self.api.clone(),
            self.registry.clone(),
            Duration::from_millis(self.settings.close_delay_ms),
        );
        coordinator.open_dialog();

        let mut progress = coordinator.subscribe();
        let printer = tokio::spawn(async move { report_progress(&mut progress, |text| eprintln!("{}", text)).await });

        let result = coordinator.submit(file).await;
        drop(coordinator);
        if let Err(e) = printer.await {
            warn!(error = %e, "progress printer stopped abnormally");
        }

        let doc = result?;
        print_detail(&doc);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let mut registry = self.registry.write().await;
        registry.refresh(self.api.as_ref()).await?;
        let removed = registry.remove(self.api.as_ref(), id).await?;
        println!("Deleted {}", removed.display_name());
        Ok(())
    }

    pub async fn show(&self, id: &str) -> anyhow::Result<()> {
        let doc = self.api.get_pdf_detail(id).await?;
        print_detail(&doc);
        Ok(())
    }

    pub async fn search(&self, query: &str) -> anyhow::Result<()> {
        let found = self.api.search_pdfs(query).await?;
        if found.is_empty() {
            println!("No documents match \"{}\".", query);
        }
        for (i, doc) in found.iter().enumerate() {
            print_row(i + 1, doc);
        }
        Ok(())
    }

    pub async fn chat(&self, message: Option<String>) -> anyhow::Result<()> {
        if let Err(e) = self.registry.write().await.refresh(self.api.as_ref()).await {
            warn!(error = %e, "document list unavailable, continuing without it");
        }
        let chat = GeneralChat::new(self.api.clone(), self.registry.clone());
        chat.load_history().await;
        run_conversation(&chat, message, &self.confirm).await
    }

    pub async fn ask(&self, pdf_id: &str, question: Option<String>) -> anyhow::Result<()> {
        let chat = DocumentChat::new(self.api.clone());
        chat.open(pdf_id).await;
        if question.is_none() {
            match self.api.get_pdf_detail(pdf_id).await {
                Ok(doc) => {
                    println!("Tanya Diko tentang dokumen ini: {}", doc.display_name());
                    if let Some(category) = doc.analysis.as_ref().and_then(|a| a.category.as_deref()) {
                        println!("[{}]", category);
                    }
                    if chat.transcript().await.is_empty() {
                        if let Some(summary) = doc.analysis.as_ref().and_then(|a| a.summary.as_deref()) {
                            println!("{}", summary);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "document detail unavailable"),
            }
        }
        run_conversation(&chat, question, &self.confirm).await
    }

    pub async fn ask_all(&self, question: &str) -> anyhow::Result<()> {
        let answer = self.api.ask_all_pdfs(question).await?;
        println!("{}", answer);
        Ok(())
    }

    pub async fn history(&self, pdf_id: Option<&str>, clear: bool) -> anyhow::Result<()> {
        if clear {
            if !self.confirm.confirm("Hapus riwayat chat?").await {
                return Ok(());
            }
            match pdf_id {
                Some(id) => self.api.clear_pdf_chat_history(id).await?,
                None => self.api.clear_chat_history().await?,
            }
            println!("History cleared.");
            return Ok(());
        }
        let messages = match pdf_id {
            Some(id) => self.api.get_pdf_chat_history(id).await?,
            None => self.api.get_chat_history().await?,
        };
        print_messages(&messages);
        Ok(())
    }

    /// Accepts any non-empty credentials and shows the document list. Nothing is verified.
    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<()> {
        if email.trim().is_empty() || password.is_empty() {
            anyhow::bail!("Email dan password wajib diisi");
        }
        info!(email = email.trim(), "local login, redirecting to documents");
        self.documents(None, 1).await
    }
}

/// Emits the text of each upload phase until the coordinator goes away.
async fn report_progress(progress: &mut broadcast::Receiver<UploadPhase>, mut emit: impl FnMut(&str)) {
    loop {
        match progress.recv().await {
            Ok(phase) => {
                if let Some(text) = phase.progress_text() {
                    emit(text);
                }
            }
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "progress updates skipped"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_row(number: usize, doc: &Document) {
    let category = doc.analysis.as_ref().and_then(|a| a.category.as_deref()).unwrap_or("-");
    println!(
        "{:>3}. {}  [{}]  {}  {}  id={}",
        number,
        doc.display_name(),
        category,
        doc.uploaded_label("%Y-%m-%d"),
        doc.file_size_formatted,
        doc.id
    );
}

fn print_detail(doc: &Document) {
    println!("{} ({})", doc.display_name(), doc.id);
    println!("  uploaded: {}  size: {}", doc.uploaded_label("%Y-%m-%d %H:%M"), doc.file_size_formatted);
    if !doc.url.is_empty() {
        println!("  url: {}", doc.url);
    }
    let Some(a) = &doc.analysis else { return };
    if let Some(title) = &a.title {
        println!("  title: {}", title);
    }
    if let Some(category) = &a.category {
        println!("  category: {}", category);
    }
    if let Some(pages) = a.page_count {
        println!("  pages: {}", pages);
    }
    if !a.keywords.is_empty() {
        println!("  keywords: {}", a.keywords.join(", "));
    }
    if !a.main_topics.is_empty() {
        println!("  topics: {}", a.main_topics.join(", "));
    }
    if let Some(summary) = &a.summary {
        println!("\n{}", summary);
    }
}

fn print_messages(messages: &[ChatMessage]) {
    for m in messages {
        let who = match m.speaker {
            Speaker::User => "you",
            Speaker::Assistant => "bot",
        };
        match m.timestamp {
            Some(ts) => println!("[{}] {}> {}", ts.format("%H:%M"), who, m.body),
            None => println!("{}> {}", who, m.body),
        }
    }
}

/// The parts of a chat orchestrator the terminal loop drives.
#[async_trait]
trait Conversation: Send + Sync {
    async fn send(&self, text: &str) -> SendOutcome;
    async fn clear(&self, confirm: &dyn Confirm) -> Result<ClearOutcome, ApiError>;
    async fn transcript(&self) -> Vec<ChatMessage>;
}

#[async_trait]
impl Conversation for GeneralChat {
    async fn send(&self, text: &str) -> SendOutcome { GeneralChat::send(self, text).await }
    async fn clear(&self, confirm: &dyn Confirm) -> Result<ClearOutcome, ApiError> { GeneralChat::clear(self, confirm).await }
    async fn transcript(&self) -> Vec<ChatMessage> { GeneralChat::transcript(self).await }
}

#[async_trait]
impl Conversation for DocumentChat {
    async fn send(&self, text: &str) -> SendOutcome { DocumentChat::send(self, text).await }
    async fn clear(&self, confirm: &dyn Confirm) -> Result<ClearOutcome, ApiError> { DocumentChat::clear(self, confirm).await }
    async fn transcript(&self) -> Vec<ChatMessage> { DocumentChat::transcript(self).await }
}

async fn send_and_print(chat: &dyn Conversation, text: &str) {
    let before = chat.transcript().await.len();
    let outcome = chat.send(text).await;
    if outcome == SendOutcome::NoActiveDocument {
        eprintln!("No document is open.");
    }
    let transcript = chat.transcript().await;
    print_messages(transcript.get(before..).unwrap_or_default());
}

async fn run_conversation(chat: &dyn Conversation, first: Option<String>, confirm: &dyn Confirm) -> anyhow::Result<()> {
    if let Some(text) = first {
        send_and_print(chat, &text).await;
        return Ok(());
    }
    print_messages(&chat.transcript().await);
    eprintln!("(/clear to clear history, /quit to leave)");
    while let Some(line) = read_line("> ").await? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => match chat.clear(confirm).await {
                Ok(ClearOutcome::Cleared) => print_messages(&chat.transcript().await),
                Ok(_) => {}
                Err(e) => eprintln!("❌ Error: {}", e),
            },
            text => send_and_print(chat, text).await,
        }
    }
    Ok(())
}

/// Reads one line from stdin off the async runtime. `None` at end of input.
async fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    use std::io::Write;
    eprint!("{}", prompt);
    std::io::stderr().flush()?;
    let line = tokio::task::spawn_blocking(|| {
        let mut buf = String::new();
        std::io::stdin().read_line(&mut buf).map(|n| (n > 0).then_some(buf))
    })
    .await??;
    Ok(line.map(|l| l.trim_end_matches(['\r', '\n']).to_string()))
}

struct StdinConfirm {
    assume_yes: bool,
}

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        match read_line(&format!("{} [y/N] ", prompt)).await {
            Ok(Some(answer)) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "ya"),
            _ => false,
        }
    }
}
