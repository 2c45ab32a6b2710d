use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod app;
mod chat;
mod models;
mod registry;
mod session;
mod settings;
mod storage;
mod upload;

use crate::settings::{ClientSettings, resolve_effective_settings};
use crate::storage::{LocalStore, SqliteLocalStore};

#[derive(Debug, Parser)]
#[command(name = "clouddocs")]
#[command(about = "Upload PDFs, browse their AI summaries and chat about them", long_about = None)]
struct Cli {
    /// Base URL of the document API
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// SQLite URL for local state (session id)
    #[arg(long, global = true)]
    state_db: Option<String>,
    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    yes: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List uploaded documents, newest first
    Documents {
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Upload a PDF and wait for its analysis
    Upload { path: Option<PathBuf> },
    Delete { id: String },
    Show { id: String },
    /// Server-side search
    Search { query: String },
    /// Talk to the assistant; interactive without a message
    Chat { message: Option<String> },
    /// Talk about one document; interactive without a question
    Ask { pdf_id: String, question: Option<String> },
    /// Ask a question across all documents
    AskAll { question: String },
    History {
        #[arg(long)]
        pdf: Option<String>,
        #[arg(long)]
        clear: bool,
    },
    Login {
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        password: String,
    },
    /// Print this profile's session id
    Session,
}

async fn open_store(database_url: Option<&str>) -> Option<SqliteLocalStore> {
    let url = database_url?;
    match SqliteLocalStore::initialize(url).await {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, "local state unavailable");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = ClientSettings {
        api_base_url: cli.api_url,
        database_url: cli.state_db,
        assume_yes: cli.yes.then_some(true),
        close_delay_ms: None,
    };
    let settings = resolve_effective_settings(&ClientSettings::defaults(), &ClientSettings::from_env(), &overrides);

    let store = open_store(settings.database_url.as_deref()).await;
    let session = session::resolve_session_id(store.as_ref().map(|s| s as &dyn LocalStore)).await;
    let gateway = api::HttpGateway::new(&settings.api_base_url, session)?;
    let session_id = gateway.session().clone();
    let app = app::App::new(Arc::new(gateway), settings);

    match cli.command {
        None => app.banner(),
        Some(Commands::Documents { query, page }) => app.documents(query, page).await?,
        Some(Commands::Upload { path }) => app.upload(path.as_deref()).await?,
        Some(Commands::Delete { id }) => app.delete(&id).await?,
        Some(Commands::Show { id }) => app.show(&id).await?,
        Some(Commands::Search { query }) => app.search(&query).await?,
        Some(Commands::Chat { message }) => app.chat(message).await?,
        Some(Commands::Ask { pdf_id, question }) => app.ask(&pdf_id, question).await?,
        Some(Commands::AskAll { question }) => app.ask_all(&question).await?,
        Some(Commands::History { pdf, clear }) => app.history(pdf.as_deref(), clear).await?,
        Some(Commands::Login { email, password }) => app.login(&email, &password).await?,
        Some(Commands::Session) => println!("{}", session_id),
    }
    Ok(())
}
