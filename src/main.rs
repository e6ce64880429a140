mod cli;
mod config;
mod conversation_state;
mod gemini_client;
mod router;
mod store;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::context::StoreContext;
use crate::cli::chat::{ChatContext, Services};
use crate::config::{AppConfig, Backend};
use crate::gemini_client::GeminiClient;
use crate::router::{ProductReplyMode, Router};
use crate::store::firestore::FirestoreStore;
use crate::store::local::LocalStore;
use crate::store::{PersistenceSink, ProductCatalog};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Message to send instead of starting an interactive chat
    #[arg(short, long)]
    input: Option<String>,

    /// How to answer messages that name a catalog product (catalog or model)
    #[arg(long)]
    product_reply: Option<ProductReplyMode>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat {
        /// Message to send instead of starting an interactive chat
        #[arg(short, long)]
        input: Option<String>,

        /// How to answer messages that name a catalog product (catalog or model)
        #[arg(long)]
        product_reply: Option<ProductReplyMode>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    // Default to chat if no subcommand is provided
    let (input, product_reply, verbose) = match cli.command {
        Some(Commands::Chat { input, product_reply, verbose }) => (input, product_reply, verbose),
        None => (cli.input, cli.product_reply, cli.verbose),
    };

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config = AppConfig::from_env()?;
    let store_context = StoreContext::new(config.store_name.clone());

    info!("Starting {}", store_context.bot_name());

    let generator = match GeminiClient::new(&config.gemini, store_context.system_instruction()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to initialize Gemini client: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let (catalog, sink) = match config.backend {
        Backend::Firestore(firestore) => {
            info!("Using Firestore project {}", firestore.project_id);
            let store = Arc::new(FirestoreStore::new(firestore)?);
            (store.clone() as Arc<dyn ProductCatalog>, store as Arc<dyn PersistenceSink>)
        }
        Backend::Local { catalog_path, data_dir } => {
            info!(
                "Using local catalog {} and data directory {}",
                catalog_path.display(),
                data_dir.display()
            );
            let store = Arc::new(LocalStore::new(catalog_path, data_dir));
            (store.clone() as Arc<dyn ProductCatalog>, store as Arc<dyn PersistenceSink>)
        }
    };

    let router = Router::new(product_reply.unwrap_or(config.product_reply));
    let interactive = input.is_none();

    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        input,
        interactive,
        store_context,
        router,
        Services {
            generator: Arc::new(generator),
            catalog,
            sink,
        },
    );
    chat_context.run().await
}
