//! # linkrag CLI
//!
//! ## Usage
//!
//! ```bash
//! linkrag --config ./config/linkrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `linkrag init` | Write a starter payload JSON file |
//! | `linkrag pack <dir>` | Pack a directory of text files into a share link |
//! | `linkrag encode <source>` | Print the share link for a payload |
//! | `linkrag decode <source>` | Print a payload as JSON |
//! | `linkrag digest <source>` | Print a payload's content digest |
//! | `linkrag search <source> "<query>"` | Rank chunks for a query |
//! | `linkrag context <source> "<query>"` | Print the grounding context block |
//! | `linkrag ask <source> "<question>"` | Ask a chat provider, grounded in the payload |
//! | `linkrag models` | List chat models for a provider |
//! | `linkrag sessions <source>` | List stored conversations for a payload |
//! | `linkrag serve` | Start the HTTP API |
//!
//! A `<source>` is a share link, a `#r=` fragment, a bare token, or a path
//! to a payload JSON file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use linkrag::ask::{self, AskOptions};
use linkrag::config;
use linkrag::pack::{self, PackOptions};
use linkrag::providers::ProviderName;
use linkrag::{search, server, share};
use linkrag_core::context::MAX_CONTEXT_CHARS;
use linkrag_core::models::RetrievalConfig;
use linkrag_core::payload;

#[derive(Parser)]
#[command(
    name = "linkrag",
    about = "linkrag: shareable lexical RAG over documents packed into a URL",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Optional; defaults apply when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./config/linkrag.toml")]
    config: PathBuf,

    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the starter payload as JSON.
    Init {
        /// Output file.
        #[arg(default_value = "payload.json")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Pack a directory of text files into a share link.
    Pack {
        /// Directory to walk.
        dir: PathBuf,

        /// Include glob (repeatable). Defaults to `**/*.md` and `**/*.txt`.
        #[arg(long = "include")]
        include: Vec<String>,

        /// Exclude glob (repeatable), in addition to `.git`, `target` and
        /// `node_modules`.
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Follow symbolic links while walking.
        #[arg(long)]
        follow_symlinks: bool,

        /// Payload title.
        #[arg(long)]
        title: Option<String>,

        /// System prompt carried in the payload.
        #[arg(long)]
        system_prompt: Option<String>,

        /// Results per query (1-12).
        #[arg(long)]
        top_k: Option<usize>,

        /// Chunk window in characters (200-4000).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Chunk overlap in characters (at most half the chunk size).
        #[arg(long)]
        overlap: Option<usize>,

        /// Print the payload JSON instead of the share link.
        #[arg(long)]
        json: bool,

        /// Base URL for the printed link (overrides `[share].base_url`).
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Print the share link for a payload source.
    Encode {
        source: String,

        /// Base URL for the printed link (overrides `[share].base_url`).
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Decode a payload source and print it as JSON.
    Decode {
        source: String,

        /// Single-line canonical JSON instead of pretty output.
        #[arg(long)]
        compact: bool,
    },

    /// Print the content digest of a payload source.
    Digest { source: String },

    /// Rank chunks of a payload for a query.
    Search {
        source: String,
        query: String,

        /// Override the payload's topK (clamped to 1-12).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the grounding context block for a query.
    Context {
        source: String,
        query: String,

        /// Context budget in characters.
        #[arg(long, default_value_t = MAX_CONTEXT_CHARS)]
        max_chars: usize,
    },

    /// Ask a chat provider a question grounded in a payload.
    Ask {
        source: String,
        question: String,

        /// Continue a specific session.
        #[arg(long)]
        session: Option<String>,

        /// Start a new session instead of continuing the latest.
        #[arg(long = "new")]
        new_session: bool,

        /// Provider override: openai, anthropic, or gemini.
        #[arg(long)]
        provider: Option<ProviderName>,

        /// Model override.
        #[arg(long)]
        model: Option<String>,

        /// Print the cited chunks after the answer.
        #[arg(long)]
        sources: bool,
    },

    /// List chat-capable models for a provider.
    Models {
        #[arg(long)]
        provider: Option<ProviderName>,
    },

    /// List stored conversations for a payload.
    Sessions { source: String },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "linkrag=debug,linkrag_core=debug,tower_http=debug"
    } else {
        "linkrag=info,linkrag_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, shutting down");
            child.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config_or_minimal(&cli.config)?;

    match cli.command {
        Commands::Init { output, force } => {
            share::run_init(&output, force)?;
        }
        Commands::Pack {
            dir,
            include,
            exclude,
            follow_symlinks,
            title,
            system_prompt,
            top_k,
            chunk_size,
            overlap,
            json,
            base_url,
        } => {
            let mut options = PackOptions::new(dir);
            if !include.is_empty() {
                options.include_globs = include;
            }
            options.exclude_globs = exclude;
            options.follow_symlinks = follow_symlinks;
            options.title = title;
            options.system_prompt = system_prompt;
            let defaults = RetrievalConfig::default();
            options.retrieval = RetrievalConfig::clamped(
                top_k.unwrap_or(defaults.top_k),
                chunk_size.unwrap_or(defaults.chunk_size),
                overlap.unwrap_or(defaults.overlap),
            );

            let packed = pack::pack_directory(&options)?;
            if json {
                println!("{}", payload::payload_to_pretty_json(&packed)?);
            } else {
                println!("{}", share::share_link(&cfg, base_url.as_deref(), &packed)?);
            }
        }
        Commands::Encode { source, base_url } => {
            share::run_encode(&cfg, &source, base_url.as_deref())?;
        }
        Commands::Decode { source, compact } => {
            share::run_decode(&source, compact)?;
        }
        Commands::Digest { source } => {
            share::run_digest(&source)?;
        }
        Commands::Search {
            source,
            query,
            top_k,
            json,
        } => {
            search::run_search(&source, &query, top_k, json)?;
        }
        Commands::Context {
            source,
            query,
            max_chars,
        } => {
            search::run_context(&source, &query, max_chars)?;
        }
        Commands::Ask {
            source,
            question,
            session,
            new_session,
            provider,
            model,
            sources,
        } => {
            let options = AskOptions {
                session,
                new_session,
                provider,
                model,
                show_sources: sources,
            };
            let cancel = cancel_on_ctrl_c();
            ask::run_ask(&cfg, &source, &question, &options, &cancel).await?;
        }
        Commands::Models { provider } => {
            ask::run_models(&cfg, provider).await?;
        }
        Commands::Sessions { source } => {
            ask::run_sessions(&cfg, &source)?;
        }
        Commands::Serve => {
            let shutdown = cancel_on_ctrl_c();
            server::run_server(&cfg, shutdown).await?;
        }
    }

    Ok(())
}
