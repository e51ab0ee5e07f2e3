//! `linkrag ask`, `linkrag models` and `linkrag sessions`.
//!
//! `ask` runs one grounded conversation turn:
//!
//! 1. decode the payload and compute its digest
//! 2. pick the session (explicit id, fresh, or most recent for the digest)
//! 3. retrieve context for the question
//! 4. assemble the system prompt and recent history
//! 5. call the configured provider, cancellable with Ctrl-C
//! 6. record the turn (or the failure) in the session store

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::providers::{complete_with_cancel, create_provider, CompletionRequest, ProviderName};
use crate::search::query_payload;
use crate::sessions::{format_timestamp, MessageRole, SessionStore, UiMessage};
use crate::share::load_payload;
use linkrag_core::payload;
use linkrag_core::prompt::{build_chat_messages, ChatMessage};

#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub session: Option<String>,
    pub new_session: bool,
    pub provider: Option<ProviderName>,
    pub model: Option<String>,
    pub show_sources: bool,
}

pub async fn run_ask(
    config: &Config,
    source: &str,
    question: &str,
    options: &AskOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let payload = load_payload(source)?;
    let digest = payload::digest(&payload)?;
    let store = SessionStore::from_config(config);
    let mut session = store.select(&digest, options.session.as_deref(), options.new_session)?;

    let outcome = query_payload(&payload, question, None, config.context.max_chars);
    info!(
        session = %session.id,
        chunks = outcome.results.len(),
        context_chars = outcome.context.chars().count(),
        "retrieved context"
    );

    let mut history = session.chat_history();
    history.push(ChatMessage::user(question));
    let messages = build_chat_messages(
        &history,
        &payload,
        &outcome.context,
        config.context.recent_history_limit,
    );

    let provider_name = options.provider.unwrap_or(config.chat.provider);
    let model = options
        .model
        .clone()
        .unwrap_or_else(|| config.chat.model_for(provider_name));
    let request = CompletionRequest {
        model,
        messages,
        temperature: config.chat.temperature,
        max_tokens: config.chat.max_tokens,
    };

    session.push(UiMessage::new(MessageRole::User, question));

    let reply = match create_provider(config, provider_name) {
        Ok(provider) => complete_with_cancel(provider.as_ref(), &request, cancel).await,
        Err(e) => Err(e),
    };

    match reply {
        Ok(answer) => {
            session.push(UiMessage::new(MessageRole::Assistant, answer.clone()));
            store.upsert(&session)?;

            println!("{}", answer.trim_end());
            if options.show_sources && !outcome.results.is_empty() {
                println!();
                println!("Sources:");
                for (i, r) in outcome.results.iter().enumerate() {
                    println!("  [{}] {} ({})", i + 1, r.doc_title, r.chunk_id);
                }
            }
            Ok(())
        }
        Err(e) => {
            warn!(session = %session.id, error = %e, "completion failed");
            session.push(UiMessage::error(e.to_string()));
            if let Err(save_err) = store.upsert(&session) {
                warn!(session = %session.id, error = %save_err, "failed to record failed turn");
            }
            Err(e)
        }
    }
}

/// `linkrag models`: list chat-capable models for a provider.
pub async fn run_models(config: &Config, provider: Option<ProviderName>) -> Result<()> {
    let name = provider.unwrap_or(config.chat.provider);
    let provider = create_provider(config, name)?;
    let models = provider.list_models().await?;
    if models.is_empty() {
        println!("No models available for {}.", name.label());
        return Ok(());
    }
    for model in models {
        println!("{}", model);
    }
    Ok(())
}

/// `linkrag sessions`: list stored conversations for a payload.
pub fn run_sessions(config: &Config, source: &str) -> Result<()> {
    let payload = load_payload(source)?;
    let digest = payload::digest(&payload)?;
    let sessions = SessionStore::from_config(config).load(&digest)?;

    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    for session in sessions {
        println!(
            "{}  {}  {} messages  {}",
            session.id,
            format_timestamp(session.updated_at),
            session.messages.len(),
            session.title
        );
    }
    Ok(())
}
