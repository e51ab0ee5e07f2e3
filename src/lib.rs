//! # linkrag
//!
//! Shareable lexical RAG. A corpus of documents plus retrieval settings is
//! normalized, compressed and carried in a URL fragment (`#r=<token>`).
//! Anyone holding the link can rebuild the same BM25 index locally, retrieve
//! grounded context for a question, and send it to a chat provider with
//! their own API key.
//!
//! The retrieval engine and payload codec live in [`linkrag_core`]; this
//! crate adds configuration, chat providers, session storage, directory
//! packing, the `linkrag` CLI and a stateless HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ pack <dir> │──▶│ Payload Codec │──▶│ #r=<token> link │
//! └────────────┘   └──────────────┘   └───────┬────────┘
//!                                             │ decode
//!                                             ▼
//!                  ┌──────────────┐   ┌────────────────┐
//!                  │ BM25 + Context│◀──│ in-memory Index │
//!                  └──────┬───────┘   └────────────────┘
//!                         ▼
//!            ┌──────────────────────┐
//!            │ CLI ask / HTTP search │──▶ OpenAI · Anthropic · Gemini
//!            └──────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`pack`] | Directory → payload |
//! | [`share`] | Payload sources, share links, encode/decode commands |
//! | [`search`] | CLI search and context commands |
//! | [`providers`] | Chat-completion providers and model catalogues |
//! | [`sessions`] | Per-payload conversation storage |
//! | [`ask`] | Grounded question answering |
//! | [`server`] | HTTP API |

pub mod ask;
pub mod config;
pub mod pack;
pub mod providers;
pub mod search;
pub mod server;
pub mod sessions;
pub mod share;
