//! # linkrag core
//!
//! Pure, I/O-free logic for linkrag: the payload codec that turns a corpus
//! plus retrieval settings into a shareable URL fragment, and the lexical
//! retrieval engine that answers queries against that corpus.
//!
//! This crate contains no tokio, no HTTP client and no filesystem access.
//! Everything here is synchronous and deterministic, so it compiles to
//! `wasm32-unknown-unknown` as well as native targets.
//!
//! ## Pipeline
//!
//! ```text
//! #r=<token> ──▶ payload::decode ──▶ Payload
//!                                      │
//!                     chunk + tokenize + index::build_index
//!                                      ▼
//!           query ──▶ search::retrieve_top_chunks ──▶ Vec<RetrievedChunk>
//!                                      │
//!                    context::format_retrieved_context
//!                                      ▼
//!                 prompt::build_chat_messages ──▶ generation backend
//! ```
//!
//! ## Example
//!
//! ```rust
//! use linkrag_core::{context, index, payload, search};
//!
//! let fragment = payload::payload_to_fragment(&payload::default_payload()).unwrap();
//! let decoded = payload::parse_payload_from_fragment(&fragment).unwrap().unwrap();
//!
//! let index = index::build_index(&decoded);
//! let hits = search::retrieve_top_chunks(&index, "share a URL hash");
//! assert!(!hits.is_empty());
//!
//! let block = context::format_retrieved_context(&hits, context::MAX_CONTEXT_CHARS);
//! assert!(block.starts_with("[1] About Static Rag Chat"));
//! ```

pub mod chunk;
pub mod context;
pub mod error;
pub mod index;
pub mod models;
pub mod payload;
pub mod prompt;
pub mod search;
pub mod tokenize;

pub use error::{PayloadError, Result};
pub use index::{build_index, Index};
pub use models::{Chunk, Document, Payload, RetrievalConfig, RetrievedChunk};
