//! Payload codec: normalization, compression and share-link fragments.
//!
//! # Normalization
//!
//! [`normalize`] accepts any JSON value and returns a canonical [`Payload`].
//! It is deliberately forgiving: every field is defaulted, clamped or coerced
//! on its own. Only two things are fatal:
//!
//! - the input is not a JSON object;
//! - the `v` field is present and is not the supported version.
//!
//! | Field | Rule |
//! |-------|------|
//! | `title` | trimmed, `"Static Rag Chat"` if blank |
//! | `systemPrompt` | trimmed, `""` if not a string |
//! | `docs` | `[]` if not an array; blank ids → `doc-{n}`, blank titles → `Document {n}`, empty content dropped |
//! | `retrieval.topK` | floored, clamped to `[1, 12]`, default 4 |
//! | `retrieval.chunkSize` | floored, clamped to `[200, 4000]`, default 800 |
//! | `retrieval.overlap` | floored, clamped to `[0, chunkSize / 2]`, default 120 |
//!
//! Normalization is idempotent: `normalize(normalize(x)) == normalize(x)`.
//!
//! # Wire format
//!
//! [`encode`] serializes the canonical JSON and compresses it with the
//! lz-string "encoded URI component" alphabet, which needs no further
//! escaping inside a URL. Links carry the token as `#r=<token>`; older links
//! that put the bare token in the fragment are still accepted.

use std::collections::HashSet;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{PayloadError, Result};
use crate::models::{
    Document, Payload, RetrievalConfig, CHUNK_SIZE_MAX, CHUNK_SIZE_MIN, DEFAULT_CHUNK_SIZE,
    DEFAULT_OVERLAP, DEFAULT_TOP_K, PAYLOAD_VERSION, TOP_K_MAX, TOP_K_MIN,
};

/// Fragment parameter that carries the encoded payload.
pub const FRAGMENT_KEY: &str = "r";

/// Title used when a payload does not provide one.
pub const DEFAULT_TITLE: &str = "Static Rag Chat";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Prefer answers grounded in the provided context. If the context is insufficient, clearly say what is missing.";

const SAMPLE_DOC: &str = "Static Rag Chat is a static chat app that compresses RAG documents into a URL hash for sharing.\nContext data travels inside the shared URL, and each user can reproduce the same session by entering their own API key locally in the browser.\nThe key idea is that one URL can share the same contextual conversation without running any backend.";

/// The starter payload: one sample document and default retrieval settings.
pub fn default_payload() -> Payload {
    Payload {
        v: PAYLOAD_VERSION,
        title: DEFAULT_TITLE.to_string(),
        system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        docs: vec![Document {
            id: "doc-1".to_string(),
            title: "About Static Rag Chat".to_string(),
            content: SAMPLE_DOC.to_string(),
        }],
        retrieval: RetrievalConfig::default(),
    }
}

/// Normalize an arbitrary JSON value into a canonical payload.
pub fn normalize(raw: &Value) -> Result<Payload> {
    let obj = raw
        .as_object()
        .ok_or_else(|| PayloadError::Validation("payload must be a JSON object".to_string()))?;

    check_version(obj.get("v"))?;

    let docs = match obj.get("docs").and_then(Value::as_array) {
        Some(entries) => clean_docs(entries),
        None => Vec::new(),
    };

    let empty = Map::new();
    let retrieval = obj
        .get("retrieval")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    Ok(Payload {
        v: PAYLOAD_VERSION,
        title: trimmed_string(obj.get("title"))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        system_prompt: trimmed_string(obj.get("systemPrompt")).unwrap_or_default(),
        docs,
        retrieval: normalize_retrieval(retrieval),
    })
}

/// Re-normalize an already typed payload.
pub fn normalize_payload(payload: &Payload) -> Result<Payload> {
    let value = serde_json::to_value(payload)
        .map_err(|e| PayloadError::Validation(format!("payload is not serializable: {}", e)))?;
    normalize(&value)
}

/// Parse JSON text and normalize it.
pub fn parse_payload_json(json: &str) -> Result<Payload> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| PayloadError::Validation(format!("payload is not valid JSON: {}", e)))?;
    normalize(&value)
}

/// Normalize, serialize and compress `payload` into a URL-safe token.
pub fn encode(payload: &Payload) -> Result<String> {
    let normalized = normalize_payload(payload)?;
    let json = canonical_json(&normalized).map_err(|e| PayloadError::Encoding(e.to_string()))?;
    let encoded = lz_str::compress_to_encoded_uri_component(json.as_str());
    if encoded.is_empty() {
        return Err(PayloadError::Encoding(
            "compression produced an empty token".to_string(),
        ));
    }
    debug!(
        docs = normalized.docs.len(),
        json_len = json.len(),
        token_len = encoded.len(),
        "encoded payload"
    );
    Ok(encoded)
}

/// Decompress, parse and normalize a token produced by [`encode`].
pub fn decode(token: &str) -> Result<Payload> {
    // Query-string decoding turns '+' (part of the token alphabet) into ' '.
    let token = token.trim().replace(' ', "+");
    if token.is_empty() {
        return Err(PayloadError::Decoding("token is empty".to_string()));
    }

    let wide = lz_str::decompress_from_encoded_uri_component(token.as_str())
        .ok_or_else(|| PayloadError::Decoding("token is not a valid compressed payload".to_string()))?;
    let json = String::from_utf16(&wide)
        .map_err(|_| PayloadError::Decoding("decompressed data is not valid text".to_string()))?;
    if json.is_empty() {
        return Err(PayloadError::Decoding(
            "token decompressed to nothing".to_string(),
        ));
    }

    let value: Value = serde_json::from_str(&json)
        .map_err(|e| PayloadError::Decoding(format!("payload is not valid JSON: {}", e)))?;
    normalize(&value)
}

/// Canonical JSON text of an already normalized payload.
pub fn canonical_json(payload: &Payload) -> serde_json::Result<String> {
    serde_json::to_string(payload)
}

/// Human-readable JSON (2-space indent) in the canonical shape.
pub fn payload_to_pretty_json(payload: &Payload) -> serde_json::Result<String> {
    serde_json::to_string_pretty(payload)
}

/// Change detector over the normalized canonical JSON.
///
/// Two payloads that normalize identically always share a digest. Used to
/// key stored conversation sessions per payload.
pub fn digest(payload: &Payload) -> Result<String> {
    let normalized = normalize_payload(payload)?;
    let json = canonical_json(&normalized).map_err(|e| PayloadError::Encoding(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// `#r=<token>` for `payload`.
pub fn payload_to_fragment(payload: &Payload) -> Result<String> {
    Ok(format!("#{}={}", FRAGMENT_KEY, encode(payload)?))
}

/// Full share link: `base_url` with the payload fragment appended.
pub fn share_link(base_url: &str, payload: &Payload) -> Result<String> {
    let base = base_url.split('#').next().unwrap_or_default();
    Ok(format!("{}{}", base, payload_to_fragment(payload)?))
}

/// Pull the encoded token out of a URL fragment.
///
/// Accepts `#r=<token>`, `r=<token>` among other `key=value` parameters, or
/// a legacy fragment that is the bare token. Returns `None` for an empty
/// fragment.
pub fn extract_encoded(fragment: &str) -> Option<String> {
    let trimmed = fragment.strip_prefix('#').unwrap_or(fragment);
    if trimmed.is_empty() {
        return None;
    }

    let keyed = url::form_urlencoded::parse(trimmed.as_bytes())
        .find(|(key, _)| key == FRAGMENT_KEY)
        .map(|(_, value)| value.replace(' ', "+"));

    match keyed {
        Some(value) if value.is_empty() => None,
        Some(value) => Some(value),
        None => Some(trimmed.to_string()),
    }
}

/// Pull the encoded token out of a full link, a fragment, or a bare token.
pub fn extract_encoded_from_link(input: &str) -> Option<String> {
    let input = input.trim();
    match input.split_once('#') {
        Some((_, fragment)) => extract_encoded(fragment),
        None => extract_encoded(input),
    }
}

/// Decode the payload carried by a URL fragment.
///
/// `Ok(None)` means the fragment carries no payload at all.
pub fn parse_payload_from_fragment(fragment: &str) -> Result<Option<Payload>> {
    match extract_encoded(fragment) {
        Some(token) => decode(&token).map(Some),
        None => Ok(None),
    }
}

fn check_version(raw: Option<&Value>) -> Result<()> {
    let raw = match raw {
        None => return Ok(()),
        Some(v) => v,
    };
    match coerce_version(raw) {
        Some(n) if n == f64::from(PAYLOAD_VERSION) => Ok(()),
        _ => Err(PayloadError::UnsupportedVersion(raw.to_string())),
    }
}

/// Numeric reading of a `v` value: `null`, `false` and blank strings read
/// as 0, `true` as 1. Arrays, objects and non-numeric strings have none.
fn coerce_version(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        other => coerce_number(other),
    }
}

fn clean_docs(entries: &[Value]) -> Vec<Document> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut docs = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let ordinal = index + 1;
        let content = trimmed_string(entry.get("content")).unwrap_or_default();
        if content.is_empty() {
            continue;
        }

        let base_id = trimmed_string(entry.get("id"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("doc-{}", ordinal));
        let title = trimmed_string(entry.get("title"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("Document {}", ordinal));

        // Chunk ids derive from document ids, so they must stay unique.
        let mut id = base_id.clone();
        let mut suffix = 2;
        while seen.contains(&id) {
            id = format!("{}-{}", base_id, suffix);
            suffix += 1;
        }
        seen.insert(id.clone());

        docs.push(Document { id, title, content });
    }

    docs
}

fn normalize_retrieval(raw: &Map<String, Value>) -> RetrievalConfig {
    let top_k = coerce_field(raw, "topK")
        .map(|n| clamp_floor(n, TOP_K_MIN, TOP_K_MAX))
        .unwrap_or(DEFAULT_TOP_K);
    let chunk_size = coerce_field(raw, "chunkSize")
        .map(|n| clamp_floor(n, CHUNK_SIZE_MIN, CHUNK_SIZE_MAX))
        .unwrap_or(DEFAULT_CHUNK_SIZE);
    let max_overlap = chunk_size / 2;
    let overlap = coerce_field(raw, "overlap")
        .map(|n| clamp_floor(n, 0, max_overlap))
        .unwrap_or_else(|| DEFAULT_OVERLAP.min(max_overlap));

    RetrievalConfig {
        top_k,
        chunk_size,
        overlap,
    }
}

fn coerce_field(raw: &Map<String, Value>, key: &str) -> Option<f64> {
    raw.get(key).and_then(coerce_number)
}

/// JSON numbers and numeric strings; anything else is "not a number".
fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn clamp_floor(n: f64, min: usize, max: usize) -> usize {
    n.floor().clamp(min as f64, max as f64) as usize
}

fn trimmed_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(|s| s.trim().to_string())
}
