//! Share-link commands: `init`, `encode`, `decode`, `digest`.
//!
//! Most commands take a payload "source", which may be any of:
//!
//! - a full share link (`https://host/chat#r=<token>`)
//! - a fragment (`#r=<token>`) or a bare token
//! - a path to a payload JSON file
//! - a path to a file containing one of the above

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::debug;

use crate::config::Config;
use linkrag_core::payload;
use linkrag_core::Payload;

/// Resolve a payload source (see module docs) into a normalized payload.
pub fn load_payload(source: &str) -> Result<Payload> {
    let source = source.trim();
    if source.is_empty() {
        bail!("payload source must not be empty");
    }

    let path = Path::new(source);
    if path.is_file() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file: {}", path.display()))?;
        let trimmed = content.trim();
        if trimmed.starts_with('{') {
            debug!(path = %path.display(), "reading payload JSON");
            return Ok(payload::parse_payload_json(trimmed)?);
        }
        return decode_link(trimmed);
    }

    decode_link(source)
}

fn decode_link(input: &str) -> Result<Payload> {
    let token = payload::extract_encoded_from_link(input)
        .ok_or_else(|| anyhow::anyhow!("no payload found in link"))?;
    Ok(payload::decode(&token)?)
}

/// Share link for `payload`: `base_url#r=<token>`, or just the fragment
/// when no base URL is configured.
pub fn share_link(config: &Config, base_url: Option<&str>, payload: &Payload) -> Result<String> {
    let base = base_url
        .or(config.share.base_url.as_deref())
        .map(str::trim)
        .filter(|b| !b.is_empty());
    Ok(match base {
        Some(base) => payload::share_link(base, payload)?,
        None => payload::payload_to_fragment(payload)?,
    })
}

/// `linkrag init`: write the starter payload as pretty JSON.
pub fn run_init(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = payload::payload_to_pretty_json(&payload::default_payload())?;
    std::fs::write(output, format!("{}\n", json))
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote starter payload to {}", output.display());
    Ok(())
}

/// `linkrag encode`: print the share link for a payload source.
pub fn run_encode(config: &Config, source: &str, base_url: Option<&str>) -> Result<()> {
    let payload = load_payload(source)?;
    let link = share_link(config, base_url, &payload)?;
    debug!(docs = payload.docs.len(), link_len = link.len(), "encoded share link");
    println!("{}", link);
    Ok(())
}

/// `linkrag decode`: print the normalized payload as JSON.
pub fn run_decode(source: &str, compact: bool) -> Result<()> {
    let payload = load_payload(source)?;
    let json = if compact {
        payload::canonical_json(&payload)?
    } else {
        payload::payload_to_pretty_json(&payload)?
    };
    println!("{}", json);
    Ok(())
}

/// `linkrag digest`: print the payload's content digest.
pub fn run_digest(source: &str) -> Result<()> {
    let payload = load_payload(source)?;
    println!("{}", payload::digest(&payload)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_payload_from_link_fragment_and_token() {
        let expected = payload::default_payload();
        let token = payload::encode(&expected).unwrap();

        for source in [
            format!("https://example.com/#r={}", token),
            format!("#r={}", token),
            token.clone(),
        ] {
            assert_eq!(load_payload(&source).unwrap(), expected);
        }
    }

    #[test]
    fn test_load_payload_from_files() {
        let tmp = TempDir::new().unwrap();
        let json_path = tmp.path().join("payload.json");
        std::fs::write(&json_path, r#"{ "title": "File", "docs": [{ "content": "x" }] }"#).unwrap();
        assert_eq!(load_payload(json_path.to_str().unwrap()).unwrap().title, "File");

        let link_path = tmp.path().join("link.txt");
        let fragment = payload::payload_to_fragment(&payload::default_payload()).unwrap();
        std::fs::write(&link_path, format!("{}\n", fragment)).unwrap();
        assert!(load_payload(link_path.to_str().unwrap()).is_ok());
    }

    #[test]
    fn test_load_payload_errors() {
        assert!(load_payload("").is_err());
        assert!(load_payload("https://example.com/#").is_err());
        assert!(load_payload("#r=@@@").is_err());
    }

    #[test]
    fn test_share_link_base_url() {
        let mut config = Config::default();
        let p = payload::default_payload();
        assert!(share_link(&config, None, &p).unwrap().starts_with("#r="));

        config.share.base_url = Some("https://rag.example.com/".to_string());
        assert!(share_link(&config, None, &p)
            .unwrap()
            .starts_with("https://rag.example.com/#r="));
        assert!(share_link(&config, Some("http://localhost:5173"), &p)
            .unwrap()
            .starts_with("http://localhost:5173#r="));
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("payload.json");
        run_init(&out, false).unwrap();
        assert!(run_init(&out, false).is_err());
        run_init(&out, true).unwrap();
        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            payload::parse_payload_json(&written).unwrap(),
            payload::default_payload()
        );
    }
}
