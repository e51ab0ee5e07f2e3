//! Build a payload from a directory of text files.
//!
//! Walks `root` recursively, keeps files matching the include globs and not
//! matching the exclude globs (`.git`, `target` and `node_modules` are always
//! excluded), and turns each file into one [`Document`]:
//!
//! - `id`: path relative to `root`, `/`-separated
//! - `title`: file name
//! - `content`: file text
//!
//! Documents are sorted by path so the same tree always packs to the same
//! link.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use linkrag_core::models::{Document, Payload, RetrievalConfig, PAYLOAD_VERSION};
use linkrag_core::payload::{self, DEFAULT_TITLE};

pub const DEFAULT_INCLUDE_GLOBS: &[&str] = &["**/*.md", "**/*.txt"];

const DEFAULT_EXCLUDE_GLOBS: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

#[derive(Debug, Clone)]
pub struct PackOptions {
    pub root: PathBuf,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
    pub title: Option<String>,
    pub system_prompt: Option<String>,
    pub retrieval: RetrievalConfig,
}

impl PackOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_globs: DEFAULT_INCLUDE_GLOBS.iter().map(|s| s.to_string()).collect(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            title: None,
            system_prompt: None,
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Collect matching files under `options.root` as documents.
pub fn collect_documents(options: &PackOptions) -> Result<Vec<Document>> {
    let root = &options.root;
    if !root.is_dir() {
        bail!("Pack root is not a directory: {}", root.display());
    }

    let include_set = build_globset(&options.include_globs)?;

    let mut excludes: Vec<String> = DEFAULT_EXCLUDE_GLOBS.iter().map(|s| s.to_string()).collect();
    excludes.extend(options.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut docs = Vec::new();

    for entry in WalkDir::new(root).follow_links(options.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = relative_id(path, root);

        if exclude_set.is_match(&relative) || !include_set.is_match(&relative) {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative.clone());

        docs.push(Document {
            id: relative,
            title,
            content,
        });
    }

    docs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(docs)
}

/// Pack a directory into a normalized payload.
pub fn pack_directory(options: &PackOptions) -> Result<Payload> {
    let docs = collect_documents(options)?;
    info!(root = %options.root.display(), files = docs.len(), "packed directory");

    let draft = Payload {
        v: PAYLOAD_VERSION,
        title: options
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        system_prompt: options
            .system_prompt
            .clone()
            .unwrap_or_else(|| payload::default_payload().system_prompt),
        docs,
        retrieval: options.retrieval,
    };

    // Normalization drops empty files and clamps retrieval settings.
    Ok(payload::normalize_payload(&draft)?)
}

fn relative_id(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("guides")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("guides/deploy.md"), "Deploy with helm.").unwrap();
        fs::write(root.join("notes.txt"), "Rollback notes.").unwrap();
        fs::write(root.join("empty.md"), "   ").unwrap();
        fs::write(root.join("main.rs"), "fn main() {}").unwrap();
        fs::write(root.join(".git/HEAD.md"), "ref").unwrap();
        fs::write(root.join("node_modules/pkg/README.md"), "dep").unwrap();
        tmp
    }

    #[test]
    fn test_collect_documents_filters_and_sorts() {
        let tmp = tree();
        let docs = collect_documents(&PackOptions::new(tmp.path())).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["empty.md", "guides/deploy.md", "notes.txt"]);
        assert_eq!(docs[1].title, "deploy.md");
    }

    #[test]
    fn test_custom_globs() {
        let tmp = tree();
        let mut options = PackOptions::new(tmp.path());
        options.include_globs = vec!["**/*.rs".to_string(), "**/*.md".to_string()];
        options.exclude_globs = vec!["guides/**".to_string()];
        let docs = collect_documents(&options).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["empty.md", "main.rs"]);
    }

    #[test]
    fn test_pack_directory_normalizes() {
        let tmp = tree();
        let mut options = PackOptions::new(tmp.path());
        options.title = Some("Ops Docs".to_string());
        let payload = pack_directory(&options).unwrap();
        assert_eq!(payload.title, "Ops Docs");
        assert_eq!(payload.docs.len(), 2);
        assert_eq!(payload.docs[0].id, "guides/deploy.md");
    }

    #[test]
    fn test_pack_is_deterministic() {
        let tmp = tree();
        let options = PackOptions::new(tmp.path());
        let a = payload::encode(&pack_directory(&options).unwrap()).unwrap();
        let b = payload::encode(&pack_directory(&options).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_root() {
        let tmp = TempDir::new().unwrap();
        assert!(collect_documents(&PackOptions::new(tmp.path().join("nope"))).is_err());
    }

    #[test]
    fn test_invalid_glob() {
        let tmp = tree();
        let mut options = PackOptions::new(tmp.path());
        options.include_globs = vec!["[".to_string()];
        assert!(collect_documents(&options).is_err());
    }
}
