//! Message archive loading.
//!
//! Scans the corpus directory for export files matching the configured
//! include globs (by default `message_*.json`), parses each as
//! `{"messages": [...]}`, and returns all messages sorted ascending by
//! timestamp. Unreadable or unparseable files are logged and skipped; only
//! an empty aggregate result is fatal, since an empty corpus cannot support
//! retrieval.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::Message;

#[derive(Deserialize)]
struct MessageFile {
    #[serde(default)]
    messages: Vec<Message>,
}

/// Load every message from the archive, sorted ascending by `timestamp_ms`.
pub fn load_messages(config: &Config) -> Result<Vec<Message>> {
    let root = &config.corpus.dir;
    if !root.exists() {
        bail!("Corpus directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.corpus.include_globs)?;

    let mut messages = Vec::new();
    let mut files_read = 0usize;
    let mut files_failed = 0usize;

    // Collect matching paths first and sort them so load order is stable.
    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                files_failed += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if include_set.is_match(relative.to_string_lossy().as_ref()) {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    for path in &paths {
        match read_message_file(path) {
            Ok(mut batch) => {
                files_read += 1;
                messages.append(&mut batch);
            }
            Err(e) => {
                files_failed += 1;
                tracing::warn!("skipping {}: {}", path.display(), e);
            }
        }
    }

    // Chunking requires ascending timestamp order.
    messages.sort_by_key(|m| m.timestamp_ms);

    if messages.is_empty() {
        bail!(
            "No messages loaded from {} ({} files read, {} failed)",
            root.display(),
            files_read,
            files_failed
        );
    }

    tracing::info!(
        "loaded {} messages from {} files ({} failed)",
        messages.len(),
        files_read,
        files_failed
    );

    Ok(messages)
}

fn read_message_file(path: &std::path::Path) -> Result<Vec<Message>> {
    let content = std::fs::read_to_string(path)?;
    let parsed: MessageFile = serde_json::from_str(&content)?;
    Ok(parsed.messages)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, CorpusConfig};
    use std::fs;
    use tempfile::TempDir;

    fn config_for(dir: &std::path::Path) -> Config {
        let toml = format!(
            "[corpus]\ndir = \"{}\"\n\n[cache]\ndir = \"{}\"\n",
            dir.display(),
            dir.display()
        );
        toml::from_str(&toml).unwrap()
    }

    #[test]
    fn test_loads_and_sorts_messages() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("message_1.json"),
            r#"{"messages": [
                {"sender_name": "Ana", "timestamp_ms": 3000, "content": "tres"},
                {"sender_name": "Luis", "timestamp_ms": 1000, "content": "uno"}
            ]}"#,
        )
        .unwrap();
        fs::write(
            tmp.path().join("message_2.json"),
            r#"{"messages": [
                {"sender_name": "Ana", "timestamp_ms": 2000, "content": "dos"}
            ]}"#,
        )
        .unwrap();

        let messages = load_messages(&config_for(tmp.path())).unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["uno", "dos", "tres"]);
    }

    #[test]
    fn test_broken_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("message_1.json"),
            r#"{"messages": [{"sender_name": "Ana", "timestamp_ms": 1000, "content": "hola"}]}"#,
        )
        .unwrap();
        fs::write(tmp.path().join("message_2.json"), "not json at all").unwrap();

        let messages = load_messages(&config_for(tmp.path())).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_non_matching_files_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("message_1.json"),
            r#"{"messages": [{"sender_name": "Ana", "timestamp_ms": 1000, "content": "hola"}]}"#,
        )
        .unwrap();
        fs::write(
            tmp.path().join("notes.json"),
            r#"{"messages": [{"sender_name": "Ana", "timestamp_ms": 2000, "content": "extra"}]}"#,
        )
        .unwrap();

        let messages = load_messages(&config_for(tmp.path())).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hola");
    }

    #[test]
    fn test_empty_corpus_is_fatal() {
        let tmp = TempDir::new().unwrap();
        assert!(load_messages(&config_for(tmp.path())).is_err());
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            corpus: CorpusConfig {
                dir: tmp.path().join("nope"),
                include_globs: vec!["message_*.json".to_string()],
            },
            cache: CacheConfig {
                dir: tmp.path().to_path_buf(),
            },
            ..config_for(tmp.path())
        };
        assert!(load_messages(&config).is_err());
    }
}
