//! Retrieval layer on top of the embedding index.
//!
//! Thin contract layer adding the composite queries the question generator
//! needs: single-topic retrieval and multi-seed merged retrieval that
//! deduplicates by chunk id, keeping the lowest distance per chunk.

use anyhow::Result;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::config::Config;
use crate::index::EmbeddingIndex;
use crate::models::SearchResult;

/// Retrieve the top `k` chunks for a single topic phrase.
pub async fn search_topic(
    index: &EmbeddingIndex,
    config: &Config,
    topic: &str,
    k: usize,
) -> Result<Vec<SearchResult>> {
    index.search(config, topic, k, None, None).await
}

/// Retrieve across several seed phrases and merge the results.
///
/// Each seed contributes up to `k / seeds + 1` hits; duplicates (same chunk
/// reached from different seeds) keep their lowest distance. The merged set
/// is sorted ascending by distance, truncated to `k`, and re-ranked.
pub async fn search_merged(
    index: &EmbeddingIndex,
    config: &Config,
    seeds: &[String],
    k: usize,
) -> Result<Vec<SearchResult>> {
    if seeds.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let per_seed = k / seeds.len() + 1;
    let mut best: HashMap<i64, SearchResult> = HashMap::new();

    for seed in seeds {
        let results = index.search(config, seed, per_seed, None, None).await?;
        for result in results {
            match best.entry(result.chunk.id) {
                Entry::Occupied(mut existing) => {
                    if result.distance < existing.get().distance {
                        existing.get_mut().distance = result.distance;
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(result);
                }
            }
        }
    }

    let mut merged: Vec<SearchResult> = best.into_values().collect();
    merged.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk.id.cmp(&b.chunk.id))
    });
    merged.truncate(k);

    for (i, result) in merged.iter_mut().enumerate() {
        result.rank = i + 1;
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EmbeddingIndex;
    use crate::models::Message;
    use tempfile::TempDir;

    fn msg(sender: &str, content: &str, ts: i64) -> Message {
        Message {
            sender: sender.to_string(),
            content: content.to_string(),
            timestamp_ms: ts,
        }
    }

    fn test_config(dir: &std::path::Path) -> Config {
        let toml = format!(
            "[corpus]\ndir = \"{0}\"\n\n[cache]\ndir = \"{0}\"\n\n[embedding]\nprovider = \"hash\"\ndims = 64\n",
            dir.display()
        );
        toml::from_str(&toml).unwrap()
    }

    async fn build_index(config: &Config) -> EmbeddingIndex {
        let base = 1_672_531_200_000i64;
        let messages: Vec<Message> = [
            "te amo mucho",
            "vamos al parque",
            "pizza en el restaurante",
            "película el viernes",
            "qué risa ayer",
            "te extraño bastante",
        ]
        .iter()
        .enumerate()
        .map(|(i, content)| msg("Ana", content, base + i as i64 * 60_000))
        .collect();

        // chunk_size 5 -> 2 chunks
        EmbeddingIndex::build(config, &messages, false).await.unwrap()
    }

    #[tokio::test]
    async fn test_merged_dedups_by_chunk_id() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let index = build_index(&config).await;

        // Two seeds that both hit the same chunks; every chunk id must
        // appear at most once.
        let seeds = vec!["te amo".to_string(), "te extraño".to_string()];
        let merged = search_merged(&index, &config, &seeds, 10).await.unwrap();

        let mut ids: Vec<i64> = merged.iter().map(|r| r.chunk.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), merged.len());
    }

    #[tokio::test]
    async fn test_merged_sorted_and_ranked() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let index = build_index(&config).await;

        let seeds = vec!["parque".to_string(), "pizza".to_string()];
        let merged = search_merged(&index, &config, &seeds, 10).await.unwrap();

        for pair in merged.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        for (i, r) in merged.iter().enumerate() {
            assert_eq!(r.rank, i + 1);
        }
    }

    #[tokio::test]
    async fn test_merged_respects_k() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let index = build_index(&config).await;

        let seeds = vec!["te amo".to_string(), "parque".to_string()];
        let merged = search_merged(&index, &config, &seeds, 1).await.unwrap();
        assert!(merged.len() <= 1);
    }

    #[tokio::test]
    async fn test_merged_empty_seeds() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let index = build_index(&config).await;

        let merged = search_merged(&index, &config, &[], 5).await.unwrap();
        assert!(merged.is_empty());
    }
}
