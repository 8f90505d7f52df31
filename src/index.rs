//! Vector index over message chunks, with a file-backed cache.
//!
//! The index owns all chunks and one embedding vector per chunk, and serves
//! exact nearest-neighbor search by brute-force squared-L2 scan — the corpus
//! is a single conversation, small enough that a flat scan beats any
//! approximate structure.
//!
//! # Cache layout
//!
//! Two files in the configured cache directory:
//!
//! | File | Contents |
//! |------|----------|
//! | `chunks.json` | model name, dimension, creation time, and all chunk metadata |
//! | `vectors.bin` | raw little-endian f32 vectors, concatenated in chunk order |
//!
//! A cache is valid only when both files exist, the recorded model and
//! dimension match the configured provider, and the vector file length is
//! exactly `chunk_count × dims × 4` bytes. Anything else is treated as "no
//! valid cache" and triggers a rebuild. Deleting either file (or passing
//! `--force` to `build`) invalidates the cache. `build` additionally
//! compares a hash of the freshly chunked corpus against the cached one,
//! so an archive edited underneath its cache is re-embedded instead of
//! served stale.
//!
//! # Degraded builds
//!
//! A failed embedding batch (after the provider's own retries) substitutes
//! zero vectors for that batch and continues; the degradation is logged and
//! counted, and surfaces in the health endpoint. A degraded build never
//! aborts the whole index.

use anyhow::{bail, ensure, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::chunk::chunk_messages;
use crate::config::Config;
use crate::embedding;
use crate::models::{Chunk, Message, SearchResult};

const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.bin";

/// Metadata file contents. The model and dimension pin the cache to the
/// provider that produced it.
#[derive(Serialize, Deserialize)]
struct CacheMeta {
    model: String,
    dims: usize,
    created_at: i64,
    /// Hash of all chunk texts; detects a corpus that changed under an
    /// existing cache.
    fingerprint: String,
    chunks: Vec<Chunk>,
}

/// Exact nearest-neighbor index over chunk embeddings.
///
/// Immutable after construction; `search` takes `&self` and needs no
/// locking. Only [`EmbeddingIndex::build`] and [`EmbeddingIndex::load`]
/// produce an index, so an unbuilt index is unrepresentable.
#[derive(Debug)]
pub struct EmbeddingIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    model: String,
    dims: usize,
    fingerprint: String,
    degraded_batches: usize,
}

/// Summary counters for `stats` and the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub chunk_count: usize,
    pub message_count: usize,
    pub vector_count: usize,
    pub embedding_dimension: usize,
    pub model: String,
    pub cache_present: bool,
    pub index_size_bytes: u64,
}

impl EmbeddingIndex {
    /// Build the index, loading from cache when a valid one exists and
    /// `force_rebuild` is false.
    ///
    /// Fails fast on an empty corpus: a zero-chunk index would be silently
    /// useless to every caller downstream.
    pub async fn build(
        config: &Config,
        messages: &[Message],
        force_rebuild: bool,
    ) -> Result<EmbeddingIndex> {
        if !config.embedding.is_enabled() {
            bail!("Embedding provider is disabled. Set [embedding] provider in config.");
        }

        let chunks = chunk_messages(messages, config.chunking.chunk_size);
        if chunks.is_empty() {
            bail!("Corpus produced no chunks; cannot build an index");
        }
        let fingerprint = corpus_fingerprint(&chunks);

        if !force_rebuild {
            match Self::load(config) {
                Ok(Some(index)) if index.fingerprint == fingerprint => {
                    tracing::info!(
                        "loaded index from cache: {} chunks, {} vectors",
                        index.chunks.len(),
                        index.vectors.len()
                    );
                    return Ok(index);
                }
                Ok(Some(_)) => {
                    tracing::warn!("corpus changed since the cache was built, rebuilding");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("cache load failed, rebuilding: {}", e);
                }
            }
        }

        let provider = embedding::create_provider(&config.embedding)?;
        let model = provider.model_name().to_string();
        let dims = provider.dims();

        tracing::info!(
            "building index: {} messages -> {} chunks (model {}, dims {})",
            messages.len(),
            chunks.len(),
            model,
            dims
        );

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        let mut degraded_batches = 0usize;
        let batch_size = config.embedding.batch_size.max(1);

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            match embedding::embed_texts(&config.embedding, &texts).await {
                Ok(batch_vectors) => {
                    ensure!(
                        batch_vectors.len() == batch.len(),
                        "provider returned {} vectors for {} texts",
                        batch_vectors.len(),
                        batch.len()
                    );
                    vectors.extend(batch_vectors);
                }
                Err(e) => {
                    degraded_batches += 1;
                    tracing::warn!(
                        "embedding batch {} failed, substituting zero vectors: {}",
                        batch_no,
                        e
                    );
                    vectors.extend((0..batch.len()).map(|_| vec![0.0f32; dims]));
                }
            }

            tracing::info!("embedded {}/{} chunks", vectors.len(), chunks.len());
        }

        ensure!(
            vectors.len() == chunks.len(),
            "index corruption: {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        );

        let index = EmbeddingIndex {
            chunks,
            vectors,
            model,
            dims,
            fingerprint,
            degraded_batches,
        };
        index.persist(config)?;

        if degraded_batches > 0 {
            tracing::warn!(
                "index built with {} degraded batches (zero-vector placeholders)",
                degraded_batches
            );
        }

        Ok(index)
    }

    /// Load the index from the cache directory.
    ///
    /// Returns `Ok(None)` when no valid cache exists (missing files, a
    /// model/dimension mismatch against the configured provider, or a
    /// vector file whose length does not match the chunk count).
    pub fn load(config: &Config) -> Result<Option<EmbeddingIndex>> {
        let chunks_path = chunks_path(config);
        let vectors_path = vectors_path(config);

        if !chunks_path.exists() || !vectors_path.exists() {
            return Ok(None);
        }

        let meta_raw = std::fs::read_to_string(&chunks_path)
            .with_context(|| format!("Failed to read {}", chunks_path.display()))?;
        let meta: CacheMeta =
            serde_json::from_str(&meta_raw).with_context(|| "Failed to parse chunk metadata")?;

        let provider = embedding::create_provider(&config.embedding)?;
        if meta.model != provider.model_name() || meta.dims != provider.dims() {
            tracing::warn!(
                "cache built with model {} (dims {}), config wants {} (dims {}); ignoring cache",
                meta.model,
                meta.dims,
                provider.model_name(),
                provider.dims()
            );
            return Ok(None);
        }

        let blob = std::fs::read(&vectors_path)
            .with_context(|| format!("Failed to read {}", vectors_path.display()))?;
        let expected = meta.chunks.len() * meta.dims * 4;
        if blob.len() != expected {
            tracing::warn!(
                "vector file is {} bytes, expected {}; ignoring cache",
                blob.len(),
                expected
            );
            return Ok(None);
        }

        let all = embedding::blob_to_vec(&blob);
        let vectors: Vec<Vec<f32>> = all.chunks(meta.dims).map(|v| v.to_vec()).collect();

        ensure!(
            vectors.len() == meta.chunks.len(),
            "index corruption: {} vectors for {} chunks",
            vectors.len(),
            meta.chunks.len()
        );

        Ok(Some(EmbeddingIndex {
            chunks: meta.chunks,
            vectors,
            model: meta.model,
            dims: meta.dims,
            fingerprint: meta.fingerprint,
            degraded_batches: 0,
        }))
    }

    fn persist(&self, config: &Config) -> Result<()> {
        std::fs::create_dir_all(&config.cache.dir)
            .with_context(|| format!("Failed to create {}", config.cache.dir.display()))?;

        let meta = CacheMeta {
            model: self.model.clone(),
            dims: self.dims,
            created_at: chrono::Utc::now().timestamp(),
            fingerprint: self.fingerprint.clone(),
            chunks: self.chunks.clone(),
        };
        let meta_json = serde_json::to_vec(&meta)?;
        std::fs::write(chunks_path(config), meta_json)?;

        let mut blob = Vec::with_capacity(self.vectors.len() * self.dims * 4);
        for vec in &self.vectors {
            blob.extend_from_slice(&embedding::vec_to_blob(vec));
        }
        std::fs::write(vectors_path(config), blob)?;

        Ok(())
    }

    /// Semantic search over the indexed chunks.
    ///
    /// Embeds `query`, scans for the `2*k` nearest chunks to leave room for
    /// post-filtering, drops chunks outside `date_range` or without a
    /// message from `sender_filter`, and returns at most `k` results in
    /// ascending distance order with 1-based ranks.
    pub async fn search(
        &self,
        config: &Config,
        query: &str,
        k: usize,
        date_range: Option<(NaiveDate, NaiveDate)>,
        sender_filter: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = match embedding::embed_query(&config.embedding, query).await {
            Ok(v) => v,
            Err(e) if config.retrieval.degrade_on_embed_error => {
                // No-preference query: every chunk is equally (un)likely.
                tracing::warn!("query embedding failed, degrading to zero vector: {}", e);
                vec![0.0f32; self.dims]
            }
            Err(e) => return Err(e),
        };

        let mut candidates: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, embedding::l2_distance(&query_vec, v)))
            .collect();

        candidates.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        candidates.truncate(2 * k);

        let mut results = Vec::new();
        for (idx, distance) in candidates {
            let chunk = &self.chunks[idx];

            if let Some((start, end)) = date_range {
                if !chunk.overlaps(start, end) {
                    continue;
                }
            }
            if let Some(sender) = sender_filter {
                if !chunk.has_sender(sender) {
                    continue;
                }
            }

            results.push(SearchResult {
                chunk: chunk.clone(),
                distance,
                rank: results.len() + 1,
            });

            if results.len() >= k {
                break;
            }
        }

        Ok(results)
    }

    /// Summary counters for the index and its cache files.
    pub fn statistics(&self, config: &Config) -> IndexStats {
        let chunks_present = chunks_path(config).exists();
        let vectors_path = vectors_path(config);
        let index_size_bytes = std::fs::metadata(&vectors_path).map(|m| m.len()).unwrap_or(0);

        IndexStats {
            chunk_count: self.chunks.len(),
            message_count: self.chunks.iter().map(|c| c.message_count).sum(),
            vector_count: self.vectors.len(),
            embedding_dimension: self.dims,
            model: self.model.clone(),
            cache_present: chunks_present && vectors_path.exists(),
            index_size_bytes,
        }
    }

    /// Number of batches that fell back to zero-vector placeholders during
    /// the build. Nonzero means retrieval quality is degraded.
    pub fn degraded_batches(&self) -> usize {
        self.degraded_batches
    }
}

fn corpus_fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.text.as_bytes());
        hasher.update([0x1f]);
    }
    format!("{:x}", hasher.finalize())
}

fn chunks_path(config: &Config) -> PathBuf {
    config.cache.dir.join(CHUNKS_FILE)
}

fn vectors_path(config: &Config) -> PathBuf {
    config.cache.dir.join(VECTORS_FILE)
}
