//! End-to-end index lifecycle tests against the library API.
//!
//! Uses the deterministic `hash` embedding provider so everything runs
//! offline: build, persist, reload, invalidate, and search behave exactly
//! the same on every run.

use memoria::config::Config;
use memoria::index::EmbeddingIndex;
use memoria::models::Message;
use tempfile::TempDir;

fn msg(sender: &str, content: &str, ts: i64) -> Message {
    Message {
        sender: sender.to_string(),
        content: content.to_string(),
        timestamp_ms: ts,
    }
}

fn config(cache_dir: &std::path::Path, dims: usize) -> Config {
    let toml = format!(
        r#"
[corpus]
dir = "{0}"

[cache]
dir = "{0}"

[chunking]
chunk_size = 5

[embedding]
provider = "hash"
dims = {1}
batch_size = 3
"#,
        cache_dir.display(),
        dims
    );
    toml::from_str(&toml).unwrap()
}

fn corpus() -> Vec<Message> {
    let day = 86_400_000i64;
    let base = 1_672_531_200_000i64; // 2023-01-01
    [
        "te amo mucho mi amor",
        "yo también te amo",
        "vamos al parque el sábado",
        "mejor vamos al cine",
        "pedimos pizza anoche",
        "la película estuvo buenísima",
        "qué risa con lo del perro",
        "no puedo dejar de reír",
        "te extraño un montón",
        "nos vemos en el café de siempre",
        "plan para las vacaciones?",
        "playa, sin duda",
    ]
    .iter()
    .enumerate()
    .map(|(i, content)| {
        msg(
            if i % 2 == 0 { "Ana" } else { "Luis" },
            content,
            base + i as i64 * day,
        )
    })
    .collect()
}

#[tokio::test]
async fn test_build_persist_reload_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), 64);

    let built = EmbeddingIndex::build(&config, &corpus(), false).await.unwrap();
    let built_stats = built.statistics(&config);
    assert_eq!(built_stats.chunk_count, 3); // 12 messages / 5 per chunk
    assert_eq!(built_stats.vector_count, built_stats.chunk_count);
    assert!(built_stats.cache_present);

    // Both cache files exist with the expected sizes.
    assert!(tmp.path().join("chunks.json").exists());
    let vec_len = std::fs::metadata(tmp.path().join("vectors.bin")).unwrap().len();
    assert_eq!(vec_len, 3 * 64 * 4);

    // A fresh process would load the same index from cache.
    let loaded = EmbeddingIndex::load(&config).unwrap().expect("cache should load");
    let loaded_stats = loaded.statistics(&config);
    assert_eq!(loaded_stats.chunk_count, built_stats.chunk_count);
    assert_eq!(loaded_stats.message_count, 12);

    // And search behaves identically on the loaded copy.
    let a = built.search(&config, "te amo", 2, None, None).await.unwrap();
    let b = loaded.search(&config, "te amo", 2, None, None).await.unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.chunk.id, y.chunk.id);
        assert_eq!(x.distance, y.distance);
    }
}

#[tokio::test]
async fn test_build_twice_reuses_cache() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), 64);

    EmbeddingIndex::build(&config, &corpus(), false).await.unwrap();
    let meta_before = std::fs::read(tmp.path().join("chunks.json")).unwrap();

    // Second build without --force loads the cache instead of rewriting it.
    EmbeddingIndex::build(&config, &corpus(), false).await.unwrap();
    let meta_after = std::fs::read(tmp.path().join("chunks.json")).unwrap();
    assert_eq!(meta_before, meta_after);
}

#[tokio::test]
async fn test_force_rebuild_rewrites_cache() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), 64);

    EmbeddingIndex::build(&config, &corpus(), false).await.unwrap();

    // Corrupt the vector file, then force a rebuild: it must be restored.
    std::fs::write(tmp.path().join("vectors.bin"), b"junk").unwrap();
    EmbeddingIndex::build(&config, &corpus(), true).await.unwrap();
    let vec_len = std::fs::metadata(tmp.path().join("vectors.bin")).unwrap().len();
    assert_eq!(vec_len, 3 * 64 * 4);
}

#[tokio::test]
async fn test_corpus_change_triggers_rebuild() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), 64);

    EmbeddingIndex::build(&config, &corpus(), false).await.unwrap();

    // Same cache dir, edited corpus: the fingerprint no longer matches, so
    // a plain (non-force) build re-embeds instead of serving stale chunks.
    let mut edited = corpus();
    edited[0].content = "texto completamente nuevo".to_string();
    let rebuilt = EmbeddingIndex::build(&config, &edited, false).await.unwrap();

    let hit = rebuilt
        .search(&config, "texto completamente nuevo", 1, None, None)
        .await
        .unwrap();
    assert!(hit[0].chunk.text.contains("texto completamente nuevo"));
}

#[tokio::test]
async fn test_dimension_mismatch_is_no_valid_cache() {
    let tmp = TempDir::new().unwrap();

    EmbeddingIndex::build(&config(tmp.path(), 64), &corpus(), false)
        .await
        .unwrap();

    // A cache built with 64 dims must never be served for a 32-dim config.
    let config32 = config(tmp.path(), 32);
    assert!(EmbeddingIndex::load(&config32).unwrap().is_none());

    let rebuilt = EmbeddingIndex::build(&config32, &corpus(), false).await.unwrap();
    assert_eq!(rebuilt.statistics(&config32).embedding_dimension, 32);
}

#[tokio::test]
async fn test_search_bound_order_and_grounding() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), 64);
    let index = EmbeddingIndex::build(&config, &corpus(), false).await.unwrap();

    for k in [1usize, 2, 3, 50] {
        let results = index.search(&config, "amor", k, None, None).await.unwrap();
        assert!(results.len() <= k);
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    // The chunk that literally contains "te amo" must win for that query.
    let top = index.search(&config, "te amo", 1, None, None).await.unwrap();
    assert!(top[0].chunk.text.contains("te amo"));
}

#[tokio::test]
async fn test_empty_corpus_fails_fast() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), 64);
    let err = EmbeddingIndex::build(&config, &[], false).await.unwrap_err();
    assert!(err.to_string().contains("no chunks"));
}
