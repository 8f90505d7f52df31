//! `build` command: load the corpus and build (or refresh) the index.

use anyhow::Result;

use crate::config::Config;
use crate::corpus;
use crate::index::EmbeddingIndex;

/// Build the embedding index, loading from cache unless `force` is set.
pub async fn run_build(config: &Config, force: bool) -> Result<()> {
    println!("Loading corpus from {}...", config.corpus.dir.display());
    let messages = corpus::load_messages(config)?;
    println!("  {} messages loaded", messages.len());

    let index = EmbeddingIndex::build(config, &messages, force).await?;
    let stats = index.statistics(config);

    println!("build complete");
    println!("  chunks:     {}", stats.chunk_count);
    println!("  vectors:    {}", stats.vector_count);
    println!("  model:      {} ({} dims)", stats.model, stats.embedding_dimension);
    if index.degraded_batches() > 0 {
        println!(
            "  WARNING:    {} batches degraded to zero vectors",
            index.degraded_batches()
        );
    }

    Ok(())
}
