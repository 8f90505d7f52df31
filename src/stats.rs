//! Index statistics and cache overview.
//!
//! Provides a quick summary of what's indexed: chunk and vector counts,
//! embedding model, and cache size. Used by `memoria stats` to give
//! confidence that the build worked as expected.

use anyhow::Result;

use crate::config::Config;
use crate::index::EmbeddingIndex;

/// Run the stats command: load the cached index and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    let index = match EmbeddingIndex::load(config)? {
        Some(index) => index,
        None => {
            println!("No index cache found in {}.", config.cache.dir.display());
            println!("Run `memoria build` first.");
            return Ok(());
        }
    };

    let stats = index.statistics(config);

    println!("Memoria — Index Stats");
    println!("=====================");
    println!();
    println!("  Cache:      {}", config.cache.dir.display());
    println!("  Size:       {}", format_bytes(stats.index_size_bytes));
    println!();
    println!("  Chunks:     {}", stats.chunk_count);
    println!("  Messages:   {}", stats.message_count);
    println!("  Vectors:    {}", stats.vector_count);
    println!(
        "  Model:      {} ({} dims)",
        stats.model, stats.embedding_dimension
    );
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
