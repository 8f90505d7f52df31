//! `search` command: run semantic queries against the cached index.
//!
//! With a single query, date and sender filters apply directly. With
//! several queries, results are merged and deduplicated through
//! [`crate::retrieve::search_merged`].

use anyhow::{bail, Result};
use chrono::NaiveDate;

use crate::config::Config;
use crate::index::EmbeddingIndex;
use crate::models::SearchResult;
use crate::retrieve;

pub async fn run_search(
    config: &Config,
    queries: &[String],
    limit: usize,
    since: Option<String>,
    until: Option<String>,
    sender: Option<String>,
) -> Result<()> {
    if queries.iter().all(|q| q.trim().is_empty()) {
        println!("No results.");
        return Ok(());
    }

    let index = match EmbeddingIndex::load(config)? {
        Some(index) => index,
        None => bail!(
            "No index cache found in {}. Run `memoria build` first.",
            config.cache.dir.display()
        ),
    };

    let date_range = parse_date_range(since.as_deref(), until.as_deref())?;

    let results: Vec<SearchResult> = if queries.len() == 1 {
        index
            .search(
                config,
                &queries[0],
                limit,
                date_range,
                sender.as_deref(),
            )
            .await?
    } else {
        if date_range.is_some() || sender.is_some() {
            bail!("Date and sender filters apply to single-query search only");
        }
        retrieve::search_merged(&index, config, queries, limit).await?
    };

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for result in &results {
        let (start, end) = result.chunk.date_range;
        println!(
            "{}. [{:.4}] chunk {} ({} messages, {}..{})",
            result.rank,
            result.distance,
            result.chunk.id,
            result.chunk.message_count,
            start,
            end
        );
        println!("    excerpt: \"{}\"", snippet(&result.chunk.text));
        println!();
    }

    Ok(())
}

fn parse_date_range(
    since: Option<&str>,
    until: Option<&str>,
) -> Result<Option<(NaiveDate, NaiveDate)>> {
    let parse = |s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid date '{}': {} (expected YYYY-MM-DD)", s, e))
    };

    Ok(match (since, until) {
        (None, None) => None,
        (Some(s), None) => Some((parse(s)?, NaiveDate::MAX)),
        (None, Some(u)) => Some((NaiveDate::MIN, parse(u)?)),
        (Some(s), Some(u)) => Some((parse(s)?, parse(u)?)),
    })
}

fn snippet(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let trimmed: String = flat.trim().chars().take(240).collect();
    trimmed
}
