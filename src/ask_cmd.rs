//! `ask` command: generate one quiz question from the CLI.
//!
//! Exercises the full retrieval + extraction + LLM pipeline outside the
//! server, which is the quickest way to debug prompt grounding.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::generate;
use crate::index::EmbeddingIndex;

pub async fn run_ask(config: &Config, question_number: u32) -> Result<()> {
    if question_number == 0 {
        bail!("Question numbers start at 1");
    }

    let index = match EmbeddingIndex::load(config)? {
        Some(index) => index,
        None => bail!(
            "No index cache found in {}. Run `memoria build` first.",
            config.cache.dir.display()
        ),
    };

    let question = generate::generate(&index, config, question_number, &[]).await?;

    println!("{}", serde_json::to_string_pretty(&question)?);
    Ok(())
}
