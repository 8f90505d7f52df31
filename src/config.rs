use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub quiz: QuizConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reveal: RevealConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Directory containing the archive export.
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["message_*.json".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Directory holding the chunk metadata and vector files.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Texts are truncated to this many characters before embedding.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 50,
            max_retries: 5,
            timeout_secs: 30,
            max_input_chars: 8000,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    50
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_input_chars() -> usize {
    8000
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// When true, a query-embedding failure degrades to a zero vector
    /// (no-preference query) instead of failing the search.
    #[serde(default = "default_degrade_on_embed_error")]
    pub degrade_on_embed_error: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            degrade_on_embed_error: default_degrade_on_embed_error(),
        }
    }
}

fn default_degrade_on_embed_error() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_chat_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: default_temperature(),
            max_retries: default_chat_max_retries(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_chat_max_retries() -> u32 {
    2
}
fn default_chat_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuizConfig {
    #[serde(default = "default_total_questions")]
    pub total_questions: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// How many chunks to retrieve per question topic.
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,
    /// Ordered topic seed phrases; question N uses entry N-1 (the last
    /// entry is reused once the table is exhausted).
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            total_questions: default_total_questions(),
            max_attempts: default_max_attempts(),
            retrieval_k: default_retrieval_k(),
            topics: default_topics(),
        }
    }
}

fn default_total_questions() -> u32 {
    7
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retrieval_k() -> usize {
    15
}

fn default_topics() -> Vec<String> {
    [
        "momento gracioso risa divertido chistoso",
        "viaje vacaciones salir pasear lugar",
        "comida favorita comer restaurante pizza",
        "película serie Netflix ver juntos película favorita",
        "sueño futuro planes juntos casarnos hijos",
        "pelea enojado discusión problema perdón",
        "sorpresa regalo detalle especial romántico",
        "música canción artista bailar escuchar",
        "familia amigos conocer presentar",
        "primera vez conocimos beso te amo",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    /// Nickname vocabulary, lowercase.
    #[serde(default = "default_nicknames")]
    pub nicknames: Vec<String>,
    /// Affectionate phrase vocabulary, lowercase.
    #[serde(default = "default_phrases")]
    pub phrases: Vec<String>,
    /// Location vocabulary, lowercase.
    #[serde(default = "default_places")]
    pub places: Vec<String>,
    /// Cap on literal message excerpts fed to the generator.
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            nicknames: default_nicknames(),
            phrases: default_phrases(),
            places: default_places(),
            max_examples: default_max_examples(),
        }
    }
}

fn default_nicknames() -> Vec<String> {
    [
        "amor", "bebe", "bb", "mi vida", "corazon", "cielo", "princesa", "rey", "reina", "tesoro",
        "cariño", "mi todo", "mi mundo",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_phrases() -> Vec<String> {
    [
        "te amo",
        "te quiero",
        "te extraño",
        "te necesito",
        "mi amor",
        "siempre juntos",
        "para siempre",
        "eres todo",
        "eres mi vida",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_places() -> Vec<String> {
    [
        "parque",
        "playa",
        "cine",
        "restaurante",
        "nuestra casa",
        "nuestro lugar",
        "mirador",
        "café",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_max_examples() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RevealConfig {
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_reveal_message")]
    pub message: String,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
            address: default_address(),
            message: default_reveal_message(),
        }
    }
}

fn default_latitude() -> f64 {
    19.4326
}
fn default_longitude() -> f64 {
    -99.1332
}
fn default_address() -> String {
    "Te espero en un lugar especial".to_string()
}
fn default_reveal_message() -> String {
    "You made it! You know our story so well. Now come to this place... \
     I have something important to ask you."
        .to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }

    if config.quiz.total_questions == 0 {
        anyhow::bail!("quiz.total_questions must be >= 1");
    }
    if config.quiz.max_attempts == 0 {
        anyhow::bail!("quiz.max_attempts must be >= 1");
    }
    if config.quiz.retrieval_k == 0 {
        anyhow::bail!("quiz.retrieval_k must be >= 1");
    }
    if config.quiz.topics.is_empty() {
        anyhow::bail!("quiz.topics must not be empty");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.provider == "openai" && config.embedding.model.is_none() {
        anyhow::bail!("embedding.model must be specified for the openai provider");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "hash" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or hash.",
            other
        ),
    }

    Ok(())
}
