//! # Memoria
//!
//! A retrieval-augmented quiz chatbot over a personal message archive.
//!
//! Memoria ingests a chat export (a directory of `message_*.json` files),
//! groups the messages into fixed-size chunks, embeds each chunk, and serves
//! a quiz whose questions are generated by an LLM grounded in the retrieved
//! conversation history. Completing the quiz unlocks a location reveal.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────────┐
//! │  Corpus  │──▶│   Chunker    │──▶│ EmbeddingIndex │
//! │  (JSON)  │   │ N msgs/chunk │   │ vectors + cache│
//! └──────────┘   └──────────────┘   └──────┬─────────┘
//!                                          │
//!                       ┌──────────────────┤
//!                       ▼                  ▼
//!                ┌────────────┐      ┌──────────┐
//!                │ Generator  │─────▶│   HTTP   │
//!                │ RAG + LLM  │      │  (quiz)  │
//!                └────────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! memoria build                  # chunk + embed the archive, persist the cache
//! memoria stats                  # index statistics
//! memoria search "te amo"        # debug semantic search
//! memoria ask --number 1         # generate one question offline
//! memoria serve                  # start the quiz HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`corpus`] | Message archive loading |
//! | [`chunk`] | Message chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index with file-backed cache |
//! | [`retrieve`] | Filtered and multi-seed retrieval |
//! | [`extract`] | Statistical keyword extraction |
//! | [`llm`] | Chat-completion client |
//! | [`generate`] | Quiz question generation |
//! | [`session`] | Quiz session state machine |
//! | [`store`] | In-memory session store |
//! | [`server`] | Quiz HTTP server |

pub mod ask_cmd;
pub mod build_cmd;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod index;
pub mod llm;
pub mod models;
pub mod retrieve;
pub mod search;
pub mod server;
pub mod session;
pub mod stats;
pub mod store;
