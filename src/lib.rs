//! # Tributary
//!
//! Turns URLs into clean, bounded text for an answer generator.
//!
//! ## Architecture
//!
//! ```text
//! URLs → Gatherer → [Cache ⇄ Orchestrator → Extractor → Renderer pool] → validation → Processor → context
//! ```
//!
//! - [`scraper`]: static-then-rendered extraction with a quality gate
//! - [`gatherer`]: bounded fan-out over a URL list
//! - [`processor`]: merge, sanitize and cap the gathered text
//! - [`pipeline`]: intent analysis, search, and answer generation around the above
//!
//! ## Quick Start
//!
//! ```bash
//! # Scrape one page
//! tributary scrape https://blog.rust-lang.org/
//!
//! # Gather several pages for a conversation and print the merged context
//! tributary gather -c demo --context https://a.example https://b.example
//!
//! # Drop expired cache rows
//! tributary purge
//! ```

/// Application context and error handling.
///
/// [`AppContext`](app::AppContext) owns the renderer pool and wires the
/// cache, fetcher, orchestrator, gatherer and processor around it.
pub mod app;

/// TTL cache and bounded chat history over a [`KvStore`](store::KvStore).
pub mod cache;

/// Command-line interface using clap.
///
/// - `scrape <url>` - Scrape one URL
/// - `gather <urls>...` - Scrape several URLs for a conversation
/// - `history <conversation>` - Show recent chat entries
/// - `purge` - Delete expired cache rows
pub mod cli;

/// Configuration loaded from `~/.config/tributary/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`ScrapeResult`](domain::ScrapeResult): per-URL outcome with metrics
/// - [`ChatEntry`](domain::ChatEntry): one conversation turn
/// - [`QueryAnalysis`](domain::QueryAnalysis): validated intent classification
pub mod domain;

/// Plain HTTP fetching for the static strategy.
pub mod fetcher;

pub mod gatherer;

/// Request-level flow and the external collaborator traits.
pub mod pipeline;

pub mod processor;

/// Two-tier content acquisition backed by headless Chrome.
///
/// - [`ScrapeOrchestrator`](scraper::ScrapeOrchestrator): cache, static, rendered
/// - [`RendererPool`](scraper::RendererPool): bounded, health-checked sessions
/// - [`ContentExtractor`](scraper::ContentExtractor): selector-driven text extraction
pub mod scraper;

/// SQLite persistence layer.
///
/// - [`KvStore`](store::KvStore): TTL key-value and list primitives
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
