//! TokScrape - hashtag post scraper driven through a live headless browser session
//!
//! This library provides the core functionality for TokScrape, including:
//! - Browser session bootstrap and session-proxied API calls
//! - Cursor pagination and embedded page state extraction
//! - Single-flight background job management
//! - CSV and JSON export

pub mod core;
pub mod config;
pub mod scraper;
pub mod export;
pub mod error;
pub mod logging;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for convenience
pub use crate::core::TokScrape;
pub use crate::config::AppConfig;
pub use crate::error::{ScrapeError, ScrapeResult};
