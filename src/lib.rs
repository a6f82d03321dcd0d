//! scorewatch: scrapes leagues, teams, standings, fixtures and live match
//! events from livescore.com through a staged job pipeline.

#![allow(clippy::should_implement_trait)]

pub mod browser;
pub mod config;
pub mod crawl;
pub mod dedup;
pub mod directory;
pub mod error;
pub mod extract;
pub mod limiter;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod stages;

pub use error::{ScrapeError, ScrapeResult};
