// Core types and query layer for the Guardian news MCP server

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod query;
pub mod types;

pub use cache::{CacheKind, NewsCaches};
pub use client::{GuardianClient, Upstream};
pub use config::NewsConfig;
pub use error::{NewsError, NewsResult};
pub use query::{NewsService, SearchRequest};
pub use types::*;
