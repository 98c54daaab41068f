//! # Token Keeper Library
//!
//! Keeps one bearer token valid on demand: refreshes it shortly before
//! expiry, persists the refreshed token, and rebuilds the whole chain from a
//! new seed token once refreshing stops working.
//!
//! Modules:
//! - `cache`: token value object, caching and bootstrapping token sources
//! - `storage`: token persistence (file, memory)
//! - `sources`: OAuth2 token endpoint used as refresher and bootstrapper
//! - `resilience`: bounded retry with permanent/recoverable errors
//! - `config`: service configuration, loading and validation
//! - `server`, `observability`: HTTP token endpoint and prometheus metrics

pub mod config;
pub mod cache;
pub mod storage;
pub mod sources;
pub mod resilience;
pub mod tests;
pub mod observability;
pub mod server;
pub mod utils;


pub use crate::cache::{
    AccessToken, BootstrapToken, BootstrappingTokenSource, CachingTokenSource, RefreshToken, Token,
    TokenSource, TokenSourceError,
};
pub use crate::config::sources::ServiceConfig;
