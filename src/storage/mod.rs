//! Token persistence backends.

use std::future::Future;

use anyhow::Result;

use crate::cache::token::Token;

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Durable home of a [`Token`]. Saves are best effort from the cache's point
/// of view: a failed save never reverts the in-memory token.
pub trait Storage: Send + Sync {
    fn save(&self, token: &Token) -> impl Future<Output = Result<()>> + Send;

    /// `None` when nothing has been stored yet
    fn load(&self) -> impl Future<Output = Result<Option<Token>>> + Send;
}

/// Placeholder for sources built without persistence.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStorage;

impl Storage for NoStorage {
    async fn save(&self, _token: &Token) -> Result<()> {
        Ok(())
    }

    async fn load(&self) -> Result<Option<Token>> {
        Ok(None)
    }
}

/// `None` behaves like [`NoStorage`], so persistence can be switched by config
/// without changing the source's type.
impl<S: Storage> Storage for Option<S> {
    async fn save(&self, token: &Token) -> Result<()> {
        match self {
            Some(store) => store.save(token).await,
            None => Ok(()),
        }
    }

    async fn load(&self) -> Result<Option<Token>> {
        match self {
            Some(store) => store.load().await,
            None => Ok(None),
        }
    }
}
