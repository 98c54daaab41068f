use std::future::Future;

use anyhow::Result;

use crate::cache::error::TokenSourceError;
use crate::cache::token::{AccessToken, Token};

/// Read interface handed to callers that need a valid token on demand.
pub trait TokenSource: Send + Sync {
    /// Full token including refresh token and id token
    fn token_ex(&self) -> impl Future<Output = Result<Token, TokenSourceError>> + Send;

    /// Reduced bearer view
    fn token(&self) -> impl Future<Output = Result<AccessToken, TokenSourceError>> + Send {
        async move { self.token_ex().await.map(AccessToken::from) }
    }
}

/// Produces a new token from the current one. Must not depend on being
/// called only once.
pub trait RefreshToken: Send + Sync {
    fn refresh(&self, current: &Token) -> impl Future<Output = Result<Token>> + Send;
}

/// Produces a brand-new seed token, independent of any previous chain.
pub trait BootstrapToken: Send + Sync {
    fn bootstrap(&self) -> impl Future<Output = Result<Token>> + Send;
}

impl<F, Fut> RefreshToken for F
where
    F: Fn(Token) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Token>> + Send,
{
    fn refresh(&self, current: &Token) -> impl Future<Output = Result<Token>> + Send {
        self(current.clone())
    }
}

impl<F, Fut> BootstrapToken for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Token>> + Send,
{
    fn bootstrap(&self) -> impl Future<Output = Result<Token>> + Send {
        self()
    }
}
