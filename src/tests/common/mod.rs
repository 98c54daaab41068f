// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use reqwest::Client;

use crate::cache::error::TokenSourceError;
use crate::cache::token::Token;
use crate::cache::token_source::TokenSource;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Token expiring `secs` seconds from now
pub fn token_in(access: &str, secs: i64, refresh: &str) -> Token {
    Token::new(access, Utc::now() + Duration::seconds(secs), refresh)
}

/// Refresh function that counts calls and answers with `next`, or fails when
/// `next` is `None`.
pub fn counting_refresher(
    calls: Arc<AtomicUsize>,
    next: Option<Token>,
) -> impl Fn(Token) -> std::future::Ready<Result<Token>> + Send + Sync {
    move |_current: Token| {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(next.clone().ok_or_else(|| anyhow!("refresh endpoint down")))
    }
}

/// Token source whose outcome can be flipped from the test.
#[derive(Clone)]
pub struct SwitchSource {
    pub token: Token,
    pub failing: Arc<AtomicBool>,
    pub calls: Arc<AtomicUsize>,
}

impl SwitchSource {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            failing: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl TokenSource for SwitchSource {
    async fn token_ex(&self) -> Result<Token, TokenSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(TokenSourceError::RefreshFailed(anyhow!("refresh token revoked")))
        } else {
            Ok(self.token.clone())
        }
    }
}
