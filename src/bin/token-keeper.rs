use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::Duration;
use clap::Parser;
use reqwest::Client;
use token_keeper::cache::caching::DEFAULT_SAFETY_MARGIN_SECONDS;
use token_keeper::config::loader::file_to_config;
use token_keeper::config::settings::RetryConfig;
use token_keeper::resilience::retry::RetrySettings;
use token_keeper::server;
use token_keeper::sources::OAuth2Endpoint;
use token_keeper::storage::{FileStorage, Storage};
use token_keeper::utils::logging;
use token_keeper::utils::logging::LogLevel;
use token_keeper::{BootstrappingTokenSource, CachingTokenSource, Token, TokenSource};
use tracing::{info, warn};

const HTTP_TIMEOUT_MS: u64 = 5000;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "token-keeper.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL" , value_enum)]
    log_level: Option<LogLevel>,
}

fn retry_settings(retry: &Option<RetryConfig>) -> RetrySettings {
    let defaults = RetrySettings::default();
    RetrySettings {
        attempts: retry.as_ref().and_then(|r| r.attempts).unwrap_or(defaults.attempts),
        base_delay_ms: retry.as_ref().and_then(|r| r.base_delay_ms).unwrap_or(defaults.base_delay_ms),
        max_delay_ms: retry.as_ref().and_then(|r| r.max_delay_ms).unwrap_or(defaults.max_delay_ms),
        max_elapsed_ms: retry.as_ref().and_then(|r| r.max_elapsed_ms).or(defaults.max_elapsed_ms),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = file_to_config(Path::new(&args.config)).await?;
    let settings = &service_config.settings;
    logging::run(settings, args.log_level);

    // -------------------------------
    // 2. Token endpoint (refresher + bootstrapper)
    // -------------------------------

    let client = Client::builder()
        .timeout(StdDuration::from_millis(HTTP_TIMEOUT_MS))
        .build()?;
    let endpoint = OAuth2Endpoint::new(client, service_config.endpoint.clone(), retry_settings(&settings.retry));

    // -------------------------------
    // 3. Storage and token source chain
    // -------------------------------

    let store = settings.storage.as_ref().map(|s| FileStorage::new(&s.path));
    let safety_margin = Duration::seconds(settings.safety_margin_seconds.unwrap_or(DEFAULT_SAFETY_MARGIN_SECONDS));

    let refresher = endpoint.clone();
    let factory_store = store.clone();
    let factory = move |token: Token| {
        CachingTokenSource::new(Some(token), refresher.clone())
            .with_storage(factory_store.clone())
            .with_safety_margin(safety_margin)
    };

    let restored = match store.load().await {
        Ok(token) => token,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "stored token ignored");
            None
        }
    };
    let source = Arc::new(match restored {
        Some(token) => {
            info!(expiry = ?token.expiry, "restored token from storage");
            let held = factory(token);
            BootstrappingTokenSource::with_source(endpoint, factory, held)
        }
        None => BootstrappingTokenSource::new(endpoint, factory),
    });

    // -------------------------------
    // 4. Warm up: acquire the first token before serving
    // -------------------------------

    if let Err(err) = source.token_ex().await {
        warn!(error = %err, "initial token acquisition failed, retrying on demand");
    }

    // -------------------------------
    // 5. Serve
    // -------------------------------

    info!("Service starting...");
    server::server::start(settings, source).await
}
