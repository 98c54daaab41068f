//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks retry, safety margin, server, metrics and logging settings
//! - Checks the token endpoint and every credential value source

use std::path::Path;
use tracing::{error, info};

use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::config::sources::{BootstrapConfig, EndpointConfig, GenericSourceValue, ServiceConfig};
use crate::observability::metrics::get_metrics;

/// One hour; longer backoff pauses are a misconfiguration
const MAX_RETRY_DELAY_MS: u64 = 3_600_000;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_endpoint(&cfg.endpoint, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &settings.retry {
        validate_retry("settings.retry", retry, errors);
    }

    // safety margin sane bounds
    if let Some(s) = settings.safety_margin_seconds {
        if s < 0 {
            errors.push(format!("settings.safety_margin_seconds ({}) must not be negative", s));
        } else if s > 60 * 60 * 24 {
            errors.push(format!(
                "settings.safety_margin_seconds ({}) is unreasonably large",
                s
            ));
        }
    }

    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be a valid port number",
            settings.server.port
        ));
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }

    if let Some(storage) = &settings.storage {
        if storage.path.trim().is_empty() {
            errors.push("settings.storage.path must not be empty".to_string());
        } else if Path::new(&storage.path).file_name().is_none() {
            errors.push(format!("settings.storage.path '{}' must name a file", storage.path));
        }
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if let Some(attempts) = retry.attempts {
        if attempts == 0 {
            errors.push(format!("{}.attempts must be > 0", path));
        }
    }
    for (field, value) in [("base_delay_ms", retry.base_delay_ms), ("max_delay_ms", retry.max_delay_ms)] {
        if value.is_some_and(|ms| ms > MAX_RETRY_DELAY_MS) {
            errors.push(format!("{}.{} must be <= {}", path, field, MAX_RETRY_DELAY_MS));
        }
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "{}.max_delay_ms ({}) must be >= base_delay_ms ({})",
                path, max, base
            ));
        }
    }
    if let Some(0) = retry.max_elapsed_ms {
        errors.push(format!("{}.max_elapsed_ms must be > 0", path));
    }
}

/// ENDPOINT VALIDATION
fn validate_endpoint(endpoint: &EndpointConfig, errors: &mut Vec<String>) {
    let url = endpoint.token_url.trim();
    if url.is_empty() {
        errors.push("endpoint.token_url cannot be empty".to_string());
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("endpoint.token_url '{}' must be an http(s) URL", url));
    }

    validate_generic_source_value("endpoint.client_id", &endpoint.client_id, errors);
    if let Some(secret) = &endpoint.client_secret {
        validate_generic_source_value("endpoint.client_secret", secret, errors);
    }
    if let Some(scope) = &endpoint.scope {
        validate_generic_source_value("endpoint.scope", scope, errors);
    }
    if let Some(headers) = &endpoint.headers {
        for (k, v) in headers {
            if k.trim().is_empty() {
                errors.push("endpoint.headers contains an empty header name".to_string());
            }
            validate_generic_source_value(&format!("endpoint.headers.{}", k), v, errors);
        }
    }

    match &endpoint.bootstrap {
        BootstrapConfig::ClientCredentials => {
            if endpoint.client_secret.is_none() {
                errors.push(
                    "endpoint.client_secret is required for bootstrap grant 'client_credentials'".to_string(),
                );
            }
        }
        BootstrapConfig::RefreshToken { refresh_token } => {
            validate_generic_source_value("endpoint.bootstrap.refresh_token", refresh_token, errors);
        }
    }
}

fn validate_generic_source_value(path: &str, value: &GenericSourceValue, errors: &mut Vec<String>) {
    match value {
        GenericSourceValue::Literal { value } => {
            if value.is_empty() {
                errors.push(format!("{}: literal value must not be empty", path));
            }
        }
        GenericSourceValue::FromEnv { from_env } => {
            if from_env.trim().is_empty() {
                errors.push(format!("{}: from_env must name a variable", path));
            }
        }
        GenericSourceValue::FromFile { path: file } => {
            if !Path::new(file).is_absolute() {
                errors.push(format!("{}: path '{}' must be absolute", path, file));
            }
        }
    }
}
