use anyhow::{anyhow, Result};
use http::StatusCode;
use reqwest::Client;
use tracing::{debug, info};

use crate::cache::token::{Token, TokenResponse};
use crate::cache::token_source::{BootstrapToken, RefreshToken};
use crate::config::sources::{BootstrapConfig, EndpointConfig, GenericSourceValue};
use crate::resilience::retry::{permanent, RetrySettings};
use crate::sources::values::prepare_generic_source_value;

static GRANT_REFRESH_TOKEN: &str = "refresh_token";
static GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";

/// OAuth2 token endpoint acting as both refresher (`refresh_token` grant)
/// and bootstrapper (configured seed grant).
#[derive(Debug, Clone)]
pub struct OAuth2Endpoint {
    client: Client,
    config: EndpointConfig,
    retry: RetrySettings,
}

impl OAuth2Endpoint {
    pub fn new(client: Client, config: EndpointConfig, retry: RetrySettings) -> Self {
        Self { client, config, retry }
    }

    /// POST a grant with client credentials attached, retrying recoverable
    /// failures.
    pub async fn request_token(&self, grant_type: &str, extra: Vec<(&'static str, String)>) -> Result<Token> {
        let form = self.build_form(grant_type, extra)?;
        let headers = self.build_headers()?;
        let form = &form;
        let headers = &headers;

        debug!(grant_type, url = %self.config.token_url, "requesting token");
        let token = self
            .retry
            .run_with_retry(move || self.post_form(form, headers))
            .await?;
        info!(grant_type, expiry = ?token.expiry, "token endpoint issued token");
        Ok(token)
    }

    fn build_form(&self, grant_type: &str, extra: Vec<(&'static str, String)>) -> Result<Vec<(&'static str, String)>> {
        let mut form = vec![
            ("grant_type", grant_type.to_owned()),
            ("client_id", prepare_generic_source_value(&self.config.client_id)?),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", prepare_generic_source_value(secret)?));
        }
        if let Some(scope) = &self.config.scope {
            form.push(("scope", prepare_generic_source_value(scope)?));
        }
        form.extend(extra);
        Ok(form)
    }

    fn build_headers(&self) -> Result<Vec<(String, String)>> {
        self.config
            .headers
            .iter()
            .flatten()
            .map(|(k, v)| prepare_generic_source_value(v).map(|value| (k.to_owned(), value)))
            .collect()
    }

    async fn post_form(&self, form: &[(&'static str, String)], headers: &[(String, String)]) -> Result<Token> {
        let mut request = self.client.post(&self.config.token_url).form(form);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = anyhow!("token request failed: {}: {}", status, body.trim());
            return Err(if is_recoverable(status) { err } else { permanent(err) });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| permanent(anyhow!("invalid token response: {}", e)))?;
        body.into_token().map_err(permanent)
    }
}

/// 5xx and throttling are worth retrying, other client errors are not.
fn is_recoverable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT
}

fn refresh_token_value(value: &GenericSourceValue) -> Result<String> {
    let token = prepare_generic_source_value(value)?;
    if token.is_empty() {
        return Err(anyhow!("bootstrap refresh token is empty"));
    }
    Ok(token)
}

impl RefreshToken for OAuth2Endpoint {
    async fn refresh(&self, current: &Token) -> Result<Token> {
        if current.refresh_token.is_empty() {
            return Err(permanent(anyhow!("token has no refresh token")));
        }
        self.request_token(GRANT_REFRESH_TOKEN, vec![("refresh_token", current.refresh_token.clone())])
            .await
    }
}

impl BootstrapToken for OAuth2Endpoint {
    async fn bootstrap(&self) -> Result<Token> {
        match &self.config.bootstrap {
            BootstrapConfig::ClientCredentials => {
                self.request_token(GRANT_CLIENT_CREDENTIALS, Vec::new()).await
            }
            BootstrapConfig::RefreshToken { refresh_token } => {
                let seed = refresh_token_value(refresh_token)?;
                let mut token = self
                    .request_token(GRANT_REFRESH_TOKEN, vec![("refresh_token", seed.clone())])
                    .await?;
                // keep the seed when the endpoint does not rotate it
                if token.refresh_token.is_empty() {
                    token.refresh_token = seed;
                }
                Ok(token)
            }
        }
    }
}
