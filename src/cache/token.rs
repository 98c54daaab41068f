use anyhow::{anyhow, Result};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Full credential: short-lived access token, its expiry and the long-lived
/// refresh token. `id_token` carries optional identity claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id_token: String,
}

/// Reduced bearer view of a [`Token`], without renewal material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expiry: Option<DateTime<Utc>>,
}

/// Claims decoded from the `id_token` payload
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct IdClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Token {
    pub fn new(access_token: impl Into<String>, expiry: DateTime<Utc>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: String::new(),
            expiry: Some(expiry),
            refresh_token: refresh_token.into(),
            id_token: String::new(),
        }
    }

    /// True when the token expires in less than `margin`. A token without
    /// expiry is always due.
    pub fn expires_within(&self, margin: Duration) -> bool {
        match self.expiry {
            Some(expiry) => expiry - Utc::now() < margin,
            None => true,
        }
    }

    /// Override-merge: a field is replaced only when `newer` carries a
    /// non-empty value, so a refresh response without `refresh_token` keeps
    /// the stored one.
    pub fn merge(&mut self, newer: Token) {
        let Token {
            access_token,
            token_type,
            expiry,
            refresh_token,
            id_token,
        } = newer;

        override_non_empty(&mut self.access_token, access_token);
        override_non_empty(&mut self.token_type, token_type);
        override_non_empty(&mut self.refresh_token, refresh_token);
        override_non_empty(&mut self.id_token, id_token);
        if expiry.is_some() {
            self.expiry = expiry;
        }
    }

    pub fn access(&self) -> AccessToken {
        AccessToken {
            access_token: self.access_token.clone(),
            token_type: self.token_type.clone(),
            expiry: self.expiry,
        }
    }

    /// Decode the payload segment of `id_token` without verifying the signature.
    pub fn id_claims(&self) -> Result<IdClaims> {
        if self.id_token.is_empty() {
            return Err(anyhow!("token carries no id_token"));
        }
        let parts: Vec<&str> = self.id_token.split('.').collect();
        if parts.len() != 3 {
            return Err(anyhow!("invalid JWT format"));
        }

        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .map_err(|e| anyhow!("base64 decode error: {}", e))?;

        serde_json::from_slice::<IdClaims>(&decoded)
            .map_err(|e| anyhow!("invalid JWT payload: {}", e))
    }
}

fn override_non_empty(field: &mut String, value: String) {
    if !value.is_empty() {
        *field = value;
    }
}

impl From<Token> for AccessToken {
    fn from(token: Token) -> Self {
        Self {
            access_token: token.access_token,
            token_type: token.token_type,
            expiry: token.expiry,
        }
    }
}

/// Token endpoint response body (RFC 6749 section 5.1)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Fails when `expires_in` does not fit a timestamp.
    pub fn into_token(self) -> Result<Token> {
        let expiry = match self.expires_in {
            Some(secs) => Some(
                Duration::try_seconds(secs)
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                    .ok_or_else(|| anyhow!("expires_in out of range: {}", secs))?,
            ),
            None => None,
        };

        Ok(Token {
            access_token: self.access_token,
            token_type: self.token_type,
            expiry,
            refresh_token: self.refresh_token.unwrap_or_default(),
            id_token: self.id_token.unwrap_or_default(),
        })
    }
}
