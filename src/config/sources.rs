use serde::Deserialize;
use std::collections::HashMap;
use crate::config::settings::SettingsConfig;


/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    pub endpoint: EndpointConfig,
}

/// ================================
/// Token endpoint
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    /// OAuth2 token endpoint used for both refresh and bootstrap grants
    pub token_url: String,
    pub client_id: GenericSourceValue,
    pub client_secret: Option<GenericSourceValue>,
    pub scope: Option<GenericSourceValue>,
    /// extra headers sent with every token request
    pub headers: Option<HashMap<String, GenericSourceValue>>,
    pub bootstrap: BootstrapConfig,
}

/// How a brand-new seed token is obtained
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "grant", rename_all = "snake_case")]
pub enum BootstrapConfig {
    /// `grant_type=client_credentials`
    ClientCredentials,
    /// exchange a long-lived, out-of-band issued refresh token
    RefreshToken { refresh_token: GenericSourceValue },
}

/// Credential value sources
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum GenericSourceValue {
    Literal {
        value: String,
    },
    FromEnv {
        from_env: String,
    },
    FromFile {
        path: String,
    },
}
