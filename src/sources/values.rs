use anyhow::{anyhow, Result};
use std::{env, fs};

use crate::config::sources::GenericSourceValue;

/// Resolve a configured credential value. Env and file values are read on
/// every call so rotated secrets are picked up without a restart.
pub fn prepare_generic_source_value(value: &GenericSourceValue) -> Result<String> {
    match value {
        GenericSourceValue::Literal { value } => Ok(value.to_owned()),
        GenericSourceValue::FromEnv { from_env } => env::var(from_env)
            .map_err(|err| anyhow!("env '{}': {}", from_env, err)),
        GenericSourceValue::FromFile { path } => fs::read_to_string(path)
            .map_err(|err| anyhow!("file '{}': {}", path, err))
            .map(|res| res.trim().to_string()),
    }
}
