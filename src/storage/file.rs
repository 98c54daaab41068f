use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::cache::token::Token;
use crate::storage::Storage;

/// JSON file store. Writes go to a sibling `.tmp` file that is renamed over
/// the target, so readers never see a half-written token.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Writes `content` to a fresh file that is only ever readable by the owner.
/// A leftover file is removed first, since `mode` only applies on creation.
async fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(err) if err.kind() != ErrorKind::NotFound => return Err(err),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}

impl Storage for FileStorage {
    async fn save(&self, token: &Token) -> Result<()> {
        let content = serde_json::to_vec_pretty(token)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create directory '{}'", parent.display()))?;
        }

        let tmp = self.path.with_extension("tmp");
        write_private(&tmp, &content)
            .await
            .with_context(|| format!("write '{}'", tmp.display()))?;

        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename '{}' to '{}'", tmp.display(), self.path.display()))?;

        info!(path = %self.path.display(), "token stored");
        Ok(())
    }

    async fn load(&self) -> Result<Option<Token>> {
        match fs::read(&self.path).await {
            Ok(content) => {
                let token = serde_json::from_slice::<Token>(&content)
                    .with_context(|| format!("invalid token file '{}'", self.path.display()))?;
                debug!(path = %self.path.display(), "token loaded");
                Ok(Some(token))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read '{}'", self.path.display())),
        }
    }
}
