use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenSourceError {
    /// No seed token was ever supplied to this source.
    #[error("token not initialized")]
    Uninitialized,

    #[error("token refresh failed: {0:#}")]
    RefreshFailed(#[source] anyhow::Error),

    /// The token was refreshed in memory but could not be stored.
    #[error("token persist failed: {0:#}")]
    PersistFailed(#[source] anyhow::Error),

    #[error("token bootstrap failed: {0:#}")]
    BootstrapFailed(#[source] anyhow::Error),

    #[error("rebuilt token source failed: {0}")]
    InnerSourceFailed(#[source] Box<TokenSourceError>),
}
