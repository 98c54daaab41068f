pub mod bootstrapping;
pub mod caching;
pub mod error;
pub mod token;
pub mod token_source;

pub use bootstrapping::BootstrappingTokenSource;
pub use caching::CachingTokenSource;
pub use error::TokenSourceError;
pub use token::{AccessToken, IdClaims, Token, TokenResponse};
pub use token_source::{BootstrapToken, RefreshToken, TokenSource};
