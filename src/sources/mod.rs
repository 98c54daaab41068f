//! Sources module
//!
//! Concrete refresh and bootstrap collaborators backed by an OAuth2 token endpoint.

pub mod oauth2;
pub mod values;

pub use oauth2::OAuth2Endpoint;
