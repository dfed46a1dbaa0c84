//! # OpenID Connect Discovery
//!
//! Retrieval of the provider configuration document. The document supplies
//! the issuer (expected `iss`), the authorization and token endpoints and the
//! JWKS endpoint used by the verifier.
//!
//! ## Security
//!
//! - HTTPS required, HTTP allowed only for loopback hosts
//! - Request timeout from the provider configuration (default 10 seconds)
//! - Every endpoint in the document must be an absolute URL
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use oidc_idtoken::discovery::DiscoveryFetcher;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = DiscoveryFetcher::new(Duration::from_secs(10))?;
//! let document = fetcher
//!     .fetch("https://idp.example.com/.well-known/openid-configuration")
//!     .await?;
//!
//! println!("JWKS endpoint: {}", document.jwks_uri);
//! # Ok(())
//! # }
//! ```

mod fetcher;
mod types;

pub use fetcher::DiscoveryFetcher;
pub use types::{DiscoveryDocument, DiscoveryError};
