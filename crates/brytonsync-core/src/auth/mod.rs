//! Authentication module for the Ride with GPS token lifecycle.
//!
//! This module provides:
//! - `TokenStore`: the on-disk cache holding a single bare token string
//! - `Session`: load, probe and refresh logic producing the token for a run
//!
//! Tokens carry no expiry; a cached token is trusted until a probe fails.

pub mod session;
pub mod token_store;

pub use session::{AuthToken, Session, TokenSource, TokenUser};
pub use token_store::TokenStore;
