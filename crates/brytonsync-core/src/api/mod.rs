//! REST API client module for Ride with GPS.
//!
//! This module provides the `ApiClient` for exchanging credentials for an
//! auth token, probing a cached token, listing routes and uploading trips.
//!
//! Every request carries the application API key in `x-rwgps-api-key`;
//! authenticated requests add the user's token in `x-rwgps-auth-token`.

pub mod client;
pub mod error;

pub use client::{ApiClient, RouteSummary, RoutesPage};
pub use error::ApiError;
