//! brytonsync core - moves zipped ride files from a Nextcloud folder to
//! Ride with GPS.
//!
//! A run ([`pipeline::SyncJob::run`]) makes sure a valid Ride with GPS token is
//! cached, pulls every `.zip` from the configured WebDAV folder, moves the
//! originals into the done folder, extracts the `.fit` files, uploads each one
//! and announces the outcome on an ntfy topic.

pub mod api;
pub mod archive;
pub mod auth;
pub mod cloud;
pub mod config;
pub mod notify;
pub mod pipeline;
pub mod upload;
pub mod workspace;

pub use config::{Config, ConfigError};
pub use pipeline::{RunReport, SyncJob};
