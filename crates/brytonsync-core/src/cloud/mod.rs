//! Nextcloud transfer module.
//!
//! This module provides the `WebDavClient` for listing the source folder,
//! downloading archives into the local working folder and moving processed
//! files into the done folder.

pub mod error;
pub mod listing;
pub mod webdav;

pub use error::TransferError;
pub use listing::{normalize_folder, RemoteFile};
pub use webdav::{FetchSummary, WebDavClient};
