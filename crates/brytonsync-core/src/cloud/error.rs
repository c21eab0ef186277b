use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Listing {folder} failed (status {status}): {body}")]
    List {
        folder: String,
        status: u16,
        body: String,
    },

    #[error("Download of {file} failed (status {status})")]
    Download { file: String, status: u16 },

    #[error("Move of {file} failed (status {status}): {body}")]
    Move {
        file: String,
        status: u16,
        body: String,
    },

    #[error("Invalid request: {0}")]
    Request(String),

    #[error("Malformed multistatus response: {0}")]
    InvalidListing(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Could not write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    pub(crate) fn body(body: &str) -> String {
        ApiError::truncate_body(body)
    }
}
