//! WebDAV client for the Nextcloud side of the sync.
//!
//! Listing uses `PROPFIND` with `Depth: 1`, downloads are plain `GET`s of the
//! listed hrefs and processed files are relocated with a server-side `MOVE`.
//! Every request carries basic auth.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Method, StatusCode};
use tracing::{info, warn};

use crate::config::CloudConfig;

use super::listing::{normalize_folder, parse_hrefs, select_archives, RemoteFile};
use super::TransferError;

/// Nextcloud serves the user's files below this path.
const WEBDAV_PATH: &str = "/remote.php/webdav";

/// Outcome of one discover-and-fetch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Archives seen in the listing, whether or not they transferred
    pub discovered: usize,
    pub downloaded: Vec<PathBuf>,
    pub moved: usize,
    pub failed: usize,
}

fn dav_method(name: &[u8]) -> Result<Method, TransferError> {
    Method::from_bytes(name).map_err(|e| TransferError::Request(e.to_string()))
}

#[derive(Clone)]
pub struct WebDavClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl WebDavClient {
    pub fn new(cloud: &CloudConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: cloud.base_url.trim_end_matches('/').to_string(),
            username: cloud.username.clone(),
            password: cloud.password.clone(),
        })
    }

    fn webdav_base(&self) -> String {
        format!("{}{}", self.base_url, WEBDAV_PATH)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// List the archives directly inside `folder`, in listing order.
    pub async fn list_archives(&self, folder: &str) -> Result<Vec<RemoteFile>, TransferError> {
        let folder = normalize_folder(folder);
        let url = format!("{}{}", self.webdav_base(), folder);
        let propfind = dav_method(b"PROPFIND")?;

        let response = self.request(propfind, &url).header("depth", "1").send().await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::MULTI_STATUS {
            return Err(TransferError::List {
                folder,
                status: status.as_u16(),
                body: TransferError::body(&body),
            });
        }

        let hrefs = parse_hrefs(&body)?;
        Ok(select_archives(&hrefs))
    }

    /// Fetch `file` into `local_folder` under its decoded basename.
    pub async fn download(&self, file: &RemoteFile, local_folder: &Path) -> Result<PathBuf, TransferError> {
        let url = format!("{}{}", self.base_url, file.href);
        let response = self.request(Method::GET, &url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransferError::Download {
                file: file.file_name(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let local_path = local_folder.join(file.file_name());
        tokio::fs::write(&local_path, &bytes)
            .await
            .map_err(|source| TransferError::Io {
                path: local_path.display().to_string(),
                source,
            })?;

        Ok(local_path)
    }

    /// Destination URL for `file` once processed.
    ///
    /// The done folder is nested under the source folder.
    pub fn done_destination(&self, file: &RemoteFile, remote_folder: &str, done_folder: &str) -> String {
        let source = normalize_folder(remote_folder);
        let done = normalize_folder(done_folder);
        format!(
            "{}{}{}{}",
            self.webdav_base(),
            source,
            done.trim_start_matches('/'),
            file.encoded_name()
        )
    }

    /// Server-side move of `file` into the done folder.
    pub async fn mark_done(
        &self,
        file: &RemoteFile,
        remote_folder: &str,
        done_folder: &str,
    ) -> Result<(), TransferError> {
        let url = format!("{}{}", self.base_url, file.href);
        let destination = self.done_destination(file, remote_folder, done_folder);
        let method = dav_method(b"MOVE")?;

        let response = self
            .request(method, &url)
            .header("Destination", destination)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CREATED || status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransferError::Move {
                file: file.file_name(),
                status: status.as_u16(),
                body: TransferError::body(&body),
            })
        }
    }

    /// List, download and relocate every archive in the source folder.
    ///
    /// Per-file failures are logged and skipped. A file is only moved after
    /// its download succeeded, and a failed move keeps the local copy.
    pub async fn discover_and_fetch(
        &self,
        remote_folder: &str,
        done_folder: &str,
        local_folder: &Path,
    ) -> FetchSummary {
        let mut summary = FetchSummary::default();
        let folder = normalize_folder(remote_folder);

        if let Err(e) = tokio::fs::create_dir_all(local_folder).await {
            warn!(error = %e, path = %local_folder.display(), "Could not create local folder");
            return summary;
        }

        let files = match self.list_archives(&folder).await {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Error listing remote folder");
                return summary;
            }
        };

        if files.is_empty() {
            info!("Found no zip files in {}", folder);
            return summary;
        }
        summary.discovered = files.len();
        info!("Found {} ZIP file(s)", files.len());

        for file in &files {
            let name = file.file_name();
            info!(file = %name, "Downloading");

            let local_path = match self.download(file, local_folder).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(file = %name, error = %e, "Failed to download");
                    summary.failed += 1;
                    continue;
                }
            };
            info!(file = %name, path = %local_path.display(), "Successfully downloaded");
            summary.downloaded.push(local_path);

            match self.mark_done(file, &folder, done_folder).await {
                Ok(()) => {
                    info!(file = %name, "Moved to {}", normalize_folder(done_folder));
                    summary.moved += 1;
                }
                Err(e) => warn!(file = %name, error = %e, "Error moving file"),
            }
        }

        summary
    }
}
