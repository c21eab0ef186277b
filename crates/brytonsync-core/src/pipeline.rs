//! One sync run from start to finish.
//!
//! ```text
//! Init -> EnsureToken -> Discover -> (no files) ------------------> Cleanup
//!                                 -> (files) -> Expand -> Upload -> Cleanup
//! ```
//!
//! Cleanup runs on every path. It is owned by a [`CleanupGuard`] created
//! right after the initial sweep, so an early return or a panic in any stage
//! still empties the working folder.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::api::{ApiClient, RoutesPage};
use crate::archive;
use crate::auth::{AuthToken, Session, TokenSource, TokenStore};
use crate::cloud::WebDavClient;
use crate::config::Config;
use crate::notify::Notifier;
use crate::upload;
use crate::workspace::{self, CleanupGuard};

/// What happened during one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `None` when no usable token could be obtained.
    pub token_source: Option<TokenSource>,
    pub removed_before: usize,
    pub discovered: usize,
    pub downloaded: usize,
    pub moved: usize,
    pub extracted: usize,
    pub uploaded: Vec<String>,
    pub upload_failed: Vec<String>,
    pub removed_after: usize,
}

impl RunReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            token_source: None,
            removed_before: 0,
            discovered: 0,
            downloaded: 0,
            moved: 0,
            extracted: 0,
            uploaded: Vec::new(),
            upload_failed: Vec::new(),
            removed_after: 0,
        }
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or(0)
    }
}

pub struct SyncJob<'a> {
    config: &'a Config,
    api: ApiClient,
    webdav: WebDavClient,
    notifier: Notifier,
}

impl<'a> SyncJob<'a> {
    pub fn new(config: &'a Config) -> Result<Self> {
        let api = ApiClient::new(&config.rwgps_base_url, &config.rwgps.api_key, config.http_timeout)
            .context("Failed to build Ride with GPS client")?;
        let webdav = WebDavClient::new(&config.cloud, config.http_timeout)
            .context("Failed to build WebDAV client")?;
        let notifier = Notifier::new(&config.ntfy_base_url, &config.notify_topic, config.http_timeout)
            .context("Failed to build notifier")?;

        Ok(Self {
            config,
            api,
            webdav,
            notifier,
        })
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Load the cached token, probe it, and fetch a replacement if needed.
    pub async fn ensure_token(&self) -> Result<(AuthToken, TokenSource)> {
        let mut session = Session::new(TokenStore::new(&self.config.token_file));
        let source = session.ensure_token(&self.api, &self.config.rwgps).await?;
        let token = session
            .data
            .take()
            .context("Session reported success without holding a token")?;
        Ok((token, source))
    }

    /// Fetch a page of the account's routes with a validated token.
    pub async fn list_routes(&self, page: u32) -> Result<RoutesPage> {
        let (token, _) = self.ensure_token().await?;
        let page = self.api.with_token(token.token).list_routes(page).await?;
        Ok(page)
    }

    /// Execute a full sync pass. Never fails; problems are logged and
    /// reflected in the report.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::new();
        let folder = &self.config.local_folder;

        report.removed_before = workspace::clean(folder);
        let guard = CleanupGuard::new(folder);

        self.run_stages(&mut report).await;

        report.removed_after = guard.finish();
        report.finished_at = Some(Utc::now());
        info!(
            discovered = report.discovered,
            downloaded = report.downloaded,
            moved = report.moved,
            extracted = report.extracted,
            uploaded = report.uploaded.len(),
            failed = report.upload_failed.len(),
            elapsed_ms = report.elapsed_ms(),
            "Run complete"
        );
        report
    }

    async fn run_stages(&self, report: &mut RunReport) {
        let token = match self.ensure_token().await {
            Ok((token, source)) => {
                report.token_source = Some(source);
                token
            }
            Err(e) => {
                // Leave remote files where they are so the next run picks them up
                let reason = format!("{:#}", e);
                error!(error = %reason, "No usable auth token, skipping transfer");
                return;
            }
        };

        let cloud = &self.config.cloud;
        let fetch = self
            .webdav
            .discover_and_fetch(&cloud.remote_folder, &cloud.done_folder, &self.config.local_folder)
            .await;
        report.discovered = fetch.discovered;
        report.downloaded = fetch.downloaded.len();
        report.moved = fetch.moved;

        if fetch.discovered == 0 {
            return;
        }

        report.extracted = archive::expand_all(&self.config.local_folder).len();

        let api = self.api.with_token(token.token);
        let uploads = upload::upload_all(&self.config.local_folder, &api, &self.notifier).await;
        report.uploaded = uploads.uploaded;
        report.upload_failed = uploads.failed;
    }
}
