//! Pushes extracted activity files to Ride with GPS.

use std::path::Path;

use tracing::{info, warn};

use crate::api::ApiClient;
use crate::notify::Notifier;
use crate::workspace::files_with_extension;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
}

/// Upload every `.fit` in `folder`, one at a time, in file-name order.
///
/// Each outcome is announced through `notifier`. Nothing here aborts the
/// batch: a rejected or failed upload is logged, notified and skipped.
pub async fn upload_all(folder: &Path, api: &ApiClient, notifier: &Notifier) -> UploadSummary {
    let mut summary = UploadSummary::default();

    let files = match files_with_extension(folder, &["fit"]) {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, path = %folder.display(), "Could not scan for activity files");
            return summary;
        }
    };

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(file = %name, "Uploading");

        match api.upload_trip(&path).await {
            Ok(status) => {
                info!(file = %name, status = %status, "Upload accepted");
                notifier.send(&format!("Successful upload of {}", name)).await;
                summary.uploaded.push(name);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Upload failed");
                notifier.send(&format!("Failed upload of {}", name)).await;
                summary.failed.push(name);
            }
        }
    }

    summary
}
