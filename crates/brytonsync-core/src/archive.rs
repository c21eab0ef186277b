//! Archive extraction into the working folder.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::workspace::files_with_extension;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Could not open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not extract {path}: {source}")]
    Zip {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Extract one archive into `dest`, overwriting same-named entries.
///
/// Entry names that would land outside `dest` are skipped.
pub fn expand(archive: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let io_err = |path: &Path| {
        let path = path.display().to_string();
        move |source| ArchiveError::Io { path, source }
    };
    let zip_err = |source| ArchiveError::Zip {
        path: archive.display().to_string(),
        source,
    };

    let file = File::open(archive).map_err(io_err(archive))?;
    let mut zip = zip::ZipArchive::new(file).map_err(zip_err)?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(zip_err)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(io_err(&out_path))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let mut out = File::create(&out_path).map_err(io_err(&out_path))?;
        io::copy(&mut entry, &mut out).map_err(io_err(&out_path))?;
        written += 1;
    }
    Ok(written)
}

/// Extract every `.zip` in `folder` into the same folder.
///
/// Archives are processed in file-name order; a broken archive is logged and
/// skipped. Returns the archives that expanded cleanly.
pub fn expand_all(folder: &Path) -> Vec<PathBuf> {
    let archives = match files_with_extension(folder, &["zip"]) {
        Ok(archives) => archives,
        Err(e) => {
            warn!(error = %e, path = %folder.display(), "Could not scan for archives");
            return Vec::new();
        }
    };

    let mut expanded = Vec::new();
    for archive in archives {
        match expand(&archive, folder) {
            Ok(entries) => {
                info!(archive = %archive.display(), entries, "Extracted");
                expanded.push(archive);
            }
            Err(e) => warn!(error = %e, "Skipping archive"),
        }
    }
    expanded
}
