//! The local working folder.
//!
//! Archives are downloaded and extracted into one flat folder that is emptied
//! of archive and activity files before and after every run.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Extensions removed by [`clean`].
pub const WORK_EXTENSIONS: [&str; 2] = ["zip", "fit"];

/// Regular files directly inside `folder` whose extension matches one of
/// `extensions` (case-insensitive), sorted by path.
///
/// A folder that does not exist yields an empty list.
pub fn files_with_extension(folder: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                extensions.iter().any(|want| ext.eq_ignore_ascii_case(want))
            })
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Delete every archive and activity file in `folder`. Returns how many
/// files were removed. Files that cannot be removed are logged and skipped.
pub fn clean(folder: &Path) -> usize {
    let files = match files_with_extension(folder, &WORK_EXTENSIONS) {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, path = %folder.display(), "Could not scan working folder");
            return 0;
        }
    };

    let mut removed = 0;
    for file in files {
        match std::fs::remove_file(&file) {
            Ok(()) => {
                debug!(path = %file.display(), "Removed");
                removed += 1;
            }
            Err(e) => warn!(error = %e, path = %file.display(), "Could not remove file"),
        }
    }
    removed
}

/// Empties the working folder when dropped, so cleanup happens on every way
/// out of a run, including early returns and unwinding panics.
pub struct CleanupGuard {
    folder: PathBuf,
    finished: bool,
}

impl CleanupGuard {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            finished: false,
        }
    }

    /// Clean now and report how many files went.
    pub fn finish(mut self) -> usize {
        self.finished = true;
        let removed = clean(&self.folder);
        info!(removed, "Run complete, tidying up");
        removed
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.finished {
            let removed = clean(&self.folder);
            warn!(removed, "Run aborted, tidied up working folder");
        }
    }
}
