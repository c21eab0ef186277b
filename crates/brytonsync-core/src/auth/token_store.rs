use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::AuthToken;

/// File-backed cache for the one auth token the process uses.
///
/// The format is the bare token string, nothing else, so files written by
/// earlier tooling keep working.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token. A missing or blank file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<AuthToken>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token file {}", self.path.display()))?;

        // Last non-empty line wins
        let token = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last();

        Ok(token.map(|t| AuthToken {
            token: t.to_string(),
            user: None,
        }))
    }

    /// Overwrite the cached token.
    pub fn save(&self, token: &AuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, &token.token)
            .with_context(|| format!("Failed to write token file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str) -> AuthToken {
        AuthToken {
            token: value.to_string(),
            user: None,
        }
    }

    #[test]
    fn test_load_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("rwGPSToken.key"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_bare_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rwGPSToken.key");
        let store = TokenStore::new(&path);

        store.save(&token("abc123")).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc123");
        assert_eq!(store.load().unwrap().unwrap().token, "abc123");
    }

    #[test]
    fn test_save_overwrites_previous_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("rwGPSToken.key"));

        store.save(&token("old-token-with-longer-text")).unwrap();
        store.save(&token("new")).unwrap();

        assert_eq!(store.load().unwrap().unwrap().token, "new");
    }

    #[test]
    fn test_load_trims_and_takes_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rwGPSToken.key");
        std::fs::write(&path, "first\n  second  \n\n").unwrap();

        let loaded = TokenStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded.token, "second");
        assert!(loaded.user.is_none());
    }

    #[test]
    fn test_load_blank_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rwGPSToken.key");
        std::fs::write(&path, " \n\n").unwrap();

        assert!(TokenStore::new(&path).load().unwrap().is_none());
    }
}
