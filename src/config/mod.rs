//! Tool-level settings
//!
//! All durable configuration lives in the repository's git config; this
//! module is the typed view over the handful of `braid.*` keys.

use crate::errors::Result;
use crate::git::freeze::DEFAULT_FREEZE_LIMIT_MB;
use crate::git::GitRepository;

/// Root reference new branches track by default (e.g. `origin/main`)
pub const ROOT_KEY: &str = "braid.root";
/// Ceiling, in megabytes, for untracked data captured by a freeze
pub const FREEZE_LIMIT_KEY: &str = "braid.freeze-limit-mb";

/// Typed view of the `braid.*` git config keys
#[derive(Debug, Clone)]
pub struct Settings {
    /// Configured root reference, if any
    pub root: Option<String>,
    /// Freeze ceiling for untracked files, in megabytes
    pub freeze_limit_mb: u64,
}

impl Settings {
    /// Read settings from the repository's git configuration
    pub fn load(repo: &GitRepository) -> Result<Self> {
        let config = repo.config()?;

        let root = match config.get_string(ROOT_KEY) {
            Ok(value) => Some(value),
            Err(e) if e.code() == git2::ErrorCode::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let freeze_limit_mb = match config.get_i64(FREEZE_LIMIT_KEY) {
            Ok(value) if value >= 0 => value as u64,
            _ => DEFAULT_FREEZE_LIMIT_MB,
        };

        Ok(Self {
            root,
            freeze_limit_mb,
        })
    }

    /// The root reference terminating the branch DAG.
    ///
    /// `braid.root` when configured, otherwise the default branch of
    /// `origin`, otherwise `origin/main`.
    pub fn resolve_root(&self, repo: &GitRepository) -> Result<String> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        if let Some(head) = repo.default_remote_branch("origin")? {
            return Ok(head);
        }
        Ok("origin/main".to_string())
    }
}
