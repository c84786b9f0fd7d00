use crate::errors::{BraidError, Result};
use crate::git::GitRepository;
use crate::graph::{Branch, BranchGraph};
use tracing::debug;

const UPSTREAM_FIELD: &str = "braid-upstream";
const BASE_FIELD: &str = "braid-base";
const DORMANT_FIELD: &str = "dormant";

/// Config key under which an in-flight rebase session is persisted.
const SESSION_KEY: &str = "braid.rebase-session";

/// Persists per-branch metadata (upstream, base marker, dormant flag) in the
/// repository's git configuration and reconstructs the dependency graph on
/// demand.
///
/// Every mutation is written through immediately; no in-memory-only state
/// survives process exit, so a crashed session can be picked up by a fresh
/// process reading the same store. Acyclicity is enforced by the writers
/// (branch creation, reparenting), not here.
pub struct BranchGraphStore {
    config: git2::Config,
}

impl BranchGraphStore {
    /// Open the store backing the given repository
    pub fn open(repo: &GitRepository) -> Result<Self> {
        Ok(Self {
            config: repo.config()?,
        })
    }

    fn key(name: &str, field: &str) -> String {
        format!("branch.{}.{}", name, field)
    }

    fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_flag(&self, key: &str) -> Result<bool> {
        match self.config.get_bool(key) {
            Ok(value) => Ok(value),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match self.config.remove(key) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load one branch's metadata; None when the branch is not tracked
    pub fn get(&self, name: &str) -> Result<Option<Branch>> {
        let upstream = match self.get_str(&Self::key(name, UPSTREAM_FIELD))? {
            Some(upstream) => upstream,
            None => return Ok(None),
        };
        let base = self.get_str(&Self::key(name, BASE_FIELD))?;
        let dormant = self.get_flag(&Self::key(name, DORMANT_FIELD))?;

        Ok(Some(Branch {
            name: name.to_string(),
            upstream,
            base,
            dormant,
        }))
    }

    /// Write one branch's metadata through to the config store
    pub fn set(&mut self, branch: &Branch) -> Result<()> {
        self.config
            .set_str(&Self::key(&branch.name, UPSTREAM_FIELD), &branch.upstream)?;
        match &branch.base {
            Some(base) => self
                .config
                .set_str(&Self::key(&branch.name, BASE_FIELD), base)?,
            None => self.remove(&Self::key(&branch.name, BASE_FIELD))?,
        }
        if branch.dormant {
            self.config
                .set_bool(&Self::key(&branch.name, DORMANT_FIELD), true)?;
        } else {
            self.remove(&Self::key(&branch.name, DORMANT_FIELD))?;
        }
        debug!("Stored branch metadata for '{}'", branch.name);
        Ok(())
    }

    /// Rewrite only the upstream edge of a tracked branch
    pub fn set_upstream(&mut self, name: &str, upstream: &str) -> Result<()> {
        self.config
            .set_str(&Self::key(name, UPSTREAM_FIELD), upstream)?;
        Ok(())
    }

    /// Rewrite only the base marker of a tracked branch
    pub fn set_base(&mut self, name: &str, base: &str) -> Result<()> {
        self.config.set_str(&Self::key(name, BASE_FIELD), base)?;
        Ok(())
    }

    /// Toggle the dormant flag of a tracked branch
    pub fn set_dormant(&mut self, name: &str, dormant: bool) -> Result<()> {
        if dormant {
            self.config
                .set_bool(&Self::key(name, DORMANT_FIELD), true)?;
        } else {
            self.remove(&Self::key(name, DORMANT_FIELD))?;
        }
        Ok(())
    }

    /// Drop a branch from the store entirely
    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.remove(&Self::key(name, UPSTREAM_FIELD))?;
        self.remove(&Self::key(name, BASE_FIELD))?;
        self.remove(&Self::key(name, DORMANT_FIELD))?;
        debug!("Removed branch metadata for '{}'", name);
        Ok(())
    }

    /// Reconstruct the full dependency graph from the store
    pub fn list_all(&self) -> Result<BranchGraph> {
        let mut names = Vec::new();
        {
            let glob = format!(r"^branch\..*\.{}$", UPSTREAM_FIELD);
            let mut entries = self.config.entries(Some(&glob))?;
            while let Some(entry) = entries.next() {
                let entry = entry?;
                let Some(key) = entry.name() else { continue };
                if let Some(name) = key
                    .strip_prefix("branch.")
                    .and_then(|k| k.strip_suffix(&format!(".{}", UPSTREAM_FIELD)))
                {
                    names.push(name.to_string());
                }
            }
        }

        let mut branches = Vec::with_capacity(names.len());
        for name in names {
            if let Some(branch) = self.get(&name)? {
                branches.push(branch);
            }
        }
        Ok(BranchGraph::from_branches(branches))
    }

    /// Read the persisted rebase-session blob, if a session is in flight
    pub fn read_session(&self) -> Result<Option<String>> {
        self.get_str(SESSION_KEY)
    }

    /// Persist the rebase-session blob
    pub fn write_session(&mut self, blob: &str) -> Result<()> {
        self.config.set_str(SESSION_KEY, blob)?;
        Ok(())
    }

    /// Clear the rebase-session entry after a completed pass
    pub fn clear_session(&mut self) -> Result<()> {
        self.remove(SESSION_KEY)
    }

    /// Error helper for callers that require a tracked branch
    pub fn require(&self, name: &str) -> Result<Branch> {
        self.get(name)?.ok_or_else(|| {
            BraidError::branch(format!(
                "Branch '{}' is not tracked; create it with `braid new-branch` \
                 or set its upstream in git config",
                name
            ))
        })
    }
}
