use crate::errors::Result;
use crate::graph::BranchGraphStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persisted state of an in-flight rebase pass.
///
/// Lives in the same durable store as the branch graph, as one JSON blob so
/// a partially-written session cannot exist. A second invocation after a
/// conflict reads this back and resumes instead of restarting: branches
/// already popped off `queue` are never re-attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebaseSession {
    /// Branch checked out when the pass started; restored at the end
    pub starting_branch: String,
    /// Branches still to rebase, in schedule order
    pub queue: Vec<String>,
    /// Branch whose rebase is open in a conflicted state, if any
    pub stalled: Option<String>,
    /// When the pass began
    pub started_at: DateTime<Utc>,
}

impl RebaseSession {
    pub fn new(starting_branch: String, queue: Vec<String>) -> Self {
        Self {
            starting_branch,
            queue,
            stalled: None,
            started_at: Utc::now(),
        }
    }

    /// Persist this session in the branch graph store
    pub fn save(&self, store: &mut BranchGraphStore) -> Result<()> {
        let blob = serde_json::to_string(self)?;
        store.write_session(&blob)?;
        debug!(
            "Saved rebase session ({} branches queued)",
            self.queue.len()
        );
        Ok(())
    }

    /// Load the in-flight session, if one exists
    pub fn load(store: &BranchGraphStore) -> Result<Option<Self>> {
        match store.read_session()? {
            Some(blob) => {
                let session: Self = serde_json::from_str(&blob)?;
                debug!(
                    "Loaded rebase session started {} ({} branches left)",
                    session.started_at,
                    session.queue.len()
                );
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Remove the persisted session after a completed pass
    pub fn clear(store: &mut BranchGraphStore) -> Result<()> {
        store.clear_session()
    }
}
