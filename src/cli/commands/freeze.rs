use crate::cli::output::Output;
use crate::config::Settings;
use crate::errors::Result;
use crate::git::{FreezeOutcome, Freezer, GitRepository};

/// Snapshot uncommitted work into synthetic commits
pub fn run_freeze() -> Result<()> {
    let repo = GitRepository::open_cwd()?;
    let settings = Settings::load(&repo)?;

    let freezer = Freezer::new(&repo, settings.freeze_limit_mb);
    match freezer.freeze()? {
        FreezeOutcome::Clean => {
            Output::info("Working tree is clean; nothing to freeze.");
        }
        FreezeOutcome::Frozen { commits } => {
            Output::success(format!(
                "Froze uncommitted work into {} snapshot commit(s). \
                 Run `braid thaw` to restore it.",
                commits
            ));
        }
    }
    Ok(())
}

/// Restore the snapshot taken by freeze
pub fn run_thaw() -> Result<()> {
    let repo = GitRepository::open_cwd()?;
    let settings = Settings::load(&repo)?;

    Freezer::new(&repo, settings.freeze_limit_mb).thaw()?;
    Output::success("Restored uncommitted work.");
    Ok(())
}
