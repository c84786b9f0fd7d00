use crate::cli::output::Output;
use crate::config::Settings;
use crate::errors::{BraidError, Result};
use crate::git::GitRepository;
use crate::graph::BranchGraphStore;
use crate::stack::{UpdateOptions, UpdateResult, UpdateRunner};

/// Run a full rebase pass over the tracked branch graph
pub fn run(options: UpdateOptions) -> Result<()> {
    let repo = GitRepository::open_cwd()?;
    let store = BranchGraphStore::open(&repo)?;
    let settings = Settings::load(&repo)?;

    let mut runner = UpdateRunner::new(&repo, store, settings, options);
    let result = runner.run()?;
    print_summary(&result);

    if !result.failed.is_empty() {
        return Err(BraidError::branch(format!(
            "{} branch(es) could not be updated: {}. Rerun `braid rebase-update` \
             after resolving, or rebase them by hand.",
            result.failed.len(),
            result.failed.join(", ")
        )));
    }
    Ok(())
}

fn print_summary(result: &UpdateResult) {
    if result.is_noop() && result.failed.is_empty() {
        Output::success("All branches are up to date.");
        return;
    }

    Output::section("Rebase pass complete");
    if !result.rebased.is_empty() {
        Output::success(format!(
            "Rebased {}: {}",
            result.rebased.len(),
            result.rebased.join(", ")
        ));
    }
    if !result.squashed.is_empty() {
        Output::success(format!(
            "Squash fallback applied to: {}",
            result.squashed.join(", ")
        ));
    }
    if !result.up_to_date.is_empty() {
        Output::sub_item(format!("Already current: {}", result.up_to_date.join(", ")));
    }
    for pruned in &result.pruned {
        if pruned.reparented.is_empty() {
            Output::sub_item(format!("Pruned empty branch '{}'", pruned.name));
        } else {
            Output::sub_item(format!(
                "Pruned empty branch '{}'; moved {} onto '{}'",
                pruned.name,
                pruned.reparented.join(", "),
                pruned.upstream
            ));
        }
    }
    if !result.failed.is_empty() {
        Output::warning(format!("Failed: {}", result.failed.join(", ")));
    }
}
