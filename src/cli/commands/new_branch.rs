use crate::cli::output::Output;
use crate::config::Settings;
use crate::errors::{BraidError, Result};
use crate::git::GitRepository;
use crate::graph::BranchGraphStore;
use crate::stack::{create_branch, NewBranchRequest, UpstreamPolicy};

/// Create a new tracked branch under one of the upstream policies
pub fn run(
    name: String,
    upstream: Option<String>,
    upstream_current: bool,
    lkgr: bool,
    inject_current: bool,
) -> Result<()> {
    let flags_set = [
        upstream.is_some(),
        upstream_current,
        lkgr,
        inject_current,
    ]
    .iter()
    .filter(|set| **set)
    .count();
    if flags_set > 1 {
        return Err(BraidError::validation(
            "--upstream, --upstream_current, --lkgr, and --inject_current \
             are mutually exclusive",
        ));
    }

    let policy = if let Some(reference) = upstream {
        UpstreamPolicy::Explicit(reference)
    } else if upstream_current {
        UpstreamPolicy::Current
    } else if lkgr {
        UpstreamPolicy::Explicit("lkgr".to_string())
    } else if inject_current {
        UpstreamPolicy::InjectCurrent
    } else {
        UpstreamPolicy::Root
    };

    let repo = GitRepository::open_cwd()?;
    let mut store = BranchGraphStore::open(&repo)?;
    let settings = Settings::load(&repo)?;

    let created = create_branch(&repo, &mut store, &settings, &NewBranchRequest { name, policy })?;

    Output::success(format!("Created branch '{}'", created.name));
    Output::sub_item(format!("Tracking: {}", created.upstream));
    if let Some(below) = &created.spliced_below {
        Output::sub_item(format!("'{}' now tracks '{}'", below, created.name));
    }
    Ok(())
}
