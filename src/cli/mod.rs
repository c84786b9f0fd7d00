pub mod commands;
pub mod output;

use crate::errors::Result;
use crate::stack::UpdateOptions;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "braid")]
#[command(about = "Braid - keep a stack of dependent branches rebased in one pass")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebase every tracked branch onto its upstream, root to leaf
    #[command(name = "rebase-update")]
    RebaseUpdate {
        /// Skip fetching remotes; operate on currently-known remote state
        #[arg(long, short = 'n')]
        no_fetch: bool,

        /// Skip conflicted branches (and their dependents) instead of stopping
        #[arg(long, short = 'k')]
        keep_going: bool,

        /// Disable the squash fallback; any conflict stops the pass
        #[arg(long)]
        no_squash: bool,

        /// Only update the currently checked-out branch
        #[arg(long)]
        current: bool,

        /// Also update every branch stacked on the selected ones
        #[arg(long)]
        tree: bool,

        /// Restrict the pass to these branches
        branches: Vec<String>,
    },

    /// Create a branch that tracks an upstream in the stack
    #[command(name = "new-branch")]
    NewBranch {
        /// Name of the branch to create
        name: String,

        /// Track REF verbatim (local branch, remote branch, or tag)
        #[arg(long)]
        upstream: Option<String>,

        /// Track the currently checked-out branch
        #[arg(long = "upstream_current")]
        upstream_current: bool,

        /// Track the lkgr ref
        #[arg(long)]
        lkgr: bool,

        /// Insert the new branch between the current branch and its upstream
        #[arg(long = "inject_current")]
        inject_current: bool,
    },

    /// Snapshot uncommitted work into synthetic commits on the current branch
    Freeze,

    /// Restore the snapshot taken by freeze
    Thaw,

    /// Collapse the current branch's commits into one
    #[command(name = "squash-branch")]
    SquashBranch {
        /// Message for the squashed commit
        #[arg(long, short)]
        message: Option<String>,
    },

    /// Show the tracked branch stack
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        self.setup_logging();

        match self.command {
            Commands::RebaseUpdate {
                no_fetch,
                keep_going,
                no_squash,
                current,
                tree,
                branches,
            } => commands::rebase_update::run(UpdateOptions {
                no_fetch,
                keep_going,
                no_squash,
                current_only: current,
                tree,
                branches,
            }),
            Commands::NewBranch {
                name,
                upstream,
                upstream_current,
                lkgr,
                inject_current,
            } => commands::new_branch::run(name, upstream, upstream_current, lkgr, inject_current),
            Commands::Freeze => commands::freeze::run_freeze(),
            Commands::Thaw => commands::freeze::run_thaw(),
            Commands::SquashBranch { message } => commands::squash::run(message),
            Commands::Status => commands::status::run(),
            Commands::Completions { shell } => commands::completions::run(shell),
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time();

        if self.no_color {
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}
