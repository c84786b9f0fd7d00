use crate::cli::Cli;
use crate::errors::Result;
use clap::CommandFactory;
use clap_complete::Shell;

/// Write completions for the given shell to stdout
pub fn run(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "braid", &mut std::io::stdout());
    Ok(())
}
