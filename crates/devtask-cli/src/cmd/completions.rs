//! `dt completions <shell>`.

use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate the script for.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Print the completion script for `shell` to stdout.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn run_completions(shell: Shell, command: &mut clap::Command) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_completions(shell, command, &mut out)
}

fn write_completions(shell: Shell, command: &mut clap::Command, out: &mut dyn Write) -> Result<()> {
    let bin = command
        .get_bin_name()
        .unwrap_or_else(|| command.get_name())
        .to_string();
    generate(shell, command, bin, out);
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write_completions;
    use clap::{Arg, Command};
    use clap_complete::Shell;

    #[test]
    fn script_mentions_subcommands() {
        let mut command = Command::new("dt")
            .subcommand(Command::new("tasks"))
            .subcommand(Command::new("comments").arg(Arg::new("task")));
        let mut buf = Vec::new();
        write_completions(Shell::Bash, &mut command, &mut buf).expect("generate");
        let script = String::from_utf8(buf).expect("utf8");
        assert!(script.contains("dt"));
        assert!(script.contains("comments"));
    }
}
