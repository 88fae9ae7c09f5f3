use anyhow::{Context, Result};
use clap::Command;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

/// Where each shell picks up a completion file for the extperf binary
pub fn install_hint(shell: Shell) -> &'static str {
    match shell {
        Shell::Bash => "~/.local/share/bash-completion/completions/extperf",
        Shell::Zsh => "a directory on $fpath, as _extperf",
        Shell::Fish => "~/.config/fish/completions/extperf.fish",
        Shell::PowerShell => "your $PROFILE",
        Shell::Elvish => "~/.config/elvish/rc.elv",
        _ => "your shell's completion directory",
    }
}

/// Write the completion script for `shell` to `out`
pub fn write_script(shell: Shell, cmd: &mut Command, out: &mut dyn Write) -> Result<()> {
    let bin_name = cmd.get_name().to_string();
    generate(shell, cmd, bin_name, out);
    out.flush().context("Failed to write completion script")
}

/// Print the completion script to stdout; the install hint goes to the log so pipes stay clean
pub fn execute(shell: Shell, cmd: &mut Command) -> Result<()> {
    tracing::debug!("Generating {} completions, install to {}", shell, install_hint(shell));
    write_script(shell, cmd, &mut io::stdout().lock())
}
