//! Renders the `sacloud-machine` man pages into `OUT_DIR`.
//!
//! One page covers the top-level command; each subcommand gets its own
//! `sacloud-machine-<name>.1` page so the long `create` flag list stays
//! readable.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn render(command: clap::Command, target: &Path) -> io::Result<()> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    fs::write(target, buffer)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = PathBuf::from(
        env::var_os("OUT_DIR")
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR was not set"))?,
    );

    let command = Cli::command();
    let bin_name = command.get_name().to_owned();
    for sub in command.get_subcommands() {
        let page_name = format!("{bin_name}-{}", sub.get_name());
        let page = sub.clone().name(page_name.clone());
        render(page, &out_dir.join(format!("{page_name}.1")))?;
    }
    render(command, &out_dir.join(format!("{bin_name}.1")))?;

    Ok(())
}
