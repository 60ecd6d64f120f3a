use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::session::Session;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the template to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a session template with default settings as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let toml_str = toml::to_string_pretty(&Session::template())?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write session to {}", path.display()))?;
        println!("Session template saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
