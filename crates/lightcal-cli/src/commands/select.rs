use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use lightcal_core::masters::select_masters;

use crate::session::Session;
use crate::summary::print_selection;

#[derive(Args)]
pub struct SelectArgs {
    /// Session file (TOML)
    pub session: PathBuf,
}

/// Dry run: report the masters each light would be calibrated with.
pub fn run(args: &SelectArgs) -> Result<()> {
    let session = Session::load(&args.session)?;
    let catalog = session.load_catalog()?;

    println!();
    let mut unmatched = 0usize;
    for entry in &session.lights {
        let selection = select_masters(&entry.info, &catalog);
        let missing_required = selection.require(&session.settings.required).is_err();
        if missing_required {
            unmatched += 1;
        }
        let path = session.light_path(entry);
        print_selection(&path.display().to_string(), &selection, missing_required);
    }
    println!();
    println!(
        "{} light(s), {} missing a required master",
        session.lights.len(),
        unmatched
    );

    Ok(())
}
