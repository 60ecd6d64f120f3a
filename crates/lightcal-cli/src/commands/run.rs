use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use lightcal_core::io::image_io::save_tiff;
use lightcal_core::pipeline::config::ErrorPolicy;
use lightcal_core::pipeline::{calibrate_batch, BatchReport, CalibrationEngine};
use tracing::info;

use crate::progress::BarReporter;
use crate::session::Session;
use crate::summary::{print_batch_report, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Session file (TOML)
    pub session: PathBuf,

    /// Directory for calibrated frames
    #[arg(short, long, default_value = "calibrated")]
    pub output: PathBuf,

    /// Keep saturated pixels out of flat correction
    #[arg(long)]
    pub debloom: bool,

    /// Stop starting new frames after the first failure
    #[arg(long)]
    pub fail_fast: bool,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut session = Session::load(&args.session)?;
    if args.debloom {
        session.settings.debloom = true;
    }
    if args.fail_fast {
        session.settings.on_error = ErrorPolicy::AbortBatch;
    }
    if session.lights.is_empty() {
        bail!("Session {} lists no light frames", args.session.display());
    }

    let catalog = session.load_catalog()?;
    print_run_summary(&session, &catalog, &args.output);
    let lights = session.load_lights()?;

    let engine = CalibrationEngine::new(session.settings.clone(), Arc::new(catalog));
    let reporter = BarReporter::new(lights.len())?;
    let report = calibrate_batch(&engine, lights, &reporter);
    reporter.finish();

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let saved = save_completed(&session, &report, &args.output)?;
    print_batch_report(&report, &saved);

    if report.failed() > 0 {
        bail!(
            "{} of {} frames failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}

/// Write every completed frame as `<stem>_cal.tiff`. Cancelled and failed
/// frames are not written.
fn save_completed(
    session: &Session,
    report: &BatchReport,
    output: &Path,
) -> Result<Vec<Option<PathBuf>>> {
    let mut saved = Vec::with_capacity(report.outcomes.len());
    for (outcome, entry) in report.outcomes.iter().zip(&session.lights) {
        if !outcome.is_completed() {
            saved.push(None);
            continue;
        }
        let path = output.join(calibrated_name(&entry.path));
        save_tiff(&outcome.light.buffer, &path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        info!(path = %path.display(), "Calibrated frame saved");
        saved.push(Some(path));
    }
    Ok(saved)
}

fn calibrated_name(light: &Path) -> String {
    let stem = light
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "light".to_string());
    format!("{stem}_cal.tiff")
}
