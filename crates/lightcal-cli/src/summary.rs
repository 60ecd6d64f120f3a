use std::path::{Path, PathBuf};

use console::Style;
use lightcal_core::masters::{MasterCatalog, MasterSelection};
use lightcal_core::pipeline::config::CalibrationSettings;
use lightcal_core::pipeline::{BatchReport, CalibrationStage, FrameOutcome, StageStatus};

use crate::session::Session;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    ok: Style,
    error: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            ok: Style::new().green().bold(),
            error: Style::new().red().bold(),
        }
    }
}

fn print_title(s: &Styles, title: &str) {
    println!();
    println!("  {}", s.title.apply_to(title));
    println!(
        "  {}",
        s.title.apply_to("\u{2550}".repeat(title.chars().count()))
    );
    println!();
}

pub fn print_run_summary(session: &Session, catalog: &MasterCatalog, output: &Path) {
    let s = Styles::new();
    print_title(&s, "Light Frame Calibration");

    println!(
        "  {:<14}{}",
        s.label.apply_to("Lights"),
        s.value.apply_to(session.lights.len())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Layout"),
        s.method.apply_to(
            session
                .layout
                .map_or_else(|| "from files".to_string(), |l| l.to_string())
        )
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!();

    println!("  {}", s.header.apply_to("Masters"));
    for (label, count) in [
        ("Offset", catalog.offsets.len()),
        ("Dark", catalog.darks.len()),
        ("Flat", catalog.flats.len()),
    ] {
        if count == 0 {
            println!("    {:<12}{}", s.label.apply_to(label), s.disabled.apply_to("none"));
        } else {
            println!("    {:<12}{}", s.label.apply_to(label), s.value.apply_to(count));
        }
    }
    println!();

    print_settings_section(&s, &session.settings);
}

fn print_settings_section(s: &Styles, settings: &CalibrationSettings) {
    println!("  {}", s.header.apply_to("Settings"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Debloom"),
        if settings.debloom {
            s.method.apply_to("on".to_string())
        } else {
            s.disabled.apply_to("off".to_string())
        }
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Flat ref"),
        s.method.apply_to(settings.flat.normalization)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Defects"),
        s.value.apply_to(settings.flat.defective_policy)
    );
    if settings.hot_pixel.enabled {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Hot pixels"),
            s.method.apply_to(format!(
                "{} sigma, {}",
                settings.hot_pixel.sigma, settings.hot_pixel.method
            ))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Hot pixels"),
            s.disabled.apply_to("disabled")
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("On error"),
        s.value.apply_to(settings.on_error)
    );
    println!();
}

/// Per-frame result lines followed by batch totals.
/// `saved` holds the output path of every frame written to disk.
pub fn print_batch_report(report: &BatchReport, saved: &[Option<PathBuf>]) {
    let s = Styles::new();
    print_title(&s, "Results");

    for (outcome, path) in report.outcomes.iter().zip(saved) {
        print_frame_line(&s, outcome, path.as_deref());
    }
    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Completed"),
        s.ok.apply_to(report.completed())
    );
    if report.cancelled() > 0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Cancelled"),
            s.disabled.apply_to(report.cancelled())
        );
    }
    if report.failed() > 0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Failed"),
            s.error.apply_to(report.failed())
        );
    }
    println!();
}

fn print_frame_line(s: &Styles, outcome: &FrameOutcome, saved: Option<&Path>) {
    let name = outcome.light.buffer.id().to_string();
    match &outcome.result {
        Err(e) => {
            println!("  {} {}", s.error.apply_to("FAIL"), s.path.apply_to(&name));
            println!("       {}", s.error.apply_to(e.root()));
        }
        Ok(report) if report.is_cancelled() => {
            println!(
                "  {} {}",
                s.disabled.apply_to("STOP"),
                s.path.apply_to(&name)
            );
        }
        Ok(report) => {
            println!("  {} {}", s.ok.apply_to(" OK "), s.path.apply_to(&name));
            let stages: Vec<String> = report
                .stages
                .iter()
                .map(|(stage, status)| stage_note(*stage, status))
                .collect();
            println!("       {}", s.label.apply_to(stages.join(", ")));
            if let Some(path) = saved {
                println!("       {}", s.path.apply_to(path.display()));
            }
        }
    }
}

fn stage_note(stage: CalibrationStage, status: &StageStatus) -> String {
    match status {
        StageStatus::Skipped(reason) => format!("{stage}: {reason}"),
        StageStatus::Applied(summary) => match stage {
            CalibrationStage::Dark => match summary.scale {
                Some(scale) if scale != 1.0 => format!("{stage} x{scale:.3}"),
                _ => stage.to_string(),
            },
            CalibrationStage::Flat if summary.defective_pixels > 0 => {
                format!("{stage} ({} defective)", summary.defective_pixels)
            }
            CalibrationStage::HotPixel => format!(
                "{stage} ({} fixed, {} on stars)",
                summary.interpolated_pixels, summary.protected_pixels
            ),
            _ => stage.to_string(),
        },
    }
}

/// One block per light with the masters `select_masters` picked for it.
pub fn print_selection(name: &str, selection: &MasterSelection, missing_required: bool) {
    let s = Styles::new();
    let marker = if missing_required {
        s.error.apply_to("FAIL")
    } else {
        s.ok.apply_to(" OK ")
    };
    println!("  {} {}", marker, s.path.apply_to(name));

    let none = || s.disabled.apply_to("none".to_string());
    println!(
        "       {:<8}{}",
        s.label.apply_to("Offset"),
        selection
            .offset
            .as_ref()
            .map_or_else(none, |m| s.value.apply_to(m.buffer().id().to_string()))
    );
    println!(
        "       {:<8}{}",
        s.label.apply_to("Dark"),
        selection.dark.as_ref().map_or_else(none, |d| {
            let mut text = d.master.buffer().id().to_string();
            if !d.exact {
                text.push_str(&format!(" (scaled x{:.3})", d.scale));
            }
            s.value.apply_to(text)
        })
    );
    println!(
        "       {:<8}{}",
        s.label.apply_to("Flat"),
        selection
            .flat
            .as_ref()
            .map_or_else(none, |m| s.value.apply_to(m.buffer().id().to_string()))
    );
}
