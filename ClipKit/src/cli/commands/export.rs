//! CLI commands for exporting layers and previews

use std::path::Path;
use std::time::Instant;

use indicatif::ProgressBar;

use crate::cli::progress::{
    DISK, LOOKING_GLASS, PICTURE, TRUCK, print_done, print_step, simple_bar,
};
use crate::ClipFile;
use crate::export::{ExportOptions, batch_export, export_clip, export_file, find_clip_files};

/// Load export settings from a TOML file, or defaults.
pub fn load_options(config: Option<&Path>) -> anyhow::Result<ExportOptions> {
    match config {
        Some(path) => Ok(ExportOptions::from_toml_file(path)?),
        None => Ok(ExportOptions::default()),
    }
}

/// Export one project
pub fn export(
    source: &Path,
    destination: &Path,
    options: &ExportOptions,
    quiet: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();

    if !quiet {
        print_step(1, 2, LOOKING_GLASS, &format!("Reading {}...", source.display()));
    }
    let mut clip = ClipFile::open(source)?;

    if !quiet {
        print_step(2, 2, PICTURE, "Decoding layers...");
    }

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        simple_bar(0, "Exporting")
    };
    let result = export_clip(&mut clip, destination, options, &|progress| {
        pb.set_length(progress.total as u64);
        pb.set_position(progress.current as u64);
        pb.set_message(progress.item.clone());
    })?;
    pb.finish_and_clear();

    println!(
        "{}Wrote {} files to {}",
        DISK,
        result.success_count(),
        destination.display()
    );
    if !result.skipped.is_empty() {
        println!("  Skipped: {} layers", result.skipped.len());
    }
    if result.fail_count() > 0 {
        println!("  Failed: {}", result.fail_count());
        for failure in &result.failures {
            println!(
                "    canvas {} layer {}: {}",
                failure.canvas_id, failure.layer_id, failure.message
            );
        }
    }

    if !quiet {
        print_done(started.elapsed());
    }

    Ok(())
}

/// Write canvas previews only
pub fn previews(source: &Path, destination: &Path) -> anyhow::Result<()> {
    let options = ExportOptions {
        include_layers: false,
        ..ExportOptions::default()
    };
    let result = export_file(source, destination, &options, &|_| {})?;

    if result.written.is_empty() {
        println!("No canvas previews in: {}", source.display());
    } else {
        for path in &result.written {
            println!("  {}", path.display());
        }
    }

    Ok(())
}

/// Batch export every project under a directory
pub fn batch(source: &Path, destination: &Path, options: &ExportOptions) -> anyhow::Result<()> {
    let started = Instant::now();
    let files = find_clip_files(source);

    if files.is_empty() {
        println!("No .clip files found in: {}", source.display());
        return Ok(());
    }

    print_step(1, 1, TRUCK, &format!("Exporting {} projects", files.len()));

    let pb = simple_bar(files.len() as u64, "Exporting");
    let result = batch_export(&files, source, destination, options, |progress| {
        pb.set_position(progress.current as u64);
        pb.set_message(progress.item.clone());
    });
    pb.finish_and_clear();

    println!();
    println!("Export complete:");
    println!("  Success: {}", result.success_count);
    println!("  Failed: {}", result.fail_count);

    if result.fail_count > 0 {
        println!();
        println!("Problems:");
        for msg in result.results.iter().filter(|m| !m.starts_with("Exported")) {
            println!("  {msg}");
        }
    }

    print_done(started.elapsed());

    Ok(())
}
