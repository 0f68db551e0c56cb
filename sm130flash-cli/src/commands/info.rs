//! Firmware image info command implementation.

use anyhow::{Context, Result};
use console::style;
use sm130flash::FirmwareImage;
use std::path::Path;

fn load_image(image_path: &Path) -> Result<FirmwareImage> {
    FirmwareImage::from_file(image_path)
        .with_context(|| format!("Failed to load firmware image {}", image_path.display()))
}

/// Info command implementation.
pub(crate) fn cmd_info(image_path: &Path, json: bool) -> Result<()> {
    if json {
        return cmd_info_json(image_path);
    }

    eprintln!(
        "{} Loading firmware image {}",
        style("📦").cyan(),
        image_path.display()
    );

    let image = load_image(image_path)?;
    let summary = image.summary();

    eprintln!("\n{}", style("Firmware Image").bold().underlined());
    eprintln!("  Chunks:        {}", summary.chunk_count);
    eprintln!("  Total size:    {} bytes", summary.total_bytes);
    if !image.is_empty() {
        eprintln!(
            "  Chunk sizes:   {}..={} bytes",
            summary.smallest_chunk, summary.largest_chunk
        );
    }
    if summary.smallest_chunk != summary.largest_chunk {
        eprintln!("  {} chunks differ in size", style("note:").yellow());
    }

    Ok(())
}

/// Info command `--json` output: structured JSON to stdout.
fn cmd_info_json(image_path: &Path) -> Result<()> {
    let image = load_image(image_path)?;

    let output = serde_json::json!({
        "ok": true,
        "data": {
            "path": image_path.display().to_string(),
            "image": image.summary(),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
