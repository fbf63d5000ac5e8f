//! CLI commands for inspecting a project without exporting

use std::path::Path;

use crate::ClipFile;
use crate::Error;
use crate::container::TAG_EXTERNAL;

/// Format byte size for human-readable output
fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1}M", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else {
        format!("{bytes}")
    }
}

/// Show a summary of a project
pub fn info(source: &Path) -> anyhow::Result<()> {
    let clip = ClipFile::open(source)?;
    let tables = clip.tables();

    println!("Project: {}", source.display());
    println!();
    println!("Chunks: {}", clip.index().len());
    println!(
        "External data chunks: {}",
        clip.index().find_all(&TAG_EXTERNAL).count()
    );
    println!("Layers: {}", tables.layers().len());
    println!("Offscreens: {}", tables.offscreens().len());
    println!();

    println!("Canvases:");
    for canvas_id in clip.canvas_ids() {
        let layer_count = tables.layers_in_canvas(canvas_id).count();
        match clip.canvas_preview(canvas_id) {
            Some(preview) => println!(
                "  {canvas_id:>4}  {layer_count:>4} layers  preview {}x{} ({})",
                preview.width,
                preview.height,
                format_size(preview.image_data.len() as u64)
            ),
            None => println!("  {canvas_id:>4}  {layer_count:>4} layers  no preview"),
        }
    }

    Ok(())
}

/// Dump the chunk index
pub fn chunks(source: &Path) -> anyhow::Result<()> {
    let clip = ClipFile::open(source)?;

    println!("{:>12}  {:8}  {:>12}", "OFFSET", "TAG", "SIZE");
    for chunk in clip.index().iter() {
        println!(
            "{:>12}  {:8}  {:>12}",
            chunk.start,
            chunk.tag_str(),
            format_size(chunk.size)
        );
    }
    println!();
    println!("{} chunks", clip.index().len());

    Ok(())
}

/// List layers with their resolution chain
pub fn layers(source: &Path, canvas: Option<i64>) -> anyhow::Result<()> {
    let clip = ClipFile::open(source)?;
    let tables = clip.tables();

    for canvas_id in clip
        .canvas_ids()
        .into_iter()
        .filter(|c| canvas.is_none_or(|wanted| wanted == *c))
    {
        println!("Canvas {canvas_id}:");
        for layer in tables.layers_in_canvas(canvas_id) {
            match clip.resolve(canvas_id, layer.id) {
                Ok(resolved) => {
                    let levels = layer
                        .mipmap_id
                        .and_then(|id| tables.mipmaps().get(id))
                        .map_or(0, |m| tables.mipmap_chain(m, clip.sink()).len());
                    println!(
                        "  {:>6}  {:<24}  {:>5}x{:<5}  {} ({} mipmap levels)",
                        layer.id, layer.name, resolved.width, resolved.height, resolved.external_id, levels
                    );
                }
                Err(Error::IncompleteLayerData { missing, .. }) => {
                    println!("  {:>6}  {:<24}  no pixel data (missing {missing})", layer.id, layer.name);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
