//! Command execution implementations

use super::Commands;
use super::{export, inspect};

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Info { source } => inspect::info(source),
            Commands::Chunks { source } => inspect::chunks(source),
            Commands::Layers { source, canvas } => inspect::layers(source, *canvas),
            Commands::Export {
                source,
                destination,
                config,
                canvas,
                layers,
                no_previews,
                no_layers,
                sequential,
                skip_empty,
                quiet,
            } => {
                let mut options = export::load_options(config.as_deref())?;
                if canvas.is_some() {
                    options.canvas = *canvas;
                }
                if !layers.is_empty() {
                    options.layers.clone_from(layers);
                }
                options.include_previews &= !no_previews;
                options.include_layers &= !no_layers;
                options.parallel &= !sequential;
                options.skip_empty |= *skip_empty;

                export::export(source, destination, &options, *quiet)
            }
            Commands::Previews {
                source,
                destination,
            } => export::previews(source, destination),
            Commands::Batch {
                source,
                destination,
                config,
            } => {
                let options = export::load_options(config.as_deref())?;
                export::batch(source, destination, &options)
            }
        }
    }
}
