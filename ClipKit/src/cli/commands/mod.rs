use clap::Subcommand;
use std::path::PathBuf;

mod execute;
pub mod export;
pub mod inspect;

#[derive(Subcommand)]
pub enum Commands {
    /// Show a summary of a .clip file
    Info {
        /// Source .clip file
        source: PathBuf,
    },

    /// List the chunk index of a .clip file
    Chunks {
        /// Source .clip file
        source: PathBuf,
    },

    /// List layers and how their pixel data resolves
    Layers {
        /// Source .clip file
        source: PathBuf,

        /// Only list layers of this canvas
        #[arg(short, long)]
        canvas: Option<i64>,
    },

    /// Export layers as PNG and canvas previews as stored
    Export {
        /// Source .clip file
        source: PathBuf,

        /// Output directory
        destination: PathBuf,

        /// Export settings file (TOML); flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only export this canvas
        #[arg(long)]
        canvas: Option<i64>,

        /// Only export these layer ids (repeatable)
        #[arg(short, long = "layer")]
        layers: Vec<i64>,

        /// Skip canvas previews
        #[arg(long, conflicts_with = "no_layers")]
        no_previews: bool,

        /// Skip layer rasters
        #[arg(long)]
        no_layers: bool,

        /// Decode layers on a single thread
        #[arg(long)]
        sequential: bool,

        /// Skip layers with no visible pixels
        #[arg(long)]
        skip_empty: bool,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Write canvas previews only
    Previews {
        /// Source .clip file
        source: PathBuf,

        /// Output directory
        destination: PathBuf,
    },

    /// Export every .clip file under a directory
    Batch {
        /// Directory to search for .clip files
        source: PathBuf,

        /// Output directory (one subfolder per project)
        destination: PathBuf,

        /// Export settings file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
