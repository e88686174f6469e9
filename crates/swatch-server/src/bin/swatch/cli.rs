//! CLI definitions for swatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "swatch",
    version,
    about = "Live component variation workbench",
    infer_subcommands = true,
    after_help = "Examples:\n  swatch serve                        # serve ./swatch.toml or defaults\n  swatch serve --listen 0.0.0.0:7100  # listen on all interfaces\n  swatch variations buttons/Button.jsx\n  swatch preview Button.jsx --variation primary > preview.html"
)]
pub struct Cli {
    /// Log at debug level regardless of the configured level.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the component library, variation store and push channel.
    Serve {
        /// Configuration file (defaults to ./swatch.toml when present).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Listen address override, e.g. 127.0.0.1:7100.
        #[arg(long)]
        listen: Option<String>,
    },
    /// List component sources in the library.
    Components {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List stored variations of a component.
    Variations {
        /// Component path relative to the library root.
        component: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the preview sandbox document for a component.
    Preview {
        /// Component path relative to the library root.
        component: String,
        /// Seed the preview with this stored variation.
        #[arg(long)]
        variation: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the file slug derived from a variation name.
    Slug {
        /// Variation name.
        name: String,
    },
}
