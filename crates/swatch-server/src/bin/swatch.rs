//! CLI entrypoint for the swatch workbench server.

#[path = "swatch/cli.rs"]
mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use swatch_core::codec::decode_variation;
use swatch_core::slug::slugify;
use swatch_server::config::parse_listen;
use swatch_server::http::{render_preview, AppState};
use swatch_server::library::Library;
use swatch_server::push::PushHub;
use swatch_server::store::VariationStore;
use swatch_server::{ServerConfig, SwatchServer};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config, listen } => {
            let mut config = load_config(config)?;
            init_tracing(cli.verbose, &config);
            if let Some(listen) = listen {
                config.listen = parse_listen(&listen)?;
            }
            info!("library root {}", config.library.root.display());
            let server = SwatchServer::start(&config).context("failed to start server")?;
            println!("swatch serving {}", server.url());
            server.wait();
        }
        Command::Components { config } => {
            let config = load_config(config)?;
            init_tracing(cli.verbose, &config);
            let library = Library::new(config.library);
            for entry in library.entries()? {
                println!("{}\t{}", entry.path, entry.name);
            }
        }
        Command::Variations { component, config } => {
            let config = load_config(config)?;
            init_tracing(cli.verbose, &config);
            let store = VariationStore::new(Arc::new(Library::new(config.library)));
            let component = store.library().resolve(&component)?;
            for (slug, source) in store.list_variations(&component)? {
                match decode_variation(&source) {
                    Ok(source) => {
                        println!("{slug}\t{}", source.name.as_deref().unwrap_or(slug.as_str()));
                    }
                    Err(err) => println!("{slug}\t<unreadable: {err}>"),
                }
            }
        }
        Command::Preview {
            component,
            variation,
            config,
        } => {
            let config = load_config(config)?;
            init_tracing(cli.verbose, &config);
            let state = AppState {
                store: VariationStore::new(Arc::new(Library::new(config.library))),
                hub: Arc::new(PushHub::new()),
                preview: config.preview,
                announce_writes: false,
            };
            let html = render_preview(&state, &component, variation.as_deref())?;
            print!("{html}");
        }
        Command::Slug { name } => {
            let slug = slugify(&name);
            anyhow::ensure!(!slug.is_empty(), "'{name}' has no usable characters for a slug");
            println!("{slug}");
        }
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
    let config = match path {
        Some(path) => ServerConfig::load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            ServerConfig::discover(cwd)?
        }
    };
    Ok(config)
}

fn init_tracing(verbose: bool, config: &ServerConfig) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        config.log_level.parse().unwrap_or(LevelFilter::INFO)
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}
