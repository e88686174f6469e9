//! `swatch.toml` configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use smol_str::SmolStr;

use crate::error::ServerError;

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "swatch.toml";
/// Listen address when none is configured.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:7100";
const DEFAULT_EXTENSIONS: [&str; 3] = ["js", "jsx", "tsx"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Where components and their variation files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Directory scanned for component sources.
    pub root: PathBuf,
    /// Source extensions, without the leading dot.
    pub extensions: Vec<SmolStr>,
    /// Directory holding variation and metadata files.
    pub variations: PathBuf,
}

/// File watcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    /// Whether file changes are announced on the push channel.
    pub enabled: bool,
    /// Quiet period before changes are announced.
    pub debounce: Duration,
}

/// Preview document settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewConfig {
    /// Framework plugin that mounts the component.
    pub plugin: SmolStr,
    /// URL directory the runtime bundles load from; `None` uses relative URLs.
    pub bundle_dir: Option<SmolStr>,
    /// Raw tags added to the document head.
    pub inject_tags: Vec<String>,
    /// Stylesheets inlined into every preview document.
    pub styles: Vec<PathBuf>,
    /// Scripts inlined into every preview document.
    pub scripts: Vec<PathBuf>,
}

/// Everything `swatch serve` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Component and variation locations.
    pub library: LibraryConfig,
    /// Listen address, `host:port`.
    pub listen: SmolStr,
    /// File watcher.
    pub watch: WatchConfig,
    /// Preview documents.
    pub preview: PreviewConfig,
    /// Default log filter.
    pub log_level: SmolStr,
}

impl ServerConfig {
    /// Defaults for a library rooted at `base`.
    #[must_use]
    pub fn for_root(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            library: LibraryConfig {
                root: base.join("src/components"),
                extensions: DEFAULT_EXTENSIONS.iter().map(|ext| SmolStr::new(ext)).collect(),
                variations: base.join("variations"),
            },
            listen: SmolStr::new(DEFAULT_LISTEN),
            watch: WatchConfig {
                enabled: true,
                debounce: Duration::from_millis(150),
            },
            preview: PreviewConfig {
                plugin: SmolStr::new("react"),
                bundle_dir: Some(SmolStr::new("swatch")),
                inject_tags: Vec::new(),
                styles: Vec::new(),
                scripts: Vec::new(),
            },
            log_level: SmolStr::new("info"),
        }
    }

    /// Loads `path`; relative paths inside resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            ServerError::InvalidConfig(format!("{}: {err}", path.display()).into())
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&text, base)
    }

    /// Loads `swatch.toml` from `dir` when present, defaults otherwise.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, ServerError> {
        let dir = dir.as_ref();
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::for_root(dir))
        }
    }

    /// Parses `text`; relative paths resolve against `base`.
    pub fn from_toml(text: &str, base: &Path) -> Result<Self, ServerError> {
        let raw: SwatchToml = toml::from_str(text)
            .map_err(|err| ServerError::InvalidConfig(format!("{CONFIG_FILE}: {err}").into()))?;
        raw.into_config(base)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SwatchToml {
    library: Option<LibrarySection>,
    server: Option<ServerSection>,
    watch: Option<WatchSection>,
    preview: Option<PreviewSection>,
    log: Option<LogSection>,
}

#[derive(Debug, Deserialize)]
struct LibrarySection {
    root: Option<PathBuf>,
    extensions: Option<Vec<String>>,
    variations: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    listen: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WatchSection {
    enabled: Option<bool>,
    debounce_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PreviewSection {
    plugin: Option<String>,
    bundle_dir: Option<String>,
    inject_tags: Option<Vec<String>>,
    styles: Option<Vec<PathBuf>>,
    scripts: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize)]
struct LogSection {
    level: Option<String>,
}

impl SwatchToml {
    fn into_config(self, base: &Path) -> Result<ServerConfig, ServerError> {
        let mut config = ServerConfig::for_root(base);

        if let Some(library) = self.library {
            if let Some(root) = library.root {
                config.library.root = base.join(root);
            }
            if let Some(variations) = library.variations {
                config.library.variations = base.join(variations);
            }
            if let Some(extensions) = library.extensions {
                let extensions: Vec<SmolStr> = extensions
                    .iter()
                    .map(|ext| ext.trim().trim_start_matches('.'))
                    .filter(|ext| !ext.is_empty())
                    .map(SmolStr::new)
                    .collect();
                if extensions.is_empty() {
                    return Err(ServerError::InvalidConfig(
                        "library.extensions must name at least one extension".into(),
                    ));
                }
                config.library.extensions = extensions;
            }
        }

        if let Some(listen) = self.server.and_then(|server| server.listen) {
            config.listen = parse_listen(&listen)?;
        }

        if let Some(watch) = self.watch {
            config.watch.enabled = watch.enabled.unwrap_or(true);
            if let Some(ms) = watch.debounce_ms {
                if ms == 0 {
                    return Err(ServerError::InvalidConfig(
                        "watch.debounce_ms must be greater than zero".into(),
                    ));
                }
                config.watch.debounce = Duration::from_millis(ms);
            }
        }

        if let Some(preview) = self.preview {
            if let Some(plugin) = preview.plugin {
                if plugin.trim().is_empty() {
                    return Err(ServerError::InvalidConfig("preview.plugin is empty".into()));
                }
                config.preview.plugin = SmolStr::new(plugin.trim());
            }
            if let Some(dir) = preview.bundle_dir {
                let dir = dir.trim().trim_matches('/');
                config.preview.bundle_dir = (!dir.is_empty()).then(|| SmolStr::new(dir));
            }
            config.preview.inject_tags = preview.inject_tags.unwrap_or_default();
            config.preview.styles = resolve_all(base, preview.styles);
            config.preview.scripts = resolve_all(base, preview.scripts);
        }

        if let Some(level) = self.log.and_then(|log| log.level) {
            config.log_level = parse_log_level(&level)?;
        }
        Ok(config)
    }
}

fn resolve_all(base: &Path, paths: Option<Vec<PathBuf>>) -> Vec<PathBuf> {
    paths
        .unwrap_or_default()
        .into_iter()
        .map(|path| base.join(path))
        .collect()
}

/// Validates a `host:port` listen address.
pub fn parse_listen(text: &str) -> Result<SmolStr, ServerError> {
    let text = text.trim();
    let valid = text
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if valid {
        Ok(SmolStr::new(text))
    } else {
        Err(ServerError::InvalidConfig(
            format!("invalid listen address '{text}' (expected host:port)").into(),
        ))
    }
}

/// Accepts one of the tracing level names, in any case.
pub fn parse_log_level(text: &str) -> Result<SmolStr, ServerError> {
    let level = text.trim().to_ascii_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        Ok(SmolStr::new(level))
    } else {
        Err(ServerError::InvalidConfig(
            format!("invalid log level '{text}'").into(),
        ))
    }
}
