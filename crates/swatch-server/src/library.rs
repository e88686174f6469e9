//! Component discovery and declaration extraction.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use smol_str::SmolStr;
use swatch_core::docgen::parse_docgen;
use swatch_core::wire::ComponentEntry;
use swatch_core::ComponentMetadata;
use tracing::{debug, warn};

use crate::config::LibraryConfig;
use crate::error::ServerError;

/// Suffix of the declaration sidecar written by the external analyzer.
pub const DOCGEN_SUFFIX: &str = ".docgen.json";

/// Produces property declarations for one component source.
pub trait Analyzer: Send + Sync {
    /// Files whose changes alter the declarations of `source`.
    fn inputs(&self, source: &Path) -> Vec<PathBuf>;

    /// Declarations of the component at `source`, named `component`.
    fn analyze(&self, component: &str, source: &Path) -> Result<ComponentMetadata, ServerError>;
}

/// Reads react-docgen output from `<stem>.docgen.json` next to the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocgenSidecar;

impl DocgenSidecar {
    /// Sidecar location for `source`.
    #[must_use]
    pub fn sidecar_path(source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        source.with_file_name(format!("{stem}{DOCGEN_SUFFIX}"))
    }
}

impl Analyzer for DocgenSidecar {
    fn inputs(&self, source: &Path) -> Vec<PathBuf> {
        vec![Self::sidecar_path(source)]
    }

    fn analyze(&self, component: &str, source: &Path) -> Result<ComponentMetadata, ServerError> {
        let sidecar = Self::sidecar_path(source);
        let text = match std::fs::read_to_string(&sidecar) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no declarations for {component}");
                return Ok(ComponentMetadata {
                    path: SmolStr::new(component),
                    name: SmolStr::new(file_stem(component)),
                    ..ComponentMetadata::default()
                });
            }
            Err(err) => return Err(ServerError::io(sidecar.display(), &err)),
        };
        parse_docgen(component, &text).map_err(|err| {
            ServerError::Server(format!("{}: {err}", sidecar.display()).into())
        })
    }
}

fn file_stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.split('.').next().unwrap_or(file)
}

/// A component source resolved inside the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    /// Normalized path relative to the library root, `/` separated.
    pub path: SmolStr,
    /// Absolute source file.
    pub source: PathBuf,
}

/// Modification time and length of one analyzer input; `None` when missing.
type InputStamp = Option<(Option<SystemTime>, u64)>;

#[derive(Debug)]
struct CachedMetadata {
    stamps: Vec<InputStamp>,
    metadata: ComponentMetadata,
}

/// The component sources under one root.
///
/// Analyzer results are cached per component and reused until the source
/// or one of its declaration inputs changes on disk.
pub struct Library {
    config: LibraryConfig,
    analyzer: Arc<dyn Analyzer>,
    cache: Mutex<HashMap<SmolStr, CachedMetadata>>,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("config", &self.config)
            .field("cached", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}

impl Library {
    /// Library analyzed through docgen sidecars.
    pub fn new(config: LibraryConfig) -> Self {
        Self::with_analyzer(config, Arc::new(DocgenSidecar))
    }

    /// Library analyzed through `analyzer`.
    pub fn with_analyzer(config: LibraryConfig, analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            config,
            analyzer,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Directory scanned for components.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Directory holding variation files.
    #[must_use]
    pub fn variations_root(&self) -> &Path {
        &self.config.variations
    }

    /// Every component source under the root, sorted by path.
    pub fn components(&self) -> Result<Vec<ComponentRef>, ServerError> {
        let root = glob::Pattern::escape(&self.config.root.to_string_lossy());
        let mut found = Vec::new();
        for ext in &self.config.extensions {
            let pattern = format!("{root}/**/*.{ext}");
            let paths = glob::glob(&pattern)
                .map_err(|err| ServerError::Server(format!("glob '{pattern}': {err}").into()))?;
            for entry in paths {
                let source = match entry {
                    Ok(source) => source,
                    Err(err) => {
                        warn!("skipping unreadable library entry: {err}");
                        continue;
                    }
                };
                if !source.is_file() || source.starts_with(&self.config.variations) {
                    continue;
                }
                let Ok(relative) = source.strip_prefix(&self.config.root) else {
                    continue;
                };
                let relative = relative
                    .components()
                    .map(|part| part.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if let Ok(path) = self.normalize(&relative) {
                    found.push(ComponentRef { path, source });
                }
            }
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found.dedup_by(|a, b| a.path == b.path);
        Ok(found)
    }

    /// Component list with display names.
    pub fn entries(&self) -> Result<Vec<ComponentEntry>, ServerError> {
        Ok(self
            .components()?
            .into_iter()
            .map(|component| {
                let name = self
                    .metadata(&component)
                    .map_or_else(|_| SmolStr::new(file_stem(&component.path)), |meta| meta.name);
                ComponentEntry {
                    path: component.path,
                    name,
                }
            })
            .collect())
    }

    /// Validates `path` and checks that the component exists.
    pub fn resolve(&self, path: &str) -> Result<ComponentRef, ServerError> {
        let path = self.normalize(path)?;
        let source = self.config.root.join(path.as_str());
        if !source.is_file() {
            return Err(ServerError::UnknownComponent(path));
        }
        Ok(ComponentRef { path, source })
    }

    /// Declarations of `component`, analyzed again only when its inputs changed.
    pub fn metadata(&self, component: &ComponentRef) -> Result<ComponentMetadata, ServerError> {
        let stamps = self.input_stamps(component);
        if let Some(cached) = self.cache.lock().get(&component.path) {
            if cached.stamps == stamps {
                return Ok(cached.metadata.clone());
            }
        }
        let metadata = self.analyzer.analyze(&component.path, &component.source)?;
        self.cache.lock().insert(
            component.path.clone(),
            CachedMetadata {
                stamps,
                metadata: metadata.clone(),
            },
        );
        Ok(metadata)
    }

    fn input_stamps(&self, component: &ComponentRef) -> Vec<InputStamp> {
        std::iter::once(component.source.clone())
            .chain(self.analyzer.inputs(&component.source))
            .map(|path| {
                std::fs::metadata(path)
                    .ok()
                    .map(|meta| (meta.modified().ok(), meta.len()))
            })
            .collect()
    }

    /// Files feeding the declarations of `component`.
    #[must_use]
    pub fn declaration_inputs(&self, component: &ComponentRef) -> Vec<PathBuf> {
        self.analyzer.inputs(&component.source)
    }

    /// Directory of variation files: the component path without extension.
    #[must_use]
    pub fn variation_dir(&self, component: &ComponentRef) -> PathBuf {
        let without_ext = component
            .path
            .rsplit_once('.')
            .map_or(component.path.as_str(), |(stem, _)| stem);
        self.config.variations.join(without_ext)
    }

    /// Normalizes a request path: relative, `/` separated, no hidden or
    /// parent segments, with a configured extension.
    pub fn normalize(&self, path: &str) -> Result<SmolStr, ServerError> {
        let trimmed = path.trim().trim_start_matches("./");
        if trimmed.is_empty() {
            return Err(ServerError::invalid("component path is required"));
        }
        if trimmed.contains('\\') {
            return Err(ServerError::invalid("component path must use '/' separators"));
        }
        let raw = Path::new(trimmed);
        if raw.is_absolute() {
            return Err(ServerError::invalid("absolute component paths are not allowed"));
        }
        let mut parts = Vec::new();
        for part in raw.components() {
            match part {
                Component::Normal(value) => {
                    let text = value.to_string_lossy();
                    if text.starts_with('.') {
                        return Err(ServerError::invalid("hidden component paths are not allowed"));
                    }
                    parts.push(text.into_owned());
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ServerError::invalid("component path escapes the library root"));
                }
            }
        }
        let normalized = parts.join("/");
        let known = normalized
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| {
                !stem.is_empty() && self.config.extensions.iter().any(|known| known == ext)
            });
        if !known || normalized.ends_with(DOCGEN_SUFFIX) {
            return Err(ServerError::invalid(format!(
                "'{normalized}' is not a component source"
            )));
        }
        Ok(SmolStr::new(normalized))
    }
}
