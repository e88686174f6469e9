//! Variation and metadata files on disk.
//!
//! Layout: `<variations>/<component without extension>/meta.json` plus one
//! `<slug>.json` per variation. Sources are stored verbatim; decoding is the
//! client's business so that a corrupt file stays readable and fixable.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use swatch_core::slug::{is_reserved_slug, is_valid_slug};
use tracing::debug;

use crate::error::ServerError;
use crate::library::{ComponentRef, Library};

/// Per-component custom metadata file.
pub const META_FILE: &str = "meta.json";
const SOURCE_EXT: &str = "json";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Whether a write created a new variation or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file did not exist before.
    Created,
    /// An existing file was replaced.
    Updated,
}

/// Reads and writes the files under the variations directory.
#[derive(Debug, Clone)]
pub struct VariationStore {
    library: Arc<Library>,
}

impl VariationStore {
    /// Store over the variation directories of `library`.
    pub fn new(library: Arc<Library>) -> Self {
        Self { library }
    }

    /// Library the store resolves components against.
    #[must_use]
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Raw `meta.json` source; empty when the file does not exist.
    pub fn read_metadata(&self, component: &ComponentRef) -> Result<String, ServerError> {
        let path = self.metadata_path(component);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(ServerError::io(path.display(), &err)),
        }
    }

    /// Replaces `meta.json` atomically.
    pub fn write_metadata(&self, component: &ComponentRef, code: &str) -> Result<(), ServerError> {
        write_atomic(&self.metadata_path(component), code)
    }

    /// Location of `meta.json`, whether or not it exists.
    #[must_use]
    pub fn metadata_path(&self, component: &ComponentRef) -> PathBuf {
        self.library.variation_dir(component).join(META_FILE)
    }

    /// Raw variation sources keyed by slug, sorted by slug.
    pub fn list_variations(
        &self,
        component: &ComponentRef,
    ) -> Result<IndexMap<SmolStr, String>, ServerError> {
        let dir = self.library.variation_dir(component);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(IndexMap::new()),
            Err(err) => return Err(ServerError::io(dir.display(), &err)),
        };
        let mut slugs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| ServerError::io(dir.display(), &err))?;
            if let Some(slug) = variation_slug(&entry.path()) {
                slugs.push(slug);
            }
        }
        slugs.sort();
        let mut variations = IndexMap::with_capacity(slugs.len());
        for slug in slugs {
            let path = dir.join(format!("{slug}.{SOURCE_EXT}"));
            match fs::read_to_string(&path) {
                Ok(text) => {
                    variations.insert(slug, text);
                }
                // Removed between listing and reading.
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(ServerError::io(path.display(), &err)),
            }
        }
        Ok(variations)
    }

    /// Raw source of one variation.
    pub fn read_variation(
        &self,
        component: &ComponentRef,
        slug: &str,
    ) -> Result<String, ServerError> {
        let path = self.variation_path(component, slug)?;
        fs::read_to_string(&path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ServerError::UnknownVariation {
                    component: component.path.clone(),
                    slug: SmolStr::new(slug),
                }
            } else {
                ServerError::io(path.display(), &err)
            }
        })
    }

    /// Writes one variation atomically and says whether it was new.
    pub fn write_variation(
        &self,
        component: &ComponentRef,
        slug: &str,
        code: &str,
    ) -> Result<WriteOutcome, ServerError> {
        let path = self.variation_path(component, slug)?;
        let outcome = if path.is_file() {
            WriteOutcome::Updated
        } else {
            WriteOutcome::Created
        };
        write_atomic(&path, code)?;
        debug!("wrote variation {} of {}", slug, component.path);
        Ok(outcome)
    }

    /// Removes one variation file.
    pub fn delete_variation(
        &self,
        component: &ComponentRef,
        slug: &str,
    ) -> Result<(), ServerError> {
        let path = self.variation_path(component, slug)?;
        fs::remove_file(&path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ServerError::UnknownVariation {
                    component: component.path.clone(),
                    slug: SmolStr::new(slug),
                }
            } else {
                ServerError::io(path.display(), &err)
            }
        })
    }

    /// File of variation `slug`; fails for invalid or reserved slugs.
    pub fn variation_path(
        &self,
        component: &ComponentRef,
        slug: &str,
    ) -> Result<PathBuf, ServerError> {
        validate_slug(slug)?;
        Ok(self
            .library
            .variation_dir(component)
            .join(format!("{slug}.{SOURCE_EXT}")))
    }
}

/// Slugs name files, so they must be valid and must not shadow `meta.json`.
pub fn validate_slug(slug: &str) -> Result<(), ServerError> {
    if !is_valid_slug(slug) {
        return Err(ServerError::invalid(format!("invalid variation slug '{slug}'")));
    }
    if is_reserved_slug(slug) {
        return Err(ServerError::invalid(format!("variation slug '{slug}' is reserved")));
    }
    Ok(())
}

/// Slug of a variation file, or `None` for metadata and foreign files.
#[must_use]
pub fn variation_slug(path: &Path) -> Option<SmolStr> {
    let name = path.file_name()?.to_str()?;
    if name == META_FILE {
        return None;
    }
    let slug = name.strip_suffix(".json")?;
    is_valid_slug(slug).then(|| SmolStr::new(slug))
}

/// Writes through a hidden temp file and a rename.
///
/// Every call gets its own temp file, so concurrent writers to one path
/// never share one.
pub fn write_atomic(path: &Path, text: &str) -> Result<(), ServerError> {
    let dir = path
        .parent()
        .ok_or_else(|| ServerError::Server(format!("no parent for {}", path.display()).into()))?;
    fs::create_dir_all(dir).map_err(|err| ServerError::io(dir.display(), &err))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let temp = dir.join(format!(".{file_name}.{}.{seq}.tmp", std::process::id()));
    fs::write(&temp, text).map_err(|err| ServerError::io(temp.display(), &err))?;
    fs::rename(&temp, path).map_err(|err| {
        let _ = fs::remove_file(&temp);
        ServerError::io(path.display(), &err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LibraryConfig;
    use crate::test_support::{temp_dir, write_file};

    fn store(root: &Path) -> (VariationStore, ComponentRef) {
        write_file(&root.join("src/buttons/Button.jsx"), "");
        let library = Arc::new(Library::new(LibraryConfig {
            root: root.join("src"),
            extensions: vec!["jsx".into()],
            variations: root.join("variations"),
        }));
        let component = library.resolve("buttons/Button.jsx").expect("component");
        (VariationStore::new(library), component)
    }

    #[test]
    fn variations_round_trip_through_disk() {
        let root = temp_dir("swatch-store");
        let (store, button) = store(&root);
        assert!(store.list_variations(&button).expect("list").is_empty());

        assert_eq!(
            store.write_variation(&button, "primary", "{}\n").expect("write"),
            WriteOutcome::Created
        );
        assert_eq!(
            store.write_variation(&button, "primary", "{\"props\":{}}\n").expect("write"),
            WriteOutcome::Updated
        );
        store.write_variation(&button, "ghost", "not json").expect("write");
        store.write_metadata(&button, "{}\n").expect("meta");

        let listed = store.list_variations(&button).expect("list");
        let slugs: Vec<_> = listed.keys().map(SmolStr::as_str).collect();
        assert_eq!(slugs, ["ghost", "primary"]);
        assert_eq!(listed["ghost"], "not json");
        assert!(root.join("variations/buttons/Button/primary.json").is_file());
        assert_eq!(store.read_metadata(&button).expect("meta"), "{}\n");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn delete_reports_missing_variations() {
        let root = temp_dir("swatch-store-delete");
        let (store, button) = store(&root);
        store.write_variation(&button, "primary", "{}").expect("write");
        store.delete_variation(&button, "primary").expect("delete");
        let err = store.delete_variation(&button, "primary").unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(store.read_variation(&button, "primary").unwrap_err().status_code(), 404);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn slugs_cannot_escape_or_shadow_metadata() {
        let root = temp_dir("swatch-store-slug");
        let (store, button) = store(&root);
        for slug in ["../x", "Primary", "", "meta", "a/b"] {
            let err = store.write_variation(&button, slug, "{}").unwrap_err();
            assert_eq!(err.status_code(), 400, "{slug}");
        }
        assert_eq!(store.read_metadata(&button).expect("meta"), "");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn concurrent_writes_to_one_file_do_not_collide() {
        let root = temp_dir("swatch-store-concurrent");
        let path = root.join("variations/primary.json");
        let writers: Vec<_> = (0..8)
            .map(|writer| {
                let path = path.clone();
                std::thread::spawn(move || {
                    for round in 0..20 {
                        let text = format!("{{\"writer\":{writer},\"round\":{round}}}\n");
                        write_atomic(&path, &text).expect("atomic write");
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().expect("writer thread");
        }
        let text = fs::read_to_string(&path).expect("final file");
        assert!(text.contains("\"round\":19"), "{text}");
        let leftovers: Vec<_> = fs::read_dir(root.join("variations"))
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn temp_files_are_not_listed() {
        let root = temp_dir("swatch-store-temp");
        let (store, button) = store(&root);
        write_file(&root.join("variations/buttons/Button/.primary.json.1.tmp"), "{}");
        write_file(&root.join("variations/buttons/Button/notes.txt"), "");
        assert!(store.list_variations(&button).expect("list").is_empty());
        let _ = fs::remove_dir_all(root);
    }
}
