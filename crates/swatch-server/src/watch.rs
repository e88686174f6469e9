//! Filesystem watcher turning disk changes into push events.
//!
//! Raw notifications are debounced, then the library is rescanned and
//! compared with the previous scan. Only real differences are broadcast,
//! so editor save dances and our own atomic renames collapse into one event.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use smol_str::SmolStr;
use swatch_core::wire::{PushEvent, PushEventKind};
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::push::PushHub;
use crate::store::VariationStore;

const STOP_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ComponentState {
    metadata: u64,
    variations: BTreeMap<SmolStr, u64>,
}

/// Content fingerprints of every component's metadata and variations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibrarySnapshot {
    components: BTreeMap<SmolStr, ComponentState>,
}

fn fingerprint(parts: &[&str]) -> u64 {
    let mut hasher = DefaultHasher::new();
    parts.hash(&mut hasher);
    hasher.finish()
}

impl LibrarySnapshot {
    /// Scans the library; unreadable components are skipped with a warning.
    #[must_use]
    pub fn capture(store: &VariationStore) -> Self {
        let library = store.library();
        let components = match library.components() {
            Ok(components) => components,
            Err(err) => {
                warn!("library scan failed: {err}");
                return Self::default();
            }
        };
        let mut snapshot = Self::default();
        for component in components {
            let meta = store.read_metadata(&component).unwrap_or_default();
            let declarations: Vec<String> = library
                .declaration_inputs(&component)
                .iter()
                .map(|path| std::fs::read_to_string(path).unwrap_or_default())
                .collect();
            let mut parts = vec![meta.as_str()];
            parts.extend(declarations.iter().map(String::as_str));

            let variations = match store.list_variations(&component) {
                Ok(variations) => variations
                    .iter()
                    .map(|(slug, text)| (slug.clone(), fingerprint(&[text.as_str()])))
                    .collect(),
                Err(err) => {
                    warn!("variation scan failed for {}: {err}", component.path);
                    BTreeMap::new()
                }
            };
            snapshot.components.insert(
                component.path,
                ComponentState {
                    metadata: fingerprint(&parts),
                    variations,
                },
            );
        }
        snapshot
    }

    /// Events that turn `self` into `next`, grouped by component.
    #[must_use]
    pub fn diff(&self, next: &Self) -> Vec<PushEvent> {
        let mut events = Vec::new();
        for (path, state) in &next.components {
            let Some(previous) = self.components.get(path) else {
                events.push(PushEvent::new(PushEventKind::ComponentMetadataChanged, path.clone()));
                continue;
            };
            if previous.metadata != state.metadata {
                events.push(PushEvent::new(PushEventKind::ComponentMetadataChanged, path.clone()));
            }
            for (slug, hash) in &state.variations {
                match previous.variations.get(slug) {
                    None => events.push(PushEvent::new(
                        PushEventKind::ComponentVariationAdded,
                        path.clone(),
                    )),
                    Some(old) if old != hash => events.push(PushEvent::new(
                        PushEventKind::ComponentVariationChanged,
                        path.clone(),
                    )),
                    Some(_) => {}
                }
            }
            for slug in previous.variations.keys() {
                if !state.variations.contains_key(slug) {
                    events.push(PushEvent::new(
                        PushEventKind::ComponentVariationRemoved,
                        path.clone(),
                    ));
                }
            }
        }
        for path in self.components.keys() {
            if !next.components.contains_key(path) {
                events.push(PushEvent::new(PushEventKind::ComponentMetadataChanged, path.clone()));
            }
        }
        events.dedup();
        events
    }
}

fn is_relevant(event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    // Temp files of atomic writes are hidden; the rename target is not.
    event.paths.iter().any(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| !name.starts_with('.'))
    })
}

/// Keeps the watcher thread alive; stops it when dropped.
#[derive(Debug)]
pub struct WatchHandle {
    stop: Arc<AtomicBool>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Watches the library and variation roots and broadcasts changes.
pub fn spawn_library_watcher(
    store: VariationStore,
    hub: Arc<PushHub>,
    debounce: Duration,
) -> Result<WatchHandle, ServerError> {
    let roots = [
        store.library().root().to_path_buf(),
        store.library().variations_root().to_path_buf(),
    ];
    for root in &roots {
        std::fs::create_dir_all(root).map_err(|err| ServerError::io(root.display(), &err))?;
    }
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_thread = stop.clone();
    let (ready_tx, ready_rx) = channel::<Result<(), String>>();
    thread::spawn(move || {
        let (tx, rx) = channel::<notify::Result<Event>>();
        let mut watcher = match notify::recommended_watcher(move |result| {
            let _ = tx.send(result);
        }) {
            Ok(watcher) => watcher,
            Err(err) => {
                let _ = ready_tx.send(Err(err.to_string()));
                return;
            }
        };
        for root in &roots {
            if let Err(err) = watcher.watch(root, RecursiveMode::Recursive) {
                let _ = ready_tx.send(Err(format!("watch '{}': {err}", root.display())));
                return;
            }
        }
        let mut snapshot = LibrarySnapshot::capture(&store);
        let _ = ready_tx.send(Ok(()));

        while !stop_for_thread.load(Ordering::SeqCst) {
            let triggered = match rx.recv_timeout(STOP_POLL) {
                Ok(Ok(event)) => is_relevant(&event),
                Ok(Err(err)) => {
                    warn!("library watcher event error: {err}");
                    false
                }
                Err(RecvTimeoutError::Timeout) => false,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if !triggered {
                continue;
            }

            let mut deadline = Instant::now() + debounce;
            loop {
                let Some(timeout) = deadline.checked_duration_since(Instant::now()) else {
                    break;
                };
                match rx.recv_timeout(timeout) {
                    Ok(Ok(event)) => {
                        if is_relevant(&event) {
                            deadline = Instant::now() + debounce;
                        }
                    }
                    Ok(Err(err)) => warn!("library watcher event error: {err}"),
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }

            let next = LibrarySnapshot::capture(&store);
            for event in snapshot.diff(&next) {
                hub.broadcast(&event);
            }
            snapshot = next;
        }
        debug!("library watcher stopped");
    });
    match ready_rx.recv_timeout(Duration::from_secs(5)) {
        Ok(Ok(())) => Ok(WatchHandle { stop }),
        Ok(Err(err)) => Err(ServerError::Server(format!("library watcher: {err}").into())),
        Err(_) => Err(ServerError::Server("library watcher did not start".into())),
    }
}
