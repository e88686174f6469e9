//! Navigation entries published by component views.

use std::fmt;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use smol_str::SmolStr;

/// Source id under which variation links are published.
pub const PLAYGROUND_SOURCE: &str = "playground-plugin";

/// One link in a component's navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavEntry {
    /// Link text.
    pub title: String,
    /// Anchor id; the variation slug.
    pub id: SmolStr,
}

/// Receives the links a component page wants shown in site navigation.
pub trait Navigation: Send + Sync {
    /// Replaces the entries `source_id` publishes for `component`.
    fn update_navigation(&self, component: &str, source_id: &str, entries: Vec<NavEntry>);
}

/// In-process navigation store keyed by component and source.
#[derive(Default)]
pub struct NavigationRegistry {
    entries: Mutex<IndexMap<(SmolStr, SmolStr), Vec<NavEntry>>>,
}

impl fmt::Debug for NavigationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationRegistry")
            .field("sources", &self.entries.lock().len())
            .finish()
    }
}

impl NavigationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries last published by `source_id` for `component`.
    #[must_use]
    pub fn entries(&self, component: &str, source_id: &str) -> Vec<NavEntry> {
        self.entries
            .lock()
            .get(&(SmolStr::new(component), SmolStr::new(source_id)))
            .cloned()
            .unwrap_or_default()
    }

    /// Every entry for `component`, grouped by source in publish order.
    #[must_use]
    pub fn component(&self, component: &str) -> Vec<(SmolStr, Vec<NavEntry>)> {
        self.entries
            .lock()
            .iter()
            .filter(|((path, _), _)| path == component)
            .map(|((_, source), entries)| (source.clone(), entries.clone()))
            .collect()
    }
}

impl Navigation for NavigationRegistry {
    fn update_navigation(&self, component: &str, source_id: &str, entries: Vec<NavEntry>) {
        self.entries
            .lock()
            .insert((SmolStr::new(component), SmolStr::new(source_id)), entries);
    }
}
