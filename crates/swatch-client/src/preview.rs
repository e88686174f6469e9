//! Preview frame lifecycle.
//!
//! A frame is booted once with a sandbox document and seed props, then kept
//! in sync through the update entry point the runtime bundle installs. There
//! is no queue: an update delivered before the host reports the mount is
//! dropped, and the frame shows the seed props until the next update.
//!
//! [`PreviewFrames`] keeps one frame per previewable variation of a
//! component page, keyed by slug.

use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use swatch_core::preview::PreviewDocument;
use swatch_core::Props;
use tracing::debug;

/// The embedded browsing context a frame renders into.
pub trait FrameHost {
    /// Replaces the frame contents with `html`.
    fn write_document(&mut self, html: &str);

    /// Sets the seed value the bootstrap script reads once.
    fn set_initial_data(&mut self, props: &Props);

    /// Whether the bootstrap script has installed its update entry point
    /// ([`UPDATE_ENTRY`](swatch_core::preview::UPDATE_ENTRY)).
    fn has_update_entry(&self) -> bool;

    /// Calls the update entry point, re-rendering the mounted component
    /// with `props`.
    fn call_update(&mut self, props: &Props);
}

impl<H: FrameHost + ?Sized> FrameHost for Box<H> {
    fn write_document(&mut self, html: &str) {
        (**self).write_document(html);
    }

    fn set_initial_data(&mut self, props: &Props) {
        (**self).set_initial_data(props);
    }

    fn has_update_entry(&self) -> bool {
        (**self).has_update_entry()
    }

    fn call_update(&mut self, props: &Props) {
        (**self).call_update(props);
    }
}

/// Creates the browsing context for a new frame.
pub trait FrameFactory: Send + Sync {
    /// Host for the preview of variation `slug` of `component`.
    fn create(&self, component: &str, slug: &str) -> Box<dyn FrameHost + Send>;
}

/// Lifecycle of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Created, nothing written yet.
    Uninitialized,
    /// Document written; waiting for the component to mount.
    Booting,
    /// Accepting updates.
    Mounted,
    /// Inside a call to the update entry point.
    Updating,
    /// Gone; nothing reaches the host any more.
    TornDown,
}

/// What happened to one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The host re-rendered with the new props.
    Applied,
    /// The frame had not mounted yet.
    Dropped,
    /// The frame is torn down.
    Ignored,
}

/// One sandboxed preview of a component.
#[derive(Debug)]
pub struct PreviewFrame<H> {
    host: H,
    document: PreviewDocument,
    state: FrameState,
}

impl<H: FrameHost> PreviewFrame<H> {
    /// A frame that will boot `document` into `host`.
    pub fn new(host: H, document: PreviewDocument) -> Self {
        Self {
            host,
            document,
            state: FrameState::Uninitialized,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// The host this frame renders into.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host, e.g. to deliver its events.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Writes the document and seeds `props`. Only the first call boots.
    pub fn boot(&mut self, props: &Props) -> bool {
        if self.state != FrameState::Uninitialized {
            return false;
        }
        self.host.write_document(&self.document.render());
        self.host.set_initial_data(props);
        self.state = FrameState::Booting;
        true
    }

    /// Called by the host once the bootstrap script mounted the component.
    pub fn mounted(&mut self) {
        if self.state == FrameState::Booting {
            self.state = FrameState::Mounted;
        }
    }

    /// Pushes new props into the mounted component.
    pub fn update(&mut self, props: &Props) -> UpdateOutcome {
        match self.state {
            FrameState::TornDown => return UpdateOutcome::Ignored,
            FrameState::Mounted | FrameState::Updating => {}
            FrameState::Uninitialized | FrameState::Booting => {
                debug!("preview update before mount dropped");
                return UpdateOutcome::Dropped;
            }
        }
        if !self.host.has_update_entry() {
            debug!("preview has no update entry point; update dropped");
            return UpdateOutcome::Dropped;
        }
        self.state = FrameState::Updating;
        self.host.call_update(props);
        self.state = FrameState::Mounted;
        UpdateOutcome::Applied
    }

    /// Stops all further traffic to the host.
    pub fn teardown(&mut self) {
        self.state = FrameState::TornDown;
    }
}

/// Frame type held by [`PreviewFrames`].
pub type BoxedFrame = PreviewFrame<Box<dyn FrameHost + Send>>;

/// What [`PreviewFrames::show`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    /// A new frame was created and booted with the props.
    Booted,
    /// The frame already shows these props.
    Unchanged,
    /// The props went to the existing frame.
    Updated(UpdateOutcome),
}

struct Slot {
    frame: BoxedFrame,
    shown: Props,
}

/// The live frames of one component page, keyed by variation slug.
///
/// A frame is booted once per slug and afterwards only receives updates,
/// so editing a variation never reloads its sandbox.
pub struct PreviewFrames {
    component: SmolStr,
    document: PreviewDocument,
    factory: Arc<dyn FrameFactory>,
    slots: IndexMap<SmolStr, Slot>,
}

impl std::fmt::Debug for PreviewFrames {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewFrames")
            .field("component", &self.component)
            .field("slugs", &self.slots.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl PreviewFrames {
    /// No frames yet; new ones boot `document` into hosts from `factory`.
    pub fn new(
        component: impl Into<SmolStr>,
        document: PreviewDocument,
        factory: Arc<dyn FrameFactory>,
    ) -> Self {
        Self {
            component: component.into(),
            document,
            factory,
            slots: IndexMap::new(),
        }
    }

    /// Shows `props` in the frame of `slug`, booting the frame on first use.
    pub fn show(&mut self, slug: &str, props: &Props) -> ShowOutcome {
        if let Some(slot) = self.slots.get_mut(slug) {
            if slot.shown == *props {
                return ShowOutcome::Unchanged;
            }
            // A dropped update is not retried; the frame keeps what it shows.
            slot.shown = props.clone();
            return ShowOutcome::Updated(slot.frame.update(props));
        }
        let host = self.factory.create(&self.component, slug);
        let mut frame = PreviewFrame::new(host, self.document.clone());
        frame.boot(props);
        debug!("booted preview of {}/{slug}", self.component);
        self.slots.insert(
            SmolStr::new(slug),
            Slot {
                frame,
                shown: props.clone(),
            },
        );
        ShowOutcome::Booted
    }

    /// Reports that the component inside the frame of `slug` mounted.
    pub fn mounted(&mut self, slug: &str) -> bool {
        match self.slots.get_mut(slug) {
            Some(slot) => {
                slot.frame.mounted();
                slot.frame.state() == FrameState::Mounted
            }
            None => false,
        }
    }

    /// Tears down and forgets the frame of `slug`.
    pub fn remove(&mut self, slug: &str) -> bool {
        match self.slots.shift_remove(slug) {
            Some(mut slot) => {
                slot.frame.teardown();
                true
            }
            None => false,
        }
    }

    /// Tears down every frame whose slug fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.slots.retain(|slug, slot| {
            let kept = keep(slug);
            if !kept {
                slot.frame.teardown();
            }
            kept
        });
    }

    /// Tears down every frame.
    pub fn clear(&mut self) {
        self.retain(|_| false);
    }

    /// The frame of `slug`, if one is live.
    #[must_use]
    pub fn frame(&self, slug: &str) -> Option<&BoxedFrame> {
        self.slots.get(slug).map(|slot| &slot.frame)
    }

    /// Number of live frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no frame is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
