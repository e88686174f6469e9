//! Component view state machine.
//!
//! A [`ComponentView`] owns everything one component page shows: the
//! resolved control schema, the decoded variations, the open modal and the
//! debounced writers. It performs no I/O. Operations queue [`Outgoing`]
//! requests; whoever executes them reports back through
//! [`ComponentView::complete`], and [`ComponentView::poll`] fires the
//! debounce timers.
//!
//! Every request carries a [`Ticket`] stamped with the mount epoch.
//! Unmounting bumps the epoch, so completions of requests issued by an
//! earlier mount are ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use smol_str::SmolStr;
use swatch_core::codec::{
    decode_metadata, decode_variation, encode_metadata, encode_variation, VariationSource,
};
use swatch_core::control::{ControlRegistry, Edit};
use swatch_core::form::{PropForm, Widget};
use swatch_core::preview::PreviewDocument;
use swatch_core::resolve::resolve;
use swatch_core::slug::{is_reserved_slug, slugify};
use swatch_core::wire::{
    Ack, ComponentResponse, PushEvent, SaveMetadata, SaveVariation, VariationsResponse,
};
use swatch_core::{
    ControlDescriptor, ControlKind, CustomMetadata, DecodeError, PropDeclaration, Props, Variation,
};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::debounce::{DebounceState, Debouncer};
use crate::error::ClientError;
use crate::navigation::{NavEntry, Navigation, PLAYGROUND_SOURCE};
use crate::preview::{FrameFactory, PreviewFrames};
use crate::scroll::ScrollLock;

/// Identifies one request within one mount of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    /// Mount generation; bumped by every mount and unmount.
    pub epoch: u64,
    /// Position within the epoch.
    pub seq: u64,
}

/// Server call a view wants made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `GET /components/{path}`.
    FetchMetadata,
    /// `GET /variations/{path}`.
    FetchVariations,
    /// `POST /variations/{path}`.
    SaveVariation(SaveVariation),
    /// `DELETE /variations/{path}?variation={slug}`.
    DeleteVariation {
        /// Variation to delete.
        slug: SmolStr,
    },
    /// `POST /components/{path}`.
    SaveMetadata(SaveMetadata),
}

/// A request with its routing information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// Identifies the completion.
    pub ticket: Ticket,
    /// Component the request concerns.
    pub component: SmolStr,
    /// What to send.
    pub request: Request,
}

/// Decoded server answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Answer to [`Request::FetchMetadata`].
    Component(ComponentResponse),
    /// Answer to [`Request::FetchVariations`].
    Variations(VariationsResponse),
    /// Answer to writes and deletes.
    Ack(Ack),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Purpose {
    Metadata,
    Variations,
    Create(SmolStr),
    Persist(SmolStr),
    Randomize(SmolStr),
    Delete(SmolStr),
    PersistMetadata,
}

/// The modal currently open, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "slug", rename_all = "camelCase")]
pub enum EditMode {
    /// Editing the props of one variation.
    Variation(SmolStr),
    /// Editing the control overrides of the component.
    CustomMetadata,
}

/// What the page should draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum ViewModel {
    /// `meta.json` does not decode; nothing else is shown.
    MetadataError {
        /// Decode error message.
        message: String,
        /// File to fix.
        location: String,
    },
    /// Waiting for metadata or variations.
    Loading,
    /// Everything loaded.
    Ready(ReadyView),
}

/// Page contents once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyView {
    /// Component display name.
    pub title: SmolStr,
    /// Component doc comment.
    pub description: Option<String>,
    /// One card per variation, in slug order.
    pub cards: Vec<VariationCard>,
    /// Why the last create was refused.
    pub create_error: Option<String>,
    /// The open modal.
    pub modal: Option<ModalView>,
    /// Whether the page behind a modal must not scroll.
    pub scroll_locked: bool,
}

/// One entry of the variation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "card", rename_all = "camelCase")]
pub enum VariationCard {
    /// A variation that decoded; previewed with `props`.
    Preview {
        /// Variation slug.
        slug: SmolStr,
        /// Name, or the slug when there is none.
        title: String,
        /// Props to render.
        props: Props,
    },
    /// A variation whose source does not decode.
    Broken {
        /// Variation slug.
        slug: SmolStr,
        /// Decode error message.
        error: String,
        /// File to fix.
        location: String,
    },
}

/// Contents of the open modal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "modal", rename_all = "camelCase")]
pub enum ModalView {
    /// Property form of one variation.
    Variation {
        /// Variation slug.
        slug: SmolStr,
        /// Name, or the slug when there is none.
        title: String,
        /// One widget per descriptor.
        form: Vec<Widget>,
        /// Current props.
        props: Props,
    },
    /// One control kind selector per declared property.
    CustomMetadata {
        /// Selectors in declaration order.
        controls: Vec<Widget>,
    },
}

/// State of one component page.
pub struct ComponentView {
    component: SmolStr,
    config: ClientConfig,
    registry: Arc<ControlRegistry>,
    navigation: Arc<dyn Navigation>,
    rng: StdRng,

    epoch: u64,
    seq: u64,
    mounted: bool,
    outbox: Vec<Outgoing>,
    in_flight: HashMap<u64, Purpose>,

    loading_metadata: bool,
    loading_variations: bool,
    metadata_error: Option<DecodeError>,
    name: SmolStr,
    description: Option<String>,
    declarations: IndexMap<SmolStr, PropDeclaration>,
    custom: CustomMetadata,
    descriptors: IndexMap<SmolStr, ControlDescriptor>,
    variations: IndexMap<SmolStr, Variation>,
    create_error: Option<String>,
    edit_mode: Option<EditMode>,
    scroll: ScrollLock,

    variation_writes: Debouncer<SmolStr, Props>,
    metadata_writes: Debouncer<(), CustomMetadata>,
    frames: Option<PreviewFrames>,
}

impl std::fmt::Debug for ComponentView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentView")
            .field("component", &self.component)
            .field("epoch", &self.epoch)
            .field("mounted", &self.mounted)
            .field("variations", &self.variations.len())
            .field("edit_mode", &self.edit_mode)
            .finish_non_exhaustive()
    }
}

impl ComponentView {
    /// View of `component`; nothing is fetched before [`ComponentView::mount`].
    pub fn new(
        component: impl Into<SmolStr>,
        config: ClientConfig,
        registry: Arc<ControlRegistry>,
        navigation: Arc<dyn Navigation>,
    ) -> Self {
        let component = component.into();
        let delay = config.persistence_delay;
        let name = component
            .rsplit('/')
            .next()
            .and_then(|file| file.split('.').next())
            .map_or_else(|| component.clone(), SmolStr::new);
        Self {
            component,
            config,
            registry,
            navigation,
            rng: StdRng::from_os_rng(),
            epoch: 0,
            seq: 0,
            mounted: false,
            outbox: Vec::new(),
            in_flight: HashMap::new(),
            loading_metadata: true,
            loading_variations: true,
            metadata_error: None,
            name,
            description: None,
            declarations: IndexMap::new(),
            custom: CustomMetadata::default(),
            descriptors: IndexMap::new(),
            variations: IndexMap::new(),
            create_error: None,
            edit_mode: None,
            scroll: ScrollLock::default(),
            variation_writes: Debouncer::new(delay),
            metadata_writes: Debouncer::new(delay),
            frames: None,
        }
    }

    /// Replaces the random source, e.g. with a seeded one.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Gives every previewable variation a live frame booted from
    /// `document` into hosts made by `factory`.
    #[must_use]
    pub fn with_preview_frames(
        mut self,
        document: PreviewDocument,
        factory: Arc<dyn FrameFactory>,
    ) -> Self {
        self.frames = Some(PreviewFrames::new(self.component.clone(), document, factory));
        self
    }

    /// Live preview frames, when the view was given a frame factory.
    #[must_use]
    pub fn preview_frames(&self) -> Option<&PreviewFrames> {
        self.frames.as_ref()
    }

    /// Forwards the mount signal of the frame of `slug`.
    pub fn preview_mounted(&mut self, slug: &str) -> bool {
        self.frames
            .as_mut()
            .is_some_and(|frames| frames.mounted(slug))
    }

    /// Component path.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Whether the view is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Current mount epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Resolved descriptors keyed by property name.
    #[must_use]
    pub fn descriptors(&self) -> &IndexMap<SmolStr, ControlDescriptor> {
        &self.descriptors
    }

    /// Overrides from `meta.json`.
    #[must_use]
    pub fn custom_metadata(&self) -> &CustomMetadata {
        &self.custom
    }

    /// Why `meta.json` did not decode, if it did not.
    #[must_use]
    pub fn metadata_error(&self) -> Option<&DecodeError> {
        self.metadata_error.as_ref()
    }

    /// Variations keyed by slug.
    #[must_use]
    pub fn variations(&self) -> &IndexMap<SmolStr, Variation> {
        &self.variations
    }

    /// One variation.
    #[must_use]
    pub fn variation(&self, slug: &str) -> Option<&Variation> {
        self.variations.get(slug)
    }

    /// Why the last create was refused.
    #[must_use]
    pub fn create_error(&self) -> Option<&str> {
        self.create_error.as_deref()
    }

    /// The open modal.
    #[must_use]
    pub fn edit_mode(&self) -> Option<&EditMode> {
        self.edit_mode.as_ref()
    }

    /// Whether page scrolling is locked.
    #[must_use]
    pub fn scroll_locked(&self) -> bool {
        self.scroll.is_locked()
    }

    /// Whether metadata or variations are still loading.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading_metadata || self.loading_variations
    }

    /// Debounced write state of variation `slug`.
    #[must_use]
    pub fn write_state(&self, slug: &str) -> DebounceState {
        self.variation_writes.state(&SmolStr::new(slug))
    }

    /// Earliest debounce deadline, for the driver's timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (
            self.variation_writes.next_deadline(),
            self.metadata_writes.next_deadline(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// No queued requests and no pending or in-flight debounced writes.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.outbox.is_empty() && self.variation_writes.is_idle() && self.metadata_writes.is_idle()
    }

    /// Requests queued since the last call.
    pub fn take_requests(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    fn enqueue(&mut self, request: Request, purpose: Purpose) -> Ticket {
        self.seq += 1;
        let ticket = Ticket {
            epoch: self.epoch,
            seq: self.seq,
        };
        self.in_flight.insert(ticket.seq, purpose);
        self.outbox.push(Outgoing {
            ticket,
            component: self.component.clone(),
            request,
        });
        ticket
    }

    /// Starts a new epoch and fetches metadata and variations. A no-op when mounted.
    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        self.loading_metadata = true;
        self.loading_variations = true;
        self.fetch_metadata();
        self.fetch_variations();
    }

    /// Ignores in-flight completions from now on and closes any modal.
    ///
    /// Edits still waiting for their quiet period are sent right away.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        for (slug, props) in self.variation_writes.flush() {
            self.send_variation(slug.clone(), props, Purpose::Persist(slug));
        }
        for ((), metadata) in self.metadata_writes.flush() {
            self.send_metadata(&metadata);
        }
        self.variation_writes.reset();
        self.metadata_writes.reset();
        self.stop_edit();
        self.mounted = false;
        self.epoch += 1;
        self.in_flight.clear();
        if let Some(frames) = self.frames.as_mut() {
            frames.clear();
        }
    }

    /// Queues a metadata fetch.
    pub fn fetch_metadata(&mut self) {
        self.enqueue(Request::FetchMetadata, Purpose::Metadata);
    }

    /// Queues a variation list fetch.
    pub fn fetch_variations(&mut self) {
        self.enqueue(Request::FetchVariations, Purpose::Variations);
    }

    fn form(&self) -> PropForm<'_> {
        PropForm::new(&self.registry, &self.descriptors)
    }

    fn random_props(&mut self) -> Props {
        let registry = Arc::clone(&self.registry);
        PropForm::new(&registry, &self.descriptors).random_props(&mut self.rng)
    }

    fn send_variation(&mut self, slug: SmolStr, props: Props, purpose: Purpose) -> Ticket {
        let name = self
            .variations
            .get(&slug)
            .and_then(|variation| variation.name.clone());
        let code = encode_variation(&VariationSource { name, props });
        self.enqueue(
            Request::SaveVariation(SaveVariation {
                variation: slug,
                code,
            }),
            purpose,
        )
    }

    fn send_metadata(&mut self, metadata: &CustomMetadata) -> Ticket {
        let code = encode_metadata(metadata);
        self.enqueue(Request::SaveMetadata(SaveMetadata { code }), Purpose::PersistMetadata)
    }

    /// Creates a variation with random props under the slug of `name`.
    ///
    /// Names that slugify to nothing, to a reserved slug, or to a slug that
    /// is already taken set the create error and send nothing.
    pub fn create_variation(&mut self, name: &str) -> Result<SmolStr, ClientError> {
        let slug = SmolStr::new(slugify(name));
        let refused = if slug.is_empty() || is_reserved_slug(&slug) {
            Some(ClientError::InvalidName(SmolStr::new(name.trim())))
        } else if self.variations.contains_key(&slug) {
            Some(ClientError::DuplicateVariation(SmolStr::new(name.trim())))
        } else {
            None
        };
        if let Some(err) = refused {
            self.create_error = Some(err.to_string());
            return Err(err);
        }
        self.create_error = None;
        let props = self.random_props();
        // Listed right away so a second create with the same slug is refused.
        self.variations.insert(
            slug.clone(),
            Variation {
                slug: slug.clone(),
                name: Some(name.trim().to_string()),
                content: Ok(props.clone()),
            },
        );
        self.send_variation(slug.clone(), props, Purpose::Create(slug.clone()));
        Ok(slug)
    }

    /// Applies `props` locally and schedules the write.
    pub fn update_variation(&mut self, slug: &str, props: Props, now: Instant) {
        let Some(variation) = self.variations.get_mut(slug) else {
            warn!("update of unknown variation '{slug}' of {}", self.component);
            return;
        };
        variation.content = Ok(props.clone());
        let slug = variation.slug.clone();
        if let Some(frames) = self.frames.as_mut() {
            frames.show(&slug, &props);
        }
        self.variation_writes.schedule(slug, props, now);
    }

    /// Applies one control edit to one property of a variation.
    pub fn edit_variation_prop(&mut self, slug: &str, prop: &str, edit: &Edit, now: Instant) {
        let Some(current) = self.variations.get(slug) else {
            warn!("edit of unknown variation '{slug}' of {}", self.component);
            return;
        };
        let current = current.props().cloned().unwrap_or_default();
        let registry = Arc::clone(&self.registry);
        let next = PropForm::new(&registry, &self.descriptors)
            .apply(&mut self.rng, &current, prop, edit);
        self.update_variation(slug, next, now);
    }

    /// Writes fresh random props immediately, replacing any pending edit.
    pub fn randomize_variation(&mut self, slug: &str) {
        let Some(slug) = self.variations.get(slug).map(|variation| variation.slug.clone()) else {
            warn!("randomize of unknown variation '{slug}' of {}", self.component);
            return;
        };
        self.variation_writes.cancel(&slug);
        let props = self.random_props();
        if let Some(variation) = self.variations.get_mut(&slug) {
            variation.content = Ok(props.clone());
        }
        if let Some(frames) = self.frames.as_mut() {
            frames.show(&slug, &props);
        }
        self.send_variation(slug.clone(), props, Purpose::Randomize(slug));
    }

    /// Cancels any pending edit and deletes the variation file.
    pub fn delete_variation(&mut self, slug: &str) {
        let slug = SmolStr::new(slug);
        self.variation_writes.cancel(&slug);
        self.enqueue(
            Request::DeleteVariation { slug: slug.clone() },
            Purpose::Delete(slug),
        );
    }

    /// Recomputes the schema at once and schedules the metadata write.
    pub fn update_custom_metadata(&mut self, metadata: CustomMetadata, now: Instant) {
        self.descriptors = resolve(&self.declarations, &metadata.props);
        self.custom = metadata.clone();
        self.loading_metadata = false;
        self.metadata_writes.schedule((), metadata, now);
    }

    /// Opens the variation modal; false when the slug is unknown.
    pub fn start_variation_edit(&mut self, slug: &str) -> bool {
        let Some(slug) = self.variations.get(slug).map(|variation| variation.slug.clone()) else {
            return false;
        };
        self.edit_mode = Some(EditMode::Variation(slug));
        self.scroll.lock();
        true
    }

    /// Opens the custom metadata modal.
    pub fn start_custom_metadata_edit(&mut self) {
        self.edit_mode = Some(EditMode::CustomMetadata);
        self.scroll.lock();
    }

    /// Closes the modal and unlocks scrolling.
    pub fn stop_edit(&mut self) {
        self.edit_mode = None;
        self.scroll.unlock();
    }

    /// Closes the open modal; false when there was none.
    pub fn escape(&mut self) -> bool {
        if self.edit_mode.is_none() {
            return false;
        }
        self.stop_edit();
        true
    }

    /// Refetches what a push event concerns; other components are ignored.
    pub fn push(&mut self, event: &PushEvent) {
        if !self.mounted || event.component != self.component {
            return;
        }
        debug!("push {} for {}", event.event.as_str(), event.component);
        if event.event.is_metadata() {
            self.fetch_metadata();
        } else {
            self.fetch_variations();
        }
    }

    /// Queues the debounced writes whose quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) {
        for (slug, props) in self.variation_writes.due(now) {
            self.send_variation(slug.clone(), props, Purpose::Persist(slug));
        }
        for ((), metadata) in self.metadata_writes.due(now) {
            self.send_metadata(&metadata);
        }
    }

    /// Applies the outcome of a request.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<Response, ClientError>,
        now: Instant,
    ) {
        if ticket.epoch != self.epoch {
            debug!("ignoring completion from an earlier mount of {}", self.component);
            return;
        }
        let Some(purpose) = self.in_flight.remove(&ticket.seq) else {
            return;
        };
        match &purpose {
            Purpose::Persist(slug) => self.variation_writes.finished(slug, now),
            Purpose::PersistMetadata => self.metadata_writes.finished(&(), now),
            _ => {}
        }
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!("{} request for {} failed: {err}", purpose.label(), self.component);
                return;
            }
        };
        match (purpose, response) {
            (Purpose::Metadata, Response::Component(component)) => self.apply_metadata(component),
            (Purpose::Variations, Response::Variations(variations)) => {
                self.apply_variations(variations);
            }
            (
                Purpose::Create(_) | Purpose::Persist(_) | Purpose::Randomize(_),
                Response::Ack(_),
            ) => self.fetch_variations(),
            (Purpose::Delete(slug), Response::Ack(_)) => {
                if let Some(frames) = self.frames.as_mut() {
                    frames.remove(&slug);
                }
                if matches!(self.edit_mode, Some(EditMode::Variation(_))) {
                    self.stop_edit();
                }
                self.fetch_variations();
            }
            (Purpose::PersistMetadata, Response::Ack(_)) => {}
            (purpose, response) => warn!(
                "unexpected response to {} request for {}: {response:?}",
                purpose.label(),
                self.component
            ),
        }
    }

    fn apply_metadata(&mut self, response: ComponentResponse) {
        match decode_metadata(&response.data) {
            Ok(custom) => {
                self.descriptors = resolve(&response.props, &custom.props);
                self.declarations = response.props;
                self.custom = custom;
                if !response.name.is_empty() {
                    self.name = response.name;
                }
                self.description = response.description;
                self.metadata_error = None;
                self.loading_metadata = false;
            }
            Err(err) => {
                warn!("custom metadata of {} does not decode: {err}", self.component);
                self.metadata_error = Some(err);
            }
        }
    }

    /// Boots frames for new variations and pushes changed props into the
    /// others. Broken and vanished variations lose their frame.
    fn sync_frames(&mut self) {
        let Some(frames) = self.frames.as_mut() else {
            return;
        };
        frames.retain(|slug| self.variations.contains_key(slug));
        for variation in self.variations.values() {
            match &variation.content {
                Ok(props) => {
                    frames.show(&variation.slug, props);
                }
                Err(_) => {
                    frames.remove(&variation.slug);
                }
            }
        }
    }

    fn apply_variations(&mut self, response: VariationsResponse) {
        self.variations = response
            .data
            .into_iter()
            .map(|(slug, source)| {
                let variation = match decode_variation(&source) {
                    Ok(decoded) => Variation {
                        slug: slug.clone(),
                        name: decoded.name,
                        content: Ok(decoded.props),
                    },
                    Err(err) => Variation {
                        slug: slug.clone(),
                        name: None,
                        content: Err(err),
                    },
                };
                (slug, variation)
            })
            .collect();
        self.loading_variations = false;
        self.sync_frames();
        let entries = self
            .variations
            .values()
            .map(|variation| NavEntry {
                title: variation.title().to_string(),
                id: variation.slug.clone(),
            })
            .collect();
        self.navigation
            .update_navigation(&self.component, PLAYGROUND_SOURCE, entries);
    }

    /// View model for the current state.
    #[must_use]
    pub fn render(&self) -> ViewModel {
        if let Some(err) = &self.metadata_error {
            return ViewModel::MetadataError {
                message: err.to_string(),
                location: self.config.meta_location(&self.component),
            };
        }
        if self.is_loading() {
            return ViewModel::Loading;
        }
        let location_base = self.config.meta_location(&self.component);
        let variation_dir = location_base
            .strip_suffix("meta.json")
            .unwrap_or(location_base.as_str())
            .to_string();
        let cards = self
            .variations
            .values()
            .map(|variation| match &variation.content {
                Ok(props) => VariationCard::Preview {
                    slug: variation.slug.clone(),
                    title: variation.title().to_string(),
                    props: props.clone(),
                },
                Err(err) => VariationCard::Broken {
                    slug: variation.slug.clone(),
                    error: err.to_string(),
                    location: format!("{variation_dir}{}.json", variation.slug),
                },
            })
            .collect();
        ViewModel::Ready(ReadyView {
            title: self.name.clone(),
            description: self.description.clone(),
            cards,
            create_error: self.create_error.clone(),
            modal: self.modal_view(),
            scroll_locked: self.scroll.is_locked(),
        })
    }

    fn modal_view(&self) -> Option<ModalView> {
        match self.edit_mode.as_ref()? {
            EditMode::Variation(slug) => {
                let variation = self.variations.get(slug)?;
                let props = variation.props().cloned().unwrap_or_default();
                Some(ModalView::Variation {
                    slug: slug.clone(),
                    title: variation.title().to_string(),
                    form: self.form().render(&props),
                    props,
                })
            }
            EditMode::CustomMetadata => {
                let options: Vec<String> = ControlKind::SELECTABLE
                    .iter()
                    .map(|kind| kind.as_str().to_string())
                    .collect();
                let controls = self
                    .descriptors
                    .iter()
                    .map(|(name, descriptor)| Widget::Select {
                        label: name.clone(),
                        options: options.clone(),
                        selected: ControlKind::SELECTABLE
                            .iter()
                            .position(|kind| *kind == descriptor.kind),
                    })
                    .collect();
                Some(ModalView::CustomMetadata { controls })
            }
        }
    }
}

impl Purpose {
    fn label(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Variations => "variations",
            Self::Create(_) => "create",
            Self::Persist(_) => "persist",
            Self::Randomize(_) => "randomize",
            Self::Delete(_) => "delete",
            Self::PersistMetadata => "metadata persist",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use swatch_core::wire::PushEventKind;
    use swatch_core::{CustomOverride, PropType, ScalarKind};

    use crate::navigation::NavigationRegistry;

    const COMPONENT: &str = "buttons/Button.jsx";

    fn view() -> (ComponentView, Arc<NavigationRegistry>) {
        let navigation = Arc::new(NavigationRegistry::new());
        let view = ComponentView::new(
            COMPONENT,
            ClientConfig::default(),
            Arc::new(ControlRegistry::with_builtin()),
            navigation.clone(),
        )
        .with_rng(StdRng::seed_from_u64(7));
        (view, navigation)
    }

    fn declarations() -> IndexMap<SmolStr, PropDeclaration> {
        let mut props = IndexMap::new();
        props.insert(
            SmolStr::new("label"),
            PropDeclaration::new(PropType::Scalar(ScalarKind::String), true),
        );
        props.insert(
            SmolStr::new("sizes"),
            PropDeclaration::new(
                PropType::ArrayOf(Box::new(PropType::Scalar(ScalarKind::Number))),
                true,
            ),
        );
        props
    }

    fn component_response(meta: &str) -> Response {
        Response::Component(ComponentResponse {
            data: meta.to_string(),
            props: declarations(),
            name: SmolStr::new("Button"),
            description: None,
        })
    }

    fn variations_response(sources: &[(&str, &str)]) -> Response {
        Response::Variations(VariationsResponse {
            data: sources
                .iter()
                .map(|(slug, source)| (SmolStr::new(*slug), (*source).to_string()))
                .collect(),
        })
    }

    /// Mounts and answers both initial fetches.
    fn ready(view: &mut ComponentView, meta: &str, sources: &[(&str, &str)]) {
        view.mount();
        let now = Instant::now();
        for outgoing in view.take_requests() {
            let response = match outgoing.request {
                Request::FetchMetadata => component_response(meta),
                Request::FetchVariations => variations_response(sources),
                other => panic!("unexpected request {other:?}"),
            };
            view.complete(outgoing.ticket, Ok(response), now);
        }
    }

    fn saves(outgoing: &[Outgoing]) -> Vec<(SmolStr, String)> {
        outgoing
            .iter()
            .filter_map(|outgoing| match &outgoing.request {
                Request::SaveVariation(save) => Some((save.variation.clone(), save.code.clone())),
                _ => None,
            })
            .collect()
    }

    fn label(text: &str) -> Props {
        let mut props = Props::new();
        props.insert("label".to_string(), json!(text));
        props
    }

    #[test]
    fn mount_fetches_metadata_and_variations() {
        let (mut view, _) = view();
        assert_eq!(view.render(), ViewModel::Loading);
        view.mount();
        let requests: Vec<_> = view
            .take_requests()
            .into_iter()
            .map(|outgoing| outgoing.request)
            .collect();
        assert_eq!(requests, vec![Request::FetchMetadata, Request::FetchVariations]);
        view.mount();
        assert!(view.take_requests().is_empty());
    }

    #[test]
    fn loading_lasts_until_both_halves_arrive() {
        let (mut view, _) = view();
        view.mount();
        let requests = view.take_requests();
        view.complete(requests[0].ticket, Ok(component_response("")), Instant::now());
        assert_eq!(view.render(), ViewModel::Loading);
        view.complete(requests[1].ticket, Ok(variations_response(&[])), Instant::now());
        assert!(matches!(view.render(), ViewModel::Ready(_)));
        assert_eq!(view.descriptors().len(), 2);
    }

    #[test]
    fn corrupt_variations_do_not_block_siblings() {
        let (mut view, navigation) = view();
        ready(
            &mut view,
            "",
            &[
                ("primary", "{\"name\":\"Primary\",\"props\":{\"label\":\"Go\"}}"),
                ("broken", "{ \"props\": "),
                ("plain", "{\"props\":{}}"),
            ],
        );
        assert_eq!(view.variations().len(), 3);
        let usable = view.variations().values().filter(|v| v.props().is_some()).count();
        assert_eq!(usable, 2);
        assert!(view.variation("broken").and_then(Variation::error).is_some());

        let titles: Vec<_> = navigation
            .entries(COMPONENT, PLAYGROUND_SOURCE)
            .into_iter()
            .map(|entry| (entry.title, entry.id))
            .collect();
        assert_eq!(
            titles,
            vec![
                ("Primary".to_string(), SmolStr::new("primary")),
                ("broken".to_string(), SmolStr::new("broken")),
                ("plain".to_string(), SmolStr::new("plain")),
            ]
        );

        let ViewModel::Ready(ready) = view.render() else {
            panic!("view should be ready");
        };
        match &ready.cards[1] {
            VariationCard::Broken { location, .. } => {
                assert_eq!(location, "variations/buttons/Button/broken.json");
            }
            other => panic!("expected broken card, got {other:?}"),
        }
    }

    #[test]
    fn metadata_errors_take_precedence_and_keep_the_schema() {
        let (mut view, _) = view();
        ready(&mut view, "", &[]);
        let schema = view.descriptors().clone();

        view.fetch_metadata();
        let outgoing = view.take_requests();
        view.complete(outgoing[0].ticket, Ok(component_response("{ nope")), Instant::now());
        assert_eq!(view.descriptors(), &schema);
        match view.render() {
            ViewModel::MetadataError { location, .. } => {
                assert_eq!(location, "variations/buttons/Button/meta.json");
            }
            other => panic!("expected metadata error, got {other:?}"),
        }

        view.fetch_metadata();
        let outgoing = view.take_requests();
        let fixed = r#"{"props":{"label":{"controlType":"enum"}}}"#;
        view.complete(outgoing[0].ticket, Ok(component_response(fixed)), Instant::now());
        assert!(view.metadata_error().is_none());
        assert_eq!(view.descriptors()["label"].kind, ControlKind::Enum);
    }

    #[test]
    fn duplicate_slugs_are_refused_before_any_request() {
        let (mut view, _) = view();
        ready(&mut view, "", &[]);

        assert_eq!(view.create_variation("Foo"), Ok(SmolStr::new("foo")));
        let first = view.take_requests();
        assert_eq!(saves(&first).len(), 1);

        let err = view.create_variation("  foo!  ").unwrap_err();
        assert_eq!(err, ClientError::DuplicateVariation("foo!".into()));
        assert!(view.take_requests().is_empty());
        assert_eq!(
            view.create_error(),
            Some("a variation with the name foo! already exists")
        );

        assert!(view.create_variation("???").unwrap_err().is_validation());
        assert!(view.create_variation("Meta").is_err());
        assert!(view.take_requests().is_empty());

        view.create_variation("Bar").expect("create");
        assert_eq!(view.create_error(), None);
    }

    #[test]
    fn created_variations_carry_name_and_random_props() {
        let (mut view, _) = view();
        ready(&mut view, "", &[]);
        view.create_variation("Big Button").expect("create");
        let outgoing = view.take_requests();
        let (slug, code) = &saves(&outgoing)[0];
        assert_eq!(slug, "big-button");
        let source = decode_variation(code).expect("encoded variation decodes");
        assert_eq!(source.name.as_deref(), Some("Big Button"));
        assert!(source.props["label"].is_string());
        let sizes = source.props["sizes"].as_array().expect("sizes array");
        assert!(sizes.len() <= 4);

        view.complete(outgoing[0].ticket, Ok(Response::Ack(Ack::ok())), Instant::now());
        let refetch: Vec<_> = view.take_requests().into_iter().map(|o| o.request).collect();
        assert_eq!(refetch, vec![Request::FetchVariations]);
    }

    #[test]
    fn bursts_of_edits_persist_once_with_the_last_values() {
        let (mut view, _) = view();
        ready(&mut view, "", &[("primary", "{\"name\":\"Primary\",\"props\":{}}")]);
        let start = Instant::now();
        for step in 0..10u64 {
            let now = start + Duration::from_millis(step * 20);
            view.update_variation("primary", label(&format!("edit {step}")), now);
        }
        let last = start + Duration::from_millis(180);
        assert_eq!(view.variation("primary").and_then(Variation::props), Some(&label("edit 9")));
        assert_eq!(view.write_state("primary"), DebounceState::Pending);

        view.poll(last + Duration::from_millis(999));
        assert!(view.take_requests().is_empty());
        view.poll(last + Duration::from_millis(1000));
        let outgoing = view.take_requests();
        let writes = saves(&outgoing);
        assert_eq!(writes.len(), 1);
        let source = decode_variation(&writes[0].1).expect("decode");
        assert_eq!(source.name.as_deref(), Some("Primary"));
        assert_eq!(source.props, label("edit 9"));
        assert_eq!(view.write_state("primary"), DebounceState::Writing);

        let done = last + Duration::from_secs(2);
        view.complete(outgoing[0].ticket, Ok(Response::Ack(Ack::ok())), done);
        assert_eq!(view.write_state("primary"), DebounceState::Clean);
    }

    #[test]
    fn failed_writes_are_not_rolled_back() {
        let (mut view, _) = view();
        ready(&mut view, "", &[("primary", "{\"props\":{}}")]);
        let now = Instant::now();
        view.update_variation("primary", label("local"), now);
        view.poll(now + Duration::from_secs(1));
        let outgoing = view.take_requests();
        view.complete(
            outgoing[0].ticket,
            Err(ClientError::Transport("connection refused".into())),
            now + Duration::from_secs(2),
        );
        assert_eq!(view.variation("primary").and_then(Variation::props), Some(&label("local")));
        assert!(view.take_requests().is_empty());
        assert!(view.is_idle());
    }

    #[test]
    fn array_item_edits_replace_one_element() {
        let (mut view, _) = view();
        ready(
            &mut view,
            "",
            &[("primary", "{\"props\":{\"label\":\"a\",\"sizes\":[1,2,3,4,5]}}")],
        );
        let before = view.variation("primary").and_then(Variation::props).cloned();
        let edit = Edit::Item {
            index: 2,
            edit: Box::new(Edit::Set(json!(30))),
        };
        view.edit_variation_prop("primary", "sizes", &edit, Instant::now());
        let after = view.variation("primary").and_then(Variation::props).expect("props");
        assert_eq!(after["sizes"], json!([1, 2, 30, 4, 5]));
        assert_eq!(before.expect("props")["sizes"], json!([1, 2, 3, 4, 5]));
    }

    #[test]
    fn custom_metadata_changes_the_schema_before_the_write() {
        let (mut view, _) = view();
        ready(&mut view, "", &[]);
        let mut metadata = CustomMetadata::default();
        metadata.props.insert(
            SmolStr::new("label"),
            CustomOverride::control("enum"),
        );
        let now = Instant::now();
        view.update_custom_metadata(metadata.clone(), now);
        assert_eq!(view.descriptors()["label"].kind, ControlKind::Enum);
        assert!(view.take_requests().is_empty());

        view.poll(now + Duration::from_secs(1));
        let outgoing = view.take_requests();
        assert_eq!(
            outgoing[0].request,
            Request::SaveMetadata(SaveMetadata {
                code: encode_metadata(&metadata)
            })
        );
    }

    #[test]
    fn randomize_writes_immediately_and_replaces_pending_edits() {
        let (mut view, _) = view();
        ready(&mut view, "", &[("primary", "{\"props\":{}}")]);
        let now = Instant::now();
        view.update_variation("primary", label("pending"), now);
        view.randomize_variation("primary");
        let outgoing = view.take_requests();
        assert_eq!(saves(&outgoing).len(), 1);
        assert_eq!(view.write_state("primary"), DebounceState::Clean);
        view.poll(now + Duration::from_secs(2));
        assert!(view.take_requests().is_empty());
    }

    #[test]
    fn delete_closes_the_modal_and_refetches() {
        let (mut view, _) = view();
        ready(&mut view, "", &[("primary", "{\"props\":{}}")]);
        assert!(view.start_variation_edit("primary"));
        assert!(view.scroll_locked());
        view.delete_variation("primary");
        let outgoing = view.take_requests();
        assert_eq!(
            outgoing[0].request,
            Request::DeleteVariation { slug: "primary".into() }
        );
        view.complete(outgoing[0].ticket, Ok(Response::Ack(Ack::ok())), Instant::now());
        assert_eq!(view.edit_mode(), None);
        assert!(!view.scroll_locked());
        let refetch: Vec<_> = view.take_requests().into_iter().map(|o| o.request).collect();
        assert_eq!(refetch, vec![Request::FetchVariations]);
    }

    #[test]
    fn edits_reach_live_preview_frames_without_a_reboot() {
        use crate::preview::tests::{LogFactory, SharedLog};
        use crate::preview::FrameState;

        let log = Arc::new(SharedLog::default());
        let (view, _) = view();
        let mut view = view.with_preview_frames(
            PreviewDocument::new("react", COMPONENT),
            Arc::new(LogFactory(log.clone())),
        );
        ready(
            &mut view,
            "",
            &[("primary", "{\"props\":{\"label\":\"seed\"}}"), ("broken", "{ nope")],
        );
        let booted: Vec<_> = log.calls("seed");
        assert_eq!(booted, vec![(SmolStr::new("primary"), Some(label("seed")))]);
        let frames = view.preview_frames().expect("frames");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames.frame("primary").map(|f| f.state()), Some(FrameState::Booting));
        assert!(view.preview_mounted("primary"));

        let now = Instant::now();
        view.edit_variation_prop("primary", "label", &Edit::Set(json!("edited")), now);
        assert_eq!(
            log.calls("update"),
            vec![(SmolStr::new("primary"), Some(label("edited")))]
        );

        // The refetch after the write brings back what the frame shows.
        view.fetch_variations();
        for outgoing in view.take_requests() {
            let sources = [("primary", "{\"props\":{\"label\":\"edited\"}}")];
            view.complete(outgoing.ticket, Ok(variations_response(&sources)), now);
        }
        assert_eq!(log.calls("document").len(), 1);
        assert_eq!(log.calls("update").len(), 1);

        view.randomize_variation("primary");
        let updates = log.calls("update");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].1.as_ref(), view.variation("primary").and_then(Variation::props));
        view.take_requests();

        view.delete_variation("primary");
        for outgoing in view.take_requests() {
            view.complete(outgoing.ticket, Ok(Response::Ack(Ack::ok())), now);
        }
        assert!(view.preview_frames().expect("frames").is_empty());
        assert_eq!(log.calls("document").len(), 1);
    }

    #[test]
    fn unmount_tears_down_preview_frames() {
        use crate::preview::tests::{LogFactory, SharedLog};

        let log = Arc::new(SharedLog::default());
        let (view, _) = view();
        let mut view = view.with_preview_frames(
            PreviewDocument::new("react", COMPONENT),
            Arc::new(LogFactory(log.clone())),
        );
        ready(&mut view, "", &[("primary", "{\"props\":{}}"), ("secondary", "{}")]);
        assert_eq!(view.preview_frames().map(PreviewFrames::len), Some(2));
        view.unmount();
        assert!(view.preview_frames().expect("frames").is_empty());
        assert!(!view.preview_mounted("primary"));
    }

    #[test]
    fn one_modal_at_a_time_with_scroll_lock() {
        let (mut view, _) = view();
        ready(&mut view, "", &[("primary", "{\"props\":{\"label\":\"x\"}}")]);
        assert!(!view.start_variation_edit("missing"));
        assert!(view.start_variation_edit("primary"));
        view.start_custom_metadata_edit();
        assert_eq!(view.edit_mode(), Some(&EditMode::CustomMetadata));
        assert!(view.scroll_locked());

        let ViewModel::Ready(ready) = view.render() else {
            panic!("ready");
        };
        match ready.modal {
            Some(ModalView::CustomMetadata { controls }) => {
                assert_eq!(controls.len(), 2);
                assert_eq!(controls[0].label(), "label");
            }
            other => panic!("expected metadata modal, got {other:?}"),
        }

        assert!(view.escape());
        assert!(!view.escape());
        assert!(!view.scroll_locked());
    }

    #[test]
    fn push_events_refetch_only_for_this_component() {
        let (mut view, _) = view();
        ready(&mut view, "", &[]);
        view.push(&PushEvent::new(PushEventKind::ComponentVariationAdded, "Card.jsx"));
        assert!(view.take_requests().is_empty());
        view.push(&PushEvent::new(PushEventKind::ComponentMetadataChanged, COMPONENT));
        view.push(&PushEvent::new(PushEventKind::ComponentVariationRemoved, COMPONENT));
        let requests: Vec<_> = view.take_requests().into_iter().map(|o| o.request).collect();
        assert_eq!(requests, vec![Request::FetchMetadata, Request::FetchVariations]);
    }

    #[test]
    fn unmount_ignores_in_flight_completions_and_flushes_edits() {
        let (mut view, _) = view();
        ready(&mut view, "", &[("primary", "{\"props\":{}}")]);
        view.start_variation_edit("primary");
        view.update_variation("primary", label("unsaved"), Instant::now());
        view.fetch_variations();
        let before = view.take_requests();

        view.unmount();
        assert_eq!(view.edit_mode(), None);
        assert!(!view.scroll_locked());
        let flushed = view.take_requests();
        assert_eq!(saves(&flushed).len(), 1);
        assert_ne!(flushed[0].ticket.epoch, view.epoch());

        view.complete(before[0].ticket, Ok(variations_response(&[])), Instant::now());
        assert_eq!(view.variations().len(), 1);
        view.push(&PushEvent::new(PushEventKind::ComponentVariationChanged, COMPONENT));
        assert!(view.take_requests().is_empty());
    }
}
