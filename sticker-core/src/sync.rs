//! Scene synchronization: keep a [`Surface`] consistent with a design.
//!
//! [`SceneSynchronizer::reconcile`] compares the element ids it has already
//! materialized (including images still loading) with the ids of the new
//! element list:
//!
//! - **different sets** → *rebuild*: clear the surface, materialize every
//!   element in paint order, restore the previous selection by id;
//! - **same set** → *patch*: silently copy geometry and properties onto the
//!   existing objects, keeping their handles.
//!
//! Image elements load asynchronously. Loads are queued as futures and applied
//! by [`SceneSynchronizer::next_load`] / [`SceneSynchronizer::settle`]; a load
//! is only applied if its element still exists, is still an image and no newer
//! load for the same id was started since.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};

use crate::cache::{ImageCache, ImageCacheConfig};
use crate::date::{Clock, SystemClock};
use crate::element::{DesignElement, ElementId, ElementType};
use crate::loader::{load_image_chain, ChainFailure, ImageFetcher, ImageLoadConfig, LoadedImage};
use crate::materialize::{self, Materialized};
use crate::notify::{Notifier, TracingNotifier};
use crate::surface::{ObjectHandle, Surface};

/// Which strategy a reconciliation used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The surface was cleared and recreated.
    Rebuilt,
    /// Existing objects were updated in place.
    Patched,
}

/// What happened to a finished image load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The image was added to the surface.
    Loaded(ElementId),
    /// Every attempt failed; a placeholder was added.
    Placeholder(ElementId),
    /// The element was deleted, retyped, or reloaded meanwhile; nothing changed.
    Stale(ElementId),
}

/// Synchronizer configuration.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Image load chain settings.
    pub images: ImageLoadConfig,
    /// Image cache limits.
    pub cache: ImageCacheConfig,
}

struct FinishedLoad {
    id: ElementId,
    generation: u64,
    result: Result<LoadedImage, ChainFailure>,
}

/// Mediates between a design's element list and a live surface.
pub struct SceneSynchronizer<S: Surface> {
    surface: S,
    fetcher: Arc<dyn ImageFetcher>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    cache: ImageCache,
    /// Materialized objects by element id.
    objects: HashMap<ElementId, ObjectHandle>,
    /// Latest known state of every element.
    elements: HashMap<ElementId, DesignElement>,
    /// Position of every element in the design's list.
    positions: HashMap<ElementId, usize>,
    /// Newest load generation per image element still loading.
    loading: HashMap<ElementId, u64>,
    next_generation: u64,
    in_flight: FuturesUnordered<BoxFuture<'static, FinishedLoad>>,
    /// Selection to restore once the element's image lands.
    deferred_selection: Option<ElementId>,
}

impl<S: Surface> SceneSynchronizer<S> {
    /// Create a synchronizer with default config, tracing notices and the system clock.
    pub fn new(surface: S, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self::with_parts(
            surface,
            fetcher,
            SyncConfig::default(),
            Arc::new(TracingNotifier),
            Arc::new(SystemClock),
        )
    }

    /// Create a synchronizer from explicit collaborators.
    pub fn with_parts(
        surface: S,
        fetcher: Arc<dyn ImageFetcher>,
        config: SyncConfig,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = ImageCache::with_config(config.cache.clone());
        Self {
            surface,
            fetcher,
            notifier,
            clock,
            config,
            cache,
            objects: HashMap::new(),
            elements: HashMap::new(),
            positions: HashMap::new(),
            loading: HashMap::new(),
            next_generation: 1,
            in_flight: FuturesUnordered::new(),
            deferred_selection: None,
        }
    }

    /// Align the surface with `elements`.
    ///
    /// Only the first element with a given id is shown; repeats are ignored.
    pub fn reconcile(&mut self, elements: &[DesignElement]) -> Reconciliation {
        let elements = unique_elements(elements);
        let new_ids: HashSet<ElementId> = elements.iter().map(|e| e.id).collect();
        let current = self.element_ids();

        if current == new_ids {
            self.patch(&elements);
            Reconciliation::Patched
        } else {
            tracing::debug!(
                "Rebuilding surface: {} -> {} elements",
                current.len(),
                new_ids.len()
            );
            self.rebuild(&elements);
            Reconciliation::Rebuilt
        }
    }

    /// Ids currently materialized or loading.
    #[must_use]
    pub fn element_ids(&self) -> HashSet<ElementId> {
        self.objects
            .keys()
            .chain(self.loading.keys())
            .copied()
            .collect()
    }

    /// Handle of the surface object for `id`, if materialized.
    #[must_use]
    pub fn handle_of(&self, id: ElementId) -> Option<ObjectHandle> {
        self.objects.get(&id).copied()
    }

    /// Element id of the currently selected surface object.
    #[must_use]
    pub fn selected_id(&self) -> Option<ElementId> {
        self.surface
            .active_object()
            .and_then(|h| self.surface.object(h))
            .and_then(|o| o.tag)
    }

    /// Select the object for `id` (or clear the selection).
    ///
    /// An image still loading is selected once it lands.
    pub fn select(&mut self, id: Option<ElementId>) {
        self.deferred_selection = None;
        match id {
            Some(id) => {
                if let Some(handle) = self.handle_of(id) {
                    if let Err(e) = self.surface.set_active_object(handle) {
                        tracing::warn!("Cannot select {id}: {e}");
                    }
                } else if self.loading.contains_key(&id) {
                    self.deferred_selection = Some(id);
                }
            }
            None => self.surface.discard_active_object(),
        }
        self.surface.request_render();
    }

    /// Number of image loads still pending.
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.loading.len()
    }

    /// Wait for the next in-flight load and apply it.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_load(&mut self) -> Option<LoadOutcome> {
        let finished = self.in_flight.next().await?;
        Some(self.apply_load(finished))
    }

    /// Drive every in-flight load to completion.
    pub async fn settle(&mut self) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next_load().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Read access to the surface.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access to the surface, for user gestures and event draining.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Consume the synchronizer and return the surface.
    pub fn into_surface(self) -> S {
        self.surface
    }

    /// The clock used for date elements.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The notification side channel.
    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    fn rebuild(&mut self, elements: &[&DesignElement]) {
        let selected = self.selected_id().or(self.deferred_selection);

        self.surface.clear();
        self.objects.clear();
        self.loading.clear();
        self.deferred_selection = None;
        self.elements = elements.iter().map(|e| (e.id, (*e).clone())).collect();
        self.positions = positions_of(elements);

        let mut ordered = elements.to_vec();
        ordered.sort_by_key(|e| e.z_index);

        for element in ordered {
            self.materialize(element);
        }

        if let Some(id) = selected {
            self.select(Some(id));
        }
        self.surface.request_render();
    }

    fn patch(&mut self, elements: &[&DesignElement]) {
        let active = self.surface.active_object();
        self.positions = positions_of(elements);

        for &element in elements {
            let previous = self.elements.insert(element.id, element.clone());
            let url_changed = element.element_type() == ElementType::Image
                && previous.as_ref().and_then(DesignElement::image_url) != element.image_url();

            if url_changed {
                tracing::debug!("Image url changed for {}, reloading", element.id);
                self.start_load(element);
            }

            let Some(handle) = self.objects.get(&element.id).copied() else {
                continue;
            };
            let Some(object) = self.surface.object(handle) else {
                tracing::warn!("Surface lost object {handle} for {}", element.id);
                continue;
            };
            let mut props = materialize::patch_props(element, object, self.clock.as_ref());
            props.stack_index = Some(self.position_of(element.id));
            if let Err(e) = self.surface.set_silent(handle, props) {
                tracing::warn!("Failed to patch {}: {e}", element.id);
            }
        }

        if let Some(handle) = active {
            if self.surface.active_object() != Some(handle)
                && self.surface.set_active_object(handle).is_err()
            {
                tracing::debug!("Active object {handle} disappeared during patch");
            }
        }
        self.surface.request_render();
    }

    fn materialize(&mut self, element: &DesignElement) {
        let cached = element.image_url().and_then(|url| self.cache.get(url));
        match materialize::materialize(element, self.clock.as_ref(), cached.as_ref()) {
            Materialized::Ready(mut object) => {
                object.stack_index = self.position_of(element.id);
                let handle = self.surface.add(object);
                self.objects.insert(element.id, handle);
            }
            Materialized::NeedsLoad { .. } => self.start_load(element),
        }
    }

    fn start_load(&mut self, element: &DesignElement) {
        let Some(url) = element.image_url().map(str::to_string) else {
            return;
        };
        let id = element.id;
        let generation = self.next_generation;
        self.next_generation += 1;
        self.loading.insert(id, generation);

        let fetcher = Arc::clone(&self.fetcher);
        let notifier = Arc::clone(&self.notifier);
        let config = self.config.images.clone();
        self.in_flight.push(
            async move {
                let result =
                    load_image_chain(fetcher.as_ref(), &url, &config, notifier.as_ref()).await;
                FinishedLoad {
                    id,
                    generation,
                    result,
                }
            }
            .boxed(),
        );
    }

    fn apply_load(&mut self, finished: FinishedLoad) -> LoadOutcome {
        let id = finished.id;
        if self.loading.get(&id) != Some(&finished.generation) {
            tracing::debug!("Dropping stale image load for {id}");
            return LoadOutcome::Stale(id);
        }
        self.loading.remove(&id);

        let Some(element) = self
            .elements
            .get(&id)
            .filter(|e| e.element_type() == ElementType::Image)
            .cloned()
        else {
            return LoadOutcome::Stale(id);
        };

        let (mut object, outcome) = match finished.result {
            Ok(image) => {
                if let Some(url) = element.image_url() {
                    self.cache.insert(url.to_string(), image.clone());
                }
                (materialize::image_object(&element, &image), LoadOutcome::Loaded(id))
            }
            Err(failure) => {
                tracing::warn!("{failure}; using placeholder");
                (
                    materialize::placeholder_object(&element),
                    LoadOutcome::Placeholder(id),
                )
            }
        };

        object.stack_index = self.position_of(id);

        // A reload replaces the previous object, keeping it selected.
        let mut reselect = self.deferred_selection == Some(id);
        if let Some(old) = self.objects.remove(&id) {
            reselect |= self.surface.active_object() == Some(old);
            self.surface.remove(old);
        }

        let handle = self.surface.add(object);
        self.objects.insert(id, handle);
        if reselect {
            self.deferred_selection = None;
            if let Err(e) = self.surface.set_active_object(handle) {
                tracing::warn!("Cannot reselect {id}: {e}");
            }
        }
        self.surface.request_render();
        outcome
    }

    fn position_of(&self, id: ElementId) -> usize {
        self.positions.get(&id).copied().unwrap_or_default()
    }
}

/// First occurrence of every id, in list order.
fn unique_elements(elements: &[DesignElement]) -> Vec<&DesignElement> {
    let mut seen = HashSet::new();
    elements
        .iter()
        .filter(|e| {
            let first = seen.insert(e.id);
            if !first {
                tracing::warn!("Ignoring repeated element id {}", e.id);
            }
            first
        })
        .collect()
}

fn positions_of(elements: &[&DesignElement]) -> HashMap<ElementId, usize> {
    elements
        .iter()
        .enumerate()
        .map(|(index, e)| (e.id, index))
        .collect()
}

impl<S: Surface + std::fmt::Debug> std::fmt::Debug for SceneSynchronizer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneSynchronizer")
            .field("surface", &self.surface)
            .field("objects", &self.objects.len())
            .field("loading", &self.loading.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}
