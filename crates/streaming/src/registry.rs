//! Session state: registered layers, their lazily loaded indexes, the active
//! watershed selection and the views derived from it.
//!
//! Locking: `state` guards selection, epoch, active layers, views and the
//! watershed catalog; `events` guards the event bus. The two are never held
//! together, no lock is held across an `.await`, and events are emitted after
//! the state lock is released. Listeners may use the read API but must not
//! touch the event bus (`subscribe`, `unsubscribe`, `events`).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use formats::geojson::GeoFeature;
use foundation::bounds::{LonLatBounds, extend_bounds};
use layers::definition::{DatasetCatalog, LayerDefinition};
use layers::index::FeatureIndex;
use layers::layer::LayerKey;
use layers::legend::Legend;
use layers::metrics::Metric;
use layers::selection::Selection;
use layers::summary::SummaryRow;
use layers::view::LayerView;
use layers::watershed::WatershedCatalog;
use parking_lot::Mutex;
use runtime::{Epoch, Event, EventBus, EventKind, ListenerId};
use tokio::sync::OnceCell;

use crate::error::RegistryError;
use crate::residency::{FileFailure, LoadReport, ResidencyState};
use crate::source::FeatureSource;

/// A layer's data after its one and only load.
#[derive(Debug)]
pub struct LoadedLayer {
    pub index: FeatureIndex,
    pub report: LoadReport,
}

#[derive(Debug)]
struct LayerEntry {
    definition: LayerDefinition,
    loading: AtomicBool,
    loaded: OnceCell<Arc<LoadedLayer>>,
}

impl LayerEntry {
    fn new(definition: LayerDefinition) -> Self {
        Self {
            definition,
            loading: AtomicBool::new(false),
            loaded: OnceCell::new(),
        }
    }
}

/// Holds `loading` up until the load finishes or its future is dropped.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct State {
    selection: Selection,
    epoch: Epoch,
    active: BTreeSet<LayerKey>,
    views: BTreeMap<LayerKey, LayerView>,
    watersheds: Option<Arc<WatershedCatalog>>,
}

impl State {
    /// View of `key` for the current epoch, recomputed if stale.
    fn view(&mut self, key: &LayerKey, index: &FeatureIndex) -> &LayerView {
        let epoch = self.epoch;
        let selection = &self.selection;
        let view = self
            .views
            .entry(key.clone())
            .or_insert_with(|| LayerView::compute(index, selection, epoch));
        if view.epoch() != epoch {
            *view = LayerView::compute(index, selection, epoch);
        }
        view
    }
}

pub struct Registry {
    source: Arc<dyn FeatureSource>,
    layers: Vec<Arc<LayerEntry>>,
    base_layer: Option<LayerKey>,
    enrichment_layer: Option<LayerKey>,
    state: Mutex<State>,
    events: Mutex<EventBus>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("layers", &self.layers.len())
            .field("base_layer", &self.base_layer)
            .field("enrichment_layer", &self.enrichment_layer)
            .finish()
    }
}

impl Registry {
    pub fn new(source: Arc<dyn FeatureSource>) -> Self {
        Self {
            source,
            layers: Vec::new(),
            base_layer: None,
            enrichment_layer: None,
            state: Mutex::new(State::default()),
            events: Mutex::new(EventBus::new()),
        }
    }

    /// Registers every layer of `catalog`, in order.
    pub fn from_catalog(
        catalog: DatasetCatalog,
        source: Arc<dyn FeatureSource>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(source);
        for definition in catalog.layers {
            registry.register(definition)?;
        }
        registry.set_base_layer(catalog.base_layer)?;
        if let Some(key) = catalog.enrichment_layer {
            registry.set_enrichment_layer(key)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, definition: LayerDefinition) -> Result<(), RegistryError> {
        if self.find(definition.key.as_str()).is_some() {
            return Err(RegistryError::DuplicateLayer(definition.key.to_string()));
        }
        self.layers.push(Arc::new(LayerEntry::new(definition)));
        Ok(())
    }

    pub fn set_base_layer(&mut self, key: LayerKey) -> Result<(), RegistryError> {
        self.entry(key.as_str())?;
        self.base_layer = Some(key);
        Ok(())
    }

    pub fn set_enrichment_layer(&mut self, key: LayerKey) -> Result<(), RegistryError> {
        self.entry(key.as_str())?;
        self.enrichment_layer = Some(key);
        Ok(())
    }

    pub fn definitions(&self) -> impl Iterator<Item = &LayerDefinition> + '_ {
        self.layers.iter().map(|e| &e.definition)
    }

    pub fn definition(&self, key: &str) -> Result<&LayerDefinition, RegistryError> {
        self.entry(key).map(|e| &e.definition)
    }

    fn find(&self, key: &str) -> Option<&Arc<LayerEntry>> {
        self.layers.iter().find(|e| e.definition.key.as_str() == key)
    }

    fn entry(&self, key: &str) -> Result<&Arc<LayerEntry>, RegistryError> {
        self.find(key)
            .ok_or_else(|| RegistryError::UnknownLayer(key.to_string()))
    }

    fn loaded(&self, key: &str) -> Result<(&Arc<LayerEntry>, &Arc<LoadedLayer>), RegistryError> {
        let entry = self.entry(key)?;
        let loaded = entry
            .loaded
            .get()
            .ok_or_else(|| RegistryError::NotLoaded(key.to_string()))?;
        Ok((entry, loaded))
    }

    pub fn residency(&self, key: &str) -> Result<ResidencyState, RegistryError> {
        let entry = self.entry(key)?;
        Ok(if entry.loaded.initialized() {
            ResidencyState::Loaded
        } else if entry.loading.load(Ordering::SeqCst) {
            ResidencyState::Loading
        } else {
            ResidencyState::Registered
        })
    }

    /// Loads the layer once. Concurrent callers share the in-flight load;
    /// later callers get the cached result. Files that fail are skipped.
    /// `LayerLoaded` fires once the layer is readable.
    pub async fn load(&self, key: &str) -> Result<Arc<LoadedLayer>, RegistryError> {
        let entry = self.entry(key)?;
        let mut fresh = false;
        let fresh_flag = &mut fresh;
        let loaded = entry
            .loaded
            .get_or_init(move || async move {
                let _loading = LoadingGuard::set(&entry.loading);
                let loaded = Arc::new(self.fetch_layer(&entry.definition).await);
                *fresh_flag = true;
                loaded
            })
            .await;

        if fresh {
            let epoch = self.state.lock().epoch;
            self.events.lock().emit(
                epoch,
                EventKind::LayerLoaded {
                    layer: key.to_string(),
                    features: loaded.report.features,
                    failed_files: loaded.report.failures.len(),
                },
            );
        }
        Ok(Arc::clone(loaded))
    }

    async fn fetch_layer(&self, definition: &LayerDefinition) -> LoadedLayer {
        let mut report = LoadReport {
            files: definition.files.len(),
            ..LoadReport::default()
        };
        let mut features = Vec::new();
        for file in &definition.files {
            match self.source.fetch(file).await {
                Ok(collection) => {
                    report.skipped_entries += collection.skipped;
                    report.invalid_geometries += collection.invalid_geometries;
                    features.extend(collection.features.into_iter().map(Arc::new));
                }
                Err(e) => {
                    tracing::warn!(layer = %definition.key, file = %file, error = %e, "skipping dataset file");
                    report.failures.push(FileFailure {
                        file: file.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report.features = features.len();

        let index = FeatureIndex::build(features, definition);
        if !index.is_filterable() && !index.is_empty() {
            tracing::debug!(layer = %definition.key, "no join field; layer ignores the selection");
        }
        tracing::info!(
            layer = %definition.key,
            features = report.features,
            failed_files = report.failures.len(),
            skipped = report.skipped_entries,
            invalid_geometries = report.invalid_geometries,
            "layer loaded"
        );
        LoadedLayer { index, report }
    }

    /// Loads the layer if needed, switches it on and returns what it shows
    /// under the current selection.
    pub async fn activate(&self, key: &str) -> Result<Vec<Arc<GeoFeature>>, RegistryError> {
        let loaded = self.load(key).await?;
        let layer = LayerKey::new(key);
        let (visible, epoch) = {
            let mut state = self.state.lock();
            state.active.insert(layer.clone());
            let view = state.view(&layer, &loaded.index);
            (view.visible_features(&loaded.index), view.epoch())
        };
        self.events.lock().emit(
            epoch,
            EventKind::LayerActivated {
                layer: key.to_string(),
            },
        );
        Ok(visible)
    }

    /// Switches the layer off. Its data and view stay cached.
    pub fn deactivate(&self, key: &str) -> Result<bool, RegistryError> {
        self.entry(key)?;
        let (removed, epoch) = {
            let mut state = self.state.lock();
            (state.active.remove(key), state.epoch)
        };
        if removed {
            self.events.lock().emit(
                epoch,
                EventKind::LayerDeactivated {
                    layer: key.to_string(),
                },
            );
        }
        Ok(removed)
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.state.lock().active.contains(key)
    }

    /// Active layers in registration order.
    pub fn active_layers(&self) -> Vec<LayerKey> {
        let state = self.state.lock();
        self.layers
            .iter()
            .map(|e| &e.definition.key)
            .filter(|k| state.active.contains(*k))
            .cloned()
            .collect()
    }

    fn universe(&self, state: &State) -> BTreeSet<String> {
        if let Some(catalog) = &state.watersheds {
            return catalog.universe().clone();
        }
        self.base_layer
            .as_ref()
            .and_then(|key| self.find(key.as_str()))
            .and_then(|entry| entry.loaded.get())
            .map(|loaded| loaded.index.codes().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Applies a new watershed selection and recomputes the view of every
    /// loaded layer. A selection covering every known watershed is the
    /// unfiltered state. Returns `false` when nothing changed.
    pub fn set_selection(&self, selection: Selection) -> bool {
        let (epoch, selected) = {
            let mut state = self.state.lock();
            let selection = selection.normalized(&self.universe(&state));
            if selection == state.selection {
                return false;
            }
            state.selection = selection;
            state.epoch = state.epoch.next();
            self.refresh_views(&mut state);
            (state.epoch, state.selection.codes().map(|c| c.len()))
        };
        tracing::debug!(%epoch, ?selected, "selection changed");
        self.events
            .lock()
            .emit(epoch, EventKind::SelectionChanged { selected });
        true
    }

    pub fn clear_selection(&self) -> bool {
        self.set_selection(Selection::All)
    }

    fn refresh_views(&self, state: &mut State) {
        for entry in &self.layers {
            if let Some(loaded) = entry.loaded.get() {
                state.view(&entry.definition.key, &loaded.index);
            }
        }
    }

    pub fn selection(&self) -> Selection {
        self.state.lock().selection.clone()
    }

    pub fn epoch(&self) -> Epoch {
        self.state.lock().epoch
    }

    pub fn visible_features(&self, key: &str) -> Result<Vec<Arc<GeoFeature>>, RegistryError> {
        let (entry, loaded) = self.loaded(key)?;
        let mut state = self.state.lock();
        Ok(state
            .view(&entry.definition.key, &loaded.index)
            .visible_features(&loaded.index))
    }

    pub fn filtered_metrics(&self, key: &str) -> Result<Metric, RegistryError> {
        let (entry, loaded) = self.loaded(key)?;
        let mut state = self.state.lock();
        Ok(*state.view(&entry.definition.key, &loaded.index).metrics())
    }

    pub fn legend(&self, key: &str) -> Result<Legend, RegistryError> {
        let (entry, loaded) = self.loaded(key)?;
        let mut state = self.state.lock();
        let view = state.view(&entry.definition.key, &loaded.index);
        Ok(Legend::from_view(&entry.definition, view))
    }

    /// Legends of every active layer, all from the same selection epoch.
    pub fn legends(&self) -> Vec<Legend> {
        let mut state = self.state.lock();
        let mut out = Vec::new();
        for entry in &self.layers {
            let key = &entry.definition.key;
            if !state.active.contains(key) {
                continue;
            }
            let Some(loaded) = entry.loaded.get() else {
                continue;
            };
            let view = state.view(key, &loaded.index);
            out.push(Legend::from_view(&entry.definition, view));
        }
        out
    }

    /// One row per registered layer; unloaded layers have no metrics yet.
    pub fn summary(&self) -> Vec<SummaryRow> {
        let mut state = self.state.lock();
        self.layers
            .iter()
            .map(|entry| {
                let key = &entry.definition.key;
                let metrics = entry
                    .loaded
                    .get()
                    .map(|loaded| *state.view(key, &loaded.index).metrics());
                SummaryRow {
                    layer: key.clone(),
                    name: entry.definition.name.clone(),
                    kind: entry.definition.kind,
                    metrics,
                }
            })
            .collect()
    }

    /// Bounds of everything the active layers show.
    pub fn visible_bounds(&self) -> Option<LonLatBounds> {
        let mut state = self.state.lock();
        let mut bounds = None;
        for entry in &self.layers {
            let key = &entry.definition.key;
            if !state.active.contains(key) {
                continue;
            }
            let Some(loaded) = entry.loaded.get() else {
                continue;
            };
            state.view(key, &loaded.index).for_each_visible(&loaded.index, |item| {
                if let Some(geometry) = &item.feature.geometry {
                    geometry.for_each_position(|p| {
                        if p.is_finite() {
                            extend_bounds(&mut bounds, p);
                        }
                    });
                }
            });
        }
        bounds
    }

    pub fn watersheds(&self) -> Option<Arc<WatershedCatalog>> {
        self.state.lock().watersheds.clone()
    }

    /// Startup sequence: base layer (fatal if none of its files load),
    /// enrichment layer, watershed catalog, unfiltered selection, then the
    /// base layer and every layer visible at start are activated.
    pub async fn initialize(&self) -> Result<Arc<WatershedCatalog>, RegistryError> {
        let base_key = self
            .base_layer
            .clone()
            .ok_or_else(|| RegistryError::UnknownLayer("<base layer>".to_string()))?;
        let base = self.load(base_key.as_str()).await?;
        if base.report.all_failed() {
            tracing::error!(layer = %base_key, "base layer unavailable");
            return Err(RegistryError::BaseLayerUnavailable {
                layer: base_key.to_string(),
                failures: base.report.failures.clone(),
            });
        }

        let enrichment = match &self.enrichment_layer {
            Some(key) => {
                let loaded = self.load(key.as_str()).await?;
                if loaded.report.all_failed() {
                    tracing::warn!(layer = %key, "enrichment layer unavailable; watersheds without regions");
                }
                Some(loaded)
            }
            None => None,
        };

        let catalog = Arc::new(WatershedCatalog::build(
            &base.index,
            enrichment.as_ref().map(|l| &l.index),
        ));
        tracing::info!(watersheds = catalog.len(), "watershed catalog built");

        let epoch = {
            let mut state = self.state.lock();
            state.watersheds = Some(Arc::clone(&catalog));
            state.selection = Selection::All;
            state.epoch = state.epoch.next();
            self.refresh_views(&mut state);
            state.epoch
        };
        self.events
            .lock()
            .emit(epoch, EventKind::SelectionChanged { selected: None });

        self.activate(base_key.as_str()).await?;
        let startup: Vec<LayerKey> = self
            .layers
            .iter()
            .filter(|e| e.definition.initially_visible && e.definition.key != base_key)
            .map(|e| e.definition.key.clone())
            .collect();
        for key in startup {
            self.activate(key.as_str()).await?;
        }
        Ok(catalog)
    }

    pub fn subscribe(&self, listener: impl FnMut(&Event) + Send + 'static) -> ListenerId {
        self.events.lock().subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.lock().unsubscribe(id)
    }

    /// Events recorded so far, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().events().to_vec()
    }

    /// Drops loaded data, views, the watershed catalog and the selection.
    /// Registrations and listeners are kept.
    pub fn reset(&mut self) {
        self.layers = self
            .layers
            .iter()
            .map(|e| Arc::new(LayerEntry::new(e.definition.clone())))
            .collect();
        *self.state.get_mut() = State::default();
        self.events.get_mut().drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use layers::definition::Classification;
    use layers::layer::GeometryKind;
    use layers::symbology::ClassScheme;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;

    // Squares of 0.01° at the equator; every one has the same area.
    fn square(code: &str, extra: &str, lon: f64) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{"Cod_man":"{code}"{extra}}},
               "geometry":{{"type":"Polygon","coordinates":[[[{lon},0],[{lon1},0],[{lon1},0.01],[{lon},0.01],[{lon},0]]]}}}}"#,
            lon1 = lon + 0.01
        )
    }

    fn point(code: &str, extra: &str) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{"COD_MAN":"{code}"{extra}}},
               "geometry":{{"type":"Point","coordinates":[-51.0,-24.0]}}}}"#
        )
    }

    fn collection(features: &[String]) -> String {
        format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        )
    }

    fn slope(code: &str, class: &str) -> String {
        square(code, &format!(r#","ClDec":"{class}""#), 0.0)
    }

    fn catalog() -> DatasetCatalog {
        let layers = vec![
            LayerDefinition::new("bacias", "Bacias", GeometryKind::Polygon, &["bacias.geojson"])
                .visible_at_start(),
            LayerDefinition::new(
                "declividade",
                "Declividade",
                GeometryKind::Polygon,
                &["decl1.geojson", "decl2.geojson"],
            )
            .with_classification(Classification::new(&["ClDec"], ClassScheme::slope()))
            .with_legend(Some("Declividade (%)"), None),
            LayerDefinition::new("pontos", "Pontos", GeometryKind::Point, &["pontos.geojson"]),
            LayerDefinition::new("rios", "Rios", GeometryKind::Line, &["rios.geojson"]),
        ];
        DatasetCatalog {
            base_layer: LayerKey::new("bacias"),
            enrichment_layer: Some(LayerKey::new("pontos")),
            layers,
        }
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_geojson(
                "bacias.geojson",
                &collection(&[
                    square("W1", r#","Manancial":"Rio Um""#, 0.0),
                    square("W2", "", 0.02),
                    square("W3", "", 0.04),
                ]),
            )
            .unwrap()
            .with_geojson(
                "decl1.geojson",
                &collection(&[
                    slope("W1", "000a003"),
                    slope("W1", "000a003"),
                    slope("W1", "003a008"),
                ]),
            )
            .unwrap()
            .with_geojson("decl2.geojson", &collection(&[slope("W2", "045a100")]))
            .unwrap()
            .with_geojson(
                "pontos.geojson",
                &collection(&[
                    point("W1", r#","RegIdr":"Ponta Grossa""#),
                    point("W2", ""),
                    point("W2", ""),
                ]),
            )
            .unwrap()
            .with_geojson(
                "rios.geojson",
                r#"{"type":"FeatureCollection","features":[
                    {"type":"Feature","properties":{"nome":"sem código"},
                     "geometry":{"type":"LineString","coordinates":[[0,0],[1,0]]}}]}"#,
            )
            .unwrap()
    }

    fn registry_with(source: MemorySource) -> (Registry, Arc<MemorySource>) {
        let source = Arc::new(source);
        let registry = Registry::from_catalog(catalog(), source.clone()).unwrap();
        (registry, source)
    }

    fn assert_rel(a: f64, b: f64) {
        assert!((a - b).abs() <= 1e-9 * b.abs().max(1e-12), "{a} vs {b}");
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let (registry, source) = registry_with(source());
        let (a, b, c) = tokio::join!(
            registry.load("declividade"),
            registry.load("declividade"),
            registry.activate("declividade"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(c.unwrap().len(), 4);
        assert_eq!(source.fetches_of("decl1.geojson"), 1);
        assert_eq!(source.fetches_of("decl2.geojson"), 1);

        registry.load("declividade").await.unwrap();
        assert_eq!(source.fetch_count(), 2);

        let loaded_events = registry
            .events()
            .iter()
            .filter(|e| e.kind.name() == "layer_loaded")
            .count();
        assert_eq!(loaded_events, 1);
    }

    #[tokio::test]
    async fn concurrent_loads_across_tasks_share_one_fetch() {
        let (registry, source) = registry_with(source());
        let registry = Arc::new(registry);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.load("pontos").await.map(|l| l.report.features) })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 3);
        }
        assert_eq!(source.fetches_of("pontos.geojson"), 1);
    }

    #[tokio::test]
    async fn layer_is_readable_when_its_load_event_fires() {
        let (registry, _) = registry_with(source());
        let registry = Arc::new(registry);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let weak = Arc::downgrade(&registry);
        registry.subscribe(move |e| {
            if let (EventKind::LayerLoaded { layer, .. }, Some(registry)) = (&e.kind, weak.upgrade()) {
                let residency = registry.residency(layer);
                let count = registry.filtered_metrics(layer).map(|m| m.count);
                sink.lock().unwrap().push((residency, count));
            }
        });

        registry.load("pontos").await.unwrap();
        registry.load("pontos").await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(Ok(ResidencyState::Loaded), Ok(3))]
        );
    }

    struct StalledSource;

    impl FeatureSource for StalledSource {
        fn fetch<'a>(
            &'a self,
            _file: &'a str,
        ) -> crate::source::BoxFuture<'a, Result<formats::geojson::FeatureCollection, crate::source::SourceError>> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test]
    async fn dropped_load_leaves_the_layer_registered() {
        let registry = Registry::from_catalog(catalog(), Arc::new(StalledSource)).unwrap();
        let during = tokio::select! {
            biased;
            _ = registry.load("rios") => panic!("stalled source resolved"),
            state = async {
                tokio::task::yield_now().await;
                registry.residency("rios").unwrap()
            } => state,
        };
        assert_eq!(during, ResidencyState::Loading);
        assert_eq!(registry.residency("rios").unwrap(), ResidencyState::Registered);
        assert!(registry.events().is_empty());
    }

    #[tokio::test]
    async fn failed_file_is_skipped_without_retry() {
        let source = source().with_failure("decl2.geojson", "connection reset");
        let (registry, source) = registry_with(source);

        let loaded = registry.load("declividade").await.unwrap();
        assert_eq!(loaded.report.features, 3);
        assert_eq!(loaded.report.failures.len(), 1);
        assert_eq!(loaded.report.failures[0].file, "decl2.geojson");
        assert!(!loaded.report.all_failed());

        registry.load("declividade").await.unwrap();
        assert_eq!(source.fetches_of("decl2.geojson"), 1);
        assert_eq!(registry.residency("declividade").unwrap(), ResidencyState::Loaded);
    }

    #[tokio::test]
    async fn base_layer_failure_is_fatal() {
        let source = source().with_failure("bacias.geojson", "404");
        let (registry, _) = registry_with(source);
        let err = registry.initialize().await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::BaseLayerUnavailable { ref layer, ref failures }
                if layer == "bacias" && failures.len() == 1
        ));
        assert!(registry.watersheds().is_none());
    }

    #[tokio::test]
    async fn enrichment_failure_is_not_fatal() {
        let source = source().with_failure("pontos.geojson", "404");
        let (registry, _) = registry_with(source);
        let catalog = registry.initialize().await.unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.regions().is_empty());
    }

    #[tokio::test]
    async fn initialize_builds_catalog_and_activates_startup_layers() {
        let (registry, _) = registry_with(source());
        let catalog = registry.initialize().await.unwrap();
        assert_eq!(catalog.universe().len(), 3);
        assert_eq!(catalog.get("W1").map(|r| r.label.as_str()), Some("W1 — Rio Um"));
        assert_eq!(catalog.regions(), vec!["Ponta Grossa"]);
        assert_eq!(registry.active_layers(), vec![LayerKey::new("bacias")]);
        assert_eq!(registry.selection(), Selection::All);
        assert_eq!(registry.residency("rios").unwrap(), ResidencyState::Registered);
        assert!(matches!(
            registry.legend("rios"),
            Err(RegistryError::NotLoaded(_))
        ));
    }

    #[tokio::test]
    async fn slope_legend_follows_the_selection() {
        let (registry, _) = registry_with(source());
        registry.initialize().await.unwrap();
        registry.activate("declividade").await.unwrap();

        let unit = registry.filtered_metrics("bacias").unwrap().area_ha / 3.0;

        registry.set_selection(Selection::only(["W1"]));
        let legend = registry.legend("declividade").unwrap();
        let labels: Vec<&str> = legend.items.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["0–3%", "3–8%"]);
        assert_rel(legend.total, 3.0 * unit);
        assert_rel(legend.items[0].percent.unwrap(), 200.0 / 3.0);

        registry.set_selection(Selection::All);
        let legend = registry.legend("declividade").unwrap();
        assert_eq!(legend.items.len(), 3);
        assert_rel(legend.total, 4.0 * unit);
        let sum: f64 = legend.items.iter().map(|e| e.value).sum();
        assert_rel(sum, legend.total);
    }

    #[tokio::test]
    async fn full_selection_behaves_like_no_selection() {
        let (registry, _) = registry_with(source());
        registry.initialize().await.unwrap();
        registry.activate("declividade").await.unwrap();

        let features = registry.visible_features("declividade").unwrap();
        let legend = registry.legend("declividade").unwrap();

        registry.set_selection(Selection::only(["W2"]));
        assert!(registry.set_selection(Selection::only(["W1", "W2", "W3"])));
        assert_eq!(registry.selection(), Selection::All);
        let after = registry.visible_features("declividade").unwrap();
        assert_eq!(after.len(), features.len());
        assert!(after.iter().zip(&features).all(|(a, b)| Arc::ptr_eq(a, b)));
        assert_eq!(registry.legend("declividade").unwrap(), legend);

        assert!(!registry.set_selection(Selection::All));
    }

    #[tokio::test]
    async fn filtered_totals_equal_sum_over_selected_codes() {
        let (registry, _) = registry_with(source());
        registry.initialize().await.unwrap();
        let loaded = registry.load("declividade").await.unwrap();

        registry.set_selection(Selection::only(["W1", "W2"]));
        let expected: f64 = ["W1", "W2"]
            .iter()
            .filter_map(|c| loaded.index.metrics_for_code(c))
            .map(|m| m.area_ha)
            .sum();
        assert_rel(registry.filtered_metrics("declividade").unwrap().area_ha, expected);
    }

    #[tokio::test]
    async fn empty_selection_shows_nothing() {
        let (registry, _) = registry_with(source());
        registry.initialize().await.unwrap();
        registry.activate("declividade").await.unwrap();

        assert!(registry.set_selection(Selection::none()));
        assert!(registry.visible_features("declividade").unwrap().is_empty());
        assert!(registry.visible_features("bacias").unwrap().is_empty());
        let legend = registry.legend("declividade").unwrap();
        assert_eq!(legend.total, 0.0);
        assert!(legend.items.is_empty());
        assert!(registry.visible_bounds().is_none());
    }

    #[tokio::test]
    async fn lazy_layer_picks_up_the_current_selection() {
        let (registry, source) = registry_with(source());
        registry.initialize().await.unwrap();
        registry.set_selection(Selection::only(["W2"]));
        assert_eq!(source.fetches_of("decl1.geojson"), 0);

        let visible = registry.activate("declividade").await.unwrap();
        assert_eq!(visible.len(), 1);
        let legend = registry.legend("declividade").unwrap();
        assert_eq!(legend.items.len(), 1);
        assert_eq!(legend.items[0].label, "45–100%");
    }

    #[tokio::test]
    async fn layers_without_join_field_ignore_the_selection() {
        let (registry, _) = registry_with(source());
        registry.initialize().await.unwrap();
        registry.activate("rios").await.unwrap();
        registry.set_selection(Selection::none());
        assert_eq!(registry.visible_features("rios").unwrap().len(), 1);
        assert!(registry.filtered_metrics("rios").unwrap().length_km > 100.0);
    }

    #[tokio::test]
    async fn views_share_the_selection_epoch() {
        let (registry, _) = registry_with(source());
        registry.initialize().await.unwrap();
        registry.activate("declividade").await.unwrap();
        registry.activate("pontos").await.unwrap();
        registry.set_selection(Selection::only(["W1"]));

        let epoch = registry.epoch();
        let state = registry.state.lock();
        assert!(!state.views.is_empty());
        assert!(state.views.values().all(|v| v.epoch() == epoch));
    }

    #[tokio::test]
    async fn legends_and_summary_cover_the_right_layers() {
        let (registry, _) = registry_with(source());
        registry.initialize().await.unwrap();
        registry.activate("pontos").await.unwrap();
        registry.set_selection(Selection::only(["W2"]));

        let legends = registry.legends();
        let keys: Vec<&str> = legends.iter().map(|l| l.layer.as_str()).collect();
        assert_eq!(keys, vec!["bacias", "pontos"]);
        assert_eq!(legends[1].total, 2.0);
        assert_eq!(legends[1].items[0].label, "Total de registros");

        let summary = registry.summary();
        assert_eq!(summary.len(), 4);
        assert_eq!(summary[2].metrics.map(|m| m.count), Some(2));
        assert_eq!(summary[3].metrics, None);

        assert!(registry.deactivate("pontos").unwrap());
        assert!(!registry.deactivate("pontos").unwrap());
        assert_eq!(registry.legends().len(), 1);
        assert!(registry.visible_features("pontos").is_ok());
    }

    #[tokio::test]
    async fn visible_bounds_cover_active_layers() {
        let (registry, _) = registry_with(source());
        registry.initialize().await.unwrap();
        let bounds = registry.visible_bounds().unwrap();
        assert_eq!(bounds.min.lon_deg, 0.0);
        assert_rel(bounds.max.lon_deg, 0.05);

        registry.set_selection(Selection::only(["W1"]));
        let bounds = registry.visible_bounds().unwrap();
        assert_rel(bounds.max.lon_deg, 0.01);
    }

    #[tokio::test]
    async fn listeners_see_mutations_in_order() {
        let (registry, _) = registry_with(source());
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.subscribe(move |e| sink.lock().unwrap().push(e.kind.name()));

        registry.initialize().await.unwrap();
        registry.set_selection(Selection::only(["W1"]));
        registry.set_selection(Selection::only(["W1"]));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "layer_loaded",
                "layer_loaded",
                "selection_changed",
                "layer_activated",
                "selection_changed",
            ]
        );
    }

    #[tokio::test]
    async fn reset_drops_session_state() {
        let (mut registry, source) = registry_with(source());
        registry.initialize().await.unwrap();
        registry.set_selection(Selection::only(["W1"]));

        registry.reset();
        assert!(registry.watersheds().is_none());
        assert_eq!(registry.selection(), Selection::All);
        assert!(registry.active_layers().is_empty());
        assert_eq!(registry.residency("bacias").unwrap(), ResidencyState::Registered);

        registry.load("bacias").await.unwrap();
        assert_eq!(source.fetches_of("bacias.geojson"), 2);
    }

    #[tokio::test]
    async fn unknown_and_duplicate_layers_are_errors() {
        let (mut registry, _) = registry_with(source());
        assert_eq!(
            registry.load("nada").await.unwrap_err(),
            RegistryError::UnknownLayer("nada".to_string())
        );
        let dup = LayerDefinition::new("rios", "Rios", GeometryKind::Line, &[]);
        assert_eq!(
            registry.register(dup),
            Err(RegistryError::DuplicateLayer("rios".to_string()))
        );
    }
}
