use crate::config::HeatmapConfig;
use crate::error::Result;
use crate::fetch::{FetchCoordinator, FetchState};
use crate::heat_cell::Snapshot;
use crate::map_view::{MapView, ViewportEvent};
use crate::markers::{MarkerLayer, Popup};
use crate::metric::Metric;
use crate::overlay::{BlobStyle, HeatmapOverlay, RedrawOutcome};
use crate::projection::Projector;
use crate::source::{HeatmapQuery, HeatmapSource};
use crate::surface::DrawingSurface;
use glam::DVec2;
use std::sync::Arc;

/// The mounted heatmap: map viewport, heat overlay, marker layer and the
/// fetch coordinator feeding them, driven one event at a time.
///
/// Mounting issues the first request, so it must happen inside a tokio runtime.
pub struct HeatmapView<S: HeatmapSource + 'static, D: DrawingSurface> {
    map: MapView,
    overlay: HeatmapOverlay<D>,
    markers: MarkerLayer,
    fetch: FetchCoordinator<S>,
    query: HeatmapQuery,
    banner: Option<String>,
    /// Cell selected before a refetch, reopened if the new snapshot still has it.
    carried_selection: Option<String>,
    mounted: bool,
}

impl<S: HeatmapSource + 'static, D: DrawingSurface> HeatmapView<S, D> {
    pub fn mount(config: &HeatmapConfig, source: S, surface: D) -> Result<Self> {
        Self::mount_with_style(config, source, surface, BlobStyle::default())
    }

    pub fn mount_with_style(
        config: &HeatmapConfig,
        source: S,
        surface: D,
        style: BlobStyle,
    ) -> Result<Self> {
        config.validate()?;
        let query = config.query()?;

        let mut map = MapView::new(config.center, config.zoom);
        map.layout(config.width, config.height);
        let overlay = HeatmapOverlay::mount(&mut map, surface, style);

        let mut view = Self {
            map,
            overlay,
            markers: MarkerLayer::default(),
            fetch: FetchCoordinator::new(source),
            query,
            banner: None,
            carried_selection: None,
            mounted: true,
        };
        view.refresh();
        Ok(view)
    }

    /// Discards the current snapshot and requests the active query.
    fn refresh(&mut self) {
        self.banner = None;
        if let Some(cell) = self.markers.selected() {
            self.carried_selection = Some(cell.cell_id.clone());
        }
        self.fetch.request(self.query);
        self.commit(Arc::new(Snapshot::empty(self.query.metric, self.query.resolution)));
    }

    fn commit(&mut self, snapshot: Arc<Snapshot>) {
        let viewport = self.map.projector();
        let projector = viewport.as_ref().map(|v| v as &dyn Projector);
        self.overlay.set_snapshot(Arc::clone(&snapshot), projector);
        self.markers.set_snapshot(snapshot, projector);
    }

    fn sync_fetch_state(&mut self) {
        match self.fetch.state().clone() {
            FetchState::Success(snapshot) => {
                self.commit(snapshot);
                if let Some(cell_id) = self.carried_selection.take() {
                    self.markers.select(&cell_id);
                }
            }
            FetchState::Failed(message) => {
                self.carried_selection = None;
                self.banner = Some(message);
                self.commit(Arc::new(Snapshot::empty(self.query.metric, self.query.resolution)));
            }
            FetchState::Idle | FetchState::Loading(_) => {}
        }
    }

    fn viewport_changed(&mut self, event: ViewportEvent) -> RedrawOutcome {
        let viewport = self.map.projector();
        let projector = viewport.as_ref().map(|v| v as &dyn Projector);
        self.markers.reposition(projector);
        self.overlay.on_viewport_change(event, projector)
    }

    pub fn query(&self) -> HeatmapQuery {
        self.query
    }

    pub fn set_metric(&mut self, metric: Metric) {
        if !self.mounted || metric == self.query.metric {
            return;
        }
        self.query.metric = metric;
        self.refresh();
    }

    pub fn set_resolution(&mut self, resolution: u8) -> Result<()> {
        let next = HeatmapQuery::new(self.query.metric, resolution)?;
        if self.mounted && next != self.query {
            self.query = next;
            self.refresh();
        }
        Ok(())
    }

    /// Applies any finished fetch without waiting. Returns whether the view changed.
    pub fn poll(&mut self) -> bool {
        let changed = self.fetch.poll();
        if changed {
            self.sync_fetch_state();
        }
        changed
    }

    /// Waits for the active request to resolve and applies it.
    pub async fn settle(&mut self) -> bool {
        let changed = self.fetch.settle().await;
        if changed {
            self.sync_fetch_state();
        }
        changed
    }

    pub fn pan_by(&mut self, delta: DVec2) -> RedrawOutcome {
        let event = self.map.pan_by(delta);
        self.viewport_changed(event)
    }

    pub fn zoom_to(&mut self, zoom: f64) -> RedrawOutcome {
        let event = self.map.set_zoom(zoom);
        self.viewport_changed(event)
    }

    pub fn zoom_around(&mut self, anchor: DVec2, zoom: f64) -> RedrawOutcome {
        let event = self.map.zoom_around(anchor, zoom);
        self.viewport_changed(event)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> RedrawOutcome {
        let event = self.map.resize(width, height);
        self.viewport_changed(event)
    }

    /// Handles a click at container coordinates; returns the popup now open, if any.
    pub fn click(&mut self, point: DVec2) -> Option<Popup> {
        let viewport = self.map.projector()?;
        self.markers.click_at(viewport.container_to_layer(point));
        self.markers.popup()
    }

    pub fn select(&mut self, cell_id: &str) -> Option<Popup> {
        self.carried_selection = None;
        self.markers.select(cell_id);
        self.markers.popup()
    }

    pub fn popup(&self) -> Option<Popup> {
        self.markers.popup()
    }

    pub fn dismiss_popup(&mut self) {
        self.carried_selection = None;
        self.markers.dismiss();
    }

    /// Message of the last failed fetch until dismissed or a new fetch starts.
    pub fn error_banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.banner = None;
    }

    pub fn is_loading(&self) -> bool {
        self.fetch.is_loading()
    }

    /// Cell-count caption, suppressed for an empty snapshot.
    pub fn caption(&self) -> Option<String> {
        let count = self.overlay.snapshot().len();
        (count > 0).then(|| format!("{count} cells"))
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        self.overlay.snapshot()
    }

    pub fn map(&self) -> &MapView {
        &self.map
    }

    pub fn overlay(&self) -> &HeatmapOverlay<D> {
        &self.overlay
    }

    pub fn markers(&self) -> &MarkerLayer {
        &self.markers
    }

    pub fn fetch_state(&self) -> &FetchState {
        self.fetch.state()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Paints the marker layer on top of the last overlay frame.
    pub fn paint_markers(&mut self) {
        let Some(origin) = self.overlay.origin() else {
            return;
        };
        if let Some(surface) = self.overlay.surface_mut() {
            self.markers.paint(surface, origin);
        }
    }

    /// Tears everything down: abandons fetches, drops markers and detaches the overlay.
    pub fn unmount(&mut self) -> Option<D> {
        if !self.mounted {
            return None;
        }
        self.mounted = false;
        self.fetch.shutdown();
        self.carried_selection = None;
        self.markers.dismiss();
        self.markers.set_snapshot(
            Arc::new(Snapshot::empty(self.query.metric, self.query.resolution)),
            None,
        );
        self.banner = None;
        tracing::debug!(overlay = %self.overlay.id(), "heatmap view unmounted");
        self.overlay.unmount(&mut self.map)
    }
}

impl<S: HeatmapSource + 'static, D: DrawingSurface> Drop for HeatmapView<S, D> {
    fn drop(&mut self) {
        self.unmount();
    }
}
