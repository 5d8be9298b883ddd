use crate::projection::{
    lat_lng_to_world, world_to_lat_lng, PixelBounds, Projector, MAX_ZOOM, MIN_ZOOM,
};
use glam::DVec2;
use std::collections::HashSet;
use uuid::Uuid;

/// What a viewport mutation changed, forwarded to every layer as a redraw trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewportEvent {
    Pan,
    Zoom,
    Resize,
}

/// Projection frozen at one viewport state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    center_world: DVec2,
    zoom: f64,
    size: DVec2,
}

impl Viewport {
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Converts a point relative to the map container's top-left corner into layer space.
    pub fn container_to_layer(&self, point: DVec2) -> DVec2 {
        self.viewport_bounds().min + point
    }
}

impl Projector for Viewport {
    fn project(&self, lat: f64, lng: f64) -> DVec2 {
        lat_lng_to_world(lat, lng, self.zoom)
    }

    fn unproject(&self, point: DVec2) -> (f64, f64) {
        world_to_lat_lng(point, self.zoom)
    }

    fn viewport_bounds(&self) -> PixelBounds {
        let half = self.size / 2.0;
        PixelBounds::new(self.center_world - half, self.center_world + half)
    }
}

/// Slippy-map state standing in for the host map widget: centre, zoom,
/// container size and the overlay panes registered on it.
#[derive(Debug)]
pub struct MapView {
    center: (f64, f64),
    zoom: f64,
    width: u32,
    height: u32,
    laid_out: bool,
    overlays: HashSet<Uuid>,
}

impl MapView {
    /// A map that has not been laid out yet; it yields no projector until `layout`.
    pub fn new(center: (f64, f64), zoom: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width: 0,
            height: 0,
            laid_out: false,
            overlays: HashSet::new(),
        }
    }

    pub fn layout(&mut self, width: u32, height: u32) -> ViewportEvent {
        self.laid_out = true;
        self.resize(width, height)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> ViewportEvent {
        self.width = width;
        self.height = height;
        ViewportEvent::Resize
    }

    /// Moves the view by `delta` container pixels (positive x pans east, positive y south).
    pub fn pan_by(&mut self, delta: DVec2) -> ViewportEvent {
        let world = lat_lng_to_world(self.center.0, self.center.1, self.zoom) + delta;
        self.center = world_to_lat_lng(world, self.zoom);
        ViewportEvent::Pan
    }

    pub fn set_center(&mut self, lat: f64, lng: f64) -> ViewportEvent {
        self.center = (lat, lng);
        ViewportEvent::Pan
    }

    pub fn set_zoom(&mut self, zoom: f64) -> ViewportEvent {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        ViewportEvent::Zoom
    }

    /// Zooms keeping the geographic point under `anchor` (container pixels) fixed on screen.
    pub fn zoom_around(&mut self, anchor: DVec2, zoom: f64) -> ViewportEvent {
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        let Some(viewport) = self.projector() else {
            return self.set_zoom(zoom);
        };

        let (lat, lng) = viewport.unproject(viewport.container_to_layer(anchor));
        let offset = anchor - DVec2::new(self.width as f64, self.height as f64) / 2.0;
        let new_center_world = lat_lng_to_world(lat, lng, zoom) - offset;
        self.center = world_to_lat_lng(new_center_world, zoom);
        self.zoom = zoom;
        ViewportEvent::Zoom
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Current projection, or `None` while the map is not laid out or has no area.
    pub fn projector(&self) -> Option<Viewport> {
        if !self.laid_out || self.width == 0 || self.height == 0 {
            return None;
        }
        Some(Viewport {
            center_world: lat_lng_to_world(self.center.0, self.center.1, self.zoom),
            zoom: self.zoom,
            size: DVec2::new(self.width as f64, self.height as f64),
        })
    }

    pub fn attach_overlay(&mut self, id: Uuid) {
        self.overlays.insert(id);
    }

    pub fn detach_overlay(&mut self, id: Uuid) -> bool {
        self.overlays.remove(&id)
    }

    pub fn has_overlay(&self, id: Uuid) -> bool {
        self.overlays.contains(&id)
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }
}
