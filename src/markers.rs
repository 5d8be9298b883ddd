use crate::color_scale::{color_for, to_hex};
use crate::heat_cell::{HeatCell, Snapshot, DEFAULT_RESOLUTION};
use crate::metric::Metric;
use crate::normalizer::normalize;
use crate::projection::Projector;
use crate::surface::{DrawingSurface, GradientStop};
use glam::DVec2;
use image::Rgb;
use std::fmt;
use std::sync::Arc;

pub const MARKER_RADIUS: f64 = 6.0;

const SOLID: [GradientStop; 2] = [GradientStop::new(0.0, 1.0), GradientStop::new(1.0, 1.0)];

/// Clickable dot for one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub cell_id: String,
    pub intensity: f64,
    pub color: Rgb<u8>,
    /// Layer-space position, `None` until the map can project.
    pub position: Option<DVec2>,
}

impl Marker {
    pub fn hex_color(&self) -> String {
        to_hex(self.color)
    }
}

/// Detail card for the selected cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Popup {
    pub cell: HeatCell,
    pub metric: Metric,
}

impl Popup {
    pub fn lines(&self) -> Vec<String> {
        let cell = &self.cell;
        let mut lines = vec![
            format!("Lat, Lng: {:.6}, {:.6}", cell.latitude, cell.longitude),
            format!("Total points: {}", cell.weight),
            format!("Unique ids: {}", cell.unique_values),
        ];
        if let Some(avg) = cell.avg_value.filter(|_| self.metric.is_selected()) {
            let line = match self.metric.unit() {
                Some(unit) => format!("Avg {}: {avg:.2} {unit}", self.metric),
                None => format!("Avg {}: {avg:.2}", self.metric),
            };
            lines.push(line);
        }
        lines
    }
}

impl fmt::Display for Popup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

/// One marker per cell plus the single-selection popup state.
pub struct MarkerLayer {
    snapshot: Arc<Snapshot>,
    markers: Vec<Marker>,
    selected: Option<String>,
    radius: f64,
}

impl Default for MarkerLayer {
    fn default() -> Self {
        Self::new(MARKER_RADIUS)
    }
}

impl MarkerLayer {
    pub fn new(radius: f64) -> Self {
        Self {
            snapshot: Arc::new(Snapshot::empty(Metric::None, DEFAULT_RESOLUTION)),
            markers: Vec::new(),
            selected: None,
            radius,
        }
    }

    /// Rebuilds every marker from `snapshot`. The selection survives only if
    /// the selected cell is still part of the new snapshot.
    pub fn set_snapshot(&mut self, snapshot: Arc<Snapshot>, projector: Option<&dyn Projector>) {
        let metric = snapshot.metric;
        let intensities = normalize(snapshot.cells(), metric);
        self.markers = snapshot
            .cells()
            .iter()
            .zip(intensities)
            .map(|(cell, intensity)| Marker {
                cell_id: cell.cell_id.clone(),
                intensity,
                color: color_for(metric, intensity),
                position: None,
            })
            .collect();

        if let Some(id) = &self.selected {
            if snapshot.get(id).is_none() {
                tracing::debug!(cell_id = %id, "selected cell left the snapshot");
                self.selected = None;
            }
        }
        self.snapshot = snapshot;
        self.reposition(projector);
    }

    /// Re-projects every marker for the current viewport.
    pub fn reposition(&mut self, projector: Option<&dyn Projector>) {
        for (marker, cell) in self.markers.iter_mut().zip(self.snapshot.cells()) {
            marker.position = projector.map(|p| p.project(cell.latitude, cell.longitude));
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Selects `cell_id`; selecting the open one again closes it.
    /// Returns whether a popup is open afterwards.
    pub fn select(&mut self, cell_id: &str) -> bool {
        if self.selected.as_deref() == Some(cell_id) {
            self.selected = None;
        } else if self.snapshot.get(cell_id).is_some() {
            self.selected = Some(cell_id.to_string());
        }
        self.selected.is_some()
    }

    /// Selects the topmost marker under `point` (layer space), if any.
    pub fn click_at(&mut self, point: DVec2) -> Option<&str> {
        let hit = self
            .markers
            .iter()
            .rev()
            .find(|m| m.position.is_some_and(|p| p.distance(point) <= self.radius))
            .map(|m| m.cell_id.clone())?;
        self.select(&hit);
        self.selected.as_deref()
    }

    pub fn dismiss(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&HeatCell> {
        self.selected.as_deref().and_then(|id| self.snapshot.get(id))
    }

    pub fn popup(&self) -> Option<Popup> {
        self.selected().map(|cell| Popup {
            cell: cell.clone(),
            metric: self.snapshot.metric,
        })
    }

    /// Paints positioned markers as solid discs; `origin` is the surface's layer-space top-left.
    pub fn paint<S: DrawingSurface>(&self, surface: &mut S, origin: DVec2) {
        for marker in &self.markers {
            if let Some(position) = marker.position {
                surface.fill_radial_gradient(position - origin, self.radius, marker.color, &SOLID);
            }
        }
    }
}
