use crate::color_scale::color_for;
use crate::error::{HeatmapError, Result};
use crate::heat_cell::{Snapshot, DEFAULT_RESOLUTION};
use crate::helpers::clamp_unit;
use crate::map_view::{MapView, ViewportEvent};
use crate::metric::Metric;
use crate::normalizer::normalize;
use crate::projection::{PixelBounds, Projector};
use crate::surface::{DrawingSurface, GradientStop};
use glam::DVec2;
use image::Rgb;
use std::sync::Arc;
use uuid::Uuid;

/// Size and opacity curve of each heat blob.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlobStyle {
    pub min_radius: f64,
    pub base_radius: f64,
    pub radius_scale: f64,
    pub min_alpha: f64,
    pub max_alpha: f64,
}

impl Default for BlobStyle {
    fn default() -> Self {
        Self {
            min_radius: 6.0,
            base_radius: 8.0,
            radius_scale: 24.0,
            min_alpha: 0.25,
            max_alpha: 0.85,
        }
    }
}

impl BlobStyle {
    pub fn with_radius(mut self, min_radius: f64, base_radius: f64, radius_scale: f64) -> Self {
        self.min_radius = min_radius;
        self.base_radius = base_radius;
        self.radius_scale = radius_scale;
        self
    }

    pub fn with_alpha(mut self, min_alpha: f64, max_alpha: f64) -> Self {
        self.min_alpha = min_alpha;
        self.max_alpha = max_alpha;
        self
    }

    /// Square-root growth so blob area tracks intensity, never below `min_radius`.
    pub fn radius(&self, intensity: f64) -> f64 {
        (self.base_radius + self.radius_scale * clamp_unit(intensity).sqrt()).max(self.min_radius)
    }

    pub fn center_alpha(&self, intensity: f64) -> f64 {
        (self.max_alpha * clamp_unit(intensity)).max(self.min_alpha)
    }

    /// Full alpha at the centre, half at mid-radius, transparent at the rim.
    pub fn stops(&self, intensity: f64) -> [GradientStop; 3] {
        let alpha = self.center_alpha(intensity);
        [
            GradientStop::new(0.0, alpha),
            GradientStop::new(0.5, alpha / 2.0),
            GradientStop::new(1.0, 0.0),
        ]
    }
}

/// Styling resolved for one cell of a snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blob {
    pub intensity: f64,
    pub color: Rgb<u8>,
    pub radius: f64,
}

/// Styles every cell of `snapshot` in snapshot order.
pub fn blobs(snapshot: &Snapshot, style: &BlobStyle) -> Vec<Blob> {
    normalize(snapshot.cells(), snapshot.metric)
        .into_iter()
        .map(|intensity| Blob {
            intensity,
            color: color_for(snapshot.metric, intensity),
            radius: style.radius(intensity),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayState {
    Unmounted,
    MountedEmpty,
    MountedWithPoints,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub drawn: usize,
    /// Cells whose centre projected outside the surface.
    pub culled: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedrawOutcome {
    /// Not mounted, or the map had no projection yet. Retried on the next event.
    Skipped,
    Drawn(FrameStats),
}

/// Canvas layer over the map that paints each cell as a soft radial blob.
pub struct HeatmapOverlay<S: DrawingSurface> {
    id: Uuid,
    surface: Option<S>,
    snapshot: Arc<Snapshot>,
    style: BlobStyle,
    state: OverlayState,
    origin: Option<DVec2>,
}

impl<S: DrawingSurface> HeatmapOverlay<S> {
    /// Registers a new overlay pane on `map` and takes ownership of `surface`.
    pub fn mount(map: &mut MapView, surface: S, style: BlobStyle) -> Self {
        let id = Uuid::new_v4();
        map.attach_overlay(id);
        tracing::debug!(overlay = %id, "heatmap overlay mounted");
        Self {
            id,
            surface: Some(surface),
            snapshot: Arc::new(Snapshot::empty(Metric::None, DEFAULT_RESOLUTION)),
            style,
            state: OverlayState::MountedEmpty,
            origin: None,
        }
    }

    /// Detaches from `map` and hands the surface back. Later calls are no-ops.
    pub fn unmount(&mut self, map: &mut MapView) -> Option<S> {
        if self.state == OverlayState::Unmounted {
            return None;
        }
        map.detach_overlay(self.id);
        self.state = OverlayState::Unmounted;
        self.origin = None;
        tracing::debug!(overlay = %self.id, "heatmap overlay unmounted");
        self.surface.take()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn style(&self) -> &BlobStyle {
        &self.style
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    /// Layer-space position of the surface's top-left corner at the last drawn frame.
    pub fn origin(&self) -> Option<DVec2> {
        self.origin
    }

    pub fn set_snapshot(
        &mut self,
        snapshot: Arc<Snapshot>,
        projector: Option<&dyn Projector>,
    ) -> RedrawOutcome {
        self.snapshot = snapshot;
        self.redraw(projector)
    }

    pub fn on_viewport_change(
        &mut self,
        event: ViewportEvent,
        projector: Option<&dyn Projector>,
    ) -> RedrawOutcome {
        tracing::trace!(overlay = %self.id, ?event, "viewport changed");
        self.redraw(projector)
    }

    /// Full clear-and-paint of the current snapshot under `projector`.
    pub fn redraw(&mut self, projector: Option<&dyn Projector>) -> RedrawOutcome {
        match self.draw_frame(projector) {
            Ok(stats) => {
                tracing::debug!(
                    overlay = %self.id,
                    drawn = stats.drawn,
                    culled = stats.culled,
                    "heatmap frame drawn"
                );
                RedrawOutcome::Drawn(stats)
            }
            Err(err) => {
                tracing::debug!(overlay = %self.id, %err, "heatmap redraw skipped");
                RedrawOutcome::Skipped
            }
        }
    }

    fn draw_frame(&mut self, projector: Option<&dyn Projector>) -> Result<FrameStats> {
        let Some(surface) = self.surface.as_mut() else {
            return Err(HeatmapError::ProjectionUnavailable);
        };
        let projector = projector.ok_or(HeatmapError::ProjectionUnavailable)?;

        let bounds = projector.viewport_bounds();
        let size = bounds.size();
        surface.resize(size.x.round() as u32, size.y.round() as u32);
        surface.clear();
        self.origin = Some(bounds.min);

        let (width, height) = surface.size();
        let local = PixelBounds::new(DVec2::ZERO, DVec2::new(width as f64, height as f64));
        let mut stats = FrameStats::default();

        let styled = blobs(&self.snapshot, &self.style);
        for (cell, blob) in self.snapshot.cells().iter().zip(styled) {
            let point = projector.project(cell.latitude, cell.longitude) - bounds.min;
            if !local.contains(point) {
                stats.culled += 1;
                continue;
            }
            let stops = self.style.stops(blob.intensity);
            surface.fill_radial_gradient(point, blob.radius, blob.color, &stops);
            stats.drawn += 1;
        }

        self.state = if self.snapshot.is_empty() {
            OverlayState::MountedEmpty
        } else {
            OverlayState::MountedWithPoints
        };
        Ok(stats)
    }
}
