use glam::DVec2;
use std::f64::consts::PI;

pub const TILE_SIZE: f64 = 256.0;
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 22.0;

/// Axis-aligned pixel rectangle, `min` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelBounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl PixelBounds {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    /// Half-open containment, so a point on the right/bottom edge is outside.
    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }
}

/// Read-only view of the host map's current projection.
///
/// Pixel coordinates are in the map's layer space (absolute Web-Mercator
/// pixels at the current zoom). Implementations must reflect the viewport
/// at the moment of the call; callers never cache results across a
/// viewport change.
pub trait Projector {
    fn project(&self, lat: f64, lng: f64) -> DVec2;

    /// Inverse of `project`, returns `(lat, lng)` in degrees.
    fn unproject(&self, point: DVec2) -> (f64, f64);

    /// Layer-space rectangle currently visible in the map container.
    fn viewport_bounds(&self) -> PixelBounds;

    /// North-west and south-east corners of the visible area.
    fn geo_bounds(&self) -> ((f64, f64), (f64, f64)) {
        let bounds = self.viewport_bounds();
        (self.unproject(bounds.min), self.unproject(bounds.max))
    }
}

/// Full width of the Mercator world in pixels at `zoom`.
pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * zoom.exp2()
}

/// Spherical Web-Mercator forward projection into world pixels.
pub fn lat_lng_to_world(lat: f64, lng: f64, zoom: f64) -> DVec2 {
    let size = world_size(zoom);
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lng + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    DVec2::new(x, y)
}

pub fn world_to_lat_lng(point: DVec2, zoom: f64) -> (f64, f64) {
    let size = world_size(zoom);
    let lng = point.x / size * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * point.y / size);
    let lat = n.sinh().atan().to_degrees();
    (lat, lng)
}
