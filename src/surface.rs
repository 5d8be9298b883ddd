use crate::helpers::{clamp_unit, lerp};
use glam::DVec2;
use image::{ImageBuffer, Rgb, Rgba, RgbaImage};
use std::path::Path;

/// Alpha at a fractional distance from a gradient's centre (0 = centre, 1 = edge).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    pub offset: f64,
    pub alpha: f64,
}

impl GradientStop {
    pub const fn new(offset: f64, alpha: f64) -> Self {
        Self { offset, alpha }
    }
}

/// Alpha at `distance` (0..=1) along sorted `stops`; beyond the last stop the gradient is transparent.
pub fn alpha_at(stops: &[GradientStop], distance: f64) -> f64 {
    let Some(first) = stops.first() else {
        return 0.0;
    };
    if distance <= first.offset {
        return first.alpha;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if distance <= b.offset {
            let span = b.offset - a.offset;
            let t = if span > 0.0 { (distance - a.offset) / span } else { 1.0 };
            return lerp(a.alpha, b.alpha, t);
        }
    }
    0.0
}

/// The raster an overlay paints into. Coordinates are surface-local pixels.
pub trait DrawingSurface {
    fn resize(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    fn clear(&mut self);

    /// Fills a disc whose alpha falls off radially along `stops`.
    fn fill_radial_gradient(
        &mut self,
        center: DVec2,
        radius: f64,
        color: Rgb<u8>,
        stops: &[GradientStop],
    );
}

/// `DrawingSurface` backed by an RGBA image buffer.
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: ImageBuffer::new(width, height),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        (x < self.image.width() && y < self.image.height()).then(|| *self.image.get_pixel(x, y))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::error::Result<()> {
        self.image.save(path)?;
        Ok(())
    }

    // straight-alpha source-over
    fn blend(&mut self, x: u32, y: u32, color: Rgb<u8>, alpha: f64) {
        let dst = self.image.get_pixel_mut(x, y);
        let src_a = clamp_unit(alpha);
        let dst_a = dst.0[3] as f64 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        if out_a <= 0.0 {
            return;
        }
        for c in 0..3 {
            let src = color.0[c] as f64;
            let prev = dst.0[c] as f64;
            let value = (src * src_a + prev * dst_a * (1.0 - src_a)) / out_a;
            dst.0[c] = value.round().clamp(0.0, 255.0) as u8;
        }
        dst.0[3] = (out_a * 255.0).round() as u8;
    }
}

impl DrawingSurface for RasterSurface {
    fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = ImageBuffer::new(width, height);
        }
    }

    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn fill_radial_gradient(
        &mut self,
        center: DVec2,
        radius: f64,
        color: Rgb<u8>,
        stops: &[GradientStop],
    ) {
        if radius <= 0.0 {
            return;
        }
        let (width, height) = self.image.dimensions();
        let x0 = (center.x - radius).floor().max(0.0) as u32;
        let y0 = (center.y - radius).floor().max(0.0) as u32;
        let x1 = ((center.x + radius).ceil().max(0.0) as u32).min(width);
        let y1 = ((center.y + radius).ceil().max(0.0) as u32).min(height);

        for y in y0..y1 {
            for x in x0..x1 {
                // sample at the pixel centre
                let offset = DVec2::new(x as f64 + 0.5, y as f64 + 0.5) - center;
                let distance = offset.length() / radius;
                if distance > 1.0 {
                    continue;
                }
                let alpha = alpha_at(stops, distance);
                if alpha > 0.0 {
                    self.blend(x, y, color, alpha);
                }
            }
        }
    }
}
