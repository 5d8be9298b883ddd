use crate::helpers::{clamp_unit, lerp};
use crate::metric::Metric;
use image::Rgb;

/// Ordered color stops a normalized intensity is interpolated across.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub stops: &'static [[u8; 3]],
}

// blue -> cyan -> lime -> yellow -> red
pub const DEFAULT_PALETTE: Palette = Palette {
    stops: &[[0, 0, 255], [0, 255, 255], [0, 255, 0], [255, 255, 0], [255, 0, 0]],
};

pub const ALTITUDE_PALETTE: Palette = Palette {
    stops: &[[0, 104, 55], [49, 163, 84], [173, 221, 142], [254, 196, 79], [140, 81, 10]],
};

pub const SPEED_PALETTE: Palette = Palette {
    stops: &[[26, 152, 80], [145, 207, 96], [254, 224, 139], [252, 141, 89], [215, 48, 39]],
};

pub const AZIMUTH_PALETTE: Palette = Palette {
    stops: &[[94, 60, 153], [178, 171, 210], [247, 247, 247], [253, 184, 99], [230, 97, 1]],
};

impl Palette {
    pub fn for_metric(metric: Metric) -> Palette {
        match metric {
            Metric::Altitude => ALTITUDE_PALETTE,
            Metric::Speed => SPEED_PALETTE,
            Metric::Azimuth => AZIMUTH_PALETTE,
            Metric::None => DEFAULT_PALETTE,
        }
    }

    pub fn first(&self) -> Rgb<u8> {
        Rgb(self.stops[0])
    }

    pub fn last(&self) -> Rgb<u8> {
        Rgb(self.stops[self.stops.len() - 1])
    }

    /// Piecewise-linear color at `intensity`, exact stop colors at 0 and 1.
    pub fn sample(&self, intensity: f64) -> Rgb<u8> {
        let count = self.stops.len();
        if count == 1 {
            return self.first();
        }

        let scaled = clamp_unit(intensity) * (count - 1) as f64;
        let index = (scaled.floor() as usize).min(count - 1);
        let fraction = scaled - index as f64;
        let from = self.stops[index];
        let to = self.stops[(index + 1).min(count - 1)];

        let channel = |i: usize| lerp(from[i] as f64, to[i] as f64, fraction).round() as u8;
        Rgb([channel(0), channel(1), channel(2)])
    }
}

pub fn color_for(metric: Metric, intensity: f64) -> Rgb<u8> {
    Palette::for_metric(metric).sample(intensity)
}

/// `#rrggbb` form used to style markers.
pub fn to_hex(color: Rgb<u8>) -> String {
    let [r, g, b] = color.0;
    format!("#{r:02x}{g:02x}{b:02x}")
}
