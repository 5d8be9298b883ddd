pub mod error;
pub mod metric;
pub mod heat_cell;
mod helpers;
pub mod normalizer;
pub mod color_scale;
pub mod projection;
pub mod map_view;
pub mod surface;
pub mod overlay;
pub mod markers;
pub mod source;
pub mod fetch;
pub mod config;
pub mod view;

#[cfg(test)]
mod view_test;

pub use config::HeatmapConfig;
pub use error::{FetchError, HeatmapError, Result};
pub use heat_cell::{HeatCell, Snapshot};
pub use metric::Metric;
pub use source::{HeatmapQuery, HeatmapSource, HttpHeatmapSource};
pub use surface::{DrawingSurface, RasterSurface};
pub use view::HeatmapView;
