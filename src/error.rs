//! Typed errors for the heatmap core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HeatmapError>;

#[derive(Debug, Error)]
pub enum HeatmapError {
    /// Required configuration (e.g. the map access token) is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The host map is not laid out yet. Never surfaced to the user.
    #[error("projection unavailable: map is not ready")]
    ProjectionUnavailable,

    #[error("invalid H3 resolution {0}, expected 0..=15")]
    InvalidResolution(u8),

    #[error("invalid metric '{0}', expected one of altitude, speed, azimuth or none")]
    InvalidMetric(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the aggregation endpoint.
#[derive(Debug, Error)]
pub enum FetchError {
    /// `body` is kept for logs only; it can be a whole HTML error page.
    #[error("heatmap request failed with HTTP {status}")]
    Status { status: u16, body: String },

    #[error("heatmap request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("heatmap response was not a valid cell list: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request task died before producing a response.
    #[error("heatmap request aborted")]
    Aborted,
}
