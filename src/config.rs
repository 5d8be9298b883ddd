use crate::error::{HeatmapError, Result};
use crate::metric::Metric;
use crate::source::HeatmapQuery;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_CENTER: (f64, f64) = (51.0909, 71.4187);
pub const DEFAULT_ZOOM: f64 = 12.0;

/// Settings the heatmap view consumes but does not own.
#[derive(Clone, Debug, PartialEq)]
pub struct HeatmapConfig {
    pub api_base_url: String,
    /// Map provider credential; required before the map can be shown.
    pub access_token: Option<String>,
    pub center: (f64, f64),
    pub zoom: f64,
    pub metric: Metric,
    pub resolution: u8,
    pub width: u32,
    pub height: u32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            access_token: None,
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            metric: Metric::None,
            resolution: 10,
            width: 1024,
            height: 768,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| HeatmapError::Configuration(format!("{name} has an invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}

impl HeatmapConfig {
    /// Loads overrides from the environment (and `.env` if present) on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();
        let defaults = Self::default();

        let metric = match env::var("HEATMAP_METRIC") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.metric,
        };

        Ok(Self {
            api_base_url: env::var("HEATMAP_API_URL").unwrap_or(defaults.api_base_url),
            access_token: env::var("MAP_ACCESS_TOKEN").ok(),
            center: (
                parse_var("HEATMAP_CENTER_LAT", defaults.center.0)?,
                parse_var("HEATMAP_CENTER_LNG", defaults.center.1)?,
            ),
            zoom: parse_var("HEATMAP_ZOOM", defaults.zoom)?,
            metric,
            resolution: parse_var("HEATMAP_RESOLUTION", defaults.resolution)?,
            width: defaults.width,
            height: defaults.height,
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_resolution(mut self, resolution: u8) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Checks everything the view needs before mounting.
    pub fn validate(&self) -> Result<()> {
        match self.access_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => {}
            _ => {
                return Err(HeatmapError::Configuration(
                    "Map access token is missing. Set MAP_ACCESS_TOKEN to display the map.".into(),
                ));
            }
        }
        if !self.zoom.is_finite() {
            return Err(HeatmapError::Configuration(format!(
                "map zoom {} is not a finite number",
                self.zoom
            )));
        }
        if !(-90.0..=90.0).contains(&self.center.0) || !(-180.0..=180.0).contains(&self.center.1) {
            return Err(HeatmapError::Configuration(format!(
                "map centre {:?} is not a valid latitude/longitude",
                self.center
            )));
        }
        self.query().map(|_| ())
    }

    pub fn query(&self) -> Result<HeatmapQuery> {
        HeatmapQuery::new(self.metric, self.resolution)
    }
}
