use crate::error::HeatmapError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Telemetry property driving the intensity of each cell.
///
/// `None` means intensity comes from the sample count (`weight`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    None,
    Altitude,
    Speed,
    Azimuth,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::None, Metric::Altitude, Metric::Speed, Metric::Azimuth];

    /// Value of the `col_name` query parameter, absent for count-based maps.
    pub fn col_name(&self) -> Option<&'static str> {
        match self {
            Metric::None => None,
            Metric::Altitude => Some("altitude"),
            Metric::Speed => Some("speed"),
            Metric::Azimuth => Some("azimuth"),
        }
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self {
            Metric::None => None,
            Metric::Altitude => Some("m"),
            Metric::Speed => Some("m/s"),
            Metric::Azimuth => Some("°"),
        }
    }

    pub fn is_selected(&self) -> bool {
        *self != Metric::None
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.col_name().unwrap_or("none"))
    }
}

impl FromStr for Metric {
    type Err = HeatmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "none" | "None" | "null" => Ok(Metric::None),
            "altitude" => Ok(Metric::Altitude),
            "speed" => Ok(Metric::Speed),
            "azimuth" => Ok(Metric::Azimuth),
            other => Err(HeatmapError::InvalidMetric(other.to_string())),
        }
    }
}
