use crate::metric::Metric;
use h3o::{CellIndex, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// H3 resolution the aggregation service uses when none is requested.
pub const DEFAULT_RESOLUTION: Resolution = Resolution::Ten;

/// One aggregated hexagonal bucket as served by the heatmap endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatCell {
    pub latitude: f64,
    pub longitude: f64,
    /// Number of raw samples in the bucket.
    pub weight: f64,
    pub unique_values: u64,
    #[serde(rename = "h3_id")]
    pub cell_id: String,
    /// Mean of the selected metric, only sent when a metric was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_value: Option<f64>,
}

impl HeatCell {
    pub fn new(latitude: f64, longitude: f64, weight: f64, cell_id: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            weight,
            unique_values: 0,
            cell_id: cell_id.into(),
            avg_value: None,
        }
    }

    pub fn with_unique_values(mut self, unique_values: u64) -> Self {
        self.unique_values = unique_values;
        self
    }

    pub fn with_avg_value(mut self, avg_value: f64) -> Self {
        self.avg_value = Some(avg_value);
        self
    }

    /// The bucket id as an H3 index, when the server sent a valid one.
    pub fn cell_index(&self) -> Option<CellIndex> {
        self.cell_id.parse().ok()
    }
}

/// The full ordered cell list for one (metric, resolution) request.
///
/// Snapshots are immutable once built and get shared behind an `Arc`, so
/// swapping one in is all-or-nothing for every reader.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub metric: Metric,
    pub resolution: Resolution,
    cells: Vec<HeatCell>,
}

impl Snapshot {
    /// Builds a snapshot, dropping later cells whose id was already seen.
    pub fn new(metric: Metric, resolution: Resolution, cells: Vec<HeatCell>) -> Self {
        let received = cells.len();
        let mut seen = HashSet::with_capacity(received);
        let cells: Vec<HeatCell> = cells
            .into_iter()
            .filter(|cell| seen.insert(cell.cell_id.clone()))
            .collect();

        if cells.len() != received {
            tracing::warn!(
                duplicates = received - cells.len(),
                %metric,
                "dropped heat cells with duplicate ids"
            );
        }

        Self {
            metric,
            resolution,
            cells,
        }
    }

    pub fn empty(metric: Metric, resolution: Resolution) -> Self {
        Self {
            metric,
            resolution,
            cells: Vec::new(),
        }
    }

    pub fn cells(&self) -> &[HeatCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, cell_id: &str) -> Option<&HeatCell> {
        self.cells.iter().find(|cell| cell.cell_id == cell_id)
    }
}
