use crate::heat_cell::HeatCell;
use crate::helpers::clamp_unit;
use crate::metric::Metric;

/// Observed raw-value range of one snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntensityRange {
    pub min: f64,
    pub max: f64,
}

impl IntensityRange {
    /// Span used as the divisor; a flat range counts as 1 so nothing divides by zero.
    pub fn span(&self) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 { 1.0 } else { span }
    }

    pub fn normalize(&self, raw: f64) -> f64 {
        clamp_unit((raw - self.min) / self.span())
    }
}

/// Raw intensity of a cell: the metric average when one is selected and
/// present, the sample count otherwise.
pub fn raw_value(cell: &HeatCell, metric: Metric) -> f64 {
    match cell.avg_value {
        Some(avg) if metric.is_selected() => avg,
        _ => cell.weight,
    }
}

/// Min/max of the raw values, `None` for an empty slice.
pub fn intensity_range(cells: &[HeatCell], metric: Metric) -> Option<IntensityRange> {
    let mut values = cells.iter().map(|cell| raw_value(cell, metric));
    let first = values.next()?;
    let (min, max) = values.fold((first, first), |(min, max), v| (min.min(v), max.max(v)));
    Some(IntensityRange { min, max })
}

/// Per-cell normalized intensities in [0, 1], in snapshot order.
pub fn normalize(cells: &[HeatCell], metric: Metric) -> Vec<f64> {
    let Some(range) = intensity_range(cells, metric) else {
        return Vec::new();
    };
    cells
        .iter()
        .map(|cell| range.normalize(raw_value(cell, metric)))
        .collect()
}
