use serde::Serialize;

use crate::format;
use crate::layer::{GeometryKind, LayerKey};
use crate::metrics::Metric;
use crate::selection::Selection;
use crate::watershed::WatershedCatalog;

/// Shown in the cell of a layer whose data is not loaded yet.
pub const PENDING: &str = "…";

/// How many selected watersheds are named before falling back to a count.
const MAX_NAMED: usize = 3;

/// One line of the layer summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub layer: LayerKey,
    pub name: String,
    pub kind: GeometryKind,
    /// Filtered metrics; `None` while the layer is not loaded.
    pub metrics: Option<Metric>,
}

impl SummaryRow {
    /// Area, length and count cells. Only the cell of the row's geometry
    /// kind carries a value.
    pub fn cells(&self) -> [String; 3] {
        let cell = |kind: GeometryKind| -> String {
            if kind != self.kind {
                return format::PLACEHOLDER.to_string();
            }
            let Some(metrics) = &self.metrics else {
                return PENDING.to_string();
            };
            match kind {
                GeometryKind::Polygon => format::hectares(metrics.area_ha),
                GeometryKind::Line => format::kilometers(metrics.length_km),
                GeometryKind::Point => format::integer(metrics.count as f64),
            }
        };
        [
            cell(GeometryKind::Polygon),
            cell(GeometryKind::Line),
            cell(GeometryKind::Point),
        ]
    }
}

/// Sentence describing the active selection.
pub fn selection_note(selection: &Selection, watersheds: Option<&WatershedCatalog>) -> String {
    let Some(catalog) = watersheds.filter(|c| !c.is_empty()) else {
        return "Microbacias não disponíveis para filtragem.".to_string();
    };
    let codes = match selection {
        Selection::All => return "Sem filtro de microbacias — totais gerais.".to_string(),
        Selection::Only(codes) if codes.is_empty() => {
            return "Filtro aplicado sem microbacias — nenhuma feição exibida.".to_string();
        }
        Selection::Only(codes) => codes,
    };
    if codes.len() > MAX_NAMED {
        return format!("Filtro ativo: {} microbacias", codes.len());
    }
    let labels: Vec<&str> = codes
        .iter()
        .map(|code| catalog.get(code).map(|r| r.label.as_str()).unwrap_or(code))
        .collect();
    format!("Filtro ativo: {}", labels.join(", "))
}
