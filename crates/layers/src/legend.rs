use serde::Serialize;

use runtime::Epoch;

use crate::definition::LayerDefinition;
use crate::format;
use crate::index::{ClassTotals, FeatureIndex};
use crate::layer::{GeometryKind, LayerKey};
use crate::selection::Selection;
use crate::symbology::ClassScheme;
use crate::view::LayerView;

/// Which metric the legend values are in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegendUnit {
    Area,
    Length,
    Count,
}

impl From<GeometryKind> for LegendUnit {
    fn from(kind: GeometryKind) -> Self {
        match kind {
            GeometryKind::Polygon => LegendUnit::Area,
            GeometryKind::Line => LegendUnit::Length,
            GeometryKind::Point => LegendUnit::Count,
        }
    }
}

impl LegendUnit {
    pub fn render(&self, value: f64) -> String {
        match self {
            LegendUnit::Area => format::hectares(value),
            LegendUnit::Length => format::kilometers(value),
            LegendUnit::Count => format::integer(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
    pub value: f64,
    /// Share of the legend total; `None` when the total is zero or not finite.
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub layer: LayerKey,
    pub title: String,
    pub unit: LegendUnit,
    pub total: f64,
    pub items: Vec<LegendEntry>,
}

pub fn percent_of(value: f64, total: f64) -> Option<f64> {
    if total.is_finite() && total > 0.0 && value.is_finite() {
        Some(value / total * 100.0)
    } else {
        None
    }
}

/// Entries of a classed legend: positive classes only, labelled, colored
/// and ordered by `scheme`.
pub fn classed_entries(scheme: &ClassScheme, totals: &ClassTotals, total: f64) -> Vec<LegendEntry> {
    let mut classes: Vec<(&str, f64)> = totals
        .iter()
        .filter(|(_, v)| **v > 0.0)
        .map(|(k, v)| (k.as_str(), *v))
        .collect();
    classes.sort_by(|(a, _), (b, _)| scheme.compare(a, b));

    classes
        .into_iter()
        .map(|(value_key, value)| LegendEntry {
            label: scheme.label_for(value_key).to_string(),
            color: scheme.color_for(value_key).to_string(),
            value,
            percent: percent_of(value, total),
        })
        .collect()
}

/// Legend of `definition` under `selection`, straight from its index.
pub fn build_legend(definition: &LayerDefinition, index: &FeatureIndex, selection: &Selection) -> Legend {
    let view = LayerView::compute(index, selection, Epoch::INITIAL);
    Legend::from_view(definition, &view)
}

impl Legend {
    pub fn from_view(definition: &LayerDefinition, view: &LayerView) -> Self {
        let kind = definition.kind;
        let total = view.metrics().value(kind);
        let items = match &definition.classification {
            Some(classification) => classed_entries(&classification.scheme, view.class_totals(), total),
            None if total > 0.0 => vec![LegendEntry {
                label: definition.total_label().to_string(),
                color: definition.style.legend_color(kind).to_string(),
                value: total,
                percent: percent_of(total, total),
            }],
            None => Vec::new(),
        };

        Self {
            layer: definition.key.clone(),
            title: definition.legend_title().to_string(),
            unit: kind.into(),
            total,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Plain-text rendering, one entry per line.
    pub fn to_text(&self) -> String {
        let mut out = format!("{} ({})\n", self.title, self.unit.render(self.total));
        for item in &self.items {
            out.push_str(&format!(
                "  {} {}: {} ({})\n",
                item.color,
                item.label,
                self.unit.render(item.value),
                format::percent(item.percent)
            ));
        }
        out
    }
}
