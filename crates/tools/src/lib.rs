//! Helpers behind the `agua` command: settings, argument parsing, text
//! rendering and styled GeoJSON export.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use formats::geojson::{GeoFeature, feature_collection_value};
use foundation::bounds::LonLatBounds;
use layers::definition::{DatasetCatalog, LayerDefinition};
use layers::fields::{field_text, resolve_field};
use layers::legend::Legend;
use layers::selection::Selection;
use layers::summary::SummaryRow;
use layers::watershed::WatershedRecord;
use serde_json::{Value, json};

pub const DEFAULT_DATA_DIR: &str = "data";

/// Where datasets and the layer catalog come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// JSON catalog replacing the built-in one.
    pub catalog: Option<PathBuf>,
}

impl Settings {
    /// Flags win over `AGUA_DATA_DIR` / `AGUA_CATALOG`, which win over defaults.
    pub fn resolve(data_dir: Option<PathBuf>, catalog: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(|| {
            env::var("AGUA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR))
        });
        let catalog = catalog.or_else(|| env::var("AGUA_CATALOG").ok().map(PathBuf::from));
        Self { data_dir, catalog }
    }

    pub fn load_catalog(&self) -> Result<DatasetCatalog, Box<dyn std::error::Error>> {
        match &self.catalog {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .map_err(|e| format!("read {}: {e}", path.display()))?;
                Ok(DatasetCatalog::from_json_str(&json)
                    .map_err(|e| format!("parse {}: {e}", path.display()))?)
            }
            None => Ok(DatasetCatalog::agua_segura()),
        }
    }
}

/// `None` means unfiltered; an empty string selects no watershed.
pub fn parse_selection(arg: Option<&str>) -> Selection {
    match arg {
        None => Selection::All,
        Some(codes) => Selection::only(split_list(codes)),
    }
}

pub fn split_list(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Feature as GeoJSON with `stroke`, `stroke-width`, `stroke-opacity`,
/// `fill` and `fill-opacity` properties for simplestyle-aware viewers.
/// Features without an id take it from the layer's id field.
pub fn styled_feature(definition: &LayerDefinition, feature: &GeoFeature, opacity: f32) -> Value {
    let class_color = definition.classification.as_ref().map(|c| {
        let value = resolve_field(&feature.properties, c.fields.as_slice());
        c.scheme.color_for(&value).to_string()
    });
    let style = definition.style.resolve(class_color.as_deref(), opacity);
    let mut value = feature.to_geojson_value_with(|props| {
        props.insert("stroke".to_string(), json!(style.stroke));
        props.insert("stroke-width".to_string(), json!(style.weight));
        props.insert("stroke-opacity".to_string(), json!(style.opacity));
        if let Some(fill) = &style.fill {
            props.insert("fill".to_string(), json!(fill));
            props.insert("fill-opacity".to_string(), json!(style.fill_opacity));
        }
    });
    if feature.id.is_none() {
        let id = definition
            .id_field
            .as_deref()
            .and_then(|field| field_text(&feature.properties, &[field]));
        if let (Some(id), Value::Object(obj)) = (id, &mut value) {
            obj.insert("id".to_string(), Value::String(id));
        }
    }
    value
}

/// `[west, south, east, north]`, padded by `fraction` of the extent.
pub fn render_bounds(bounds: &LonLatBounds, fraction: f64) -> String {
    let b = bounds.padded(fraction);
    format!(
        "[{:.5}, {:.5}, {:.5}, {:.5}]",
        b.min.lon_deg, b.min.lat_deg, b.max.lon_deg, b.max.lat_deg
    )
}

pub fn export_collection(
    definition: &LayerDefinition,
    features: &[Arc<GeoFeature>],
    opacity: f32,
) -> Value {
    feature_collection_value(
        features
            .iter()
            .map(|f| styled_feature(definition, f, opacity)),
    )
}

pub fn render_summary(rows: &[SummaryRow]) -> String {
    let width = rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Camada".len());
    let mut out = format!(
        "{:<width$}  {:>12}  {:>12}  {:>10}\n",
        "Camada", "Área", "Extensão", "Registros"
    );
    for row in rows {
        let [area, length, count] = row.cells();
        out.push_str(&format!(
            "{:<width$}  {:>12}  {:>12}  {:>10}\n",
            row.name, area, length, count
        ));
    }
    out
}

pub fn render_legends(legends: &[Legend]) -> String {
    legends
        .iter()
        .filter(|l| !l.is_empty())
        .map(Legend::to_text)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_watersheds(records: &[&WatershedRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.label);
        if !record.origin.is_empty() {
            out.push_str(&format!(" [{}]", record.origin));
        }
        if !record.municipalities.is_empty() {
            out.push_str(&format!(" ({})", record.municipalities.join(", ")));
        }
        out.push('\n');
    }
    out
}
