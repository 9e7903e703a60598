use std::cmp::Ordering;
use std::collections::BTreeMap;

use foundation::text::collate_pt_br;
use serde::{Deserialize, Serialize};

use crate::layer::GeometryKind;

/// Color for class values no palette knows about.
pub const UNMAPPED_COLOR: &str = "#6b7280";
/// Legend label of features whose class value is empty.
pub const UNCLASSIFIED_LABEL: &str = "Sem classe";

pub const MIN_OPACITY: f32 = 0.2;
pub const MAX_OPACITY: f32 = 1.0;

const SLOPE_BANDS: [(&str, &str, &str); 7] = [
    ("000a003", "0–3%", "#edf8e9"),
    ("003a008", "3–8%", "#c7e9c0"),
    ("008a015", "8–15%", "#7fcdbb"),
    ("015a025", "15–25%", "#41b6c4"),
    ("025a045", "25–45%", "#1d91c0"),
    ("045a100", "45–100%", "#225ea8"),
    (">100", ">100%", "#0c2c84"),
];

const ELEVATION_RAMP: [&str; 6] = [
    "#ffffcc", "#c2e699", "#78c679", "#31a354", "#006837", "#00441b",
];
const ELEVATION_BREAKS: [f64; 6] = [0.0, 400.0, 800.0, 1200.0, 1600.0, 2000.0];

const LAND_USE_COLORS: [(&str, &str); 12] = [
    ("Agricultura Anual", "#e6ab02"),
    ("Agricultura Perene", "#c98c00"),
    ("Corpos d’Água", "#67a9cf"),
    ("Floresta Nativa", "#1b9e77"),
    ("Mangue", "#0f766e"),
    ("Pastagem/Campo", "#a6d854"),
    ("Plantios Florestais", "#106b21"),
    ("Restinga", "#66c2a5"),
    ("Solo Exposto/Mineração", "#bdbdbd"),
    ("Várzea", "#c7e9c0"),
    ("Área Construída", "#7570b3"),
    ("Área Urbanizada", "#6a51a3"),
];

// Coarser NIVEL_I labels, used when a feature has no NIVEL_II value.
const LAND_USE_COARSE_COLORS: [(&str, &str); 5] = [
    ("Água", "#67a9cf"),
    ("Áreas de Vegetação Natural", "#1b9e77"),
    ("Áreas Antrópicas Agrícolas", "#e6ab02"),
    ("Áreas Antrópicas Não Agrícolas", "#6a51a3"),
    ("Áreas Antrópicas Agrícolas/Áreas de Vegetação Natural", "#8da0cb"),
];
const LAND_USE_FALLBACK: &str = "#31a354";

const SOIL_COLORS: [(&str, &str); 12] = [
    ("LATOSSOLOS", "#d95f0e"),
    ("ARGISSOLOS", "#fdae6b"),
    ("NEOSSOLOS LITÓLICOS", "#fee6ce"),
    ("NEOSSOLOS REGOLÍTICOS", "#fdd0a2"),
    ("NITOSSOLOS", "#a6761d"),
    ("CAMBISSOLOS", "#e0c2a2"),
    ("GLEISSOLOS", "#74c476"),
    ("ESPODOSSOLOS", "#9ecae1"),
    ("ORGANOSSOLOS", "#807dba"),
    ("AFLORAMENTOS DE ROCHAS", "#bdbdbd"),
    ("ÁREAS URBANAS", "#756bb1"),
    ("ESPELHOS DAGUA", "#67a9cf"),
];
const SOIL_FALLBACK: &str = "#dfc27d";

/// One class of a ranked scheme: raw attribute value, display label, color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassBand {
    pub value: String,
    pub label: String,
    pub color: String,
}

/// How class values of a layer map to colors and how legend entries order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "order", rename_all = "snake_case")]
pub enum ClassScheme {
    /// Fixed band order; values outside the bands follow, in gray.
    Ranked { bands: Vec<ClassBand> },
    /// Labels like `"400 a 800"`, colored by the midpoint of their two
    /// numbers and ordered by their leading number. Bin `i` covers
    /// `[breaks[i], breaks[i + 1])`; the last bin is open-ended.
    Interval { ramp: Vec<String>, breaks: Vec<f64> },
    /// Labels looked up in each palette in turn, ordered alphabetically.
    Nominal {
        palettes: Vec<BTreeMap<String, String>>,
        #[serde(default = "default_fallback")]
        fallback: String,
    },
}

fn default_fallback() -> String {
    UNMAPPED_COLOR.to_string()
}

fn palette(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(label, color)| (label.to_string(), color.to_string()))
        .collect()
}

impl ClassScheme {
    pub fn slope() -> Self {
        ClassScheme::Ranked {
            bands: SLOPE_BANDS
                .iter()
                .map(|(value, label, color)| ClassBand {
                    value: value.to_string(),
                    label: label.to_string(),
                    color: color.to_string(),
                })
                .collect(),
        }
    }

    pub fn elevation() -> Self {
        ClassScheme::Interval {
            ramp: ELEVATION_RAMP.iter().map(|c| c.to_string()).collect(),
            breaks: ELEVATION_BREAKS.to_vec(),
        }
    }

    pub fn land_use() -> Self {
        ClassScheme::Nominal {
            palettes: vec![palette(&LAND_USE_COLORS), palette(&LAND_USE_COARSE_COLORS)],
            fallback: LAND_USE_FALLBACK.to_string(),
        }
    }

    pub fn soils() -> Self {
        ClassScheme::Nominal {
            palettes: vec![palette(&SOIL_COLORS)],
            fallback: SOIL_FALLBACK.to_string(),
        }
    }

    /// Display label of a class value. The empty value is the unclassified bucket.
    pub fn label_for<'a>(&'a self, value: &'a str) -> &'a str {
        if value.is_empty() {
            return UNCLASSIFIED_LABEL;
        }
        match self {
            ClassScheme::Ranked { bands } => bands
                .iter()
                .find(|b| b.value == value)
                .map(|b| b.label.as_str())
                .unwrap_or(value),
            _ => value,
        }
    }

    pub fn color_for<'a>(&'a self, value: &str) -> &'a str {
        if value.is_empty() {
            return UNMAPPED_COLOR;
        }
        match self {
            ClassScheme::Ranked { bands } => bands
                .iter()
                .find(|b| b.value == value)
                .map(|b| b.color.as_str())
                .unwrap_or(UNMAPPED_COLOR),
            ClassScheme::Interval { ramp, breaks } => interval_color(ramp, breaks, value),
            ClassScheme::Nominal { palettes, fallback } => palettes
                .iter()
                .find_map(|p| p.get(value))
                .map(String::as_str)
                .unwrap_or(fallback.as_str()),
        }
    }

    /// Legend order of two class values. The unclassified value sorts last.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        match self {
            ClassScheme::Ranked { bands } => {
                let rank = |v: &str| bands.iter().position(|b| b.value == v);
                match (rank(a), rank(b)) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => collate_pt_br(a, b),
                }
            }
            ClassScheme::Interval { .. } => leading_number(a)
                .total_cmp(&leading_number(b))
                .then_with(|| collate_pt_br(a, b)),
            ClassScheme::Nominal { .. } => collate_pt_br(a, b),
        }
    }
}

fn digit_runs(label: &str) -> impl Iterator<Item = f64> + '_ {
    label
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .filter_map(|run| run.parse::<f64>().ok())
}

fn leading_number(label: &str) -> f64 {
    let digits: &str = label
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or("");
    digits.parse::<f64>().unwrap_or(0.0)
}

fn interval_color<'a>(ramp: &'a [String], breaks: &[f64], label: &str) -> &'a str {
    let Some(first) = ramp.first() else {
        return UNMAPPED_COLOR;
    };
    let mut runs = digit_runs(label);
    let (Some(lo), Some(hi)) = (runs.next(), runs.next()) else {
        return first.as_str();
    };
    let mid = (lo + hi) / 2.0;
    let bin = breaks.iter().rposition(|b| mid >= *b);
    match bin.and_then(|i| ramp.get(i)) {
        Some(color) => color.as_str(),
        None => ramp.last().map(String::as_str).unwrap_or(UNMAPPED_COLOR),
    }
}

/// Stroke and fill of a layer's features, before the global opacity applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerStyle {
    pub stroke: String,
    pub weight: f32,
    /// Fixed fill. Classified layers fill with their class color instead.
    pub fill: Option<String>,
    pub fill_opacity: f32,
    pub dash: Option<String>,
    /// Marker radius of point layers.
    pub radius: Option<f32>,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            stroke: "#4b5563".to_string(),
            weight: 1.0,
            fill: None,
            fill_opacity: 0.25,
            dash: None,
            radius: None,
        }
    }
}

impl LayerStyle {
    pub fn outline(stroke: &str, weight: f32, fill_opacity: f32) -> Self {
        Self {
            stroke: stroke.to_string(),
            weight,
            fill_opacity,
            ..Self::default()
        }
    }

    pub fn filled(stroke: &str, weight: f32, fill: &str, fill_opacity: f32) -> Self {
        Self {
            fill: Some(fill.to_string()),
            ..Self::outline(stroke, weight, fill_opacity)
        }
    }

    pub fn line(stroke: &str, weight: f32) -> Self {
        Self::outline(stroke, weight, 0.0)
    }

    pub fn marker(fill: &str) -> Self {
        Self {
            radius: Some(4.0),
            ..Self::filled("#1f2937", 1.0, fill, 0.85)
        }
    }

    pub fn with_dash(mut self, dash: &str) -> Self {
        self.dash = Some(dash.to_string());
        self
    }

    /// Swatch color of a single-entry legend: fill for points, stroke otherwise.
    pub fn legend_color(&self, kind: GeometryKind) -> &str {
        match (kind, &self.fill) {
            (GeometryKind::Point, Some(fill)) => fill.as_str(),
            _ => self.stroke.as_str(),
        }
    }

    /// Style of one feature at the given global opacity.
    pub fn resolve(&self, class_color: Option<&str>, opacity: f32) -> FeatureStyle {
        let opacity = clamp_opacity(opacity);
        FeatureStyle {
            stroke: self.stroke.clone(),
            weight: self.weight,
            fill: class_color.map(str::to_string).or_else(|| self.fill.clone()),
            fill_opacity: self.fill_opacity * opacity,
            opacity,
            dash: self.dash.clone(),
            radius: self.radius,
        }
    }
}

/// Concrete drawing attributes of one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStyle {
    pub stroke: String,
    pub weight: f32,
    pub fill: Option<String>,
    pub fill_opacity: f32,
    pub opacity: f32,
    pub dash: Option<String>,
    pub radius: Option<f32>,
}

pub fn clamp_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        return MAX_OPACITY;
    }
    opacity.clamp(MIN_OPACITY, MAX_OPACITY)
}
