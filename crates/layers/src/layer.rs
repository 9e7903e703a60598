use serde::{Deserialize, Serialize};

/// Stable key of a thematic layer (`"declividade"`, `"microbacias"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerKey(String);

impl LayerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for LayerKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayerKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Geometry family of a layer; decides which metric its features carry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    #[serde(alias = "poly")]
    Polygon,
    Line,
    Point,
}

impl GeometryKind {
    pub fn unit_suffix(&self) -> &'static str {
        match self {
            GeometryKind::Polygon => "ha",
            GeometryKind::Line => "km",
            GeometryKind::Point => "",
        }
    }
}
