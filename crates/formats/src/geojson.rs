use foundation::math::LonLat;
use serde_json::{Map, Value};

use crate::error::FormatError;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(LonLat),
    MultiPoint(Vec<LonLat>),
    LineString(Vec<LonLat>),
    MultiLineString(Vec<Vec<LonLat>>),
    Polygon(Vec<Vec<LonLat>>),
    MultiPolygon(Vec<Vec<Vec<LonLat>>>),
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Visits every position of the geometry.
    pub fn for_each_position(&self, mut f: impl FnMut(LonLat)) {
        match self {
            Geometry::Point(p) => f(*p),
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => ps.iter().copied().for_each(f),
            Geometry::MultiLineString(rings) | Geometry::Polygon(rings) => {
                rings.iter().flatten().copied().for_each(f)
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().copied().for_each(f),
        }
    }
}

/// One GeoJSON feature as loaded from a dataset file.
///
/// Features are immutable once parsed and shared by reference between the
/// index and every filtered view. A feature whose geometry could not be read
/// keeps its properties and has `geometry == None`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: Option<Geometry>,
}

impl GeoFeature {
    pub fn new(properties: Map<String, Value>, geometry: Option<Geometry>) -> Self {
        Self {
            id: None,
            properties,
            geometry,
        }
    }

    /// Emits the feature as a GeoJSON `Feature` object.
    pub fn to_geojson_value(&self) -> Value {
        self.to_geojson_value_with(|_| {})
    }

    /// Like [`GeoFeature::to_geojson_value`], letting the caller add or
    /// override properties on the emitted copy.
    pub fn to_geojson_value_with(&self, extra: impl FnOnce(&mut Map<String, Value>)) -> Value {
        let mut fobj = Map::new();
        fobj.insert("type".to_string(), Value::String("Feature".to_string()));
        if let Some(id) = &self.id {
            fobj.insert("id".to_string(), Value::String(id.clone()));
        }

        let mut properties = self.properties.clone();
        extra(&mut properties);
        fobj.insert("properties".to_string(), Value::Object(properties));

        let geometry = match &self.geometry {
            Some(g) => geometry_to_geojson_value(g),
            None => Value::Null,
        };
        fobj.insert("geometry".to_string(), geometry);
        Value::Object(fobj)
    }
}

/// Result of parsing one GeoJSON document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<GeoFeature>,
    /// Entries of `features` that were not `Feature` objects.
    pub skipped: usize,
    /// Features kept without geometry because it was missing or malformed.
    pub invalid_geometries: usize,
}

impl FeatureCollection {
    pub fn from_geojson_str(payload: &str) -> Result<Self, FormatError> {
        let value: Value = serde_json::from_str(payload).map_err(FormatError::Json)?;
        Self::from_geojson_value(value)
    }

    pub fn from_geojson_slice(payload: &[u8]) -> Result<Self, FormatError> {
        let value: Value = serde_json::from_slice(payload).map_err(FormatError::Json)?;
        Self::from_geojson_value(value)
    }

    /// Accepts a `FeatureCollection` or a single `Feature`.
    pub fn from_geojson_value(value: Value) -> Result<Self, FormatError> {
        let Value::Object(mut obj) = value else {
            return Err(FormatError::NotAnObject);
        };
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let mut out = FeatureCollection::default();
        match ty.as_str() {
            "FeatureCollection" => {
                let Some(Value::Array(entries)) = obj.remove("features") else {
                    return Ok(out);
                };
                out.features.reserve(entries.len());
                for entry in entries {
                    out.push_value(entry);
                }
            }
            "Feature" => out.push_value(Value::Object(obj)),
            other => return Err(FormatError::UnsupportedType(other.to_string())),
        }
        Ok(out)
    }

    fn push_value(&mut self, value: Value) {
        let Value::Object(mut feat_obj) = value else {
            self.skipped += 1;
            return;
        };
        if feat_obj.get("type").and_then(|v| v.as_str()) != Some("Feature") {
            self.skipped += 1;
            return;
        }

        let id = match feat_obj.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let properties = match feat_obj.remove("properties") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let geometry = feat_obj
            .get("geometry")
            .filter(|v| !v.is_null())
            .and_then(|v| parse_geometry(v).ok());
        if geometry.is_none() {
            self.invalid_geometries += 1;
        }

        self.features.push(GeoFeature {
            id,
            properties,
            geometry,
        });
    }

    /// Emits the collection as a GeoJSON `FeatureCollection`.
    /// Property order follows the parsed map, not the source text.
    pub fn to_geojson_value(&self) -> Value {
        feature_collection_value(self.features.iter().map(GeoFeature::to_geojson_value))
    }
}

/// Wraps already-serialized features in a `FeatureCollection` object.
pub fn feature_collection_value(features: impl IntoIterator<Item = Value>) -> Value {
    let mut root = Map::new();
    root.insert(
        "type".to_string(),
        Value::String("FeatureCollection".to_string()),
    );
    root.insert(
        "features".to_string(),
        Value::Array(features.into_iter().collect()),
    );
    Value::Object(root)
}

fn geometry_to_geojson_value(geom: &Geometry) -> Value {
    let coords = match geom {
        Geometry::Point(p) => point_coords(p),
        Geometry::MultiPoint(ps) | Geometry::LineString(ps) => points_coords(ps),
        Geometry::MultiLineString(rings) | Geometry::Polygon(rings) => {
            Value::Array(rings.iter().map(|r| points_coords(r)).collect())
        }
        Geometry::MultiPolygon(polys) => Value::Array(
            polys
                .iter()
                .map(|poly| Value::Array(poly.iter().map(|r| points_coords(r)).collect()))
                .collect(),
        ),
    };

    let mut obj = Map::new();
    obj.insert(
        "type".to_string(),
        Value::String(geom.type_name().to_string()),
    );
    obj.insert("coordinates".to_string(), coords);
    Value::Object(obj)
}

fn point_coords(p: &LonLat) -> Value {
    Value::Array(vec![Value::from(p.lon_deg), Value::from(p.lat_deg)])
}

fn points_coords(ps: &[LonLat]) -> Value {
    Value::Array(ps.iter().map(point_coords).collect())
}

fn parse_geometry(value: &Value) -> Result<Geometry, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(Geometry::Point(parse_point(coords)?)),
        "MultiPoint" => Ok(Geometry::MultiPoint(parse_points(coords)?)),
        "LineString" => Ok(Geometry::LineString(parse_points(coords)?)),
        "MultiLineString" => Ok(Geometry::MultiLineString(parse_rings(coords)?)),
        "Polygon" => Ok(Geometry::Polygon(parse_rings(coords)?)),
        "MultiPolygon" => Ok(Geometry::MultiPolygon(parse_multi_polygon(coords)?)),
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_point(coords: &Value) -> Result<LonLat, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [lon, lat]".to_string());
    }
    let lon = arr[0].as_f64().ok_or("lon must be a number".to_string())?;
    let lat = arr[1].as_f64().ok_or("lat must be a number".to_string())?;
    Ok(LonLat::new(lon, lat))
}

fn parse_points(coords: &Value) -> Result<Vec<LonLat>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array".to_string())?;
    arr.iter().map(parse_point).collect()
}

fn parse_rings(coords: &Value) -> Result<Vec<Vec<LonLat>>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array of rings".to_string())?;
    arr.iter().map(parse_points).collect()
}

fn parse_multi_polygon(coords: &Value) -> Result<Vec<Vec<Vec<LonLat>>>, String> {
    let polys = coords
        .as_array()
        .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
    polys.iter().map(parse_rings).collect()
}
