use std::ops::AddAssign;

use formats::geojson::{GeoFeature, Geometry};
use foundation::math::{path_length_m, polygon_area_m2};
use serde::Serialize;

use crate::layer::GeometryKind;

const M2_PER_HA: f64 = 10_000.0;
const M_PER_KM: f64 = 1_000.0;

/// Area, length and count of one feature or an aggregate of features.
///
/// A single feature only ever carries the metric of its layer's geometry
/// kind; the other two fields stay zero.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct Metric {
    pub area_ha: f64,
    pub length_km: f64,
    pub count: u64,
}

impl Metric {
    pub const ZERO: Metric = Metric {
        area_ha: 0.0,
        length_km: 0.0,
        count: 0,
    };

    /// The field that matters for `kind`, as a float.
    pub fn value(&self, kind: GeometryKind) -> f64 {
        match kind {
            GeometryKind::Polygon => self.area_ha,
            GeometryKind::Line => self.length_km,
            GeometryKind::Point => self.count as f64,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.area_ha == 0.0 && self.length_km == 0.0 && self.count == 0
    }
}

impl AddAssign<Metric> for Metric {
    fn add_assign(&mut self, rhs: Metric) {
        self.area_ha += rhs.area_ha;
        self.length_km += rhs.length_km;
        self.count += rhs.count;
    }
}

impl<'a> AddAssign<&'a Metric> for Metric {
    fn add_assign(&mut self, rhs: &'a Metric) {
        *self += *rhs;
    }
}

impl std::iter::Sum for Metric {
    fn sum<I: Iterator<Item = Metric>>(iter: I) -> Self {
        iter.fold(Metric::ZERO, |mut acc, m| {
            acc += m;
            acc
        })
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

/// Metric of `feature` read as a `kind` feature. Missing or unusable
/// geometry yields zero; geometry of another family contributes nothing.
pub fn compute_metrics(feature: &GeoFeature, kind: GeometryKind) -> Metric {
    let Some(geometry) = feature.geometry.as_ref() else {
        return Metric::ZERO;
    };
    match kind {
        GeometryKind::Polygon => Metric {
            area_ha: finite_or_zero(area_m2(geometry) / M2_PER_HA),
            ..Metric::ZERO
        },
        GeometryKind::Line => Metric {
            length_km: finite_or_zero(length_m(geometry) / M_PER_KM),
            ..Metric::ZERO
        },
        GeometryKind::Point => Metric {
            count: point_count(geometry),
            ..Metric::ZERO
        },
    }
}

fn area_m2(geometry: &Geometry) -> f64 {
    match geometry {
        Geometry::Polygon(rings) => polygon_area_m2(rings),
        Geometry::MultiPolygon(polys) => polys.iter().map(|rings| polygon_area_m2(rings)).sum(),
        _ => 0.0,
    }
}

fn length_m(geometry: &Geometry) -> f64 {
    match geometry {
        Geometry::LineString(points) => path_length_m(points),
        Geometry::MultiLineString(lines) => lines.iter().map(|points| path_length_m(points)).sum(),
        _ => 0.0,
    }
}

fn point_count(geometry: &Geometry) -> u64 {
    match geometry {
        Geometry::Point(_) => 1,
        Geometry::MultiPoint(points) => points.len() as u64,
        _ => 0,
    }
}
