use std::collections::BTreeMap;
use std::sync::Arc;

use formats::geojson::GeoFeature;

use crate::definition::LayerDefinition;
use crate::fields::{field_text, find_field, resolve_field};
use crate::layer::GeometryKind;
use crate::metrics::{Metric, compute_metrics};

/// Position of a feature within its layer's index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureId(pub u32);

impl FeatureId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Class label → aggregated metric value (area, length or count).
pub type ClassTotals = BTreeMap<String, f64>;

/// A loaded feature with everything derived from it once, at index time.
#[derive(Debug, Clone)]
pub struct IndexedFeature {
    pub feature: Arc<GeoFeature>,
    pub metric: Metric,
    pub code: Option<String>,
    /// Resolved class value; empty when the feature has none. `None` for
    /// unclassified layers.
    pub class: Option<String>,
}

/// Per-layer lookup from watershed code to features, with the metric
/// aggregates every filtered view is assembled from.
#[derive(Debug, Clone)]
pub struct FeatureIndex {
    kind: GeometryKind,
    code_field: Option<String>,
    features: Vec<IndexedFeature>,
    by_code: BTreeMap<String, Vec<FeatureId>>,
    metrics_by_code: BTreeMap<String, Metric>,
    totals: Metric,
    classified: bool,
    class_totals: ClassTotals,
    class_by_code: BTreeMap<String, ClassTotals>,
}

impl FeatureIndex {
    pub fn build(features: Vec<Arc<GeoFeature>>, definition: &LayerDefinition) -> Self {
        let class_fields = definition
            .classification
            .as_ref()
            .map(|c| c.fields.as_slice());
        Self::build_with(
            features,
            definition.kind,
            definition.join_fields.as_slice(),
            class_fields,
        )
    }

    pub fn build_with<S: AsRef<str>>(
        features: Vec<Arc<GeoFeature>>,
        kind: GeometryKind,
        join_fields: &[S],
        class_fields: Option<&[S]>,
    ) -> Self {
        // The join field is decided once, from the first feature that has
        // attributes at all.
        let code_field = features
            .iter()
            .find(|f| !f.properties.is_empty())
            .and_then(|f| find_field(&f.properties, join_fields))
            .map(str::to_string);

        let mut index = Self {
            kind,
            code_field,
            features: Vec::with_capacity(features.len()),
            by_code: BTreeMap::new(),
            metrics_by_code: BTreeMap::new(),
            totals: Metric::ZERO,
            classified: class_fields.is_some(),
            class_totals: ClassTotals::new(),
            class_by_code: BTreeMap::new(),
        };

        for (i, feature) in features.into_iter().enumerate() {
            let id = FeatureId(i as u32);
            let metric = compute_metrics(&feature, kind);
            let code = index
                .code_field
                .as_deref()
                .and_then(|field| field_text(&feature.properties, &[field]));
            let class = class_fields.map(|fields| resolve_field(&feature.properties, fields));

            index.totals += metric;
            if let Some(code) = &code {
                index.by_code.entry(code.clone()).or_default().push(id);
                *index.metrics_by_code.entry(code.clone()).or_default() += metric;
            }

            let value = metric.value(kind);
            match &class {
                Some(class) if value > 0.0 => {
                    *index.class_totals.entry(class.clone()).or_default() += value;
                    if let Some(code) = &code {
                        *index
                            .class_by_code
                            .entry(code.clone())
                            .or_default()
                            .entry(class.clone())
                            .or_default() += value;
                    }
                }
                _ => {}
            }

            index.features.push(IndexedFeature {
                feature,
                metric,
                code,
                class,
            });
        }

        index
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Attribute carrying the watershed code, as spelled in the data.
    pub fn code_field(&self) -> Option<&str> {
        self.code_field.as_deref()
    }

    /// Layers without a join field ignore the selection.
    pub fn is_filterable(&self) -> bool {
        self.code_field.is_some()
    }

    pub fn is_classified(&self) -> bool {
        self.classified
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[IndexedFeature] {
        &self.features
    }

    pub fn feature(&self, id: FeatureId) -> Option<&IndexedFeature> {
        self.features.get(id.index())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_code.keys().map(String::as_str)
    }

    pub fn features_for_code(&self, code: &str) -> &[FeatureId] {
        self.by_code.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn metrics_for_code(&self, code: &str) -> Option<&Metric> {
        self.metrics_by_code.get(code)
    }

    pub fn totals(&self) -> &Metric {
        &self.totals
    }

    pub fn class_totals(&self) -> &ClassTotals {
        &self.class_totals
    }

    pub fn class_totals_for_code(&self, code: &str) -> Option<&ClassTotals> {
        self.class_by_code.get(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Classification;
    use crate::symbology::ClassScheme;
    use formats::geojson::Geometry;
    use foundation::math::LonLat;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn point(props: Value) -> Arc<GeoFeature> {
        let Value::Object(props) = props else {
            panic!("expected object")
        };
        Arc::new(GeoFeature::new(
            props,
            Some(Geometry::Point(LonLat::new(-51.0, -24.0))),
        ))
    }

    fn points_def() -> LayerDefinition {
        LayerDefinition::new("pts", "Pontos", GeometryKind::Point, &["pts.geojson"])
    }

    #[test]
    fn groups_features_by_code() {
        let index = FeatureIndex::build(
            vec![
                point(json!({"COD_MAN": "A"})),
                point(json!({"COD_MAN": "B"})),
                point(json!({"COD_MAN": "A"})),
                point(json!({"COD_MAN": ""})),
            ],
            &points_def(),
        );
        assert_eq!(index.code_field(), Some("COD_MAN"));
        assert!(index.is_filterable());
        assert_eq!(index.codes().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(index.features_for_code("A"), &[FeatureId(0), FeatureId(2)]);
        assert_eq!(index.metrics_for_code("A").map(|m| m.count), Some(2));
        assert_eq!(index.totals().count, 4);
        assert_eq!(index.features_for_code("Z"), &[] as &[FeatureId]);
    }

    #[test]
    fn numeric_codes_join_as_text() {
        let index = FeatureIndex::build(
            vec![point(json!({"cod_man": 1201})), point(json!({"cod_man": "1201"}))],
            &points_def(),
        );
        assert_eq!(index.features_for_code("1201").len(), 2);
    }

    #[test]
    fn join_field_is_sampled_from_first_feature_with_attributes() {
        let index = FeatureIndex::build(
            vec![
                point(json!({})),
                point(json!({"nome": "sem código"})),
                point(json!({"Cod_man": "A"})),
            ],
            &points_def(),
        );
        assert_eq!(index.code_field(), None);
        assert!(!index.is_filterable());
        assert_eq!(index.totals().count, 3);
        assert_eq!(index.codes().count(), 0);
    }

    #[test]
    fn class_totals_accumulate_globally_and_per_code() {
        let def = points_def().with_classification(Classification::new(
            &["TIPO", "TIPO_GERAL"],
            ClassScheme::land_use(),
        ));
        let index = FeatureIndex::build(
            vec![
                point(json!({"Cod_man": "A", "TIPO": "x"})),
                point(json!({"Cod_man": "A", "TIPO": "", "TIPO_GERAL": "y"})),
                point(json!({"Cod_man": "B", "TIPO": "x"})),
                point(json!({"Cod_man": "B"})),
            ],
            &def,
        );
        assert!(index.is_classified());
        assert_eq!(
            index.class_totals(),
            &ClassTotals::from([
                (String::new(), 1.0),
                ("x".to_string(), 2.0),
                ("y".to_string(), 1.0)
            ])
        );
        assert_eq!(
            index.class_totals_for_code("A"),
            Some(&ClassTotals::from([("x".to_string(), 1.0), ("y".to_string(), 1.0)]))
        );
        assert_eq!(index.feature(FeatureId(1)).and_then(|f| f.class.as_deref()), Some("y"));
    }

    #[test]
    fn zero_metric_features_stay_out_of_class_totals() {
        let def = points_def().with_classification(Classification::new(&["TIPO"], ClassScheme::soils()));
        let mut empty = GeoFeature::new(serde_json::Map::new(), None);
        empty.properties.insert("TIPO".to_string(), json!("x"));
        let index = FeatureIndex::build(vec![Arc::new(empty)], &def);
        assert!(index.class_totals().is_empty());
        assert_eq!(index.len(), 1);
    }
}
