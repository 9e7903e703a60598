use std::sync::Arc;

use formats::geojson::GeoFeature;
use runtime::Epoch;

use crate::index::{ClassTotals, FeatureId, FeatureIndex, IndexedFeature};
use crate::metrics::Metric;
use crate::selection::Selection;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Visible {
    Everything,
    Subset(Vec<FeatureId>),
}

/// What one layer shows under one selection.
///
/// Views are derived from a [`FeatureIndex`] and tagged with the epoch of
/// the selection they were computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerView {
    epoch: Epoch,
    visible: Visible,
    metrics: Metric,
    class_totals: ClassTotals,
}

impl LayerView {
    pub fn compute(index: &FeatureIndex, selection: &Selection, epoch: Epoch) -> Self {
        let codes = match selection.codes() {
            Some(codes) if index.is_filterable() => codes,
            _ => {
                return Self {
                    epoch,
                    visible: Visible::Everything,
                    metrics: *index.totals(),
                    class_totals: index.class_totals().clone(),
                };
            }
        };

        let mut ids = Vec::new();
        let mut metrics = Metric::ZERO;
        let mut class_totals = ClassTotals::new();
        for code in codes {
            ids.extend_from_slice(index.features_for_code(code));
            if let Some(m) = index.metrics_for_code(code) {
                metrics += m;
            }
            for (class, value) in index.class_totals_for_code(code).into_iter().flatten() {
                *class_totals.entry(class.clone()).or_default() += value;
            }
        }
        ids.sort_unstable();

        Self {
            epoch,
            visible: Visible::Subset(ids),
            metrics,
            class_totals,
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_unfiltered(&self) -> bool {
        self.visible == Visible::Everything
    }

    pub fn metrics(&self) -> &Metric {
        &self.metrics
    }

    pub fn class_totals(&self) -> &ClassTotals {
        &self.class_totals
    }

    pub fn visible_len(&self, index: &FeatureIndex) -> usize {
        match &self.visible {
            Visible::Everything => index.len(),
            Visible::Subset(ids) => ids.len(),
        }
    }

    /// Visible features in load order.
    pub fn for_each_visible<'a>(&self, index: &'a FeatureIndex, mut f: impl FnMut(&'a IndexedFeature)) {
        match &self.visible {
            Visible::Everything => index.features().iter().for_each(f),
            Visible::Subset(ids) => {
                for id in ids {
                    if let Some(feature) = index.feature(*id) {
                        f(feature);
                    }
                }
            }
        }
    }

    pub fn visible_features(&self, index: &FeatureIndex) -> Vec<Arc<GeoFeature>> {
        let mut out = Vec::with_capacity(self.visible_len(index));
        self.for_each_visible(index, |f| out.push(Arc::clone(&f.feature)));
        out
    }
}
