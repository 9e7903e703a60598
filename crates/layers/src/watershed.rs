use std::collections::{BTreeMap, BTreeSet};

use foundation::text::{collate_pt_br, fold, sort_pt_br};
use serde::Serialize;

use crate::definition::{
    BASIN_NAME_FIELDS, MANANCIAL_FIELDS, MUNICIPALITY_FIELDS, ORIGIN_FIELDS, REGION_FIELDS,
};
use crate::fields::resolve_field;
use crate::index::FeatureIndex;

/// One watershed of the base layer, as offered for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatershedRecord {
    pub code: String,
    pub label: String,
    pub origin: String,
    pub regions: Vec<String>,
    pub municipalities: Vec<String>,
    /// Folded text the free-text query is matched against.
    #[serde(skip)]
    pub search_text: String,
}

/// Narrows the record list. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub origin: Option<String>,
    pub region: Option<String>,
    pub municipality: Option<String>,
    pub query: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl RecordFilter {
    pub fn matches(&self, record: &WatershedRecord) -> bool {
        if let Some(origin) = non_blank(&self.origin) {
            if record.origin != origin {
                return false;
            }
        }
        if let Some(region) = non_blank(&self.region) {
            if !record.regions.iter().any(|r| r == region) {
                return false;
            }
        }
        if let Some(municipality) = non_blank(&self.municipality) {
            if !record.municipalities.iter().any(|m| m == municipality) {
                return false;
            }
        }
        if let Some(query) = non_blank(&self.query) {
            if !record.search_text.contains(&fold(query)) {
                return false;
            }
        }
        true
    }
}

/// Watershed records of a session. Written once from the base layer, read
/// by every selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatershedCatalog {
    records: Vec<WatershedRecord>,
    universe: BTreeSet<String>,
}

#[derive(Default)]
struct Draft {
    label: String,
    origin: String,
    regions: BTreeSet<String>,
    municipalities: BTreeSet<String>,
}

impl WatershedCatalog {
    /// Builds one record per distinct code of `base`, enriched with the
    /// regions and municipalities of the `enrichment` features that share it.
    pub fn build(base: &FeatureIndex, enrichment: Option<&FeatureIndex>) -> Self {
        let mut drafts: BTreeMap<&str, Draft> = BTreeMap::new();
        for item in base.features() {
            let Some(code) = item.code.as_deref() else {
                continue;
            };
            if drafts.contains_key(code) {
                continue;
            }
            let props = &item.feature.properties;
            let manancial = resolve_field(props, MANANCIAL_FIELDS);
            let basin = resolve_field(props, BASIN_NAME_FIELDS);
            let label = match (manancial.is_empty(), basin.is_empty()) {
                (false, _) => format!("{code} — {manancial}"),
                (true, false) => format!("{code} — {basin}"),
                (true, true) => code.to_string(),
            };
            drafts.insert(
                code,
                Draft {
                    label,
                    origin: resolve_field(props, ORIGIN_FIELDS),
                    ..Draft::default()
                },
            );
        }

        for item in enrichment.map(|e| e.features()).unwrap_or(&[]) {
            let Some(draft) = item.code.as_deref().and_then(|c| drafts.get_mut(c)) else {
                continue;
            };
            let props = &item.feature.properties;
            let region = resolve_field(props, REGION_FIELDS);
            if !region.is_empty() {
                draft.regions.insert(region);
            }
            let municipality = resolve_field(props, MUNICIPALITY_FIELDS);
            if !municipality.is_empty() {
                draft.municipalities.insert(municipality);
            }
        }

        let mut records: Vec<WatershedRecord> = drafts
            .into_iter()
            .map(|(code, draft)| {
                let mut regions: Vec<String> = draft.regions.into_iter().collect();
                let mut municipalities: Vec<String> = draft.municipalities.into_iter().collect();
                sort_pt_br(&mut regions);
                sort_pt_br(&mut municipalities);

                let mut search = vec![code, draft.label.as_str(), draft.origin.as_str()];
                search.extend(regions.iter().map(String::as_str));
                search.extend(municipalities.iter().map(String::as_str));
                let search_text = fold(&search.join(" "));

                WatershedRecord {
                    code: code.to_string(),
                    label: draft.label,
                    origin: draft.origin,
                    regions,
                    municipalities,
                    search_text,
                }
            })
            .collect();
        records.sort_by(|a, b| collate_pt_br(&a.label, &b.label));

        let universe = records.iter().map(|r| r.code.clone()).collect();
        Self { records, universe }
    }

    pub fn records(&self) -> &[WatershedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&WatershedRecord> {
        self.records.iter().find(|r| r.code == code)
    }

    /// Every known code; a selection covering all of them is unfiltered.
    pub fn universe(&self) -> &BTreeSet<String> {
        &self.universe
    }

    pub fn filter(&self, filter: &RecordFilter) -> Vec<&WatershedRecord> {
        self.records.iter().filter(|r| filter.matches(r)).collect()
    }

    fn distinct<'a>(&'a self, values: impl Fn(&'a WatershedRecord) -> Vec<&'a str>) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .flat_map(values)
            .filter(|v| !v.is_empty())
            .collect();
        let mut out: Vec<String> = set.into_iter().map(str::to_string).collect();
        sort_pt_br(&mut out);
        out
    }

    pub fn origins(&self) -> Vec<String> {
        self.distinct(|r| vec![r.origin.as_str()])
    }

    pub fn regions(&self) -> Vec<String> {
        self.distinct(|r| r.regions.iter().map(String::as_str).collect())
    }

    pub fn municipalities(&self) -> Vec<String> {
        self.distinct(|r| r.municipalities.iter().map(String::as_str).collect())
    }
}
