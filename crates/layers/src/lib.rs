pub mod definition;
pub mod fields;
pub mod format;
pub mod index;
pub mod layer;
pub mod legend;
pub mod metrics;
pub mod selection;
pub mod summary;
pub mod symbology;
pub mod view;
pub mod watershed;

pub use definition::{Classification, DatasetCatalog, LayerDefinition};
pub use index::{FeatureId, FeatureIndex, IndexedFeature};
pub use layer::*;
pub use legend::{Legend, LegendEntry, LegendUnit, build_legend};
pub use metrics::{Metric, compute_metrics};
pub use selection::Selection;
pub use summary::SummaryRow;
pub use view::LayerView;
pub use watershed::{RecordFilter, WatershedCatalog, WatershedRecord};
