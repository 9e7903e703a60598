/// Lifecycle of a layer's data within a session.
///
/// Registered → Loading → Loaded. Loaded data is never evicted; only a
/// registry reset returns a layer to `Registered`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResidencyState {
    Registered,
    Loading,
    Loaded,
}

/// A dataset file that could not be fetched or decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub file: String,
    pub error: String,
}

/// What one layer load produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub files: usize,
    pub features: usize,
    /// Collection entries that were not features.
    pub skipped_entries: usize,
    /// Features kept without geometry.
    pub invalid_geometries: usize,
    pub failures: Vec<FileFailure>,
}

impl LoadReport {
    /// `true` when the layer has files and none of them could be read.
    pub fn all_failed(&self) -> bool {
        self.files > 0 && self.failures.len() == self.files
    }
}
