/// Selection epoch.
///
/// Every applied selection change advances the epoch by one. Filtered layer
/// views remember the epoch they were computed for, so a reader can tell a
/// stale view from a current one without comparing selections.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

impl Epoch {
    pub const INITIAL: Epoch = Epoch(0);

    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
