use std::collections::BTreeSet;

/// The active watershed filter.
///
/// `Only` with an empty set is a real filter: nothing is visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(codes.into_iter().map(Into::into).collect())
    }

    pub fn none() -> Self {
        Selection::Only(BTreeSet::new())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    /// Selected codes; `None` when unfiltered.
    pub fn codes(&self) -> Option<&BTreeSet<String>> {
        match self {
            Selection::All => None,
            Selection::Only(codes) => Some(codes),
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(codes) => codes.contains(code),
        }
    }

    /// Collapses a selection that covers every known code to `All`.
    ///
    /// An empty universe means the codes are not known yet; the selection is
    /// then kept as given.
    pub fn normalized(self, universe: &BTreeSet<String>) -> Self {
        match self {
            Selection::Only(codes)
                if !universe.is_empty() && universe.iter().all(|c| codes.contains(c)) =>
            {
                Selection::All
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Selection;
    use std::collections::BTreeSet;

    fn universe() -> BTreeSet<String> {
        ["A", "B", "C"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn full_selection_normalizes_to_all() {
        assert_eq!(
            Selection::only(["C", "A", "B"]).normalized(&universe()),
            Selection::All
        );
        assert_eq!(
            Selection::only(["A", "B", "C", "Z"]).normalized(&universe()),
            Selection::All
        );
    }

    #[test]
    fn partial_and_empty_selections_are_kept() {
        assert_eq!(
            Selection::only(["A"]).normalized(&universe()),
            Selection::only(["A"])
        );
        assert_eq!(Selection::none().normalized(&universe()), Selection::none());
        assert!(!Selection::none().contains("A"));
    }

    #[test]
    fn unknown_universe_keeps_selection() {
        let sel = Selection::only(["A"]).normalized(&BTreeSet::new());
        assert_eq!(sel.codes().map(|c| c.len()), Some(1));
        assert!(Selection::All.contains("anything"));
    }
}
