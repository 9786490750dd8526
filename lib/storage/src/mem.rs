use crate::sink::QuadSink;
use facadex_common::error::StorageError;
use facadex_common::QuadPattern;
use facadex_model::{Dataset, Quad, QuadRef};

/// In-memory graph store backing one materialized build.
#[derive(Default)]
pub struct MemStore {
    dataset: Dataset,
}

impl MemStore {
    /// Creates an empty [MemStore].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the quads collected so far.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Consumes the store and returns the collected quads.
    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }
}

impl QuadSink for MemStore {
    fn put(&mut self, quad: Quad) -> Result<bool, StorageError> {
        Ok(self.dataset.insert(&quad))
    }
}

/// Returns the quads of `dataset` that match `pattern`.
pub fn match_quads<'a>(
    dataset: &'a Dataset,
    pattern: &'a QuadPattern,
) -> impl Iterator<Item = QuadRef<'a>> {
    dataset.iter().filter(|quad| pattern.matches(*quad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use facadex_model::NamedNode;

    fn quad(s: &str, o: &str) -> Quad {
        Quad::new(
            NamedNode::new_unchecked(format!("http://example.com/{s}")),
            NamedNode::new_unchecked("http://example.com/p"),
            NamedNode::new_unchecked(format!("http://example.com/{o}")),
            NamedNode::new_unchecked("http://example.com/g"),
        )
    }

    #[test]
    fn put_reports_duplicates() {
        let mut store = MemStore::new();
        assert!(store.put(quad("s", "o")).unwrap());
        assert!(!store.put(quad("s", "o")).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn match_quads_filters_by_pattern() {
        let mut store = MemStore::new();
        store.put(quad("a", "o")).unwrap();
        store.put(quad("b", "o")).unwrap();

        let pattern = QuadPattern::new(
            None,
            Some(NamedNode::new_unchecked("http://example.com/a").into()),
            None,
            None,
        );
        assert_eq!(match_quads(store.dataset(), &pattern).count(), 1);
    }
}
