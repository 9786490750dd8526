use crate::vocab;
use oxrdf::NamedNode;

/// Returns the RDF container membership property (`rdf:_N`) for the 1-based
/// ordinal `n`.
pub fn membership_property(n: usize) -> NamedNode {
    NamedNode::new_unchecked(format!("{}_{n}", vocab::rdf::NS))
}

/// Returns the ordinal of `iri` if it is a container membership property.
pub fn membership_ordinal(iri: &str) -> Option<usize> {
    let ordinal = iri.strip_prefix(vocab::rdf::NS)?.strip_prefix('_')?;
    ordinal.parse().ok().filter(|n| *n >= 1)
}

/// Returns whether `iri` is a container membership property (`rdf:_N`).
pub fn is_membership_property(iri: &str) -> bool {
    membership_ordinal(iri).is_some()
}
