use facadex_model::{GraphName, NamedNode, QuadRef, Subject, Term};

/// A quad lookup pattern with optionally bound components.
///
/// `None` components are wildcards. A wildcard graph matches quads in every
/// graph (union semantics); a bound graph matches only that graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuadPattern {
    pub graph: Option<GraphName>,
    pub subject: Option<Subject>,
    pub predicate: Option<NamedNode>,
    pub object: Option<Term>,
}

impl QuadPattern {
    /// Creates a pattern that matches every quad.
    pub fn any() -> Self {
        Self::default()
    }

    /// Creates a pattern from its components.
    pub fn new(
        graph: Option<GraphName>,
        subject: Option<Subject>,
        predicate: Option<NamedNode>,
        object: Option<Term>,
    ) -> Self {
        Self {
            graph,
            subject,
            predicate,
            object,
        }
    }

    /// Returns whether `quad` matches this pattern.
    pub fn matches(&self, quad: QuadRef<'_>) -> bool {
        if let Some(graph) = &self.graph {
            if quad.graph_name != graph.as_ref() {
                return false;
            }
        }
        if let Some(subject) = &self.subject {
            if quad.subject != subject.as_ref() {
                return false;
            }
        }
        if let Some(predicate) = &self.predicate {
            if quad.predicate != predicate.as_ref() {
                return false;
            }
        }
        if let Some(object) = &self.object {
            if quad.object != object.as_ref() {
                return false;
            }
        }
        true
    }
}
