use facadex_common::error::StorageError;
use facadex_model::vocab::fx;
use facadex_model::{
    is_membership_property, GraphName, NamedNode, Quad, QuadRef, Subject, Term,
};
use facadex_storage::QuadSink;
use spargebra::algebra::{GraphPattern, PropertyPathExpression};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};

/// One bound-or-wildcard component of a filtering template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Component<T> {
    Wildcard,
    Bound(T),
}

/// A quad template harvested from the requesting pattern. Never mutated.
#[derive(Debug, Clone)]
struct QuadTemplate {
    graph: Component<GraphName>,
    subject: Component<Subject>,
    predicate: Component<NamedNode>,
    object: Component<Term>,
}

impl QuadTemplate {
    fn admits(&self, quad: QuadRef<'_>) -> bool {
        if let Component::Bound(graph) = &self.graph {
            if quad.graph_name != graph.as_ref() {
                return false;
            }
        }
        if let Component::Bound(subject) = &self.subject {
            if quad.subject != subject.as_ref() {
                return false;
            }
        }
        if let Component::Bound(predicate) = &self.predicate {
            // fx:anySlot stands for any ordinal or member slot.
            if predicate.as_ref() == fx::ANY_SLOT {
                if !is_slot_predicate(quad.predicate.as_str()) {
                    return false;
                }
            } else if quad.predicate != predicate.as_ref() {
                return false;
            }
        }
        if let Component::Bound(object) = &self.object {
            if quad.object != object.as_ref() {
                return false;
            }
        }
        true
    }
}

fn is_slot_predicate(iri: &str) -> bool {
    is_membership_property(iri) || iri == facadex_model::vocab::rdfs::MEMBER.as_str()
}

/// The triple-filtering overlay: the set of quad templates a requesting
/// pattern could possibly match.
///
/// Filtering is sound, never complete: a quad admitted by some template is
/// always forwarded, and a pattern without templates admits everything.
/// Disabling the overlay must not change evaluation results, only the amount
/// of work downstream.
#[derive(Debug, Clone, Default)]
pub struct TripleFilter {
    templates: Vec<QuadTemplate>,
}

impl TripleFilter {
    /// Extracts the filtering templates from `pattern`.
    pub fn from_pattern(pattern: &GraphPattern) -> Self {
        let mut templates = Vec::new();
        collect(pattern, &Component::Wildcard, &mut templates);
        Self { templates }
    }

    /// Number of collected templates. Zero means no filtering is possible.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Whether `quad` is admitted by some template (or no templates exist).
    pub fn admits(&self, quad: QuadRef<'_>) -> bool {
        self.templates.is_empty() || self.templates.iter().any(|template| template.admits(quad))
    }
}

/// Recursive walk over the operator tree, accumulating one template per
/// concrete triple pattern.
fn collect(
    pattern: &GraphPattern,
    graph: &Component<GraphName>,
    out: &mut Vec<QuadTemplate>,
) {
    match pattern {
        GraphPattern::Bgp { patterns } => {
            for triple in patterns {
                out.push(template_from(triple, graph));
            }
        }
        GraphPattern::Path { path, .. } => path_templates(path, graph, out),
        GraphPattern::Graph { name, inner } => {
            let graph = match name {
                NamedNodePattern::NamedNode(node) => Component::Bound(node.clone().into()),
                NamedNodePattern::Variable(_) => Component::Wildcard,
            };
            collect(inner, &graph, out);
        }
        GraphPattern::Join { left, right }
        | GraphPattern::Union { left, right }
        | GraphPattern::LeftJoin { left, right, .. }
        | GraphPattern::Minus { left, right } => {
            collect(left, graph, out);
            collect(right, graph, out);
        }
        GraphPattern::Filter { inner, .. }
        | GraphPattern::Extend { inner, .. }
        | GraphPattern::Project { inner, .. }
        | GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::Slice { inner, .. }
        | GraphPattern::OrderBy { inner, .. }
        | GraphPattern::Group { inner, .. }
        | GraphPattern::Service { inner, .. } => collect(inner, graph, out),
        _ => {}
    }
}

fn template_from(pattern: &TriplePattern, graph: &Component<GraphName>) -> QuadTemplate {
    QuadTemplate {
        graph: graph.clone(),
        subject: match &pattern.subject {
            TermPattern::NamedNode(node) => Component::Bound(node.clone().into()),
            // Blank nodes in patterns behave as variables.
            _ => Component::Wildcard,
        },
        predicate: match &pattern.predicate {
            NamedNodePattern::NamedNode(node) => Component::Bound(node.clone()),
            NamedNodePattern::Variable(_) => Component::Wildcard,
        },
        object: match &pattern.object {
            TermPattern::NamedNode(node) => Component::Bound(node.clone().into()),
            TermPattern::Literal(literal) => Component::Bound(literal.clone().into()),
            _ => Component::Wildcard,
        },
    }
}

/// A property-path edge contributes one wildcard-subject/wildcard-object
/// template per fixed predicate inside the path.
fn path_templates(
    path: &PropertyPathExpression,
    graph: &Component<GraphName>,
    out: &mut Vec<QuadTemplate>,
) {
    match path {
        PropertyPathExpression::NamedNode(node) => out.push(QuadTemplate {
            graph: graph.clone(),
            subject: Component::Wildcard,
            predicate: Component::Bound(node.clone()),
            object: Component::Wildcard,
        }),
        PropertyPathExpression::Reverse(inner)
        | PropertyPathExpression::ZeroOrMore(inner)
        | PropertyPathExpression::OneOrMore(inner)
        | PropertyPathExpression::ZeroOrOne(inner) => path_templates(inner, graph, out),
        PropertyPathExpression::Sequence(left, right)
        | PropertyPathExpression::Alternative(left, right) => {
            path_templates(left, graph, out);
            path_templates(right, graph, out);
        }
        // A negated set can traverse any predicate outside it.
        PropertyPathExpression::NegatedPropertySet(_) => out.push(QuadTemplate {
            graph: graph.clone(),
            subject: Component::Wildcard,
            predicate: Component::Wildcard,
            object: Component::Wildcard,
        }),
    }
}

/// Wraps a sink, forwarding only the quads the filter admits.
pub struct FilteredSink<'a> {
    filter: TripleFilter,
    inner: &'a mut dyn QuadSink,
}

impl<'a> FilteredSink<'a> {
    pub fn new(filter: TripleFilter, inner: &'a mut dyn QuadSink) -> Self {
        Self { filter, inner }
    }
}

impl QuadSink for FilteredSink<'_> {
    fn put(&mut self, quad: Quad) -> Result<bool, StorageError> {
        if self.filter.admits(quad.as_ref()) {
            self.inner.put(quad)
        } else {
            Ok(false)
        }
    }

    fn finish(&mut self) -> Result<(), StorageError> {
        self.inner.finish()
    }

    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facadex_model::membership_property;
    use facadex_model::Variable;

    fn node(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.com/{name}"))
    }

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    fn quad(s: &str, p: &str, o: &str) -> Quad {
        Quad::new(node(s), node(p), node(o), GraphName::DefaultGraph)
    }

    fn bgp(patterns: Vec<TriplePattern>) -> GraphPattern {
        GraphPattern::Bgp { patterns }
    }

    fn triple(
        subject: impl Into<TermPattern>,
        predicate: impl Into<NamedNodePattern>,
        object: impl Into<TermPattern>,
    ) -> TriplePattern {
        TriplePattern {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    #[test]
    fn empty_pattern_admits_everything() {
        let filter = TripleFilter::from_pattern(&bgp(vec![]));
        assert!(filter.is_empty());
        assert!(filter.admits(quad("s", "p", "o").as_ref()));
    }

    #[test]
    fn bound_predicate_prunes_mismatches() {
        let filter = TripleFilter::from_pattern(&bgp(vec![triple(
            var("s"),
            node("p"),
            var("o"),
        )]));
        assert_eq!(filter.len(), 1);
        assert!(filter.admits(quad("s", "p", "o").as_ref()));
        assert!(!filter.admits(quad("s", "other", "o").as_ref()));
    }

    #[test]
    fn any_template_suffices() {
        let filter = TripleFilter::from_pattern(&GraphPattern::Union {
            left: Box::new(bgp(vec![triple(var("s"), node("p1"), var("o"))])),
            right: Box::new(bgp(vec![triple(var("s"), node("p2"), var("o"))])),
        });
        assert!(filter.admits(quad("s", "p1", "o").as_ref()));
        assert!(filter.admits(quad("s", "p2", "o").as_ref()));
        assert!(!filter.admits(quad("s", "p3", "o").as_ref()));
    }

    #[test]
    fn any_slot_admits_membership_predicates() {
        let filter = TripleFilter::from_pattern(&bgp(vec![triple(
            var("s"),
            fx::ANY_SLOT.into_owned(),
            var("o"),
        )]));
        assert!(filter.admits(
            Quad::new(
                node("s"),
                membership_property(7),
                node("o"),
                GraphName::DefaultGraph
            )
            .as_ref()
        ));
        assert!(filter.admits(
            Quad::new(
                node("s"),
                facadex_model::vocab::rdfs::MEMBER.into_owned(),
                node("o"),
                GraphName::DefaultGraph
            )
            .as_ref()
        ));
        assert!(!filter.admits(quad("s", "p", "o").as_ref()));
    }

    #[test]
    fn graph_operator_scopes_templates() {
        let filter = TripleFilter::from_pattern(&GraphPattern::Graph {
            name: NamedNodePattern::NamedNode(node("g")),
            inner: Box::new(bgp(vec![triple(var("s"), node("p"), var("o"))])),
        });
        assert!(filter.admits(
            Quad::new(node("s"), node("p"), node("o"), node("g")).as_ref()
        ));
        assert!(!filter.admits(
            Quad::new(node("s"), node("p"), node("o"), node("other")).as_ref()
        ));
    }

    #[test]
    fn paths_contribute_predicate_templates() {
        let filter = TripleFilter::from_pattern(&GraphPattern::Path {
            subject: var("s").into(),
            path: PropertyPathExpression::Sequence(
                Box::new(PropertyPathExpression::NamedNode(node("p1"))),
                Box::new(PropertyPathExpression::OneOrMore(Box::new(
                    PropertyPathExpression::NamedNode(node("p2")),
                ))),
            ),
            object: var("o").into(),
        });
        assert_eq!(filter.len(), 2);
        assert!(filter.admits(quad("a", "p1", "b").as_ref()));
        assert!(filter.admits(quad("a", "p2", "b").as_ref()));
        assert!(!filter.admits(quad("a", "p3", "b").as_ref()));
    }

    #[test]
    fn filtered_sink_drops_inadmissible_quads() {
        use facadex_storage::MemStore;

        let filter = TripleFilter::from_pattern(&bgp(vec![triple(
            var("s"),
            node("p"),
            var("o"),
        )]));
        let mut store = MemStore::new();
        let mut sink = FilteredSink::new(filter, &mut store);
        assert!(sink.put(quad("s", "p", "o")).unwrap());
        assert!(!sink.put(quad("s", "other", "o")).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn literal_objects_participate_in_matching() {
        use facadex_model::Literal;

        let filter = TripleFilter::from_pattern(&bgp(vec![triple(
            var("s"),
            node("p"),
            TermPattern::Literal(Literal::from("x")),
        )]));
        let hit = Quad::new(
            node("s"),
            node("p"),
            Literal::from("x"),
            GraphName::DefaultGraph,
        );
        let miss = Quad::new(
            node("s"),
            node("p"),
            Literal::from("y"),
            GraphName::DefaultGraph,
        );
        assert!(filter.admits(hit.as_ref()));
        assert!(!filter.admits(miss.as_ref()));
    }
}
