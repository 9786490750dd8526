use facadex_common::QuadPattern;
use facadex_model::{Dataset, GraphName, NamedNode, QuadRef, Subject, Term, Variable};
use rustc_hash::FxHashMap;
use spargebra::algebra::GraphPattern;
use spargebra::term::{GroundTerm, NamedNodePattern, TermPattern, TriplePattern};

/// One solution: a set of variable bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings(FxHashMap<Variable, Term>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, variable: &Variable) -> Option<&Term> {
        self.0.get(variable)
    }

    pub fn bind(&mut self, variable: Variable, term: Term) {
        self.0.insert(variable, term);
    }

    pub fn contains(&self, variable: &Variable) -> bool {
        self.0.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.0.iter()
    }
}

impl FromIterator<(Variable, Term)> for Bindings {
    fn from_iter<T: IntoIterator<Item = (Variable, Term)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Matches a basic graph pattern against a dataset under union-graph
/// semantics, seeded with the bindings of `seed`.
///
/// This is the minimal evaluator the engine offers for continuing a
/// sub-pattern against a generated graph; a full query engine would bring
/// its own joins and solution modifiers.
pub fn match_bgp(dataset: &Dataset, patterns: &[TriplePattern], seed: &Bindings) -> Vec<Bindings> {
    let mut solutions = vec![seed.clone()];
    for pattern in patterns {
        let mut next = Vec::new();
        for solution in &solutions {
            for quad in dataset.iter() {
                if let Some(extended) = unify(pattern, quad, solution) {
                    next.push(extended);
                }
            }
        }
        solutions = next;
    }
    solutions
}

fn unify(pattern: &TriplePattern, quad: QuadRef<'_>, solution: &Bindings) -> Option<Bindings> {
    let mut out = solution.clone();
    let subject: Term = match quad.subject.into_owned() {
        Subject::NamedNode(node) => node.into(),
        Subject::BlankNode(node) => node.into(),
        #[allow(unreachable_patterns, reason = "rdf-star subjects")]
        _ => return None,
    };
    if !unify_term(&pattern.subject, subject, &mut out) {
        return None;
    }
    if !unify_named(&pattern.predicate, quad.predicate.into_owned(), &mut out) {
        return None;
    }
    if !unify_term(&pattern.object, quad.object.into_owned(), &mut out) {
        return None;
    }
    Some(out)
}

fn unify_term(pattern: &TermPattern, term: Term, out: &mut Bindings) -> bool {
    match pattern {
        TermPattern::NamedNode(node) => term == Term::from(node.clone()),
        TermPattern::Literal(literal) => term == Term::from(literal.clone()),
        // Blank nodes in patterns behave as fresh variables.
        TermPattern::BlankNode(_) => true,
        TermPattern::Variable(variable) => match out.get(variable) {
            Some(bound) => *bound == term,
            None => {
                out.bind(variable.clone(), term);
                true
            }
        },
        _ => false,
    }
}

fn unify_named(pattern: &NamedNodePattern, node: NamedNode, out: &mut Bindings) -> bool {
    match pattern {
        NamedNodePattern::NamedNode(expected) => *expected == node,
        NamedNodePattern::Variable(variable) => match out.get(variable) {
            Some(bound) => *bound == Term::from(node),
            None => {
                out.bind(variable.clone(), node.into());
                true
            }
        },
    }
}

/// Returns the solutions produced by a `VALUES` table operator, if `pattern`
/// is one. Used to replay a producer after a postponement.
pub fn values_solutions(pattern: &GraphPattern) -> Option<Vec<Bindings>> {
    let GraphPattern::Values {
        variables,
        bindings,
    } = pattern
    else {
        return None;
    };
    Some(
        bindings
            .iter()
            .map(|row| {
                variables
                    .iter()
                    .zip(row)
                    .filter_map(|(variable, term)| {
                        let term = ground_to_term(term.as_ref()?)?;
                        Some((variable.clone(), term))
                    })
                    .collect()
            })
            .collect(),
    )
}

fn ground_to_term(term: &GroundTerm) -> Option<Term> {
    match term {
        GroundTerm::NamedNode(node) => Some(node.clone().into()),
        GroundTerm::Literal(literal) => Some(literal.clone().into()),
        _ => None,
    }
}

/// Lowers a triple pattern to a quad lookup pattern, resolving variables
/// against `solution`; unresolved variables stay wildcards.
pub fn quad_pattern(
    pattern: &TriplePattern,
    graph: Option<GraphName>,
    solution: &Bindings,
) -> QuadPattern {
    let subject: Option<Subject> = match &pattern.subject {
        TermPattern::NamedNode(node) => Some(node.clone().into()),
        TermPattern::Variable(variable) => match solution.get(variable) {
            Some(Term::NamedNode(node)) => Some(node.clone().into()),
            Some(Term::BlankNode(node)) => Some(node.clone().into()),
            _ => None,
        },
        _ => None,
    };
    let predicate = match &pattern.predicate {
        NamedNodePattern::NamedNode(node) => Some(node.clone()),
        NamedNodePattern::Variable(variable) => match solution.get(variable) {
            Some(Term::NamedNode(node)) => Some(node.clone()),
            _ => None,
        },
    };
    let object = match &pattern.object {
        TermPattern::NamedNode(node) => Some(Term::from(node.clone())),
        TermPattern::Literal(literal) => Some(Term::from(literal.clone())),
        TermPattern::Variable(variable) => solution.get(variable).cloned(),
        _ => None,
    };
    QuadPattern::new(graph, subject, predicate, object)
}
