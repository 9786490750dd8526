use crate::error::{ConfigurationError, UnboundVariable};
use crate::eval::Bindings;
use crate::resource::Resource;
use facadex_common::Configuration;
use facadex_model::vocab::fx;
use facadex_model::{NamedNode, Term};
use spargebra::algebra::GraphPattern;
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};

/// Scheme prefix of triplification service endpoints. The tail of the IRI
/// carries comma-separated `key=value` arguments.
pub const ENDPOINT_SCHEME: &str = "facade-x:";

/// One triplification request, as handed over by the query evaluator.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    /// The service endpoint IRI; its tail may carry configuration
    /// arguments.
    pub endpoint: Option<NamedNode>,
    /// The sub-pattern to evaluate against the generated graph.
    pub pattern: GraphPattern,
    /// The pattern surrounding the request, used to locate the producer of
    /// a deferred variable.
    pub scope: Option<GraphPattern>,
    /// Whether the evaluator marked the request as silent.
    pub silent: bool,
}

impl ServiceRequest {
    /// Creates a request for `pattern` with no endpoint arguments.
    pub fn new(pattern: GraphPattern) -> Self {
        Self {
            endpoint: None,
            pattern,
            scope: None,
            silent: false,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: NamedNode) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: GraphPattern) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// The request after configuration resolution.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    /// The resource to triplify.
    pub resource: Resource,
    /// The sub-pattern with the configuration assertions removed.
    pub pattern: GraphPattern,
}

/// Why resolution did not produce a resource.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The configuration itself is broken. Fatal.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A configuration value is not bound yet. Recoverable via deferral.
    #[error(transparent)]
    Unbound(#[from] UnboundVariable),
}

/// Resolves the configuration of `request` against the current `solution`.
///
/// Endpoint arguments are applied first, then assertions on the reserved
/// properties subject override them. Pure apart from the failure signal.
pub fn resolve(
    request: &ServiceRequest,
    solution: &Bindings,
) -> Result<ResolvedRequest, ResolveError> {
    let mut configuration = Configuration::new();
    if let Some(endpoint) = &request.endpoint {
        endpoint_arguments(endpoint, &mut configuration)?;
    }
    collect_assertions(&request.pattern, solution, &mut configuration)?;
    let pattern = strip_assertions(&request.pattern);
    let resource = Resource::new(configuration)?;
    Ok(ResolvedRequest { resource, pattern })
}

/// Parses the `key=value` arguments in the endpoint IRI tail. Endpoints
/// outside the triplification scheme carry none.
fn endpoint_arguments(
    endpoint: &NamedNode,
    configuration: &mut Configuration,
) -> Result<(), ConfigurationError> {
    let Some(tail) = endpoint.as_str().strip_prefix(ENDPOINT_SCHEME) else {
        return Ok(());
    };
    if tail.is_empty() {
        return Ok(());
    }
    for argument in tail.split(',') {
        let Some((key, value)) = argument.split_once('=') else {
            return Err(ConfigurationError::InvalidEndpointArgument {
                argument: argument.to_owned(),
            });
        };
        configuration.set(percent_decode(key)?, percent_decode(value)?);
    }
    Ok(())
}

fn percent_decode(value: &str) -> Result<String, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidEndpointArgument {
        argument: value.to_owned(),
    };
    let mut out = Vec::with_capacity(value.len());
    let mut bytes = value.bytes();
    while let Some(byte) = bytes.next() {
        if byte == b'%' {
            let high = bytes.next().ok_or_else(invalid)?;
            let low = bytes.next().ok_or_else(invalid)?;
            let hex = [high, low];
            let hex = std::str::from_utf8(&hex).map_err(|_| invalid())?;
            out.push(u8::from_str_radix(hex, 16).map_err(|_| invalid())?);
        } else {
            out.push(byte);
        }
    }
    String::from_utf8(out).map_err(|_| invalid())
}

/// Walks every basic graph pattern, collecting the assertions attached to
/// the reserved properties subject.
fn collect_assertions(
    pattern: &GraphPattern,
    solution: &Bindings,
    configuration: &mut Configuration,
) -> Result<(), ResolveError> {
    match pattern {
        GraphPattern::Bgp { patterns } => {
            for triple in patterns.iter().filter(|t| is_properties_triple(t)) {
                let (key, value) = assertion(triple, solution)?;
                configuration.set(key, value);
            }
            Ok(())
        }
        GraphPattern::Join { left, right }
        | GraphPattern::Union { left, right }
        | GraphPattern::LeftJoin { left, right, .. }
        | GraphPattern::Minus { left, right } => {
            collect_assertions(left, solution, configuration)?;
            collect_assertions(right, solution, configuration)
        }
        GraphPattern::Filter { inner, .. }
        | GraphPattern::Extend { inner, .. }
        | GraphPattern::Graph { inner, .. }
        | GraphPattern::Project { inner, .. }
        | GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::Slice { inner, .. }
        | GraphPattern::OrderBy { inner, .. }
        | GraphPattern::Group { inner, .. } => collect_assertions(inner, solution, configuration),
        _ => Ok(()),
    }
}

fn is_properties_triple(triple: &TriplePattern) -> bool {
    matches!(&triple.subject, TermPattern::NamedNode(node) if node.as_ref() == fx::PROPERTIES)
}

/// Extracts the key/value pair of one properties assertion, looking
/// variable values up in the current solution.
fn assertion(
    triple: &TriplePattern,
    solution: &Bindings,
) -> Result<(String, String), ResolveError> {
    let key = match &triple.predicate {
        NamedNodePattern::NamedNode(node) => {
            node.as_str().strip_prefix(fx::NS).map(ToOwned::to_owned)
        }
        NamedNodePattern::Variable(_) => None,
    }
    .ok_or_else(|| ConfigurationError::InvalidAssertion {
        message: format!(
            "the predicate of a properties assertion must be an IRI under {}",
            fx::NS
        ),
    })?;

    let value = match &triple.object {
        TermPattern::Literal(literal) => literal.value().to_owned(),
        TermPattern::NamedNode(node) => node.as_str().to_owned(),
        TermPattern::Variable(variable) => match solution.get(variable) {
            Some(term) => term_text(term),
            None => {
                return Err(UnboundVariable {
                    variable: variable.clone(),
                    key,
                }
                .into())
            }
        },
        _ => {
            return Err(ConfigurationError::InvalidAssertion {
                message: format!("the value of \"{key}\" must be a literal, IRI or variable"),
            }
            .into())
        }
    };
    Ok((key, value))
}

fn term_text(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_owned(),
        Term::Literal(literal) => literal.value().to_owned(),
        other => other.to_string(),
    }
}

/// Rebuilds the pattern without the properties assertions, so the evaluator
/// never tries to match them against the generated graph.
fn strip_assertions(pattern: &GraphPattern) -> GraphPattern {
    match pattern {
        GraphPattern::Bgp { patterns } => GraphPattern::Bgp {
            patterns: patterns
                .iter()
                .filter(|triple| !is_properties_triple(triple))
                .cloned()
                .collect(),
        },
        GraphPattern::Join { left, right } => GraphPattern::Join {
            left: Box::new(strip_assertions(left)),
            right: Box::new(strip_assertions(right)),
        },
        GraphPattern::Union { left, right } => GraphPattern::Union {
            left: Box::new(strip_assertions(left)),
            right: Box::new(strip_assertions(right)),
        },
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => GraphPattern::LeftJoin {
            left: Box::new(strip_assertions(left)),
            right: Box::new(strip_assertions(right)),
            expression: expression.clone(),
        },
        GraphPattern::Minus { left, right } => GraphPattern::Minus {
            left: Box::new(strip_assertions(left)),
            right: Box::new(strip_assertions(right)),
        },
        GraphPattern::Filter { expr, inner } => GraphPattern::Filter {
            expr: expr.clone(),
            inner: Box::new(strip_assertions(inner)),
        },
        GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => GraphPattern::Extend {
            inner: Box::new(strip_assertions(inner)),
            variable: variable.clone(),
            expression: expression.clone(),
        },
        GraphPattern::Graph { name, inner } => GraphPattern::Graph {
            name: name.clone(),
            inner: Box::new(strip_assertions(inner)),
        },
        GraphPattern::Project { inner, variables } => GraphPattern::Project {
            inner: Box::new(strip_assertions(inner)),
            variables: variables.clone(),
        },
        GraphPattern::Distinct { inner } => GraphPattern::Distinct {
            inner: Box::new(strip_assertions(inner)),
        },
        GraphPattern::Reduced { inner } => GraphPattern::Reduced {
            inner: Box::new(strip_assertions(inner)),
        },
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => GraphPattern::Slice {
            inner: Box::new(strip_assertions(inner)),
            start: *start,
            length: *length,
        },
        GraphPattern::OrderBy { inner, expression } => GraphPattern::OrderBy {
            inner: Box::new(strip_assertions(inner)),
            expression: expression.clone(),
        },
        GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } => GraphPattern::Group {
            inner: Box::new(strip_assertions(inner)),
            variables: variables.clone(),
            aggregates: aggregates.clone(),
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facadex_model::vocab::fx;
    use facadex_model::{Literal, Variable};

    fn property(key: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("{}{key}", fx::NS))
    }

    fn properties_triple(key: &str, object: impl Into<TermPattern>) -> TriplePattern {
        TriplePattern {
            subject: fx::PROPERTIES.into_owned().into(),
            predicate: property(key).into(),
            object: object.into(),
        }
    }

    fn data_triple() -> TriplePattern {
        TriplePattern {
            subject: Variable::new_unchecked("s").into(),
            predicate: Variable::new_unchecked("p").into(),
            object: Variable::new_unchecked("o").into(),
        }
    }

    fn request(patterns: Vec<TriplePattern>) -> ServiceRequest {
        ServiceRequest::new(GraphPattern::Bgp { patterns })
    }

    #[test]
    fn literal_assertions_become_configuration() {
        let request = request(vec![
            properties_triple("content", TermPattern::Literal(Literal::from("abc"))),
            properties_triple("media-type", TermPattern::Literal(Literal::from("text/plain"))),
            data_triple(),
        ]);
        let resolved = resolve(&request, &Bindings::new()).unwrap();
        let configuration = resolved.resource.configuration();
        assert_eq!(configuration.content(), Some("abc"));
        assert_eq!(configuration.media_type(), Some("text/plain"));
    }

    #[test]
    fn assertions_are_stripped_from_the_pattern() {
        let request = request(vec![
            properties_triple("content", TermPattern::Literal(Literal::from("abc"))),
            data_triple(),
        ]);
        let resolved = resolve(&request, &Bindings::new()).unwrap();
        let GraphPattern::Bgp { patterns } = &resolved.pattern else {
            panic!("expected a bgp");
        };
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn variable_values_are_looked_up_in_the_solution() {
        let variable = Variable::new_unchecked("mt");
        let request = request(vec![properties_triple(
            "media-type",
            TermPattern::Variable(variable.clone()),
        )]);

        let unbound = resolve(&request, &Bindings::new()).unwrap_err();
        let ResolveError::Unbound(unbound) = unbound else {
            panic!("expected an unbound variable");
        };
        assert_eq!(unbound.variable, variable);
        assert_eq!(unbound.key, "media-type");

        let mut solution = Bindings::new();
        solution.bind(variable, Literal::from("text/plain").into());
        let resolved = resolve(&request, &solution).unwrap();
        assert_eq!(
            resolved.resource.configuration().media_type(),
            Some("text/plain")
        );
    }

    #[test]
    fn endpoint_arguments_merge_beneath_assertions() {
        let endpoint = NamedNode::new_unchecked(
            "facade-x:media-type=text%2Fplain,location=data.txt",
        );
        let request = request(vec![properties_triple(
            "media-type",
            TermPattern::Literal(Literal::from("text/csv")),
        )])
        .with_endpoint(endpoint);
        let resolved = resolve(&request, &Bindings::new()).unwrap();
        let configuration = resolved.resource.configuration();
        assert_eq!(configuration.location(), Some("data.txt"));
        assert_eq!(configuration.media_type(), Some("text/csv"));
    }

    #[test]
    fn foreign_endpoints_carry_no_arguments() {
        let request = request(vec![]).with_endpoint(NamedNode::new_unchecked(
            "http://example.com/sparql",
        ));
        let resolved = resolve(&request, &Bindings::new()).unwrap();
        assert_eq!(resolved.resource.identity(), None);
    }

    #[test]
    fn malformed_endpoint_argument_is_rejected() {
        let request = request(vec![]).with_endpoint(NamedNode::new_unchecked(
            "facade-x:media-type",
        ));
        assert!(matches!(
            resolve(&request, &Bindings::new()),
            Err(ResolveError::Configuration(
                ConfigurationError::InvalidEndpointArgument { .. }
            ))
        ));
    }

    #[test]
    fn assertions_inside_nested_operators_are_found() {
        let inner = GraphPattern::Bgp {
            patterns: vec![properties_triple(
                "content",
                TermPattern::Literal(Literal::from("abc")),
            )],
        };
        let pattern = GraphPattern::Distinct {
            inner: Box::new(GraphPattern::Join {
                left: Box::new(inner),
                right: Box::new(GraphPattern::Bgp {
                    patterns: vec![data_triple()],
                }),
            }),
        };
        let resolved = resolve(&ServiceRequest::new(pattern), &Bindings::new()).unwrap();
        assert_eq!(resolved.resource.configuration().content(), Some("abc"));
    }

    #[test]
    fn blank_node_values_are_invalid() {
        use facadex_model::BlankNode;
        let request = request(vec![properties_triple(
            "content",
            TermPattern::BlankNode(BlankNode::default()),
        )]);
        assert!(matches!(
            resolve(&request, &Bindings::new()),
            Err(ResolveError::Configuration(
                ConfigurationError::InvalidAssertion { .. }
            ))
        ));
    }
}
