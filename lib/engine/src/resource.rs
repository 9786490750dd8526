use crate::error::ConfigurationError;
use facadex_common::{keys, Configuration};
use facadex_model::vocab::fx;
use facadex_model::{GraphName, Iri, NamedNode};

/// How a resource is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceIdentity<'a> {
    /// A location IRI or file system path.
    Location(&'a str),
    /// Inline content.
    Content(&'a str),
    /// A shell command whose output is the resource.
    Command(&'a str),
}

/// One semi-structured resource together with its resolved configuration.
///
/// Immutable once created. The root IRI and namespace are validated and
/// defaulted at construction so every later consumer can rely on them.
#[derive(Debug, Clone)]
pub struct Resource {
    configuration: Configuration,
    root: NamedNode,
    namespace: Iri<String>,
}

impl Resource {
    /// Creates a resource from a resolved configuration, applying the
    /// namespace and root defaults.
    pub fn new(mut configuration: Configuration) -> Result<Self, ConfigurationError> {
        configuration.set_default(keys::NAMESPACE, fx::DATA_NS);
        configuration.set_default(keys::ROOT, default_root(&configuration));

        let namespace = configuration
            .namespace()
            .unwrap_or(fx::DATA_NS)
            .to_owned();
        let namespace = Iri::parse(namespace).map_err(|source| {
            ConfigurationError::InvalidIri {
                key: keys::NAMESPACE,
                source,
            }
        })?;
        let root = configuration.root().unwrap_or(fx::DATA_NS);
        let root = NamedNode::new(root).map_err(|source| ConfigurationError::InvalidIri {
            key: keys::ROOT,
            source,
        })?;

        Ok(Self {
            configuration,
            root,
            namespace,
        })
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The identity of this resource, preferring a location over inline
    /// content over a command. `None` when the request names none of them.
    pub fn identity(&self) -> Option<ResourceIdentity<'_>> {
        if let Some(location) = self.configuration.location() {
            return Some(ResourceIdentity::Location(location));
        }
        if let Some(content) = self.configuration.content() {
            return Some(ResourceIdentity::Content(content));
        }
        self.configuration.command().map(ResourceIdentity::Command)
    }

    /// The IRI of the root container.
    pub fn root(&self) -> &NamedNode {
        &self.root
    }

    /// The namespace under which slot keys become IRIs.
    pub fn namespace(&self) -> &Iri<String> {
        &self.namespace
    }

    /// The main graph of this resource, named by its root IRI.
    pub fn graph_name(&self) -> GraphName {
        self.root.clone().into()
    }
}

/// The default root IRI: the location with a `#` appended when the location
/// forms a valid IRI, the shared data namespace otherwise.
fn default_root(configuration: &Configuration) -> String {
    if let Some(location) = configuration.location() {
        let root = format!("{location}#");
        if Iri::parse(root.as_str()).is_ok() {
            return root;
        }
    }
    fx::DATA_NS.to_owned()
}
