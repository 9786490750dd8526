use crate::error::ConversionError;
use crate::resource::Resource;
use facadex_common::error::InconsistentStateError;
use facadex_model::vocab::{fx, rdf, rdfs};
use facadex_model::{
    membership_property, GraphName, Literal, NamedNode, NamedOrBlankNode, Quad, Subject, Term,
};
use facadex_storage::QuadSink;
use rustc_hash::FxHashMap;
use std::fmt::Write;

/// A named or ordinal slot of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// A string key, turned into an IRI under the request namespace.
    Key(String),
    /// An explicit IRI, used verbatim.
    Iri(NamedNode),
    /// A 1-based ordinal, encoded as `rdf:_N` or `rdfs:member` per the
    /// request configuration.
    Ordinal(usize),
}

impl From<&str> for Slot {
    fn from(key: &str) -> Self {
        Slot::Key(key.to_owned())
    }
}

impl From<String> for Slot {
    fn from(key: String) -> Self {
        Slot::Key(key)
    }
}

impl From<usize> for Slot {
    fn from(ordinal: usize) -> Self {
        Slot::Ordinal(ordinal)
    }
}

impl From<NamedNode> for Slot {
    fn from(iri: NamedNode) -> Self {
        Slot::Iri(iri)
    }
}

/// A typed slot value, rendered as the natural literal for its type.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
}

impl From<&str> for SlotValue {
    fn from(value: &str) -> Self {
        SlotValue::String(value.to_owned())
    }
}

impl From<String> for SlotValue {
    fn from(value: String) -> Self {
        SlotValue::String(value)
    }
}

impl From<i64> for SlotValue {
    fn from(value: i64) -> Self {
        SlotValue::Integer(value)
    }
}

impl From<f64> for SlotValue {
    fn from(value: f64) -> Self {
        SlotValue::Decimal(value)
    }
}

impl From<bool> for SlotValue {
    fn from(value: bool) -> Self {
        SlotValue::Boolean(value)
    }
}

/// Emits the Facade-X view of one resource into a quad sink, applying the
/// addressing and value policies of the request configuration.
///
/// Container ids map to nodes injectively and stably for the lifetime of one
/// build: the same id always yields the same node, distinct ids distinct
/// nodes. Every `add_*` call reports whether a new fact was recorded;
/// suppressed values (the null-string sentinel) and duplicates report
/// `false`.
pub struct FacadeBuilder<'a> {
    sink: &'a mut dyn QuadSink,
    graph: GraphName,
    root: NamedNode,
    namespace: String,
    blank_nodes: bool,
    use_rdfs_member: bool,
    trim_strings: bool,
    null_string: Option<String>,
    audit: bool,
    containers: FxHashMap<String, NamedOrBlankNode>,
    counts: FxHashMap<GraphName, i64>,
}

impl<'a> FacadeBuilder<'a> {
    /// Creates a builder writing the view of `resource` into `sink`.
    pub fn new(resource: &Resource, sink: &'a mut dyn QuadSink) -> Self {
        let configuration = resource.configuration();
        Self {
            sink,
            graph: resource.graph_name(),
            root: resource.root().clone(),
            namespace: resource.namespace().as_str().to_owned(),
            blank_nodes: configuration.blank_nodes(),
            use_rdfs_member: configuration.use_rdfs_member(),
            trim_strings: configuration.trim_strings(),
            null_string: configuration.null_string().map(ToOwned::to_owned),
            audit: configuration.audit(),
            containers: FxHashMap::default(),
            counts: FxHashMap::default(),
        }
    }

    /// Marks `container` as the root of the build.
    pub fn add_root(&mut self, container: &str) -> Result<bool, ConversionError> {
        let subject = self.container_node(container);
        self.emit(
            subject,
            rdf::TYPE.into_owned(),
            fx::ROOT.into_owned().into(),
            self.graph.clone(),
        )
    }

    /// Types `container` with `class`.
    pub fn add_type(
        &mut self,
        container: &str,
        class: NamedNode,
    ) -> Result<bool, ConversionError> {
        let subject = self.container_node(container);
        self.emit(
            subject,
            rdf::TYPE.into_owned(),
            class.into(),
            self.graph.clone(),
        )
    }

    /// Adds a value slot to `container`.
    pub fn add_value(
        &mut self,
        container: &str,
        slot: impl Into<Slot>,
        value: impl Into<SlotValue>,
    ) -> Result<bool, ConversionError> {
        let Some(literal) = self.literal(value.into()) else {
            return Ok(false);
        };
        let subject = self.container_node(container);
        let predicate = self.slot_predicate(slot.into())?;
        self.emit(subject, predicate, literal.into(), self.graph.clone())
    }

    /// Adds a child container slot to `parent`.
    pub fn add_container(
        &mut self,
        parent: &str,
        slot: impl Into<Slot>,
        child: &str,
    ) -> Result<bool, ConversionError> {
        let subject = self.container_node(parent);
        let predicate = self.slot_predicate(slot.into())?;
        let object: Term = match self.container_node(child) {
            NamedOrBlankNode::NamedNode(node) => node.into(),
            NamedOrBlankNode::BlankNode(node) => node.into(),
        };
        self.emit(subject, predicate, object, self.graph.clone())
    }

    /// Writes a source-level metadata fact into the metadata graph.
    pub fn add_metadata(
        &mut self,
        key: &str,
        value: impl Into<SlotValue>,
    ) -> Result<bool, ConversionError> {
        let Some(literal) = self.literal(value.into()) else {
            return Ok(false);
        };
        let predicate = self.key_predicate(key);
        self.emit(
            self.root.clone().into(),
            predicate,
            literal.into(),
            fx::METADATA_GRAPH.into_owned().into(),
        )
    }

    /// Whether the consumer cancelled the build. Slicing converters should
    /// poll this between emitted facts.
    pub fn is_cancelled(&self) -> bool {
        self.sink.is_cancelled()
    }

    /// Flushes end-of-build facts: with auditing enabled, the per-graph fact
    /// counts go into the audit graph.
    pub fn finish(&mut self) -> Result<(), ConversionError> {
        if !self.audit {
            return Ok(());
        }
        let mut counts: Vec<(GraphName, i64)> = self.counts.drain().collect();
        counts.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        for (graph, count) in counts {
            let subject: NamedOrBlankNode = match graph {
                GraphName::NamedNode(node) => node.into(),
                GraphName::BlankNode(node) => node.into(),
                GraphName::DefaultGraph => self.root.clone().into(),
            };
            self.emit(
                subject,
                fx::TRIPLES.into_owned(),
                Literal::from(count).into(),
                fx::AUDIT_GRAPH.into_owned().into(),
            )?;
        }
        Ok(())
    }

    /// Returns the node standing for the container id, minting it on first
    /// use. Fixed addressing policy for the whole build.
    fn container_node(&mut self, id: &str) -> NamedOrBlankNode {
        if let Some(node) = self.containers.get(id) {
            return node.clone();
        }
        let node: NamedOrBlankNode = if self.blank_nodes {
            facadex_model::BlankNode::default().into()
        } else {
            self.mint_iri(id).into()
        };
        self.containers.insert(id.to_owned(), node.clone());
        node
    }

    fn mint_iri(&self, id: &str) -> NamedNode {
        NamedNode::new(format!("{}{id}", self.root.as_str()))
            .unwrap_or_else(|_| {
                NamedNode::new_unchecked(format!(
                    "{}{}",
                    self.root.as_str(),
                    percent_encode(id)
                ))
            })
    }

    fn slot_predicate(&self, slot: Slot) -> Result<NamedNode, ConversionError> {
        match slot {
            Slot::Iri(iri) => Ok(iri),
            Slot::Key(key) => Ok(self.key_predicate(&key)),
            Slot::Ordinal(0) => {
                Err(InconsistentStateError::msg("ordinal slots are 1-based").into())
            }
            Slot::Ordinal(n) => Ok(if self.use_rdfs_member {
                rdfs::MEMBER.into_owned()
            } else {
                membership_property(n)
            }),
        }
    }

    fn key_predicate(&self, key: &str) -> NamedNode {
        NamedNode::new(format!("{}{key}", self.namespace)).unwrap_or_else(|_| {
            NamedNode::new_unchecked(format!("{}{}", self.namespace, percent_encode(key)))
        })
    }

    /// Applies the trim and null-string policies and renders the value as a
    /// literal. `None` means the value is suppressed.
    fn literal(&self, value: SlotValue) -> Option<Literal> {
        match value {
            SlotValue::String(value) => {
                let value = if self.trim_strings {
                    value.trim().to_owned()
                } else {
                    value
                };
                if self.null_string.as_deref() == Some(value.as_str()) {
                    return None;
                }
                Some(Literal::from(value))
            }
            SlotValue::Integer(value) => Some(Literal::from(value)),
            SlotValue::Decimal(value) => Some(Literal::from(value)),
            SlotValue::Boolean(value) => Some(Literal::from(value)),
        }
    }

    fn emit(
        &mut self,
        subject: NamedOrBlankNode,
        predicate: NamedNode,
        object: Term,
        graph: GraphName,
    ) -> Result<bool, ConversionError> {
        let subject: Subject = match subject {
            NamedOrBlankNode::NamedNode(node) => node.into(),
            NamedOrBlankNode::BlankNode(node) => node.into(),
        };
        let added = self
            .sink
            .put(Quad::new(subject, predicate, object, graph.clone()))?;
        if added {
            *self.counts.entry(graph).or_default() += 1;
        }
        Ok(added)
    }
}

/// Minimal percent-encoding for ids and keys that do not already form a
/// valid IRI suffix.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' | b'-' | b'.' | b'_' | b'~' => {
                out.push(char::from(byte));
            }
            _ => {
                // Writing to a String cannot fail.
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use facadex_common::{keys, Configuration};
    use facadex_storage::MemStore;

    fn resource(pairs: &[(&str, &str)]) -> Resource {
        let mut configuration = Configuration::new();
        for (key, value) in pairs {
            configuration.set(*key, *value);
        }
        Resource::new(configuration).unwrap()
    }

    #[test]
    fn container_mapping_is_stable_and_injective() {
        let resource = resource(&[]);
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        let a1 = builder.container_node("a");
        let a2 = builder.container_node("a");
        let b = builder.container_node("b");
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn iri_addressing_mints_under_the_root() {
        let resource = resource(&[
            (keys::BLANK_NODES, "false"),
            (keys::ROOT, "http://example.com/doc#"),
        ]);
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        let node = builder.container_node("row1");
        assert_eq!(
            node,
            NamedNode::new_unchecked("http://example.com/doc#row1").into()
        );
    }

    #[test]
    fn trim_then_null_suppresses_the_sentinel() {
        let resource = resource(&[
            (keys::NULL_STRING, "NA"),
            (keys::TRIM_STRINGS, "true"),
        ]);
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        assert!(!builder.add_value("c", "key", " NA ").unwrap());
        assert!(builder.add_value("c", "key", " foo ").unwrap());
        drop(builder);

        let quads: Vec<Quad> = store.dataset().iter().map(|q| q.into_owned()).collect();
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].object, Literal::from("foo").into());
    }

    #[test]
    fn ordinal_slots_follow_the_member_policy() {
        let resource = resource(&[]);
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        builder.add_value("c", 1, "a").unwrap();
        builder.add_value("c", 2, "b").unwrap();
        builder.add_value("c", 3, "c").unwrap();
        drop(builder);
        let predicates: Vec<String> = store
            .dataset()
            .iter()
            .map(|q| q.predicate.as_str().to_owned())
            .collect();
        assert!(predicates.contains(&membership_property(1).as_str().to_owned()));
        assert!(predicates.contains(&membership_property(2).as_str().to_owned()));
        assert!(predicates.contains(&membership_property(3).as_str().to_owned()));

        let resource = resource_with_member();
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        builder.add_value("c", 1, "a").unwrap();
        builder.add_value("c", 2, "b").unwrap();
        builder.add_value("c", 3, "c").unwrap();
        drop(builder);
        assert_eq!(store.len(), 3);
        assert!(store
            .dataset()
            .iter()
            .all(|q| q.predicate == rdfs::MEMBER));
    }

    fn resource_with_member() -> Resource {
        resource(&[(keys::USE_RDFS_MEMBER, "true")])
    }

    #[test]
    fn zero_ordinal_is_an_inconsistency() {
        let resource = resource(&[]);
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        assert!(matches!(
            builder.add_value("c", 0, "a"),
            Err(ConversionError::InconsistentState(_))
        ));
    }

    #[test]
    fn duplicate_facts_report_false() {
        let resource = resource(&[(keys::BLANK_NODES, "false")]);
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        assert!(builder.add_value("c", "key", "v").unwrap());
        assert!(!builder.add_value("c", "key", "v").unwrap());
    }

    #[test]
    fn numeric_values_become_typed_literals() {
        let resource = resource(&[]);
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        builder.add_value("c", "n", 42_i64).unwrap();
        builder.add_value("c", "b", true).unwrap();
        drop(builder);
        let objects: Vec<Term> = store.dataset().iter().map(|q| q.object.into_owned()).collect();
        assert!(objects.contains(&Literal::from(42_i64).into()));
        assert!(objects.contains(&Literal::from(true).into()));
    }

    #[test]
    fn audit_counts_emitted_facts() {
        let resource = resource(&[
            (keys::AUDIT, "true"),
            (keys::ROOT, "http://example.com/doc#"),
        ]);
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        builder.add_root("").unwrap();
        builder.add_value("", 1, "a").unwrap();
        builder.finish().unwrap();
        drop(builder);

        let audit: Vec<Quad> = store
            .dataset()
            .iter()
            .filter(|q| q.graph_name == fx::AUDIT_GRAPH.into())
            .map(|q| q.into_owned())
            .collect();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].object, Literal::from(2_i64).into());
    }

    #[test]
    fn metadata_lands_in_the_metadata_graph() {
        let resource = resource(&[(keys::ROOT, "http://example.com/doc#")]);
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        builder.add_metadata("size", 10_i64).unwrap();
        drop(builder);

        let quad = store.dataset().iter().next().unwrap();
        assert_eq!(quad.graph_name, fx::METADATA_GRAPH.into());
        assert_eq!(quad.subject, NamedNode::new_unchecked("http://example.com/doc#").as_ref().into());
    }

    #[test]
    fn keys_with_reserved_characters_are_encoded() {
        let resource = resource(&[]);
        let mut store = MemStore::new();
        let mut builder = FacadeBuilder::new(&resource, &mut store);
        builder.add_value("c", "a key", "v").unwrap();
        drop(builder);
        let predicate = store
            .dataset()
            .iter()
            .next()
            .map(|q| q.predicate.as_str().to_owned())
            .unwrap();
        assert!(predicate.ends_with("a%20key"));
    }
}
