//! Vocabulary of the Facade-X meta-model.

pub mod fx {
    //! Facade-X meta-model terms.

    use oxrdf::NamedNodeRef;

    /// Namespace of the Facade-X meta-model.
    pub const NS: &str = "http://sparql.xyz/facade-x/ns/";

    /// Default namespace for terms minted from source documents.
    pub const DATA_NS: &str = "http://sparql.xyz/facade-x/data/";

    /// Type of the root container of a triplified resource.
    pub const ROOT: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://sparql.xyz/facade-x/ns/root");

    /// Wildcard predicate that stands for any ordinal or member slot.
    pub const ANY_SLOT: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://sparql.xyz/facade-x/ns/anySlot");

    /// Reserved subject whose assertions carry per-request configuration.
    pub const PROPERTIES: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://sparql.xyz/facade-x/ns/properties");

    /// Name of the graph that holds source-level metadata.
    pub const METADATA_GRAPH: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://sparql.xyz/facade-x/ns/metadata");

    /// Name of the graph that holds audit information about a build.
    pub const AUDIT_GRAPH: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://sparql.xyz/facade-x/ns/audit");

    /// Audit predicate counting the facts emitted into one graph.
    pub const TRIPLES: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://sparql.xyz/facade-x/ns/triples");
}

pub mod rdf {
    //! Subset of the `rdf:` vocabulary used by the builder.

    pub use oxrdf::vocab::rdf::TYPE;

    /// Namespace of the RDF syntax terms.
    pub const NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
}

pub mod rdfs {
    //! Subset of the `rdfs:` vocabulary used by the builder.

    pub use oxrdf::vocab::rdfs::MEMBER;
}
