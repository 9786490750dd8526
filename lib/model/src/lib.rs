pub mod vocab;

mod membership;

pub use membership::{membership_ordinal, membership_property, is_membership_property};

// Re-export some oxrdf types.
pub use oxiri::Iri;
pub use oxrdf::{
    BlankNode, BlankNodeRef, Dataset, Graph, GraphName, GraphNameRef, IriParseError, Literal,
    LiteralRef, NamedNode, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, Quad, QuadRef,
    Subject, SubjectRef, Term, TermRef, Triple, TripleRef, Variable, VariableNameParseError,
    VariableRef,
};
