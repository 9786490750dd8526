//! The Facade-X triplification engine: configuration resolution, converter
//! dispatch, graph building with triple filtering, and the per-solution
//! execution protocol with deferred evaluation.
//!
//! The engine is invoked once per pattern-matching request. It resolves the
//! request configuration, selects a converter from the registry, and either
//! materializes the Facade-X view of the resource or streams it through the
//! concurrent log in [facadex_storage::stream] while the caller keeps
//! matching.

mod builder;
mod converter;
mod error;
mod eval;
mod exec;
mod fetch;
mod overlay;
mod registry;
mod resolver;
mod resource;
mod text;

pub use builder::{FacadeBuilder, Slot, SlotValue};
pub use converter::Converter;
pub use error::{
    ClaimKind, ConfigurationError, ConversionError, EvaluationError, RegistryError,
    TransportError, UnboundVariable,
};
pub use eval::{match_bgp, quad_pattern, values_solutions, Bindings};
pub use exec::{Executor, Outcome, Postponement};
pub use fetch::{LocalFetcher, ResourceFetcher};
pub use overlay::{FilteredSink, TripleFilter};
pub use registry::{ConverterRegistry, FOLDER_CONVERTER_ID, TEXT_CONVERTER_ID};
pub use resolver::{resolve, ResolveError, ResolvedRequest, ServiceRequest, ENDPOINT_SCHEME};
pub use resource::{Resource, ResourceIdentity};
pub use text::TextConverter;
