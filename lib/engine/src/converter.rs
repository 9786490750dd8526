use crate::builder::FacadeBuilder;
use crate::error::ConversionError;
use crate::fetch::ResourceFetcher;
use crate::resource::Resource;

/// A capability that turns one resource format into Facade-X quads.
///
/// Converters are stateless; one instance serves arbitrarily many requests.
/// Exactly one converter is selected per resource.
pub trait Converter: Send + Sync {
    /// Emits the Facade-X view of `resource` through `builder`.
    fn triplify(
        &self,
        resource: &Resource,
        fetcher: &dyn ResourceFetcher,
        builder: &mut FacadeBuilder<'_>,
    ) -> Result<(), ConversionError>;

    /// File extensions (lowercase, without dot) this converter handles.
    fn extensions(&self) -> &[&str] {
        &[]
    }

    /// Media types this converter handles.
    fn media_types(&self) -> &[&str] {
        &[]
    }

    /// Whether this converter can emit quads incrementally while the source
    /// is still being read. Consumed by the streaming pipeline.
    fn supports_slicing(&self) -> bool {
        false
    }
}
