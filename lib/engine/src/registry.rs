use crate::converter::Converter;
use crate::error::{ClaimKind, RegistryError};
use crate::resource::{Resource, ResourceIdentity};
use crate::text::TextConverter;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;

/// Identifier of the built-in plain-text fallback converter.
pub const TEXT_CONVERTER_ID: &str = "text";

/// Identifier under which a folder converter is looked up for directory
/// locations.
pub const FOLDER_CONVERTER_ID: &str = "folder";

/// The converter registry: maps converter ids, file extensions and media
/// types to converter instances.
///
/// Constructed once at process start and shared by reference afterwards;
/// registration is not expected to race with lookups. Extensions and media
/// types are claimed exclusively: registering a second owner fails and
/// leaves the first registration intact.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: DashMap<String, Arc<dyn Converter>>,
    by_extension: DashMap<String, String>,
    by_media_type: DashMap<String, String>,
}

impl ConverterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in fallback converter registered.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let registry = Self::new();
        registry.register(TEXT_CONVERTER_ID, Arc::new(TextConverter))?;
        Ok(registry)
    }

    /// Registers `converter` under `id`, claiming its extensions and media
    /// types.
    pub fn register(
        &self,
        id: &str,
        converter: Arc<dyn Converter>,
    ) -> Result<(), RegistryError> {
        for extension in converter.extensions() {
            let extension = extension.to_ascii_lowercase();
            if let Some(owner) = self.by_extension.get(&extension) {
                return Err(RegistryError::DuplicateRegistration {
                    kind: ClaimKind::Extension,
                    value: extension,
                    owner: owner.value().clone(),
                });
            }
        }
        for media_type in converter.media_types() {
            let media_type = media_type.to_ascii_lowercase();
            if let Some(owner) = self.by_media_type.get(&media_type) {
                return Err(RegistryError::DuplicateRegistration {
                    kind: ClaimKind::MediaType,
                    value: media_type,
                    owner: owner.value().clone(),
                });
            }
        }

        for extension in converter.extensions() {
            self.by_extension
                .insert(extension.to_ascii_lowercase(), id.to_owned());
        }
        for media_type in converter.media_types() {
            self.by_media_type
                .insert(media_type.to_ascii_lowercase(), id.to_owned());
        }
        self.converters.insert(id.to_owned(), converter);
        tracing::debug!("registered converter \"{id}\"");
        Ok(())
    }

    /// Removes `id` and releases its claims. Returns whether it existed.
    pub fn unregister(&self, id: &str) -> bool {
        let existed = self.converters.remove(id).is_some();
        self.by_extension.retain(|_, owner| owner != id);
        self.by_media_type.retain(|_, owner| owner != id);
        existed
    }

    /// Returns the converter registered under `id`.
    pub fn converter(&self, id: &str) -> Option<Arc<dyn Converter>> {
        self.converters.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the converter claiming `extension` (case-insensitive).
    pub fn resolve_by_extension(&self, extension: &str) -> Option<Arc<dyn Converter>> {
        let id = self
            .by_extension
            .get(&extension.to_ascii_lowercase())
            .map(|entry| entry.value().clone())?;
        self.converter(&id)
    }

    /// Returns the converter claiming `media_type`, ignoring parameters
    /// such as `charset`.
    pub fn resolve_by_media_type(&self, media_type: &str) -> Option<Arc<dyn Converter>> {
        let essence = media_type.split(';').next().unwrap_or(media_type).trim();
        let id = self
            .by_media_type
            .get(&essence.to_ascii_lowercase())
            .map(|entry| entry.value().clone())?;
        self.converter(&id)
    }

    /// Selects the converter for `resource`.
    ///
    /// Dispatch order: explicit converter override, explicit media type,
    /// directory detection, extension sniffed from the location, plain-text
    /// fallback. `None` when the resource has no identity at all (the caller
    /// maps this to an empty result) or when an explicit override names an
    /// unknown converter.
    pub fn select(&self, resource: &Resource) -> Option<Arc<dyn Converter>> {
        let configuration = resource.configuration();
        if let Some(id) = configuration.converter() {
            return self.converter(id);
        }
        if let Some(media_type) = configuration.media_type() {
            if let Some(converter) = self.resolve_by_media_type(media_type) {
                return Some(converter);
            }
        }
        match resource.identity()? {
            ResourceIdentity::Location(location) => {
                let path = location.strip_prefix("file://").unwrap_or(location);
                if Path::new(path).is_dir() {
                    if let Some(converter) = self.converter(FOLDER_CONVERTER_ID) {
                        return Some(converter);
                    }
                }
                if let Some(extension) = location_extension(location) {
                    if let Some(converter) = self.resolve_by_extension(&extension) {
                        return Some(converter);
                    }
                }
                self.converter(TEXT_CONVERTER_ID)
            }
            ResourceIdentity::Content(_) | ResourceIdentity::Command(_) => {
                self.converter(TEXT_CONVERTER_ID)
            }
        }
    }
}

/// Extracts the lowercased file extension of a location, ignoring query and
/// fragment parts.
fn location_extension(location: &str) -> Option<String> {
    let base = location.split(['?', '#']).next().unwrap_or(location);
    let name = base.rsplit(['/', '\\']).next().unwrap_or(base);
    let (_, extension) = name.rsplit_once('.')?;
    (!extension.is_empty()).then(|| extension.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FacadeBuilder;
    use crate::error::ConversionError;
    use crate::fetch::ResourceFetcher;
    use facadex_common::{keys, Configuration};

    struct Probe {
        extensions: &'static [&'static str],
        media_types: &'static [&'static str],
    }

    impl Converter for Probe {
        fn triplify(
            &self,
            _resource: &Resource,
            _fetcher: &dyn ResourceFetcher,
            _builder: &mut FacadeBuilder<'_>,
        ) -> Result<(), ConversionError> {
            Ok(())
        }

        fn extensions(&self) -> &[&str] {
            self.extensions
        }

        fn media_types(&self) -> &[&str] {
            self.media_types
        }
    }

    fn resource(pairs: &[(&str, &str)]) -> Resource {
        let mut configuration = Configuration::new();
        for (key, value) in pairs {
            configuration.set(*key, *value);
        }
        Resource::new(configuration).unwrap()
    }

    #[test]
    fn duplicate_extension_is_rejected_and_first_wins() {
        let registry = ConverterRegistry::new();
        registry
            .register(
                "csv",
                Arc::new(Probe {
                    extensions: &["csv"],
                    media_types: &["text/csv"],
                }),
            )
            .unwrap();

        let error = registry
            .register(
                "csv2",
                Arc::new(Probe {
                    extensions: &["csv"],
                    media_types: &[],
                }),
            )
            .unwrap_err();
        assert!(matches!(
            error,
            RegistryError::DuplicateRegistration {
                kind: ClaimKind::Extension,
                ..
            }
        ));

        assert!(registry.resolve_by_extension("csv").is_some());
        assert!(registry.converter("csv2").is_none());
    }

    #[test]
    fn failed_registration_leaves_no_partial_claims() {
        let registry = ConverterRegistry::new();
        registry
            .register(
                "first",
                Arc::new(Probe {
                    extensions: &[],
                    media_types: &["text/csv"],
                }),
            )
            .unwrap();
        registry
            .register(
                "second",
                Arc::new(Probe {
                    extensions: &["tsv"],
                    media_types: &["text/csv"],
                }),
            )
            .unwrap_err();
        assert!(registry.resolve_by_extension("tsv").is_none());
    }

    #[test]
    fn unregister_releases_claims() {
        let registry = ConverterRegistry::new();
        registry
            .register(
                "csv",
                Arc::new(Probe {
                    extensions: &["csv"],
                    media_types: &[],
                }),
            )
            .unwrap();
        assert!(registry.unregister("csv"));
        assert!(!registry.unregister("csv"));
        assert!(registry.resolve_by_extension("csv").is_none());
    }

    #[test]
    fn selection_prefers_explicit_override() {
        let registry = ConverterRegistry::with_defaults().unwrap();
        registry
            .register(
                "special",
                Arc::new(Probe {
                    extensions: &["spec"],
                    media_types: &[],
                }),
            )
            .unwrap();
        let resource = resource(&[
            (keys::CONVERTER, "special"),
            (keys::LOCATION, "http://example.com/data.txt"),
        ]);
        let selected = registry.select(&resource).unwrap();
        assert!(selected.extensions().contains(&"spec"));
    }

    #[test]
    fn selection_uses_media_type_before_extension() {
        let registry = ConverterRegistry::with_defaults().unwrap();
        registry
            .register(
                "csv",
                Arc::new(Probe {
                    extensions: &["csv"],
                    media_types: &["text/csv"],
                }),
            )
            .unwrap();
        let resource = resource(&[
            (keys::MEDIA_TYPE, "text/csv; charset=utf-8"),
            (keys::LOCATION, "http://example.com/data.txt"),
        ]);
        let selected = registry.select(&resource).unwrap();
        assert!(selected.extensions().contains(&"csv"));
    }

    #[test]
    fn selection_sniffs_extension_ignoring_query() {
        let registry = ConverterRegistry::with_defaults().unwrap();
        registry
            .register(
                "csv",
                Arc::new(Probe {
                    extensions: &["csv"],
                    media_types: &[],
                }),
            )
            .unwrap();
        let resource = resource(&[(
            keys::LOCATION,
            "http://example.com/data.CSV?download=true#top",
        )]);
        let selected = registry.select(&resource).unwrap();
        assert!(selected.extensions().contains(&"csv"));
    }

    #[test]
    fn unknown_extension_falls_back_to_text() {
        let registry = ConverterRegistry::with_defaults().unwrap();
        let resource = resource(&[(keys::LOCATION, "http://example.com/data.unknown")]);
        let selected = registry.select(&resource).unwrap();
        assert!(selected.media_types().contains(&"text/plain"));
    }

    #[test]
    fn absent_identity_selects_nothing() {
        let registry = ConverterRegistry::with_defaults().unwrap();
        let resource = resource(&[]);
        assert!(registry.select(&resource).is_none());
    }

    #[test]
    fn directory_location_selects_the_folder_converter() {
        let registry = ConverterRegistry::with_defaults().unwrap();
        registry
            .register(
                FOLDER_CONVERTER_ID,
                Arc::new(Probe {
                    extensions: &[],
                    media_types: &[],
                }),
            )
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let resource = resource(&[(keys::LOCATION, dir.path().to_str().unwrap())]);
        let selected = registry.select(&resource).unwrap();
        assert!(selected.extensions().is_empty());
    }

    #[test]
    fn location_extension_handles_paths_and_queries() {
        assert_eq!(
            location_extension("http://example.com/a/b.csv?x=1"),
            Some("csv".to_owned())
        );
        assert_eq!(location_extension("file.tar.GZ"), Some("gz".to_owned()));
        assert_eq!(location_extension("http://example.com/plain"), None);
        assert_eq!(location_extension("trailing."), None);
    }
}
