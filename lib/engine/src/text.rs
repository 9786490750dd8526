use crate::builder::FacadeBuilder;
use crate::converter::Converter;
use crate::error::ConversionError;
use crate::fetch::ResourceFetcher;
use crate::resource::Resource;
use std::io::{ErrorKind, Read};

/// The id of the root container emitted by [TextConverter].
const ROOT_CONTAINER: &str = "";

/// Fallback converter rendering any resource as plain text.
///
/// The root container carries the whole text as its first slot; under sliced
/// execution every line becomes its own ordinal slot, emitted as the source
/// is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextConverter;

impl Converter for TextConverter {
    fn triplify(
        &self,
        resource: &Resource,
        fetcher: &dyn ResourceFetcher,
        builder: &mut FacadeBuilder<'_>,
    ) -> Result<(), ConversionError> {
        let mut text = String::new();
        fetcher
            .open(resource)?
            .read_to_string(&mut text)
            .map_err(|error| {
                if error.kind() == ErrorKind::InvalidData {
                    ConversionError::Parse("resource is not valid UTF-8".to_owned())
                } else {
                    error.into()
                }
            })?;

        builder.add_root(ROOT_CONTAINER)?;
        if resource.configuration().slice() {
            for (index, line) in text.lines().enumerate() {
                builder.add_value(ROOT_CONTAINER, index + 1, line)?;
            }
        } else {
            builder.add_value(ROOT_CONTAINER, 1, text)?;
        }
        Ok(())
    }

    fn extensions(&self) -> &[&str] {
        &["txt"]
    }

    fn media_types(&self) -> &[&str] {
        &["text/plain"]
    }

    fn supports_slicing(&self) -> bool {
        true
    }
}
