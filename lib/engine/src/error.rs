use facadex_common::error::{InconsistentStateError, StorageError};
use facadex_model::{IriParseError, Variable};
use std::fmt;
use std::io;

/// An error while resolving the configuration of a request.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// A configuration value that must be an IRI does not parse as one.
    #[error("configuration value for \"{key}\" is not a valid IRI: {source}")]
    InvalidIri {
        key: &'static str,
        #[source]
        source: IriParseError,
    },
    /// An assertion on the reserved properties subject is malformed.
    #[error("invalid configuration assertion: {message}")]
    InvalidAssertion { message: String },
    /// An argument in the endpoint IRI is malformed.
    #[error("invalid endpoint argument: {argument}")]
    InvalidEndpointArgument { argument: String },
}

/// A configuration value depends on a variable the current solution does not
/// bind yet.
///
/// Recoverable through deferral; never surfaces to the caller.
#[derive(Debug, thiserror::Error)]
#[error("variable {variable} supplying \"{key}\" is not bound yet")]
pub struct UnboundVariable {
    /// The unbound variable.
    pub variable: Variable,
    /// Configuration key the variable was meant to supply.
    pub key: String,
}

/// What a converter claims in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    Extension,
    MediaType,
}

impl fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimKind::Extension => f.write_str("extension"),
            ClaimKind::MediaType => f.write_str("media type"),
        }
    }
}

/// An error while registering converters. Fatal at startup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// A second converter claimed an extension or media type.
    #[error("{kind} \"{value}\" is already registered to converter \"{owner}\"")]
    DuplicateRegistration {
        kind: ClaimKind,
        value: String,
        owner: String,
    },
}

/// An error while opening the byte stream of a resource.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// The request itself is at fault (permissions, unsupported scheme,
    /// failing command).
    #[error("client-side failure opening \"{location}\": {message}")]
    Client { location: String, message: String },
    /// The remote side failed.
    #[error("server-side failure opening \"{location}\": {message}")]
    Server { location: String, message: String },
    /// The transport layer failed.
    #[error(transparent)]
    Transport(#[from] io::Error),
}

/// An error raised by a converter while triplifying a resource.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConversionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The resource bytes cannot be parsed under the selected format.
    #[error("cannot parse resource: {0}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    InconsistentState(#[from] InconsistentStateError),
}

impl ConversionError {
    /// Whether this error only reports that the consumer cancelled the
    /// build.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ConversionError::Storage(StorageError::Cancelled))
    }
}

/// A fatal error for one solution's evaluation.
///
/// Recoverable conditions (unbound variables, missing converters) are
/// handled internally and never take this form.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EvaluationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
