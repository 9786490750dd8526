use crate::error::TransportError;
use crate::resource::{Resource, ResourceIdentity};
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::process::Command;

/// Opens the byte stream behind a resource identity.
///
/// Implementations classify failures as not-found, client-side, server-side
/// or transport failures so the engine can report them uniformly.
pub trait ResourceFetcher: Send + Sync {
    fn open(&self, resource: &Resource) -> Result<Box<dyn Read>, TransportError>;
}

/// Fetcher for local identities: file locations, inline content and shell
/// commands. HTTP transports are a host concern and live outside this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFetcher;

impl ResourceFetcher for LocalFetcher {
    fn open(&self, resource: &Resource) -> Result<Box<dyn Read>, TransportError> {
        match resource.identity() {
            None => Err(TransportError::NotFound(
                "the request names no location, content or command".to_owned(),
            )),
            Some(ResourceIdentity::Content(content)) => {
                Ok(Box::new(Cursor::new(content.as_bytes().to_vec())))
            }
            Some(ResourceIdentity::Command(command)) => run_command(command),
            Some(ResourceIdentity::Location(location)) => open_location(location),
        }
    }
}

fn run_command(command: &str) -> Result<Box<dyn Read>, TransportError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(TransportError::Transport)?;
    if !output.status.success() {
        return Err(TransportError::Client {
            location: command.to_owned(),
            message: format!("command exited with {}", output.status),
        });
    }
    Ok(Box::new(Cursor::new(output.stdout)))
}

fn open_location(location: &str) -> Result<Box<dyn Read>, TransportError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Err(TransportError::Client {
            location: location.to_owned(),
            message: "http(s) transports are not handled by the local fetcher".to_owned(),
        });
    }
    let path = location.strip_prefix("file://").unwrap_or(location);
    match File::open(path) {
        Ok(file) => Ok(Box::new(file)),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            Err(TransportError::NotFound(location.to_owned()))
        }
        Err(error) if error.kind() == ErrorKind::PermissionDenied => Err(TransportError::Client {
            location: location.to_owned(),
            message: "permission denied".to_owned(),
        }),
        Err(error) => Err(TransportError::Transport(error)),
    }
}
