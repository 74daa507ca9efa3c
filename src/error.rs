// SPDX-License-Identifier: MPL-2.0
//! Error types for the photo library bridge.
//!
//! Every asynchronous failure captured by the completion bridge is converted
//! into one of these typed errors before the blocking call returns; callers
//! never see raw framework error objects. Local validation errors (invalid
//! version, bad destination, missing source file) are raised before any
//! framework call is made and carry no framework description.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Library access has not been granted at the required level.
    Authorization(String),

    /// An identifier-based lookup returned no result (bad UUID, deleted
    /// asset, or a lookup issued against the wrong library mode).
    FetchFailed(String),

    /// Unrecognized media kind, or an operation invoked on the wrong asset
    /// variant (e.g. slow-motion re-export of a non-slow-motion video).
    MediaType(String),

    /// Retrieval succeeded at the framework layer but produced no usable
    /// payload, or an export session reported a non-success terminal status.
    Export(String),

    /// An asset creation transaction reported failure.
    Import(String),

    /// A change transaction that is not an import or album operation failed
    /// (asset deletion, attribute edit).
    Mutation(String),

    /// Album creation transaction failed.
    AlbumCreate(String),

    /// Album deletion transaction failed.
    AlbumDelete(String),

    /// Adding assets to an album failed.
    AlbumAddAsset(String),

    /// Creating a library at an explicit path failed.
    CreateLibrary(String),

    /// Default-mode operation attempted after the process switched to
    /// explicit-path mode.
    Mode(String),

    /// Change monitor used outside its Unregistered -> Observing lifecycle.
    Observer(String),

    /// Metadata store (SQLite) failure.
    Database(String),

    /// Version value outside {Original, Current, Unadjusted}. Local
    /// validation; no framework call is attempted.
    InvalidVersion(i32),

    /// Export destination is not an existing directory. Local validation.
    NotADirectory(PathBuf),

    /// Import source file does not exist. Local validation.
    FileNotFound(PathBuf),

    /// Library path already exists. Local validation.
    FileExists(PathBuf),

    /// Filesystem I/O failure while writing or copying exported payloads.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authorization(msg) => write!(f, "Authorization error: {}", msg),
            Error::FetchFailed(msg) => write!(f, "Fetch failed: {}", msg),
            Error::MediaType(msg) => write!(f, "Media type error: {}", msg),
            Error::Export(msg) => write!(f, "Export error: {}", msg),
            Error::Import(msg) => write!(f, "Import error: {}", msg),
            Error::Mutation(msg) => write!(f, "Mutation error: {}", msg),
            Error::AlbumCreate(msg) => write!(f, "Album create error: {}", msg),
            Error::AlbumDelete(msg) => write!(f, "Album delete error: {}", msg),
            Error::AlbumAddAsset(msg) => write!(f, "Album add asset error: {}", msg),
            Error::CreateLibrary(msg) => write!(f, "Create library error: {}", msg),
            Error::Mode(msg) => write!(f, "Library mode error: {}", msg),
            Error::Observer(msg) => write!(f, "Change observer error: {}", msg),
            Error::Database(msg) => write!(f, "Database error: {}", msg),
            Error::InvalidVersion(value) => write!(f, "Invalid version value: {}", value),
            Error::NotADirectory(path) => {
                write!(f, "Not a directory: {}", path.display())
            }
            Error::FileNotFound(path) => write!(f, "File not found: {}", path.display()),
            Error::FileExists(path) => write!(f, "File already exists: {}", path.display()),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` for errors raised by local validation before any
    /// framework call; these never carry a framework error description.
    pub fn is_local_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidVersion(_)
                | Error::NotADirectory(_)
                | Error::FileNotFound(_)
                | Error::FileExists(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_fetch_failed() {
        let err = Error::FetchFailed("no asset with uuid ABC".to_string());
        assert_eq!(format!("{}", err), "Fetch failed: no asset with uuid ABC");
    }

    #[test]
    fn from_io_error_produces_io_variant() {
        let io_error = std::io::Error::other("disk full");
        let err: Error = io_error.into();
        match err {
            Error::Io(message) => assert!(message.contains("disk full")),
            _ => panic!("expected Io variant"),
        }
    }

    #[test]
    fn local_validation_errors_are_flagged() {
        assert!(Error::InvalidVersion(42).is_local_validation());
        assert!(Error::NotADirectory(PathBuf::from("/nope")).is_local_validation());
        assert!(!Error::Export("no payload".into()).is_local_validation());
        assert!(!Error::Mutation("framework said no".into()).is_local_validation());
    }
}
