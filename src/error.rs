//! Error types for the inventory pipeline.
//!
//! Each variant family maps to the blast radius of the failure: an
//! [`AcquisitionError`] costs one repository, a [`ParseError`] one core, and
//! only a [`RepositoryListError`] stops the whole run.

use std::path::PathBuf;
use thiserror::Error;

/// Fetching or unpacking a repository snapshot failed.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Download of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid archive: {message}")]
    Archive { message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("No Cores directory found in extracted archive {0}")]
    NoCoresDirectory(PathBuf),
}

/// A definition file could not be read or did not hold a valid definition.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Missing file {0}")]
    MissingFile(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid definition in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

impl ParseError {
    pub fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ParseError::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Converting a binary image to PNG failed.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image {path} is {actual} bytes, expected {expected}")]
    Size {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to write image {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Loading or saving the version cache failed.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to access cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Refusing to cache {core_id} at {version}: record carries version {record_version}")]
    VersionMismatch {
        core_id: String,
        version: String,
        record_version: String,
    },
}

/// The declarative repository list is unusable. Fatal for the run.
#[derive(Debug, Error)]
pub enum RepositoryListError {
    #[error("Failed to read repository list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed repository list: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid repository list entry: {0}")]
    Invalid(String),

    #[error("Repository {owner}/{name} is listed more than once")]
    Duplicate { owner: String, name: String },
}

/// A GitHub metadata lookup failed for a reason other than absence.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("GitHub request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("GitHub returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed GitHub response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Writing an output artifact (inventory or post) failed.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize output: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that abort one repository. The run continues with the next one.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("Failed to list cores: {0}")]
    Listing(#[from] ParseError),
}

/// Errors that stop a whole synchronisation run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    RepositoryList(#[from] RepositoryListError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
