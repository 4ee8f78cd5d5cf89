//! # contract: the seams between the pipeline and its collaborators
//!
//! The orchestrator in [`crate::synchronise`] only talks to the outside world
//! through the traits below:
//!
//! - [`Acquirer`] fetches and unpacks a repository snapshot.
//! - [`RepositoryMetadata`] answers funding and latest-release questions.
//! - [`AssetExporter`] turns binary icons and platform images into PNG files.
//! - [`PostSink`] receives one notification per new or updated core.
//!
//! Every trait is annotated for `mockall` so tests can assert exactly which
//! calls a run makes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::definition::PocketTree;
use crate::error::{AcquisitionError, ExportError, MetadataError, OutputError};
use crate::repositories::RepositoryDescriptor;

/// An extracted repository snapshot. The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct AcquiredRepository {
    dir: TempDir,
}

impl AcquiredRepository {
    pub fn new(dir: TempDir) -> Self {
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Fetches repository snapshots into private temporary directories.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Download and extract the current snapshot of `repository`.
    async fn acquire(
        &self,
        repository: &RepositoryDescriptor,
    ) -> Result<AcquiredRepository, AcquisitionError>;

    /// The public download URL published in the inventory.
    fn download_url(&self, repository: &RepositoryDescriptor) -> String;
}

/// A funding-file value: either a single handle/URL or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FundingValue {
    One(String),
    Many(Vec<String>),
}

/// Contents of a repository's `.github/FUNDING.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Funding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_bridge: Option<FundingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<FundingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuehunt: Option<FundingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ko_fi: Option<FundingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liberapay: Option<FundingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_collective: Option<FundingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otechie: Option<FundingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patreon: Option<FundingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tidelift: Option<FundingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<FundingValue>,
}

/// The release picked as "latest" for a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub tag_name: String,
    pub prerelease: bool,
}

/// Repository metadata lookups. `Ok(None)` means the repository has none.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryMetadata: Send + Sync {
    async fn funding(
        &self,
        repository: &RepositoryDescriptor,
    ) -> Result<Option<Funding>, MetadataError>;

    /// Latest release, honouring the descriptor's prerelease flag.
    async fn latest_release(
        &self,
        repository: &RepositoryDescriptor,
    ) -> Result<Option<ReleaseInfo>, MetadataError>;
}

/// Converts binary images from an extracted repository into output files.
///
/// Both methods return `Ok(None)` when the source image does not exist.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait AssetExporter: Send + Sync {
    fn export_icon(&self, tree: &PocketTree, core_id: &str)
        -> Result<Option<PathBuf>, ExportError>;

    fn export_platform_image(
        &self,
        tree: &PocketTree,
        platform_id: &str,
    ) -> Result<Option<PathBuf>, ExportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Update,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::New => "new",
            ChangeKind::Update => "update",
        }
    }
}

/// Notification for a core that appeared or changed version in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPayload {
    pub author: String,
    pub shortname: String,
    pub version: String,
    pub kind: ChangeKind,
    pub content: String,
}

/// Receives change notifications.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait PostSink: Send + Sync {
    fn publish(&self, post: &PostPayload) -> Result<(), OutputError>;
}
