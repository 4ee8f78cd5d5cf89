//! Parsing of the declarative repository list.
//!
//! The list is grouped by owner on disk; each entry is flattened into a
//! [`RepositoryDescriptor`] that carries its owner so downstream code never has
//! to look back at the grouping.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::RepositoryListError;

/// One source repository packaging one or more cores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub owner: String,
    pub name: String,
    pub display_name: String,
    /// Look up the latest GitHub release and record its tag.
    pub release: bool,
    /// Accept prereleases when looking up the latest release.
    pub prerelease: bool,
}

impl RepositoryDescriptor {
    /// `owner/name`, the identifier GitHub uses for the repository.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct OwnerYaml {
    owner: String,
    #[serde(default)]
    repositories: Vec<RepositoryYaml>,
}

#[derive(Debug, Deserialize)]
struct RepositoryYaml {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    release: bool,
    #[serde(default)]
    prerelease: bool,
}

/// Reads and parses the repository list at `path`.
pub fn load_repositories<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<RepositoryDescriptor>, RepositoryListError> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading repository list");
    let content = fs::read_to_string(path).map_err(|source| RepositoryListError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_repositories(&content)
}

/// Parses repository list YAML into descriptors, preserving list order.
pub fn parse_repositories(content: &str) -> Result<Vec<RepositoryDescriptor>, RepositoryListError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let owners: Option<Vec<OwnerYaml>> = serde_yaml::from_str(content)?;
    let owners = owners.unwrap_or_default();

    let mut seen = HashSet::new();
    let mut descriptors = Vec::new();
    for group in owners {
        let owner = group.owner.trim();
        if owner.is_empty() {
            return Err(RepositoryListError::Invalid("owner must not be empty".into()));
        }
        for repo in group.repositories {
            let name = repo.name.trim();
            if name.is_empty() {
                return Err(RepositoryListError::Invalid(format!(
                    "repository name under owner '{owner}' must not be empty"
                )));
            }
            if !seen.insert((owner.to_string(), name.to_string())) {
                return Err(RepositoryListError::Duplicate {
                    owner: owner.to_string(),
                    name: name.to_string(),
                });
            }
            let descriptor = RepositoryDescriptor {
                owner: owner.to_string(),
                name: name.to_string(),
                display_name: repo.display_name.unwrap_or_else(|| name.to_string()),
                release: repo.release,
                prerelease: repo.prerelease,
            };
            debug!(repository = %descriptor.slug(), release = descriptor.release, "Parsed repository");
            descriptors.push(descriptor);
        }
    }
    info!(repositories = descriptors.len(), "Repository list parsed");
    Ok(descriptors)
}
