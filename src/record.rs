//! The serialized inventory: one [`CoreRecord`] per core, grouped by owner.

use serde::{Deserialize, Serialize};

use crate::contract::{Funding, ReleaseInfo};
use crate::definition::{Core, DataSlot, PlatformMetadata, Updater};
use crate::repositories::RepositoryDescriptor;

pub const REPOSITORY_PLATFORM: &str = "github";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub platform: String,
    pub name: String,
    pub prerelease: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
}

/// A file a core needs the user to supply, derived from a required data slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub core_specific: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// The output unit for one core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreRecord {
    pub id: String,
    pub display_name: String,
    pub repository: RepositoryRecord,
    pub sponsor_only: bool,
    pub download_url: String,
    pub platform_id: String,
    pub description: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_release: Option<String>,
    pub platform: PlatformMetadata,
    #[serde(default)]
    pub assets: Vec<AssetRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<Funding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updaters: Option<Updater>,
}

/// Everything a fresh record is built from, gathered by the orchestrator.
pub struct RecordInputs<'a> {
    pub repository: &'a RepositoryDescriptor,
    pub core: &'a Core,
    pub platform: PlatformMetadata,
    pub download_url: String,
    pub release: Option<&'a ReleaseInfo>,
    pub funding: Option<&'a Funding>,
    pub sponsor_only: bool,
    pub updater: Option<Updater>,
}

impl CoreRecord {
    pub fn build(inputs: RecordInputs<'_>) -> Self {
        let definition = &inputs.core.definition;
        CoreRecord {
            id: definition.id.clone(),
            display_name: inputs.repository.display_name.clone(),
            repository: RepositoryRecord {
                platform: REPOSITORY_PLATFORM.to_string(),
                name: inputs.repository.name.clone(),
                prerelease: inputs.repository.prerelease,
                tag_name: inputs.release.map(|r| r.tag_name.clone()),
            },
            sponsor_only: inputs.sponsor_only,
            download_url: inputs.download_url,
            platform_id: definition.platform_id.clone(),
            description: definition.description.clone(),
            version: definition.version.clone(),
            date_release: definition.date_release.clone(),
            platform: inputs.platform,
            assets: assets_for(&definition.platform_id, &inputs.core.data_slots),
            sponsor: inputs.funding.cloned(),
            updaters: inputs.updater,
        }
    }
}

/// Required slots become assets, in manifest order.
pub fn assets_for(platform_id: &str, slots: &[DataSlot]) -> Vec<AssetRecord> {
    slots
        .iter()
        .filter(|slot| slot.required)
        .map(|slot| AssetRecord {
            platform: platform_id.to_string(),
            filename: slot.filename.clone(),
            extensions: slot.extensions.clone(),
            core_specific: slot.core_specific,
        })
        .collect()
}

/// One owner's cores, sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerGroup {
    pub username: String,
    pub cores: Vec<CoreRecord>,
}

pub type Inventory = Vec<OwnerGroup>;

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(required: bool, filename: Option<&str>, core_specific: bool) -> DataSlot {
        DataSlot {
            name: None,
            required,
            filename: filename.map(str::to_string),
            extensions: None,
            core_specific,
        }
    }

    #[test]
    fn only_required_slots_become_assets() {
        let slots = vec![
            slot(true, Some("bios.bin"), true),
            slot(false, Some("save.sav"), false),
            slot(true, None, false),
        ];
        let assets = assets_for("gb", &slots);
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].filename.as_deref(), Some("bios.bin"));
        assert!(assets[0].core_specific);
        assert_eq!(assets[1].filename, None);
    }

    #[test]
    fn absent_optionals_are_omitted_from_yaml() {
        let asset = AssetRecord {
            platform: "gb".into(),
            filename: None,
            extensions: None,
            core_specific: false,
        };
        let yaml = serde_yaml::to_string(&asset).unwrap();
        assert_eq!(yaml.trim(), "platform: gb");
    }
}
