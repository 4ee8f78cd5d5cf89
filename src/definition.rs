//! Reading core definitions out of an extracted repository.
//!
//! An extracted repository carries a `Cores` directory (one sub-directory per
//! core, named by core id) and a sibling `Platforms` catalog:
//!
//! ```text
//! Cores/<core id>/core.json      required metadata
//! Cores/<core id>/data.json      required data-slot manifest
//! Cores/<core id>/info.txt       optional release notes
//! Cores/<core id>/updater.json   optional updater descriptor
//! Cores/<core id>/icon.bin       optional icon
//! Platforms/<platform id>.json
//! Platforms/_images/<platform id>.bin
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{AcquisitionError, ParseError};

pub const CORES_DIR: &str = "Cores";
pub const PLATFORMS_DIR: &str = "Platforms";
pub const PLATFORM_IMAGES_DIR: &str = "_images";

pub const CORE_FILE: &str = "core.json";
pub const DATA_FILE: &str = "data.json";
pub const INFO_FILE: &str = "info.txt";
pub const UPDATER_FILE: &str = "updater.json";
pub const ICON_FILE: &str = "icon.bin";

/// How deep below the extraction root a `Cores` directory may sit.
const MAX_CORES_DEPTH: usize = 4;

/// Data-slot parameter bit marking a file that lives in the core's own asset folder.
const CORE_SPECIFIC_FILE_BIT: u64 = 1 << 1;

/// Result of looking up a resource that most cores do not ship.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotPresent,
    Error(String),
}

impl<T> Lookup<T> {
    /// Collapses to `Option`, treating errors as absent.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotPresent | Lookup::Error(_) => None,
        }
    }
}

/// Metadata from `core.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreDefinition {
    pub id: String,
    pub platform_id: String,
    pub author: String,
    pub shortname: String,
    pub description: String,
    pub version: String,
    pub date_release: Option<String>,
}

/// One entry of the data-slot manifest in `data.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSlot {
    pub name: Option<String>,
    pub required: bool,
    pub filename: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub core_specific: bool,
}

/// A parsed core: its metadata plus its data slots in manifest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Core {
    pub definition: CoreDefinition,
    pub data_slots: Vec<DataSlot>,
}

/// Platform catalog entry, shared by all cores targeting the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
}

/// Contents of `updater.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Updater {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous: Vec<PreviousCore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousCore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub filename: String,
}

// On-disk shapes. Only the fields the inventory needs are modelled.

#[derive(Deserialize)]
struct CoreFile {
    core: CoreSection,
}

#[derive(Deserialize)]
struct CoreSection {
    metadata: CoreMetadataJson,
}

#[derive(Deserialize)]
struct CoreMetadataJson {
    #[serde(default)]
    platform_ids: Vec<String>,
    #[serde(default)]
    shortname: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    date_release: Option<String>,
}

#[derive(Deserialize)]
struct DataFile {
    data: DataSection,
}

#[derive(Deserialize)]
struct DataSection {
    #[serde(default)]
    data_slots: Vec<DataSlotJson>,
}

#[derive(Deserialize)]
struct DataSlotJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    parameters: Option<Parameters>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    extensions: Option<Vec<String>>,
}

/// Slot parameters appear both as plain integers and as hex strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Parameters {
    Number(u64),
    Text(String),
}

impl Parameters {
    fn bits(&self) -> Result<u64, String> {
        match self {
            Parameters::Number(n) => Ok(*n),
            Parameters::Text(s) => {
                let s = s.trim();
                let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => s.parse::<u64>(),
                };
                parsed.map_err(|e| format!("invalid parameters value '{s}': {e}"))
            }
        }
    }
}

#[derive(Deserialize)]
struct PlatformFile {
    platform: PlatformMetadata,
}

/// Read-only view over the `Cores` and `Platforms` directories of one extracted repository.
#[derive(Debug, Clone)]
pub struct PocketTree {
    cores_dir: PathBuf,
    platforms_dir: PathBuf,
}

impl PocketTree {
    /// Finds the shallowest `Cores` directory below `root`.
    pub fn locate(root: &Path) -> Result<Self, AcquisitionError> {
        let cores_dir = WalkDir::new(root)
            .max_depth(MAX_CORES_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir() && entry.file_name() == CORES_DIR)
            .min_by_key(|entry| entry.depth())
            .map(|entry| entry.into_path())
            .ok_or_else(|| AcquisitionError::NoCoresDirectory(root.to_path_buf()))?;

        let platforms_dir = cores_dir
            .parent()
            .map(|parent| parent.join(PLATFORMS_DIR))
            .unwrap_or_else(|| root.join(PLATFORMS_DIR));

        debug!(cores = %cores_dir.display(), platforms = %platforms_dir.display(), "Located core tree");
        Ok(Self {
            cores_dir,
            platforms_dir,
        })
    }

    /// Core ids (directory names under `Cores`), sorted.
    pub fn core_ids(&self) -> Result<Vec<String>, ParseError> {
        let entries = fs::read_dir(&self.cores_dir).map_err(|source| ParseError::Io {
            path: self.cores_dir.clone(),
            source,
        })?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ParseError::Io {
                path: self.cores_dir.clone(),
                source,
            })?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Parses `core.json` and `data.json` for the core `id`.
    pub fn read_core(&self, id: &str) -> Result<Core, ParseError> {
        let core_dir = self.cores_dir.join(id);
        let definition = self.read_definition(id, &core_dir.join(CORE_FILE))?;
        let data_slots = read_data_slots(&core_dir.join(DATA_FILE))?;
        Ok(Core {
            definition,
            data_slots,
        })
    }

    fn read_definition(&self, id: &str, path: &Path) -> Result<CoreDefinition, ParseError> {
        let file: CoreFile = read_json(path)?;
        let meta = file.core.metadata;

        let platform_id = meta
            .platform_ids
            .into_iter()
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ParseError::invalid(path, "metadata.platform_ids is empty"))?;
        if !is_plain_name(&platform_id) {
            return Err(ParseError::invalid(
                path,
                format!("platform id '{platform_id}' is not a plain file name"),
            ));
        }
        for (field, value) in [
            ("shortname", &meta.shortname),
            ("author", &meta.author),
            ("version", &meta.version),
        ] {
            if value.trim().is_empty() {
                return Err(ParseError::invalid(
                    path,
                    format!("metadata.{field} is missing or empty"),
                ));
            }
        }

        Ok(CoreDefinition {
            id: id.to_string(),
            platform_id,
            author: meta.author,
            shortname: meta.shortname,
            description: meta.description,
            version: meta.version,
            date_release: meta.date_release.filter(|d| !d.is_empty()),
        })
    }

    /// Looks up a platform in the repository-wide catalog.
    pub fn platform(&self, platform_id: &str) -> Result<PlatformMetadata, ParseError> {
        let path = self.platforms_dir.join(format!("{platform_id}.json"));
        let file: PlatformFile = read_json(&path)?;
        Ok(file.platform)
    }

    /// Free-text release notes, if the core ships any.
    pub fn info(&self, id: &str) -> Lookup<String> {
        let path = self.cores_dir.join(id).join(INFO_FILE);
        if !path.is_file() {
            return Lookup::NotPresent;
        }
        match fs::read_to_string(&path) {
            Ok(text) => Lookup::Found(text),
            Err(e) => Lookup::Error(format!("failed to read {}: {e}", path.display())),
        }
    }

    /// The updater descriptor, if the core ships one.
    pub fn updater(&self, id: &str) -> Lookup<Updater> {
        let path = self.cores_dir.join(id).join(UPDATER_FILE);
        if !path.is_file() {
            return Lookup::NotPresent;
        }
        match read_json::<Updater>(&path) {
            Ok(updater) => Lookup::Found(updater),
            Err(e) => Lookup::Error(e.to_string()),
        }
    }

    pub fn icon_path(&self, id: &str) -> PathBuf {
        self.cores_dir.join(id).join(ICON_FILE)
    }

    pub fn platform_image_path(&self, platform_id: &str) -> PathBuf {
        self.platforms_dir
            .join(PLATFORM_IMAGES_DIR)
            .join(format!("{platform_id}.bin"))
    }
}

fn read_data_slots(path: &Path) -> Result<Vec<DataSlot>, ParseError> {
    let file: DataFile = read_json(path)?;
    file.data
        .data_slots
        .into_iter()
        .map(|slot| {
            let bits = match &slot.parameters {
                Some(p) => p.bits().map_err(|reason| ParseError::invalid(path, reason))?,
                None => 0,
            };
            Ok(DataSlot {
                name: slot.name,
                required: slot.required,
                filename: slot.filename,
                extensions: slot.extensions,
                core_specific: bits & CORE_SPECIFIC_FILE_BIT != 0,
            })
        })
        .collect()
}

/// Platform ids become file names in the catalog and the asset tree.
fn is_plain_name(id: &str) -> bool {
    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ParseError> {
    if !path.is_file() {
        return Err(ParseError::MissingFile(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ParseError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const CORE_JSON: &str = r#"{
  "core": {
    "magic": "APF_VER_1",
    "metadata": {
      "platform_ids": ["gb"],
      "shortname": "GB",
      "description": "Game Boy compatible core",
      "author": "Spiritualized",
      "version": "1.2.0",
      "date_release": "2022-09-01"
    }
  }
}"#;

    const DATA_JSON: &str = r#"{
  "data": {
    "magic": "APF_VER_1",
    "data_slots": [
      { "name": "Cartridge", "id": 0, "required": true, "parameters": "0x109", "extensions": ["gb"] },
      { "name": "BIOS", "id": 1, "required": true, "parameters": 2, "filename": "gb_bios.bin" },
      { "name": "Save", "id": 2, "required": false }
    ]
  }
}"#;

    fn fixture() -> (tempfile::TempDir, PocketTree) {
        let dir = tempdir().unwrap();
        let root = dir.path().join("owner-repo-abc123").join("dist");
        write(&root.join("Cores/Spiritualized.GB/core.json"), CORE_JSON);
        write(&root.join("Cores/Spiritualized.GB/data.json"), DATA_JSON);
        write(
            &root.join("Platforms/gb.json"),
            r#"{"platform": {"category": "Handheld", "name": "Game Boy", "manufacturer": "Nintendo", "year": 1989}}"#,
        );
        let tree = PocketTree::locate(dir.path()).unwrap();
        (dir, tree)
    }

    #[test]
    fn reads_definition_and_slots_in_order() {
        let (_dir, tree) = fixture();
        assert_eq!(tree.core_ids().unwrap(), vec!["Spiritualized.GB"]);

        let core = tree.read_core("Spiritualized.GB").unwrap();
        assert_eq!(core.definition.platform_id, "gb");
        assert_eq!(core.definition.version, "1.2.0");
        assert_eq!(core.definition.date_release.as_deref(), Some("2022-09-01"));

        let names: Vec<_> = core.data_slots.iter().map(|s| s.name.clone().unwrap()).collect();
        assert_eq!(names, ["Cartridge", "BIOS", "Save"]);
        assert!(!core.data_slots[0].core_specific);
        assert!(core.data_slots[1].core_specific);
        assert_eq!(core.data_slots[1].filename.as_deref(), Some("gb_bios.bin"));
        assert!(!core.data_slots[2].required);
    }

    #[test]
    fn missing_manifest_is_reported_as_missing_file() {
        let (dir, tree) = fixture();
        let data = dir
            .path()
            .join("owner-repo-abc123/dist/Cores/Spiritualized.GB/data.json");
        fs::remove_file(data).unwrap();
        let err = tree.read_core("Spiritualized.GB").unwrap_err();
        assert!(matches!(err, ParseError::MissingFile(p) if p.ends_with(DATA_FILE)));
    }

    #[test]
    fn malformed_json_names_the_file() {
        let (dir, tree) = fixture();
        let core = dir
            .path()
            .join("owner-repo-abc123/dist/Cores/Spiritualized.GB/core.json");
        fs::write(&core, "{ not json").unwrap();
        let err = tree.read_core("Spiritualized.GB").unwrap_err();
        assert!(err.to_string().contains("core.json"), "{err}");
    }

    #[test]
    fn empty_version_is_invalid() {
        let (dir, tree) = fixture();
        let core = dir
            .path()
            .join("owner-repo-abc123/dist/Cores/Spiritualized.GB/core.json");
        fs::write(&core, CORE_JSON.replace("1.2.0", "")).unwrap();
        let err = tree.read_core("Spiritualized.GB").unwrap_err();
        assert!(matches!(err, ParseError::Invalid { .. }));
    }

    #[test]
    fn optional_resources_are_three_state() {
        let (dir, tree) = fixture();
        assert_eq!(tree.info("Spiritualized.GB"), Lookup::NotPresent);
        assert_eq!(tree.updater("Spiritualized.GB"), Lookup::NotPresent);

        let core_dir = dir.path().join("owner-repo-abc123/dist/Cores/Spiritualized.GB");
        fs::write(core_dir.join(INFO_FILE), "Fixed audio.").unwrap();
        fs::write(
            core_dir.join(UPDATER_FILE),
            r#"{"license": {"filename": "beta.bin"}}"#,
        )
        .unwrap();
        assert_eq!(
            tree.info("Spiritualized.GB"),
            Lookup::Found("Fixed audio.".to_string())
        );
        let updater = tree.updater("Spiritualized.GB").found().unwrap();
        assert_eq!(updater.license.unwrap().filename, "beta.bin");

        fs::write(core_dir.join(UPDATER_FILE), "[").unwrap();
        assert!(matches!(tree.updater("Spiritualized.GB"), Lookup::Error(_)));
    }

    #[test]
    fn platform_id_must_be_a_plain_name() {
        let (dir, tree) = fixture();
        let core = dir
            .path()
            .join("owner-repo-abc123/dist/Cores/Spiritualized.GB/core.json");
        for bad in ["../../evil", "/etc/passwd", "a/b", ".."] {
            fs::write(&core, CORE_JSON.replace(r#"["gb"]"#, &format!("[{bad:?}]"))).unwrap();
            let err = tree.read_core("Spiritualized.GB").unwrap_err();
            assert!(
                matches!(&err, ParseError::Invalid { reason, .. } if reason.contains("platform id")),
                "{bad}: {err}"
            );
        }
        assert!(is_plain_name("gb"));
        assert!(is_plain_name("arcade.v2"));
    }

    #[test]
    fn platform_lookup() {
        let (_dir, tree) = fixture();
        let platform = tree.platform("gb").unwrap();
        assert_eq!(platform.name, "Game Boy");
        assert_eq!(platform.year, Some(1989));
        assert!(matches!(tree.platform("nes"), Err(ParseError::MissingFile(_))));
    }

    #[test]
    fn locate_fails_without_cores_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        assert!(matches!(
            PocketTree::locate(dir.path()),
            Err(AcquisitionError::NoCoresDirectory(_))
        ));
    }
}
