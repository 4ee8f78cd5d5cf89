use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::OutputError;
use crate::record::Inventory;

pub const HEADER: &str = "\
# ##############################################################################
# #                                                                            #
# #                        THIS FILE IS AUTO-GENERATED                         #
# #                           DO NOT EDIT THIS FILE                            #
# #                ADD NEW CORE REPOSITORIES TO REPOSITORIES.YML               #
# #                                                                            #
# ##############################################################################
";

/// Renders the inventory as YAML behind the generated-file banner.
pub fn render_inventory(inventory: &Inventory) -> Result<String, OutputError> {
    let body = serde_yaml::to_string(inventory)?;
    Ok(format!("{HEADER}{body}"))
}

pub fn write_inventory<P: AsRef<Path>>(path: P, inventory: &Inventory) -> Result<(), OutputError> {
    let path = path.as_ref();
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, render_inventory(inventory)?).map_err(io_err)?;
    info!(path = %path.display(), owners = inventory.len(), "Wrote inventory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OwnerGroup;

    #[test]
    fn header_precedes_yaml() {
        let inventory = vec![OwnerGroup {
            username: "ownerA".into(),
            cores: vec![],
        }];
        let rendered = render_inventory(&inventory).unwrap();
        assert!(rendered.starts_with(HEADER));
        assert!(rendered.ends_with("- username: ownerA\n  cores: []\n"));
    }
}
