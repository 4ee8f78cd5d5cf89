//! Reads the run configuration from YAML.
//!
//! Relative paths in the file are resolved against the directory that holds
//! the config file, so a config checked into a site repository works no
//! matter where the binary is started from. Secrets never live here; the
//! GitHub token comes from the environment.

use anyhow::{Context, Result};
use pocket_inventory_core::config::Config;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file means "all defaults".
    let parsed: Option<Config> = serde_yaml::from_str(&config_content)
        .with_context(|| format!("Failed to parse config YAML {path_ref:?}"))?;
    let mut config = parsed.unwrap_or_default();
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    let base = path_ref.parent().unwrap_or_else(|| Path::new("."));
    anchor(&mut config.site_root, base);
    for explicit in [
        &mut config.repositories,
        &mut config.cache,
        &mut config.inventory,
        &mut config.posts_dir,
        &mut config.icons_dir,
        &mut config.platforms_dir,
    ]
    .into_iter()
    .flatten()
    {
        anchor(explicit, base);
    }

    config.trace_loaded();
    Ok(config)
}

fn anchor(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_relative_paths_only() {
        let mut relative = PathBuf::from("site");
        anchor(&mut relative, Path::new("/etc/pocket"));
        assert_eq!(relative, PathBuf::from("/etc/pocket/site"));

        let mut absolute = PathBuf::from("/srv/site");
        anchor(&mut absolute, Path::new("/etc/pocket"));
        assert_eq!(absolute, PathBuf::from("/srv/site"));
    }
}
