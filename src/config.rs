use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::sponsor::{SponsorRule, SponsorRules};

pub const DATA_DIRECTORY: &str = "_data";
pub const POSTS_DIRECTORY: &str = "_posts";
pub const REPOSITORIES_FILE: &str = "repositories.yml";
pub const CORES_FILE: &str = "cores.yml";
pub const CACHE_FILE: &str = "cache.json";
pub const AUTHOR_IMAGES: &str = "assets/images/authors";
pub const PLATFORM_IMAGES: &str = "assets/images/platforms";

/// Run configuration. Every path defaults to the Jekyll site layout under `site_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_site_root")]
    pub site_root: PathBuf,
    #[serde(default)]
    pub repositories: Option<PathBuf>,
    #[serde(default)]
    pub cache: Option<PathBuf>,
    #[serde(default)]
    pub inventory: Option<PathBuf>,
    #[serde(default)]
    pub posts_dir: Option<PathBuf>,
    #[serde(default)]
    pub icons_dir: Option<PathBuf>,
    #[serde(default)]
    pub platforms_dir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "SponsorRules::default_rules")]
    pub sponsor_rules: Vec<SponsorRule>,
}

fn default_site_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_root: default_site_root(),
            repositories: None,
            cache: None,
            inventory: None,
            posts_dir: None,
            icons_dir: None,
            platforms_dir: None,
            http_timeout_secs: default_timeout_secs(),
            sponsor_rules: SponsorRules::default_rules(),
        }
    }
}

impl Config {
    fn resolve(&self, explicit: &Option<PathBuf>, default: &str) -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| self.site_root.join(default))
    }

    pub fn repositories_path(&self) -> PathBuf {
        self.resolve(
            &self.repositories,
            &format!("{DATA_DIRECTORY}/{REPOSITORIES_FILE}"),
        )
    }

    pub fn cache_path(&self) -> PathBuf {
        self.resolve(&self.cache, &format!("{DATA_DIRECTORY}/{CACHE_FILE}"))
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.resolve(&self.inventory, &format!("{DATA_DIRECTORY}/{CORES_FILE}"))
    }

    pub fn posts_path(&self) -> PathBuf {
        self.resolve(&self.posts_dir, POSTS_DIRECTORY)
    }

    pub fn icons_path(&self) -> PathBuf {
        self.resolve(&self.icons_dir, AUTHOR_IMAGES)
    }

    pub fn platforms_path(&self) -> PathBuf {
        self.resolve(&self.platforms_dir, PLATFORM_IMAGES)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn trace_loaded(&self) {
        info!(
            site_root = %self.site_root.display(),
            repositories = %self.repositories_path().display(),
            inventory = %self.inventory_path().display(),
            sponsor_rules = self.sponsor_rules.len(),
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_site_layout() {
        let config: Config = serde_yaml::from_str("site_root: /srv/site\n").unwrap();
        assert_eq!(
            config.repositories_path(),
            PathBuf::from("/srv/site/_data/repositories.yml")
        );
        assert_eq!(config.cache_path(), PathBuf::from("/srv/site/_data/cache.json"));
        assert_eq!(config.inventory_path(), PathBuf::from("/srv/site/_data/cores.yml"));
        assert_eq!(config.posts_path(), PathBuf::from("/srv/site/_posts"));
        assert_eq!(
            config.icons_path(),
            PathBuf::from("/srv/site/assets/images/authors")
        );
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
        assert_eq!(config.sponsor_rules, SponsorRules::default_rules());
    }

    #[test]
    fn explicit_paths_win() {
        let yaml = "cache: /tmp/c.json\nhttp_timeout_secs: 5\nsponsor_rules: []\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/c.json"));
        assert_eq!(config.inventory_path(), PathBuf::from("./_data/cores.yml"));
        assert_eq!(config.http_timeout_secs, 5);
        assert!(config.sponsor_rules.is_empty());
    }
}
