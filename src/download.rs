//! Repository acquisition: download a GitHub archive snapshot and unpack it
//! into a private temporary directory.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tempfile::TempDir;
use tracing::{debug, error, info};

use crate::contract::{AcquiredRepository, Acquirer};
use crate::error::AcquisitionError;
use crate::github::GithubConfig;
use crate::repositories::RepositoryDescriptor;

const ARCHIVE_FILE: &str = "snapshot.zip";
const EXTRACT_DIR: &str = "src";

/// Downloads `GET /repos/<owner>/<name>/zipball` for each repository.
pub struct GithubArchiveDownloader {
    config: GithubConfig,
    client: Client,
    work_root: PathBuf,
}

impl GithubArchiveDownloader {
    pub fn new(config: GithubConfig) -> Result<Self, AcquisitionError> {
        let client = config.http_client().map_err(|e| AcquisitionError::Network {
            url: config.api_base.clone(),
            message: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self {
            config,
            client,
            work_root: std::env::temp_dir(),
        })
    }

    /// Creates extraction directories under `work_root` instead of the system temp dir.
    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    pub fn archive_url(&self, repository: &RepositoryDescriptor) -> String {
        format!("{}/repos/{}/zipball", self.config.api_base, repository.slug())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, AcquisitionError> {
        let network = |message: String| AcquisitionError::Network {
            url: url.to_string(),
            message,
        };
        let response = self
            .config
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let io_err = |e: std::io::Error| AcquisitionError::Io {
            message: e.to_string(),
            path: Some(dest.to_path_buf()),
            source: Some(e),
        };
        let mut file = File::create(dest).map_err(io_err)?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| network(format!("error reading download chunk: {e}")))?;
            file.write_all(&chunk).map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().map_err(io_err)?;
        Ok(written)
    }
}

#[async_trait]
impl Acquirer for GithubArchiveDownloader {
    async fn acquire(
        &self,
        repository: &RepositoryDescriptor,
    ) -> Result<AcquiredRepository, AcquisitionError> {
        // Owned by the returned guard on success, dropped (and removed) on every error path.
        let dir = TempDir::with_prefix_in("pocket-inventory-", &self.work_root).map_err(|e| {
            AcquisitionError::Io {
                message: format!("failed to create temporary directory: {e}"),
                path: Some(self.work_root.clone()),
                source: Some(e),
            }
        })?;

        let url = self.archive_url(repository);
        let archive = dir.path().join(ARCHIVE_FILE);
        info!(repository = %repository.slug(), url = %url, "Downloading repository snapshot");
        let bytes = self.download(&url, &archive).await.map_err(|e| {
            error!(repository = %repository.slug(), error = %e, "Download failed");
            e
        })?;
        debug!(repository = %repository.slug(), bytes, "Download complete");

        let (zip_path, dest) = (archive.clone(), dir.path().join(EXTRACT_DIR));
        tokio::task::spawn_blocking(move || extract_zip(&zip_path, &dest))
            .await
            .map_err(|e| AcquisitionError::Archive {
                message: format!("extraction task failed: {e}"),
            })??;
        fs::remove_file(&archive).map_err(|e| AcquisitionError::Io {
            message: format!("failed to remove archive: {e}"),
            path: Some(archive.clone()),
            source: Some(e),
        })?;
        info!(repository = %repository.slug(), path = %dir.path().display(), "Repository extracted");
        Ok(AcquiredRepository::new(dir))
    }

    fn download_url(&self, repository: &RepositoryDescriptor) -> String {
        public_download_url(&self.config.web_base, repository)
    }
}

/// Latest-release page for release-tracked repositories, otherwise the default-branch archive.
pub fn public_download_url(web_base: &str, repository: &RepositoryDescriptor) -> String {
    if repository.release {
        format!("{web_base}/{}/releases/latest", repository.slug())
    } else {
        format!("{web_base}/{}/archive/HEAD.zip", repository.slug())
    }
}

/// Unpacks `archive` into `dest`, skipping entries that would escape it.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<(), AcquisitionError> {
    let io_err = |message: &str, path: &Path, e: std::io::Error| AcquisitionError::Io {
        message: format!("{message}: {e}"),
        path: Some(path.to_path_buf()),
        source: Some(e),
    };

    let file = File::open(archive).map_err(|e| io_err("failed to open zip archive", archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| AcquisitionError::Archive {
        message: format!("invalid zip archive: {e}"),
    })?;
    fs::create_dir_all(dest).map_err(|e| io_err("failed to create extract directory", dest, e))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| AcquisitionError::Archive {
            message: format!("failed to read zip entry {i}: {e}"),
        })?;
        let Some(relative) = entry.enclosed_name() else {
            debug!(name = entry.name(), "Skipping zip entry outside extraction root");
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)
                .map_err(|e| io_err("failed to create directory", &outpath, e))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| io_err("failed to create parent directory", parent, e))?;
        }
        let mut outfile =
            File::create(&outpath).map_err(|e| io_err("failed to create file", &outpath, e))?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| AcquisitionError::Archive {
            message: format!("failed to extract {}: {e}", outpath.display()),
        })?;
    }
    debug!(archive = %archive.display(), entries = zip.len(), "Extracted archive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn descriptor(release: bool) -> RepositoryDescriptor {
        RepositoryDescriptor {
            owner: "ownerA".into(),
            name: "coreX".into(),
            display_name: "Core X".into(),
            release,
            prerelease: false,
        }
    }

    #[test]
    fn public_urls() {
        assert_eq!(
            public_download_url("https://github.com", &descriptor(true)),
            "https://github.com/ownerA/coreX/releases/latest"
        );
        assert_eq!(
            public_download_url("https://github.com", &descriptor(false)),
            "https://github.com/ownerA/coreX/archive/HEAD.zip"
        );
    }

    #[test]
    fn archive_url_uses_api_base() {
        let downloader = GithubArchiveDownloader::new(GithubConfig {
            api_base: "http://localhost:9".into(),
            ..GithubConfig::default()
        })
        .unwrap();
        assert_eq!(
            downloader.archive_url(&descriptor(false)),
            "http://localhost:9/repos/ownerA/coreX/zipball"
        );
    }

    #[test]
    fn extracts_nested_entries() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        {
            let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
            let options = SimpleFileOptions::default();
            writer.add_directory("ownerA-coreX-abc/", options).unwrap();
            writer
                .start_file("ownerA-coreX-abc/Cores/ownerA.coreX/core.json", options)
                .unwrap();
            writer.write_all(b"{}").unwrap();
            writer.finish().unwrap();
        }
        let dest = dir.path().join("out");
        extract_zip(&archive, &dest).unwrap();
        let extracted = dest.join("ownerA-coreX-abc/Cores/ownerA.coreX/core.json");
        assert_eq!(fs::read_to_string(extracted).unwrap(), "{}");
    }

    #[test]
    fn corrupt_archive_is_an_acquisition_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bad.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();
        let err = extract_zip(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, AcquisitionError::Archive { .. }));
    }

    #[tokio::test]
    async fn failed_download_leaves_no_directory_behind() {
        let work_root = tempdir().unwrap();
        let downloader = GithubArchiveDownloader::new(GithubConfig {
            // Port 9 (discard) refuses connections on test machines.
            api_base: "http://127.0.0.1:9".into(),
            timeout: std::time::Duration::from_secs(5),
            ..GithubConfig::default()
        })
        .unwrap()
        .with_work_root(work_root.path());
        let result = downloader.acquire(&descriptor(false)).await;
        assert!(matches!(result, Err(AcquisitionError::Network { .. })));
        assert_eq!(fs::read_dir(work_root.path()).unwrap().count(), 0);
    }
}
