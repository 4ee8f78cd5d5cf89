//! GitHub-backed repository metadata: funding files and latest releases.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::contract::{Funding, ReleaseInfo, RepositoryMetadata};
use crate::error::MetadataError;
use crate::repositories::RepositoryDescriptor;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_WEB_BASE: &str = "https://github.com";
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("pocket-inventory/", env!("CARGO_PKG_VERSION"));
const FUNDING_PATH: &str = ".github/FUNDING.yml";

/// Endpoints and credentials shared by the metadata client and the archive downloader.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_base: String,
    pub web_base: String,
    pub raw_base: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
            raw_base: DEFAULT_RAW_BASE.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GithubConfig {
    /// Default endpoints, with the token taken from `GITHUB_TOKEN` if set.
    pub fn from_env(timeout: Duration) -> Self {
        let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        info!(token_set = token.is_some(), timeout_secs = timeout.as_secs(), "GitHub configuration");
        Self {
            token,
            timeout,
            ..Self::default()
        }
    }

    pub fn http_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()
    }

    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseJson {
    tag_name: String,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    draft: bool,
}

/// Talks to the GitHub REST API and raw content host.
pub struct GithubClient {
    config: GithubConfig,
    client: Client,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Result<Self, MetadataError> {
        let client = config.http_client().map_err(|e| MetadataError::Request {
            url: config.api_base.clone(),
            message: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self { config, client })
    }

    async fn get_text(&self, url: &str) -> Result<Option<String>, MetadataError> {
        let response = self
            .config
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| MetadataError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url, "Not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MetadataError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(|e| MetadataError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(body))
    }
}

#[async_trait]
impl RepositoryMetadata for GithubClient {
    async fn funding(
        &self,
        repository: &RepositoryDescriptor,
    ) -> Result<Option<Funding>, MetadataError> {
        let url = format!(
            "{}/{}/HEAD/{}",
            self.config.raw_base,
            repository.slug(),
            FUNDING_PATH
        );
        let Some(body) = self.get_text(&url).await? else {
            return Ok(None);
        };
        let funding = parse_funding(&body).map_err(|message| MetadataError::Decode {
            url: url.clone(),
            message,
        })?;
        info!(repository = %repository.slug(), "Fetched funding information");
        Ok(funding)
    }

    async fn latest_release(
        &self,
        repository: &RepositoryDescriptor,
    ) -> Result<Option<ReleaseInfo>, MetadataError> {
        let url = format!("{}/repos/{}/releases", self.config.api_base, repository.slug());
        let Some(body) = self.get_text(&url).await? else {
            return Ok(None);
        };
        let releases: Vec<ReleaseJson> =
            serde_json::from_str(&body).map_err(|e| MetadataError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let release = pick_release(releases, repository.prerelease);
        match &release {
            Some(r) => info!(repository = %repository.slug(), tag = %r.tag_name, "Found latest release"),
            None => warn!(repository = %repository.slug(), "Repository has no eligible release"),
        }
        Ok(release)
    }
}

fn pick_release(releases: Vec<ReleaseJson>, allow_prerelease: bool) -> Option<ReleaseInfo> {
    releases
        .into_iter()
        .find(|r| !r.draft && (allow_prerelease || !r.prerelease))
        .map(|r| ReleaseInfo {
            tag_name: r.tag_name,
            prerelease: r.prerelease,
        })
}

/// Parses a FUNDING.yml body. An empty file or one with no known keys is `None`.
pub fn parse_funding(body: &str) -> Result<Option<Funding>, String> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let funding: Option<Funding> = serde_yaml::from_str(body).map_err(|e| e.to_string())?;
    Ok(funding.filter(|f| *f != Funding::default()))
}
