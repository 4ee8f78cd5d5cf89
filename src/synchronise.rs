//! High-level pipeline: acquire → parse → diff against the cache → export → aggregate.
//!
//! Repositories are processed one at a time. Each repository step returns its
//! own list of records; [`Synchroniser::synchronise`] folds those lists into
//! owner groups, so no result state is shared between repository steps.
//!
//! # Failure isolation
//! - A repository that cannot be downloaded, extracted or listed is logged and
//!   reported, and contributes no cores.
//! - A core whose definition is missing or malformed is logged and skipped;
//!   its siblings are still processed.
//! - Optional resources (icons, info text, updater files, funding, releases)
//!   never fail a core.
//!
//! # Cost model
//! Cores whose version matches the cache reuse the stored record and trigger
//! no network, image or post work at all.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::cache::{CacheDecision, VersionCache};
use crate::config::Config;
use crate::contract::{
    Acquirer, AssetExporter, ChangeKind, Funding, PostPayload, PostSink, ReleaseInfo,
    RepositoryMetadata,
};
use crate::definition::{Core, Lookup, PocketTree};
use crate::error::{ParseError, RepositoryError, SyncError};
use crate::output::write_inventory;
use crate::record::{CoreRecord, Inventory, OwnerGroup, RecordInputs};
use crate::repositories::{load_repositories, RepositoryDescriptor};
use crate::sponsor::SponsorPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRepository {
    pub repository: String,
    pub error: String,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub repositories_processed: usize,
    pub repositories_failed: Vec<FailedRepository>,
    pub cores_new: usize,
    pub cores_updated: usize,
    pub cores_unchanged: usize,
    pub cores_skipped: usize,
    pub cores_failed: usize,
}

impl SyncReport {
    fn absorb(&mut self, other: &SyncReport) {
        self.cores_new += other.cores_new;
        self.cores_updated += other.cores_updated;
        self.cores_unchanged += other.cores_unchanged;
        self.cores_skipped += other.cores_skipped;
        self.cores_failed += other.cores_failed;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub inventory: Inventory,
    pub report: SyncReport,
}

/// Records produced by one repository plus its counters.
#[derive(Debug, Default)]
pub struct RepositoryOutcome {
    pub records: Vec<CoreRecord>,
    pub report: SyncReport,
}

/// Per-repository values fetched at most once, and only if some core changed.
#[derive(Default)]
struct RepositoryContext {
    download_url: Option<String>,
    funding: Option<Option<Funding>>,
    release: Option<Option<ReleaseInfo>>,
}

/// Drives the pipeline over a set of collaborators.
pub struct Synchroniser<'a> {
    pub acquirer: &'a dyn Acquirer,
    pub metadata: &'a dyn RepositoryMetadata,
    pub exporter: &'a dyn AssetExporter,
    pub posts: &'a dyn PostSink,
    pub sponsor: &'a dyn SponsorPolicy,
}

impl<'a> Synchroniser<'a> {
    /// Processes every repository and returns the owner-grouped, id-sorted inventory.
    pub async fn synchronise(
        &self,
        repositories: &[RepositoryDescriptor],
        cache: &mut VersionCache,
    ) -> SyncOutcome {
        info!(repositories = repositories.len(), "[SYNC] Starting synchronisation");
        let mut exported_platforms = HashSet::new();
        let mut report = SyncReport::default();
        let mut results = Vec::with_capacity(repositories.len());

        for repository in repositories {
            match self
                .sync_repository(repository, cache, &mut exported_platforms)
                .await
            {
                Ok(outcome) => {
                    report.repositories_processed += 1;
                    report.absorb(&outcome.report);
                    results.push((repository, outcome.records));
                }
                Err(e) => {
                    error!(repository = %repository.slug(), error = %e, "[SYNC][ERROR] Repository failed");
                    report.repositories_failed.push(FailedRepository {
                        repository: repository.slug(),
                        error: e.to_string(),
                    });
                    results.push((repository, Vec::new()));
                }
            }
        }

        let inventory = group_by_owner(results);
        info!(
            owners = inventory.len(),
            new = report.cores_new,
            updated = report.cores_updated,
            unchanged = report.cores_unchanged,
            failed_repositories = report.repositories_failed.len(),
            "[SYNC] Synchronisation complete"
        );
        SyncOutcome { inventory, report }
    }

    /// Runs one repository from acquisition to cleanup.
    pub async fn sync_repository(
        &self,
        repository: &RepositoryDescriptor,
        cache: &mut VersionCache,
        exported_platforms: &mut HashSet<String>,
    ) -> Result<RepositoryOutcome, RepositoryError> {
        info!(repository = %repository.slug(), "[SYNC] Processing repository");
        // Dropping `acquired` removes the extraction directory, whichever way we leave.
        let acquired = self.acquirer.acquire(repository).await?;
        let tree = PocketTree::locate(acquired.root())?;
        let core_ids = tree.core_ids()?;
        debug!(repository = %repository.slug(), cores = core_ids.len(), "Found cores");

        let mut outcome = RepositoryOutcome::default();
        let mut context = RepositoryContext::default();

        for core_id in &core_ids {
            let core = match tree.read_core(core_id) {
                Ok(core) => core,
                Err(ParseError::MissingFile(path)) => {
                    warn!(core_id = %core_id, path = %path.display(), "Core is missing a definition file, skipping");
                    outcome.report.cores_skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(core_id = %core_id, error = %e, "Failed to parse core");
                    outcome.report.cores_failed += 1;
                    continue;
                }
            };

            let version = core.definition.version.clone();
            let kind = match cache.classify(core_id, &version) {
                CacheDecision::Unchanged(record) => {
                    debug!(core_id = %core_id, version = %version, "Core unchanged, reusing cached record");
                    outcome.report.cores_unchanged += 1;
                    outcome.records.push(record);
                    continue;
                }
                CacheDecision::New => ChangeKind::New,
                CacheDecision::Updated { previous_version } => {
                    info!(core_id = %core_id, from = %previous_version, to = %version, "Core version changed");
                    ChangeKind::Update
                }
            };

            match self
                .process_core(repository, &tree, &core, kind, &mut context, exported_platforms)
                .await
            {
                Ok(record) => {
                    if let Err(e) = cache.store(core_id, &version, &record) {
                        error!(core_id = %core_id, error = %e, "Failed to cache core record");
                    }
                    match kind {
                        ChangeKind::New => outcome.report.cores_new += 1,
                        ChangeKind::Update => outcome.report.cores_updated += 1,
                    }
                    outcome.records.push(record);
                }
                Err(e) => {
                    error!(core_id = %core_id, error = %e, "Failed to process core");
                    outcome.report.cores_failed += 1;
                }
            }
        }

        drop(acquired);
        debug!(repository = %repository.slug(), "Removed extraction directory");
        Ok(outcome)
    }

    async fn process_core(
        &self,
        repository: &RepositoryDescriptor,
        tree: &PocketTree,
        core: &Core,
        kind: ChangeKind,
        context: &mut RepositoryContext,
        exported_platforms: &mut HashSet<String>,
    ) -> Result<CoreRecord, ParseError> {
        let definition = &core.definition;
        let platform = tree.platform(&definition.platform_id)?;

        if context.download_url.is_none() {
            context.download_url = Some(self.acquirer.download_url(repository));
        }
        if context.funding.is_none() {
            let funding = self.metadata.funding(repository).await.unwrap_or_else(|e| {
                warn!(repository = %repository.slug(), error = %e, "Funding lookup failed");
                None
            });
            context.funding = Some(funding);
        }
        if repository.release && context.release.is_none() {
            let release = self
                .metadata
                .latest_release(repository)
                .await
                .unwrap_or_else(|e| {
                    warn!(repository = %repository.slug(), error = %e, "Release lookup failed");
                    None
                });
            context.release = Some(release);
        }

        if let Err(e) = self.exporter.export_icon(tree, &definition.id) {
            warn!(core_id = %definition.id, error = %e, "Icon export failed");
        }
        // A platform counts as exported only once an image was actually written.
        if !exported_platforms.contains(&definition.platform_id) {
            match self
                .exporter
                .export_platform_image(tree, &definition.platform_id)
            {
                Ok(Some(_)) => {
                    exported_platforms.insert(definition.platform_id.clone());
                }
                Ok(None) => {
                    debug!(platform_id = %definition.platform_id, "Repository ships no platform image");
                }
                Err(e) => {
                    warn!(platform_id = %definition.platform_id, error = %e, "Platform image export failed");
                }
            }
        }

        let updater = match tree.updater(&definition.id) {
            Lookup::Found(updater) => Some(updater),
            Lookup::NotPresent => None,
            Lookup::Error(reason) => {
                warn!(core_id = %definition.id, reason = %reason, "Ignoring unreadable updater file");
                None
            }
        };
        let content = match tree.info(&definition.id) {
            Lookup::Found(text) => text,
            Lookup::NotPresent => String::new(),
            Lookup::Error(reason) => {
                warn!(core_id = %definition.id, reason = %reason, "Ignoring unreadable info file");
                String::new()
            }
        };

        let record = CoreRecord::build(RecordInputs {
            repository,
            core,
            platform,
            download_url: context.download_url.clone().unwrap_or_default(),
            release: context.release.as_ref().and_then(Option::as_ref),
            funding: context.funding.as_ref().and_then(Option::as_ref),
            sponsor_only: self.sponsor.sponsor_only(definition, &core.data_slots),
            updater,
        });

        let post = PostPayload {
            author: definition.author.clone(),
            shortname: definition.shortname.clone(),
            version: definition.version.clone(),
            kind,
            content,
        };
        if let Err(e) = self.posts.publish(&post) {
            warn!(core_id = %definition.id, error = %e, "Failed to create post");
        }

        info!(core_id = %definition.id, version = %definition.version, kind = kind.as_str(), "Processed core");
        Ok(record)
    }
}

/// Folds per-repository results into owner groups, in first-seen owner order,
/// each sorted by core id.
pub fn group_by_owner<'r>(
    results: impl IntoIterator<Item = (&'r RepositoryDescriptor, Vec<CoreRecord>)>,
) -> Inventory {
    let mut inventory: Inventory = Vec::new();
    for (repository, records) in results {
        match inventory
            .iter_mut()
            .find(|group| group.username == repository.owner)
        {
            Some(group) => group.cores.extend(records),
            None => inventory.push(OwnerGroup {
                username: repository.owner.clone(),
                cores: records,
            }),
        }
    }
    for group in &mut inventory {
        group.cores.sort_by(|a, b| a.id.cmp(&b.id));
    }
    inventory
}

/// Full run against files on disk: read the repository list and cache,
/// synchronise, then write the inventory and save the cache.
pub async fn run(config: &Config, synchroniser: &Synchroniser<'_>) -> Result<SyncReport, SyncError> {
    config.trace_loaded();
    let repositories = load_repositories(config.repositories_path())?;
    let mut cache = VersionCache::load(config.cache_path());

    let outcome = synchroniser.synchronise(&repositories, &mut cache).await;

    write_inventory(config.inventory_path(), &outcome.inventory)?;
    cache.save()?;
    Ok(outcome.report)
}
