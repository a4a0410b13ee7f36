//! Full resynchronization: archive the live collections, repopulate them
//! from the board, roll back on failure, prune old archives.
//!
//! Live collections always end up holding either the pre-refresh or the
//! post-refresh state. Assumes it is the only refresh running.

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, instrument, warn};

use crate::config::RefreshConfig;
use crate::error::{RefreshPhase, Result, SyncError};
use crate::fetch::Trello;
use crate::metrics::record_refresh;
use crate::populate::{populate_all, PopulateSummary};
use crate::storage::{CollectionName, DocumentStore};

const ARCHIVE_DATE_FORMAT: &str = "%Y-%m-%d";

/// `<YYYY-MM-DD>_<collection>`
pub fn archive_name(date: NaiveDate, collection: CollectionName) -> String {
    format!("{}_{}", date.format(ARCHIVE_DATE_FORMAT), collection)
}

/// Splits an archive name back into its date and collection.
pub fn parse_archive_name(name: &str) -> Option<(NaiveDate, CollectionName)> {
    let (date, rest) = name.split_once('_')?;
    let date = NaiveDate::parse_from_str(date, ARCHIVE_DATE_FORMAT).ok()?;
    let collection = CollectionName::ALL.into_iter().find(|c| c.as_str() == rest)?;
    Some((date, collection))
}

/// First day an archive is kept for; `None` when the window does not fit
/// the calendar.
pub fn retention_cutoff(today: NaiveDate, retention_days: i64) -> Option<NaiveDate> {
    ChronoDuration::try_days(retention_days).and_then(|window| today.checked_sub_signed(window))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub archived: Vec<String>,
    pub populated: PopulateSummary,
    pub pruned: Vec<String>,
}

/// A collection moved aside during archiving.
#[derive(Debug, Clone)]
struct Renamed {
    original: String,
    archive: String,
}

pub struct Refresher {
    store: Arc<dyn DocumentStore>,
    trello: Arc<Trello>,
    config: RefreshConfig,
}

impl Refresher {
    pub fn new(store: Arc<dyn DocumentStore>, trello: Arc<Trello>, config: RefreshConfig) -> Self {
        Self { store, trello, config }
    }

    pub async fn run(&self) -> Result<RefreshReport> {
        self.run_at(Utc::now().date_naive()).await
    }

    #[instrument(skip(self))]
    pub async fn run_at(&self, today: NaiveDate) -> Result<RefreshReport> {
        let result = self.refresh(today).await;
        record_refresh(if result.is_ok() { "ok" } else { "error" });
        result
    }

    async fn refresh(&self, today: NaiveDate) -> Result<RefreshReport> {
        info!(phase = %RefreshPhase::Archiving, "Archiving current collections");
        let renamed = self.archive(today).await.map_err(|e| {
            error!(phase = %RefreshPhase::Archiving, "Archiving failed: {}", e);
            SyncError::refresh(RefreshPhase::Archiving, e)
        })?;

        info!(phase = %RefreshPhase::Repopulating, "Repopulating collections");
        let populated = match populate_all(self.store.as_ref(), &self.trello, self.config.detail_delay()).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(phase = %RefreshPhase::Repopulating, "Repopulating failed, restoring archives: {}", e);
                self.restore(&renamed).await;
                return Err(SyncError::refresh(RefreshPhase::Repopulating, e));
            }
        };

        info!(phase = %RefreshPhase::Pruning, "Pruning archives older than {} days", self.config.retention_days);
        let pruned = self.prune(today).await;

        info!(
            "Refresh finished: {} tags, {} recipes, {} details",
            populated.tags, populated.recipes, populated.details
        );
        Ok(RefreshReport {
            archived: renamed.into_iter().map(|r| r.archive).collect(),
            populated,
            pruned,
        })
    }

    /// Renames every live collection to its dated archive name. On failure
    /// the renames done so far are undone before the error is returned.
    async fn archive(&self, today: NaiveDate) -> Result<Vec<Renamed>> {
        let existing = self.store.list_collections().await?;
        let mut renamed = Vec::new();

        for collection in CollectionName::ALL {
            let original = collection.as_str();
            if !existing.iter().any(|name| name == original) {
                info!("Collection {} does not exist yet, nothing to archive", original);
                continue;
            }

            let archive = archive_name(today, collection);
            let step = async {
                if existing.iter().any(|name| *name == archive) {
                    warn!("Replacing earlier archive {} from today", archive);
                    self.store.drop_collection(&archive).await?;
                }
                self.store.rename_collection(original, &archive).await
            };

            if let Err(e) = step.await {
                self.undo_renames(&renamed).await;
                return Err(e);
            }
            info!("Archived {} as {}", original, archive);
            renamed.push(Renamed {
                original: original.to_string(),
                archive,
            });
        }

        Ok(renamed)
    }

    async fn undo_renames(&self, renamed: &[Renamed]) {
        for r in renamed.iter().rev() {
            match self.store.rename_collection(&r.archive, &r.original).await {
                Ok(()) => info!("Restored {} from {}", r.original, r.archive),
                Err(e) => error!("Could not restore {} from {}: {}", r.original, r.archive, e),
            }
        }
    }

    /// Drops whatever the failed repopulation wrote, then moves the archives
    /// back into place.
    async fn restore(&self, renamed: &[Renamed]) {
        for collection in CollectionName::ALL {
            if let Err(e) = self.store.drop_collection(collection.as_str()).await {
                error!("Could not drop partial collection {}: {}", collection, e);
            }
        }
        self.undo_renames(renamed).await;
    }

    /// Drops archives older than the retention window. Failures are logged
    /// and skipped.
    async fn prune(&self, today: NaiveDate) -> Vec<String> {
        let Some(cutoff) = retention_cutoff(today, self.config.retention_days) else {
            warn!(
                phase = %RefreshPhase::Pruning,
                "Retention of {} days is out of range, skipping pruning", self.config.retention_days
            );
            return Vec::new();
        };
        let names = match self.store.list_collections().await {
            Ok(names) => names,
            Err(e) => {
                warn!(phase = %RefreshPhase::Pruning, "Could not list collections: {}", e);
                return Vec::new();
            }
        };

        let mut pruned = Vec::new();
        for name in names {
            let Some((date, _)) = parse_archive_name(&name) else {
                continue;
            };
            if date >= cutoff {
                continue;
            }
            match self.store.drop_collection(&name).await {
                Ok(()) => {
                    info!("Pruned archive {}", name);
                    pruned.push(name);
                }
                Err(e) => warn!(phase = %RefreshPhase::Pruning, "Could not prune {}: {}", name, e),
            }
        }
        pruned
    }
}

/// Runs the refresh every `period` on one task, so runs never overlap.
pub fn spawn_schedule(refresher: Arc<Refresher>, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            info!("Starting scheduled refresh");
            if let Err(e) = refresher.run().await {
                error!("Scheduled refresh failed: {}", e);
            }
        }
    })
}
