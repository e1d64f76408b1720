use crate::aggregate::{HotspotAggregator, RecomputeStatus};
use crate::auth::Session;
use crate::error::Result;
use crate::record::{NewSighting, Sighting};
use crate::store::SightingStore;
use csv::ReaderBuilder;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;

/// Result of logging one sighting through [`FieldLog::submit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub sighting: Sighting,
    pub status: RecomputeStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    /// Appended rows in id order.
    pub appended: Vec<Sighting>,
    pub failed: usize,
    pub status: RecomputeStatus,
}

/// The sightings ledger and its hotspot table behind one writer lock.
///
/// Every append and every recompute holds the lock, so ids are assigned from
/// a consistent maximum and a recompute never reads a half-appended ledger.
/// The lock is a mutex for tasks in this process plus an exclusive advisory
/// lock on `<ledger>.lock` for other processes sharing the same files.
pub struct FieldLog {
    store: SightingStore,
    aggregator: HotspotAggregator,
    lock: Mutex<()>,
    lock_path: PathBuf,
}

/// Fields drop in order, so the file lock goes before the mutex.
struct LedgerGuard<'a> {
    _file: File,
    _mutex: MutexGuard<'a, ()>,
}

pub fn lock_path_for(ledger: &Path) -> PathBuf {
    let mut name = ledger.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

impl FieldLog {
    pub fn new(store: SightingStore, aggregator: HotspotAggregator) -> Self {
        let lock_path = lock_path_for(store.path());
        Self {
            store,
            aggregator,
            lock: Mutex::new(()),
            lock_path,
        }
    }

    pub fn store(&self) -> &SightingStore {
        &self.store
    }

    pub fn aggregator(&self) -> &HotspotAggregator {
        &self.aggregator
    }

    fn guard(&self) -> Result<LedgerGuard<'_>> {
        // The guarded data is (), a panicked holder leaves nothing to repair.
        let mutex = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        file.lock()?;
        debug!("Acquired {}", self.lock_path.display());

        Ok(LedgerGuard {
            _file: file,
            _mutex: mutex,
        })
    }

    pub fn append(&self, new: NewSighting) -> Result<Sighting> {
        let _guard = self.guard()?;
        self.store.append(new)
    }

    pub fn recompute(&self) -> Result<RecomputeStatus> {
        let _guard = self.guard()?;
        self.aggregator.recompute(&self.store)
    }

    /// Append a sighting for a logged-in observer and refresh the hotspot
    /// table before releasing the lock.
    pub fn submit(&self, session: &Session, new: NewSighting) -> Result<Submission> {
        let user = session.require_user()?;
        let _guard = self.guard()?;

        let sighting = self.store.append(new)?;
        info!("Sighting {} submitted by {}", sighting.id, user);

        let status = self.aggregator.recompute(&self.store)?;
        if !status.is_updated() {
            warn!("Data saved, but map update skipped (no data yet)");
        }
        Ok(Submission { sighting, status })
    }

    /// Append a batch concurrently, bounded by `max_concurrent`, then
    /// recompute once. Rows that fail to append are counted, not retried.
    pub async fn import(
        self: Arc<Self>,
        session: &Session,
        rows: Vec<NewSighting>,
        max_concurrent: usize,
    ) -> Result<ImportReport> {
        session.require_user()?;
        let total = rows.len();

        let progress_bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {percent:>3}% {msg}")
        {
            progress_bar.set_style(style.progress_chars("##-"));
        }
        progress_bar.set_message("Importing sightings");

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let pb = Arc::new(progress_bar);
        let mut tasks = Vec::new();

        for row in rows {
            let permit = Arc::clone(&semaphore);
            let log = Arc::clone(&self);
            let progress = Arc::clone(&pb);

            let task = async move {
                let _permit = permit.acquire_owned().await.ok();
                let result = tokio::task::spawn_blocking(move || log.append(row)).await;
                progress.inc(1);
                result
            };
            tasks.push(task);
        }

        let results = join_all(tasks).await;
        pb.finish_and_clear();

        let mut appended = Vec::with_capacity(total);
        let mut failed = 0;
        for result in results {
            match result {
                Ok(Ok(sighting)) => appended.push(sighting),
                Ok(Err(e)) => {
                    error!("Failed to append sighting: {}", e);
                    failed += 1;
                }
                Err(e) => {
                    error!("Append task failed: {}", e);
                    failed += 1;
                }
            }
        }
        appended.sort_by_key(|s| s.id);
        info!("Imported {} out of {} sightings", appended.len(), total);

        let log = Arc::clone(&self);
        let status = tokio::task::spawn_blocking(move || log.recompute()).await??;
        Ok(ImportReport {
            appended,
            failed,
            status,
        })
    }
}

/// Read a batch of unnumbered sightings for [`FieldLog::import`].
pub fn read_batch(path: &Path) -> Result<Vec<NewSighting>> {
    let mut reader = ReaderBuilder::new().from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
