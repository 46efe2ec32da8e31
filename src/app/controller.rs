use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use super::reconcile::{ReconciliationResult, reconcile};
use crate::catalog::{CatalogFetcher, ShowCatalog};
use crate::error::{FetchError, StoreError};
use crate::store::{self, ShowRecord, StoreSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    UpdateWatched { show_id: u32, episode_code: String },
    AddShow { show_id: u32 },
    DeleteShow { show_id: u32 },
}

#[derive(Debug, Clone)]
pub enum RowStatus {
    /// Marked `DONE`; the catalog was not consulted.
    Done,
    Reconciled {
        catalog: ShowCatalog,
        result: ReconciliationResult,
    },
    /// Catalog could not be fetched; counts are unknown, not zero.
    Unavailable { error: FetchError },
}

#[derive(Debug, Clone)]
pub struct ShowRow {
    pub record: ShowRecord,
    pub status: RowStatus,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub rows: Vec<ShowRow>,
    pub sort: Option<String>,
    /// Where the previous file went, when this cycle rewrote the store.
    pub backup: Option<PathBuf>,
}

pub struct TrackerController<F> {
    store_path: PathBuf,
    fetcher: F,
    concurrency: usize,
}

impl<F: CatalogFetcher> TrackerController<F> {
    pub fn new(store_path: PathBuf, fetcher: F, concurrency: usize) -> Self {
        Self {
            store_path,
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// One request cycle: load, apply at most one mutation, reconcile, persist if mutated.
    ///
    /// Mutation errors surface before any catalog request or file write.
    pub fn run_cycle(
        &self,
        mutation: Option<&Mutation>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, StoreError> {
        let mut snapshot = store::load(&self.store_path)?;
        if let Some(mutation) = mutation {
            apply_mutation(&mut snapshot, mutation, today)?;
        }

        let fetched = self.fetch_all(&snapshot.records);

        let mut backup = None;
        if mutation.is_some() {
            let names = snapshot
                .records
                .iter()
                .zip(&fetched)
                .filter_map(|(record, fetched)| match fetched {
                    Some(Ok(catalog)) => Some((record.show_id, catalog.name.clone())),
                    _ => None,
                })
                .collect::<Vec<_>>();
            for (show_id, name) in names {
                snapshot.refresh_display_name(show_id, &name);
            }
            backup = Some(store::persist(&self.store_path, &snapshot, now)?);
        }

        let rows = snapshot
            .records
            .iter()
            .zip(fetched)
            .map(|(record, fetched)| ShowRow {
                record: record.clone(),
                status: row_status(record, fetched, today),
            })
            .collect();

        Ok(CycleReport {
            rows,
            sort: snapshot.directive("SORT"),
            backup,
        })
    }

    /// Reconciles a single tracked show without touching the store.
    pub fn reconcile_show(&self, show_id: u32, today: NaiveDate) -> Result<ShowRow, StoreError> {
        let snapshot = store::load(&self.store_path)?;
        let record = snapshot
            .find(show_id)
            .cloned()
            .ok_or(StoreError::NotFound(show_id))?;
        let fetched = (!record.is_done()).then(|| self.fetch_logged(show_id));
        let status = row_status(&record, fetched, today);
        Ok(ShowRow { record, status })
    }

    fn fetch_logged(&self, show_id: u32) -> Result<ShowCatalog, FetchError> {
        let started = Instant::now();
        let fetched = self.fetcher.fetch(show_id);
        match &fetched {
            Ok(catalog) => debug!(
                "fetched show {show_id} ({} episodes) in {:?}",
                catalog.episodes.len(),
                started.elapsed()
            ),
            Err(err) => warn!("show {show_id}: {err}"),
        }
        fetched
    }

    /// Fetches catalogs for every record not marked `DONE`, in record order.
    fn fetch_all(&self, records: &[ShowRecord]) -> Vec<Option<Result<ShowCatalog, FetchError>>> {
        let fetch_one = |record: &ShowRecord| {
            (!record.is_done()).then(|| self.fetch_logged(record.show_id))
        };

        match ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
        {
            Ok(pool) => pool.install(|| records.par_iter().map(fetch_one).collect()),
            Err(err) => {
                warn!("fetch pool unavailable ({err}); fetching sequentially");
                records.iter().map(fetch_one).collect()
            }
        }
    }
}

pub(crate) fn apply_mutation(
    snapshot: &mut StoreSnapshot,
    mutation: &Mutation,
    today: NaiveDate,
) -> Result<(), StoreError> {
    match mutation {
        Mutation::UpdateWatched {
            show_id,
            episode_code,
        } => {
            let record = snapshot.apply_update(*show_id, episode_code, today)?;
            info!(
                "show {} marked watched up to {} on {}",
                record.show_id,
                record.last_watched,
                today.format("%Y-%m-%d")
            );
        }
        Mutation::AddShow { show_id } => {
            snapshot.apply_add(*show_id)?;
            info!("now tracking show {show_id}");
        }
        Mutation::DeleteShow { show_id } => snapshot.apply_delete(*show_id)?,
    }
    Ok(())
}

fn row_status(
    record: &ShowRecord,
    fetched: Option<Result<ShowCatalog, FetchError>>,
    today: NaiveDate,
) -> RowStatus {
    match fetched {
        None => RowStatus::Done,
        Some(Ok(catalog)) => {
            let result = reconcile(&record.last_watched, &catalog.episodes, today);
            RowStatus::Reconciled { catalog, result }
        }
        Some(Err(error)) => RowStatus::Unavailable { error },
    }
}
