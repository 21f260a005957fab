//! Replaces the persisted summary and monthly tables with a fresh batch.
//!
//! Delete-then-insert, one chunk at a time. Nothing is rolled back: if a call
//! fails the tables are in whatever state the completed calls left them, and
//! the whole file has to be ingested again.

use crate::error::LoadError;
use crate::records::{MonthlyRecord, SummaryRecord};
use std::future::Future;
use tracing::info;

/// Rows per insert call. The hosted store rejects larger requests.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Destination for the two record kinds.
pub trait SalesStore {
    fn delete_all(&self, table: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn insert_summary(
        &self,
        table: &str,
        rows: &[SummaryRecord],
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn insert_monthly(
        &self,
        table: &str,
        rows: &[MonthlyRecord],
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// Physical table names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub summary: String,
    pub monthly: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            summary: "vendas_resumo".to_string(),
            monthly: "vendas_mensais".to_string(),
        }
    }
}

/// The first chunk that failed. `chunk` is 1-based.
#[derive(Debug)]
pub struct ChunkError<E> {
    pub chunk: usize,
    pub source: E,
}

/// Run `f` over `items` in chunks of `chunk_size`, awaiting each call before
/// starting the next. Stops at the first failure. Returns the number of
/// chunks processed.
pub async fn for_each_chunk<'a, T, F, Fut, E>(
    items: &'a [T],
    chunk_size: usize,
    mut f: F,
) -> Result<usize, ChunkError<E>>
where
    F: FnMut(usize, &'a [T]) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let mut done = 0;
    for (idx, chunk) in items.chunks(chunk_size.max(1)).enumerate() {
        let chunk_no = idx + 1;
        f(chunk_no, chunk)
            .await
            .map_err(|source| ChunkError {
                chunk: chunk_no,
                source,
            })?;
        done = chunk_no;
    }
    Ok(done)
}

fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub summary_chunks: usize,
    pub monthly_chunks: usize,
}

/// Delete both tables (monthly first), then insert `summary` and `monthly`
/// in chunks.
pub async fn replace_all<S: SalesStore>(
    store: &S,
    tables: &Tables,
    summary: &[SummaryRecord],
    monthly: &[MonthlyRecord],
    chunk_size: usize,
) -> Result<LoadSummary, LoadError> {
    for table in [&tables.monthly, &tables.summary] {
        info!(table = %table, "deleting existing rows");
        store
            .delete_all(table)
            .await
            .map_err(|source| LoadError::Delete {
                table: table.clone(),
                source,
            })?;
    }

    let total = chunk_count(summary.len(), chunk_size);
    info!(table = %tables.summary, rows = summary.len(), chunks = total, "inserting summary rows");
    let summary_chunks = for_each_chunk(summary, chunk_size, |chunk, rows| {
        info!(table = %tables.summary, "chunk {}/{} ({} rows)", chunk, total, rows.len());
        store.insert_summary(&tables.summary, rows)
    })
    .await
    .map_err(|e| LoadError::Insert {
        table: tables.summary.clone(),
        chunk: e.chunk,
        source: e.source,
    })?;

    let total = chunk_count(monthly.len(), chunk_size);
    info!(table = %tables.monthly, rows = monthly.len(), chunks = total, "inserting monthly rows");
    let monthly_chunks = for_each_chunk(monthly, chunk_size, |chunk, rows| {
        info!(table = %tables.monthly, "chunk {}/{} ({} rows)", chunk, total, rows.len());
        store.insert_monthly(&tables.monthly, rows)
    })
    .await
    .map_err(|e| LoadError::Insert {
        table: tables.monthly.clone(),
        chunk: e.chunk,
        source: e.source,
    })?;

    Ok(LoadSummary {
        summary_chunks,
        monthly_chunks,
    })
}
