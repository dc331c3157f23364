//! Bounded-size batch writes.
//!
//! Inputs are split into contiguous batches of at most [`MAX_BATCH_SIZE`]
//! records and written one call at a time, in input order, with the client's
//! request delay between calls. Batches never run concurrently: the store's
//! rate limit is global.

use std::future::Future;

use crate::client::StoreClient;
use crate::error::Result;
use crate::progress::{ProgressCallback, SyncProgress, emit};
use crate::types::{MAX_BATCH_SIZE, NewRecord, Record, RecordPatch, TableRef};

/// Split `items` into contiguous batches of at most [`MAX_BATCH_SIZE`].
pub fn partition<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(MAX_BATCH_SIZE)
}

/// Create records in batches.
///
/// Returns the created records in input order. The first failing batch
/// aborts the run; batches already written stay written.
pub async fn create_many(
    client: &StoreClient,
    table: &TableRef,
    records: &[NewRecord],
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<Record>> {
    write_batches(client, table, records, on_progress, |batch| {
        client.create_records(table, batch)
    })
    .await
}

/// Update records in batches.
///
/// Same ordering and failure semantics as [`create_many`].
pub async fn update_many(
    client: &StoreClient,
    table: &TableRef,
    patches: &[RecordPatch],
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<Record>> {
    write_batches(client, table, patches, on_progress, |batch| {
        client.update_records(table, batch)
    })
    .await
}

async fn write_batches<'a, T, F, Fut>(
    client: &StoreClient,
    table: &TableRef,
    items: &'a [T],
    on_progress: Option<&ProgressCallback>,
    mut write: F,
) -> Result<Vec<Record>>
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = Result<Vec<Record>>>,
{
    let table_name = table.to_string();
    let total_batches = items.len().div_ceil(MAX_BATCH_SIZE);
    let mut written = Vec::with_capacity(items.len());

    for (index, batch) in partition(items).enumerate() {
        if index > 0 {
            client.pace().await;
        }

        emit(
            on_progress,
            SyncProgress::WritingBatch {
                table: table_name.clone(),
                batch: index + 1,
                total_batches,
                size: batch.len(),
            },
        );

        match write(batch).await {
            Ok(records) => written.extend(records),
            Err(e) => {
                tracing::error!(
                    table = %table_name,
                    batch = index + 1,
                    total_batches,
                    "Batch write failed, halting: {e}"
                );
                return Err(e);
            }
        }
    }

    tracing::debug!(table = %table_name, written = written.len(), "Batch write complete");
    emit(
        on_progress,
        SyncProgress::WriteComplete {
            table: table_name,
            written: written.len(),
        },
    );

    Ok(written)
}
