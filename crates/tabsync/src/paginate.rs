//! Cursor-based pagination over list endpoints.
//!
//! The store hands back an opaque `offset` with every page that has a
//! successor. Pages are requested strictly in sequence; the next request
//! always carries the cursor from the page immediately before it.

use crate::client::StoreClient;
use crate::error::Result;
use crate::progress::{ProgressCallback, SyncProgress, emit};
use crate::retry::{RetryConfig, with_restart};
use crate::types::{ListQuery, Record, TableRef};

/// Fetch only the first page of a query. No retry.
pub async fn fetch_first_page(
    client: &StoreClient,
    table: &TableRef,
    query: &ListQuery,
) -> Result<Vec<Record>> {
    let page = client.list_page(table, query, None).await?;
    Ok(page.records)
}

/// Fetch every page in one pagination session.
///
/// Waits the client's request delay after each page that has a successor and
/// stops the moment a page comes back without a cursor (an empty cursor
/// counts as none). Any error aborts the session; records gathered so far
/// are discarded.
pub async fn fetch_pages_once(
    client: &StoreClient,
    table: &TableRef,
    query: &ListQuery,
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<Record>> {
    let table_name = table.to_string();
    let mut all_records: Vec<Record> = Vec::new();
    let mut offset: Option<String> = None;
    let mut page_number = 0u32;

    loop {
        let page = client.list_page(table, query, offset.as_deref()).await?;
        page_number += 1;

        let count = page.records.len();
        all_records.extend(page.records);

        emit(
            on_progress,
            SyncProgress::FetchedPage {
                table: table_name.clone(),
                page: page_number,
                count,
                total_so_far: all_records.len(),
            },
        );

        match page.offset.filter(|next| !next.is_empty()) {
            Some(next) => {
                offset = Some(next);
                client.pace().await;
            }
            None => break,
        }
    }

    Ok(all_records)
}

/// Fetch every record of a query, restarting from the first page on failure.
///
/// Each attempt is a full [`fetch_pages_once`] session. On a retryable error
/// the session is abandoned and a new one starts after `retry.cooldown`, up
/// to `retry.max_attempts` attempts in total. Exhausting the budget returns
/// [`StoreError::MaxRetriesExceeded`](crate::StoreError::MaxRetriesExceeded);
/// callers must not treat that as an empty table.
///
/// # Example
///
/// ```ignore
/// use tabsync::{ListQuery, RetryConfig, TableRef, paginate::fetch_all};
///
/// let table = TableRef::new("app123", "Voice Mails");
/// let records = fetch_all(&client, &table, &ListQuery::default(), &RetryConfig::default(), None).await?;
/// ```
pub async fn fetch_all(
    client: &StoreClient,
    table: &TableRef,
    query: &ListQuery,
    retry: &RetryConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<Record>> {
    let table_name = table.to_string();
    let mut attempt = 0usize;

    let records = with_restart(
        || {
            attempt += 1;
            emit(
                on_progress,
                SyncProgress::FetchingPages {
                    table: table_name.clone(),
                    attempt,
                },
            );
            fetch_pages_once(client, table, query, on_progress)
        },
        retry,
        |failed_attempt, err, delay| {
            emit(
                on_progress,
                SyncProgress::FetchRetry {
                    table: table_name.clone(),
                    attempt: failed_attempt,
                    retry_after_ms: delay.as_millis() as u64,
                    error: err.to_string(),
                },
            );
        },
    )
    .await?;

    tracing::info!(table = %table_name, total = records.len(), "Fetched all records");
    emit(
        on_progress,
        SyncProgress::FetchComplete {
            table: table_name,
            total: records.len(),
        },
    );

    Ok(records)
}
