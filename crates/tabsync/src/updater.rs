//! Single-record updates, direct or by unique lookup.

use crate::client::StoreClient;
use crate::error::{Result, short_error_message};
use crate::paginate::fetch_first_page;
use crate::types::{Fields, FilterPredicate, ListQuery, Record, TableRef};

/// Result of [`find_and_update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Exactly one record matched and was updated.
    Updated(Record),
    /// No record matched. Nothing was written.
    NotFound,
    /// More than one record matched. Nothing was written.
    Ambiguous { matches: usize },
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Apply `fields` to the record with a known id.
pub async fn update_one(
    client: &StoreClient,
    table: &TableRef,
    record_id: &str,
    fields: &Fields,
) -> Result<Record> {
    client
        .update_record(table, record_id, fields)
        .await
        .inspect_err(|e| {
            tracing::error!(
                table = %table,
                record_id,
                "Error updating record: {}",
                short_error_message(e)
            );
        })
}

/// Look up the single record matching `filter` and apply `fields` to it.
///
/// Only the first page of matches is considered. Zero or several matches are
/// logged and reported as [`UpdateOutcome::NotFound`] /
/// [`UpdateOutcome::Ambiguous`] without writing anything; the filter is
/// expected to be unique, and guessing would risk patching the wrong record.
/// Query and update failures are returned without retry.
pub async fn find_and_update(
    client: &StoreClient,
    table: &TableRef,
    fields: &Fields,
    filter: &FilterPredicate,
) -> Result<UpdateOutcome> {
    let query = ListQuery::all().with_filter(filter)?;

    let matches = fetch_first_page(client, table, &query)
        .await
        .inspect_err(|e| {
            tracing::error!(
                table = %table,
                field = %filter.field,
                "Lookup query failed: {}",
                short_error_message(e)
            );
        })?;

    match matches.as_slice() {
        [] => {
            tracing::warn!(
                table = %table,
                "No records found for {}=\"{}\"",
                filter.field,
                filter.value
            );
            Ok(UpdateOutcome::NotFound)
        }
        [record] => {
            let updated = update_one(client, table, &record.id, fields).await?;
            tracing::debug!(table = %table, record_id = %updated.id, "Updated record by lookup");
            Ok(UpdateOutcome::Updated(updated))
        }
        many => {
            tracing::warn!(
                table = %table,
                matches = many.len(),
                "Multiple records found for {}=\"{}\"",
                filter.field,
                filter.value
            );
            Ok(UpdateOutcome::Ambiguous {
                matches: many.len(),
            })
        }
    }
}
