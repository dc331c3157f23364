//! Record and query types shared by every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Default API root for the record store.
pub const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";

/// View used when a query does not name one.
pub const DEFAULT_VIEW: &str = "Grid view";

/// Delay callers wait after each request of one logical operation.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 250;

/// Maximum number of records the store accepts in one write call.
pub const MAX_BATCH_SIZE: usize = 10;

/// Cooldown before fetch-all restarts from the first page.
pub const FETCH_RETRY_COOLDOWN_MS: u64 = 30_000;

/// Total attempts fetch-all makes before giving up.
pub const MAX_FETCH_ATTEMPTS: usize = 2000;

/// Sleep between poll cycles.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;

/// Shortest sleep the poll loop accepts between cycles.
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;

/// Field values keyed by field name.
pub type Fields = Map<String, Value>;

/// A record as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Store-assigned identifier, immutable after creation.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            created_time: None,
            fields,
        }
    }

    /// Get a field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// A record to be created. The store assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub fields: Fields,
}

impl NewRecord {
    pub fn new(fields: Fields) -> Self {
        Self { fields }
    }
}

/// A partial update addressed to one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub id: String,
    pub fields: Fields,
}

impl RecordPatch {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// One page of a list response.
///
/// `offset` is the continuation cursor; `None` marks the final page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub offset: Option<String>,
}

/// Body returned by batch write endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RecordList {
    #[serde(default)]
    pub records: Vec<Record>,
}

/// Base and table a request is routed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub base_id: String,
    pub table: String,
}

impl TableRef {
    pub fn new(base_id: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            base_id: base_id.into(),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base_id, self.table)
    }
}

/// A single `field = value` equality predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPredicate {
    pub field: String,
    pub value: String,
}

impl FilterPredicate {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Render the predicate as a store formula: `{field} = "value"`.
    ///
    /// Quotes and backslashes in the value are escaped. A field name that is
    /// empty or contains braces cannot be expressed and is rejected.
    pub fn to_formula(&self) -> Result<String> {
        let field = self.field.trim();
        if field.is_empty() {
            return Err(StoreError::InvalidFilter(
                "filter field name is empty".to_string(),
            ));
        }
        if field.contains(['{', '}']) {
            return Err(StoreError::InvalidFilter(format!(
                "filter field name contains braces: {field}"
            )));
        }

        let value = self.value.replace('\\', "\\\\").replace('"', "\\\"");
        Ok(format!("{{{field}}} = \"{value}\""))
    }
}

/// Parameters of a list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub view: Option<String>,
    pub filter_by_formula: Option<String>,
    pub page_size: Option<u32>,
    pub max_records: Option<u32>,
    pub fields: Vec<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            view: Some(DEFAULT_VIEW.to_string()),
            filter_by_formula: None,
            page_size: None,
            max_records: None,
            fields: Vec::new(),
        }
    }
}

impl ListQuery {
    /// Query a named view.
    #[must_use]
    pub fn view(view: impl Into<String>) -> Self {
        Self {
            view: Some(view.into()),
            ..Self::default()
        }
    }

    /// Query without naming a view.
    #[must_use]
    pub fn all() -> Self {
        Self {
            view: None,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.filter_by_formula = Some(formula.into());
        self
    }

    /// Filter by an equality predicate.
    pub fn with_filter(self, filter: &FilterPredicate) -> Result<Self> {
        Ok(self.with_formula(filter.to_formula()?))
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn with_max_records(mut self, max_records: u32) -> Self {
        self.max_records = Some(max_records);
        self
    }

    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}
