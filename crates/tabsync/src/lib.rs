//! Tabsync - a client toolkit for a hosted, rate-limited tabular record store.
//!
//! The store exposes bases of named tables over REST. This crate wraps it
//! with the operations an integration actually needs:
//!
//! - [`paginate`] - fetch one page, or every page with restart-from-scratch
//!   retry when a pagination session breaks
//! - [`batch`] - create or update any number of records in bounded batches
//! - [`updater`] - update one record by id, or by a unique field lookup
//! - [`poll`] - a long-running loop reacting to unprocessed records
//!
//! All calls through one [`StoreClient`] are paced cooperatively; nothing is
//! issued concurrently against the store.
//!
//! # Example
//!
//! ```ignore
//! use tabsync::{ClientOptions, ListQuery, RetryConfig, StoreClient, TableRef};
//! use tabsync::paginate::fetch_all;
//!
//! let client = StoreClient::new(&api_key, ClientOptions::default())?;
//! let table = TableRef::new("app123", "Voice Mails");
//! let records = fetch_all(&client, &table, &ListQuery::default(), &RetryConfig::default(), None).await?;
//! ```

pub mod batch;
pub mod client;
pub mod error;
pub mod http;
pub mod paginate;
pub mod poll;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod types;
pub mod updater;

pub use client::{ClientOptions, StoreClient};
pub use error::{Result, StoreError, short_error_message};
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use poll::{
    CycleStats, FieldReaction, InternalMarker, PollConfig, PollHandle, PollLoop, PollReaction,
    PollScope, PollState, PollSummary, ReactionError, SideEffect,
};
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use rate_limit::{ApiRateLimiter, rate_limits};
pub use retry::RetryConfig;
pub use types::{
    Fields, FilterPredicate, ListQuery, NewRecord, Page, Record, RecordPatch, TableRef,
};
pub use updater::UpdateOutcome;
