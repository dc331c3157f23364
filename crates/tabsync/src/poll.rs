//! Long-lived polling of a filtered view.
//!
//! A [`PollLoop`] repeatedly queries a view for "unprocessed" records, runs an
//! injected side effect for each new one, marks it processed, then sleeps.
//! Stopping is cooperative: a stop request is observed only between cycles,
//! so a record whose side effect ran always gets its processed marker written
//! before the loop exits.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tabsync::poll::{FieldReaction, PollConfig, PollLoop};
//!
//! let config = PollConfig::new(table, query, processed_patch);
//! let reaction = FieldReaction::new("Call ID", hook);
//! let (handle, task) = PollLoop::new(client, config, Arc::new(reaction)).spawn();
//!
//! // later
//! handle.stop();
//! let summary = task.await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::StoreClient;
use crate::error::{Result, short_error_message};
use crate::paginate::{fetch_first_page, fetch_pages_once};
use crate::progress::{ProgressCallback, SyncProgress, emit};
use crate::types::{
    DEFAULT_POLL_INTERVAL_MS, Fields, ListQuery, MIN_POLL_INTERVAL_MS, Record, TableRef,
};
use crate::updater::update_one;

/// Error type returned by injected side effects.
pub type ReactionError = Box<dyn std::error::Error + Send + Sync>;

/// Lifecycle of a poll loop. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Running,
    Stopped,
}

/// How much of the view each cycle reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollScope {
    /// Only the first page; remaining matches are picked up by later cycles.
    #[default]
    FirstPage,
    /// Every page, in one pagination session.
    AllPages,
}

/// What to poll and how to mark records as handled.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub table: TableRef,
    /// Query selecting unprocessed records.
    pub query: ListQuery,
    /// Sleep between cycles. Values below [`MIN_POLL_INTERVAL_MS`] are raised
    /// to it.
    pub interval: Duration,
    pub scope: PollScope,
    /// Fields written to a record once its side effect succeeded.
    pub processed_patch: Fields,
}

impl PollConfig {
    pub fn new(table: TableRef, query: ListQuery, processed_patch: Fields) -> Self {
        Self {
            table,
            query,
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            scope: PollScope::default(),
            processed_patch,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(MIN_POLL_INTERVAL_MS));
        self
    }

    /// The sleep actually used between cycles.
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(Duration::from_millis(MIN_POLL_INTERVAL_MS))
    }

    #[must_use]
    pub fn with_scope(mut self, scope: PollScope) -> Self {
        self.scope = scope;
        self
    }
}

/// A side effect keyed by a record's external correlation id.
#[async_trait]
pub trait SideEffect: Send + Sync {
    async fn perform(&self, correlation_id: &str) -> std::result::Result<(), ReactionError>;
}

#[async_trait]
impl<S: SideEffect + ?Sized> SideEffect for Arc<S> {
    async fn perform(&self, correlation_id: &str) -> std::result::Result<(), ReactionError> {
        (**self).perform(correlation_id).await
    }
}

/// Per-record reaction of a poll loop.
#[async_trait]
pub trait PollReaction: Send + Sync {
    /// External id the side effect is keyed by. `None` skips the record.
    fn correlation_id(&self, record: &Record) -> Option<String>;

    /// Records produced by a trusted source never need external action.
    fn is_internal(&self, _record: &Record) -> bool {
        false
    }

    async fn react(&self, correlation_id: &str) -> std::result::Result<(), ReactionError>;
}

/// Marks records whose field contains a marker substring as internal.
///
/// Matches a plain string field, a list of strings, or a list of attachment
/// objects by their `url` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalMarker {
    pub field: String,
    pub marker: String,
}

impl InternalMarker {
    pub fn new(field: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            marker: marker.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match record.get(&self.field) {
            Some(Value::String(s)) => s.contains(&self.marker),
            Some(Value::Array(items)) => items.iter().any(|item| match item {
                Value::String(s) => s.contains(&self.marker),
                Value::Object(obj) => obj
                    .get("url")
                    .and_then(Value::as_str)
                    .is_some_and(|url| url.contains(&self.marker)),
                _ => false,
            }),
            _ => false,
        }
    }
}

/// A [`PollReaction`] reading the correlation id from a named field.
pub struct FieldReaction<S> {
    correlation_field: String,
    internal: Option<InternalMarker>,
    side_effect: S,
}

impl<S: SideEffect> FieldReaction<S> {
    pub fn new(correlation_field: impl Into<String>, side_effect: S) -> Self {
        Self {
            correlation_field: correlation_field.into(),
            internal: None,
            side_effect,
        }
    }

    #[must_use]
    pub fn with_internal_marker(mut self, marker: InternalMarker) -> Self {
        self.internal = Some(marker);
        self
    }
}

#[async_trait]
impl<S: SideEffect> PollReaction for FieldReaction<S> {
    fn correlation_id(&self, record: &Record) -> Option<String> {
        match record.get(&self.correlation_field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn is_internal(&self, record: &Record) -> bool {
        self.internal.as_ref().is_some_and(|m| m.matches(record))
    }

    async fn react(&self, correlation_id: &str) -> std::result::Result<(), ReactionError> {
        self.side_effect.perform(correlation_id).await
    }
}

/// Outcome counts of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub matched: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Totals over the lifetime of a poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PollSummary {
    fn absorb(&mut self, stats: &CycleStats) {
        self.processed += stats.processed;
        self.skipped += stats.skipped;
        self.failed += stats.failed;
    }
}

/// React to one page of poll results.
///
/// Records are handled in order. Internal records and records without a
/// correlation id are skipped. A failed side effect leaves the record
/// unmarked so a later cycle retries it. A failed marker write is logged and
/// processing moves on.
pub async fn process_page(
    client: &StoreClient,
    table: &TableRef,
    records: &[Record],
    reaction: &dyn PollReaction,
    processed_patch: &Fields,
) -> CycleStats {
    let mut stats = CycleStats {
        matched: records.len(),
        ..CycleStats::default()
    };
    let mut wrote_any = false;

    for record in records {
        if reaction.is_internal(record) {
            tracing::debug!(record_id = %record.id, "Skipping internal record");
            stats.skipped += 1;
            continue;
        }

        let Some(correlation_id) = reaction.correlation_id(record) else {
            tracing::warn!(record_id = %record.id, "Record has no correlation id, skipping");
            stats.skipped += 1;
            continue;
        };

        if let Err(e) = reaction.react(&correlation_id).await {
            tracing::error!(
                record_id = %record.id,
                correlation_id = %correlation_id,
                "Side effect failed, leaving record unprocessed: {e}"
            );
            stats.failed += 1;
            continue;
        }

        if wrote_any {
            client.pace().await;
        }
        wrote_any = true;

        match update_one(client, table, &record.id, processed_patch).await {
            Ok(_) => {
                tracing::debug!(record_id = %record.id, correlation_id = %correlation_id, "Marked processed");
                stats.processed += 1;
            }
            Err(_) => stats.failed += 1,
        }
    }

    stats
}

/// Handle for stopping a running [`PollLoop`].
#[derive(Clone)]
pub struct PollHandle {
    state: Arc<watch::Sender<PollState>>,
}

impl PollHandle {
    /// Request the loop to stop at the next cycle boundary.
    pub fn stop(&self) {
        let previous = self.state.send_replace(PollState::Stopped);
        if previous == PollState::Running {
            tracing::info!("Poll loop stop requested");
        }
    }

    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == PollState::Stopped
    }
}

/// A self-rescheduling poll task.
pub struct PollLoop {
    client: StoreClient,
    config: PollConfig,
    reaction: Arc<dyn PollReaction>,
    state: Arc<watch::Sender<PollState>>,
    on_progress: Option<ProgressCallback>,
}

impl PollLoop {
    pub fn new(client: StoreClient, config: PollConfig, reaction: Arc<dyn PollReaction>) -> Self {
        let (state, _) = watch::channel(PollState::Running);
        Self {
            client,
            config,
            reaction,
            state: Arc::new(state),
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn handle(&self) -> PollHandle {
        PollHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Run the loop on a new task.
    pub fn spawn(self) -> (PollHandle, JoinHandle<PollSummary>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// Run cycles until stopped.
    pub async fn run(self) -> PollSummary {
        let mut state_rx = self.state.subscribe();
        let on_progress = self.on_progress.as_ref();
        let mut summary = PollSummary::default();

        tracing::info!(
            table = %self.config.table,
            interval = ?self.config.effective_interval(),
            "Poll loop started"
        );

        loop {
            if *state_rx.borrow() == PollState::Stopped {
                break;
            }

            summary.cycles += 1;
            let cycle = summary.cycles;
            emit(on_progress, SyncProgress::PollCycleStarted { cycle });

            match self.query().await {
                Ok(records) => {
                    let stats = process_page(
                        &self.client,
                        &self.config.table,
                        &records,
                        self.reaction.as_ref(),
                        &self.config.processed_patch,
                    )
                    .await;
                    summary.absorb(&stats);
                    emit(
                        on_progress,
                        SyncProgress::PollCycleComplete {
                            cycle,
                            matched: stats.matched,
                            processed: stats.processed,
                            skipped: stats.skipped,
                            failed: stats.failed,
                        },
                    );
                }
                Err(e) => {
                    tracing::error!(cycle, "Poll query failed: {}", short_error_message(&e));
                    summary.failed_cycles += 1;
                    emit(
                        on_progress,
                        SyncProgress::PollCycleFailed {
                            cycle,
                            error: e.to_string(),
                        },
                    );
                }
            }

            if *state_rx.borrow() == PollState::Stopped {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.effective_interval()) => {}
                _ = state_rx.wait_for(|s| *s == PollState::Stopped) => {}
            }
        }

        tracing::info!(cycles = summary.cycles, processed = summary.processed, "Poll loop stopped");
        emit(
            on_progress,
            SyncProgress::PollStopped {
                cycles: summary.cycles,
            },
        );

        summary
    }

    async fn query(&self) -> Result<Vec<Record>> {
        match self.config.scope {
            PollScope::FirstPage => {
                fetch_first_page(&self.client, &self.config.table, &self.config.query).await
            }
            PollScope::AllPages => {
                fetch_pages_once(&self.client, &self.config.table, &self.config.query, None).await
            }
        }
    }
}
