//! Progress reporting types for sync operations.
//!
//! Every long-running operation accepts an optional [`ProgressCallback`] and
//! reports what it is doing through [`SyncProgress`] events. The CLI turns
//! these into log lines.

/// Progress events emitted during sync operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Starting a paginated fetch of a table.
    FetchingPages {
        /// `base/table` being fetched.
        table: String,
        /// Attempt number of the whole fetch (1-indexed).
        attempt: usize,
    },

    /// Fetched one page.
    FetchedPage {
        /// `base/table` this page belongs to.
        table: String,
        /// Page number (1-indexed).
        page: u32,
        /// Number of records on this page.
        count: usize,
        /// Running total of records fetched in this attempt.
        total_so_far: usize,
    },

    /// Finished fetching all pages.
    FetchComplete {
        /// `base/table` that finished fetching.
        table: String,
        /// Total number of records fetched.
        total: usize,
    },

    /// A fetch attempt failed; restarting from the first page after a cooldown.
    FetchRetry {
        /// `base/table` being fetched.
        table: String,
        /// Attempt that failed (1-indexed).
        attempt: usize,
        /// Cooldown before the next attempt (ms).
        retry_after_ms: u64,
        /// Error message.
        error: String,
    },

    /// Writing one batch.
    WritingBatch {
        /// `base/table` being written.
        table: String,
        /// Batch number (1-indexed).
        batch: usize,
        /// Total number of batches.
        total_batches: usize,
        /// Records in this batch.
        size: usize,
    },

    /// All batches written.
    WriteComplete {
        /// `base/table` that was written.
        table: String,
        /// Number of records written.
        written: usize,
    },

    /// A poll cycle is starting.
    PollCycleStarted {
        /// Cycle number (1-indexed).
        cycle: u64,
    },

    /// A poll cycle finished processing its records.
    PollCycleComplete {
        /// Cycle number (1-indexed).
        cycle: u64,
        /// Records returned by the query.
        matched: usize,
        /// Records whose side effect ran and were marked processed.
        processed: usize,
        /// Records skipped as internal or missing a correlation id.
        skipped: usize,
        /// Records whose side effect or marker write failed.
        failed: usize,
    },

    /// A poll cycle could not query the store.
    PollCycleFailed {
        /// Cycle number (1-indexed).
        cycle: u64,
        /// Error message.
        error: String,
    },

    /// The poll loop observed a stop request and terminated.
    PollStopped {
        /// Number of cycles that ran.
        cycles: u64,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// This is a convenience function to avoid repetitive `if let Some(cb) = ...` patterns.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
