use tabsync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::FetchingPages { table, attempt } => {
                if attempt > 1 {
                    tracing::info!(table = %table, attempt, "Restarting fetch from the first page");
                } else {
                    tracing::info!(table = %table, "Fetching records");
                }
            }

            SyncProgress::FetchedPage {
                table,
                page,
                count,
                total_so_far,
            } => {
                tracing::debug!(table = %table, page, count, total_so_far, "Fetched page");
            }

            SyncProgress::FetchComplete { table, total } => {
                tracing::info!(table = %table, total, "Fetch complete");
            }

            SyncProgress::FetchRetry {
                table,
                attempt,
                retry_after_ms,
                error,
            } => {
                tracing::warn!(
                    table = %table,
                    attempt,
                    retry_after_ms,
                    error = %error,
                    "Fetch failed, backing off"
                );
            }

            SyncProgress::WritingBatch {
                table,
                batch,
                total_batches,
                size,
            } => {
                tracing::debug!(table = %table, batch, total_batches, size, "Writing batch");
            }

            SyncProgress::WriteComplete { table, written } => {
                tracing::info!(table = %table, written, "Write complete");
            }

            SyncProgress::PollCycleStarted { cycle } => {
                tracing::debug!(cycle, "Poll cycle started");
            }

            SyncProgress::PollCycleComplete {
                cycle,
                matched,
                processed,
                skipped,
                failed,
            } => {
                if matched == 0 {
                    tracing::debug!(cycle, "No pending records");
                } else {
                    tracing::info!(cycle, matched, processed, skipped, failed, "Poll cycle complete");
                }
            }

            SyncProgress::PollCycleFailed { cycle, error } => {
                tracing::warn!(cycle, error = %error, "Poll cycle failed, will retry next cycle");
            }

            SyncProgress::PollStopped { cycles } => {
                tracing::info!(cycles, "Poll loop stopped");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
