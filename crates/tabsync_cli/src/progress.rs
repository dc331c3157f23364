//! Progress reporting for store operations.
//!
//! Library progress events are turned into structured log lines.

mod logging;

use tabsync::ProgressCallback;

pub use logging::LoggingReporter;

/// Build a library callback that forwards every event to the reporter.
pub fn logging_callback() -> ProgressCallback {
    let reporter = LoggingReporter::new();
    Box::new(move |event| reporter.handle(event))
}
