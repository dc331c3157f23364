use std::io::IsTerminal;

use tabsync::PollHandle;

/// Stop the poll loop on Ctrl+C; exit immediately on a second Ctrl+C.
///
/// The loop finishes the cycle in flight, so every record whose side effect
/// already ran still gets marked before the process exits.
pub(crate) fn setup_shutdown_handler(handle: PollHandle) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            return;
        }

        let is_tty = std::io::stderr().is_terminal();
        if is_tty {
            eprintln!("\n\nStop requested, finishing current poll cycle...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Stop requested, finishing current poll cycle");
        }

        handle.stop();

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });
}
