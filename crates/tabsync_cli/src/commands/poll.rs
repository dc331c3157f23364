//! The `poll` command: react to unprocessed records until Ctrl+C.

use std::sync::Arc;

use async_trait::async_trait;
use tabsync::poll::PollScope;
use tabsync::{
    FieldReaction, InternalMarker, PollConfig, PollLoop, ReactionError, SideEffect, TableRef,
};
use tokio::process::Command;

use crate::commands::fetch::QueryArgs;
use crate::commands::shared::{build_client, parse_fields};
use crate::config::Config;
use crate::progress::logging_callback;
use crate::shutdown::setup_shutdown_handler;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PollArgs {
    /// Query selecting unprocessed records
    #[command(flatten)]
    pub query: QueryArgs,

    /// Field holding the correlation id passed to the hook
    #[arg(long)]
    pub correlation_field: String,

    /// Fields written once a record is handled, as a JSON object
    #[arg(long, default_value = r#"{"Processed": true}"#)]
    pub mark: String,

    /// Skip records whose FIELD contains MARKER (format FIELD=MARKER)
    #[arg(long, value_parser = parse_internal_marker)]
    pub internal: Option<InternalMarker>,

    /// Seconds between cycles (default from config or 60)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_secs: Option<u64>,

    /// Read every page each cycle instead of only the first
    #[arg(long)]
    pub all_pages: bool,

    /// Program run per record, with the correlation id as its last argument
    #[arg(long)]
    pub hook: String,

    /// Extra arguments passed to the hook before the correlation id
    #[arg(long = "hook-arg", allow_hyphen_values = true)]
    pub hook_args: Vec<String>,
}

fn parse_internal_marker(s: &str) -> Result<InternalMarker, String> {
    match s.split_once('=') {
        Some((field, marker)) if !field.is_empty() && !marker.is_empty() => {
            Ok(InternalMarker::new(field, marker))
        }
        _ => Err(format!("expected FIELD=MARKER, got '{s}'")),
    }
}

/// Side effect that runs an external program per record.
#[derive(Debug, Clone)]
pub(crate) struct CommandHook {
    program: String,
    args: Vec<String>,
}

impl CommandHook {
    pub(crate) fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl SideEffect for CommandHook {
    async fn perform(&self, correlation_id: &str) -> Result<(), ReactionError> {
        tracing::debug!(program = %self.program, correlation_id, "Running hook");

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(correlation_id)
            .kill_on_drop(true)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("hook {} exited with {}", self.program, status).into())
        }
    }
}

pub(crate) async fn handle_poll(
    args: PollArgs,
    table: &TableRef,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let processed_patch = parse_fields(&args.mark)?;
    let client = build_client(config)?;

    let interval = args
        .interval_secs
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| config.poll_interval());
    let scope = if args.all_pages {
        PollScope::AllPages
    } else {
        PollScope::FirstPage
    };
    let poll_config = PollConfig::new(table.clone(), args.query.to_query(), processed_patch)
        .with_interval(interval)
        .with_scope(scope);

    let mut reaction = FieldReaction::new(
        args.correlation_field,
        CommandHook::new(args.hook, args.hook_args),
    );
    if let Some(marker) = args.internal {
        reaction = reaction.with_internal_marker(marker);
    }

    let (handle, task) = PollLoop::new(client, poll_config, Arc::new(reaction))
        .with_progress(logging_callback())
        .spawn();
    setup_shutdown_handler(handle);

    let summary = task.await?;
    println!(
        "Stopped after {} cycles: {} processed, {} skipped, {} failed, {} failed queries",
        summary.cycles, summary.processed, summary.skipped, summary.failed, summary.failed_cycles
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_marker_parses_field_and_marker() {
        let marker = parse_internal_marker("Voice Mail=twilio").unwrap();
        assert_eq!(marker, InternalMarker::new("Voice Mail", "twilio"));

        assert!(parse_internal_marker("no-equals").is_err());
        assert!(parse_internal_marker("=marker").is_err());
        assert!(parse_internal_marker("field=").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_hook_reports_exit_status() {
        let ok = CommandHook::new("sh", vec!["-c".to_string(), "exit 0".to_string()]);
        assert!(ok.perform("CA1").await.is_ok());

        let failing = CommandHook::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
        let err = failing.perform("CA1").await.unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_hook_passes_correlation_id_last() {
        // $0 is the first argument after the script; the id lands in $1.
        let hook = CommandHook::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"test "$1" = "CA42""#.to_string(),
                "hook".to_string(),
            ],
        );
        assert!(hook.perform("CA42").await.is_ok());
        assert!(hook.perform("CA43").await.is_err());
    }

    #[tokio::test]
    async fn command_hook_missing_program_is_an_error() {
        let hook = CommandHook::new("tabsync-definitely-missing-hook", Vec::new());
        assert!(hook.perform("CA1").await.is_err());
    }
}
