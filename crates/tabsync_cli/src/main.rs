//! Tabsync CLI - command-line interface for the record store toolkit.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tabsync::TableRef;
use tracing_subscriber::EnvFilter;

use crate::commands::fetch::FetchArgs;
use crate::commands::poll::PollArgs;
use crate::commands::records::{BatchFileArgs, CreateArgs, FindUpdateArgs, UpdateArgs};

#[derive(Parser)]
#[command(name = "tabsync")]
#[command(version)]
#[command(about = "Resilient batch sync with a rate-limited tabular record store")]
#[command(
    long_about = "Tabsync reads and writes records in a hosted tabular store through its \
rate-limited REST API. Reads page through the whole table and restart from the first \
page when a session breaks; writes go out in batches of at most ten records; the poll \
command reacts to unprocessed records until interrupted."
)]
#[command(after_long_help = r#"EXAMPLES
    Fetch every record of a table as JSON:
        $ tabsync fetch "Voice Mails" --base app123 -o json

    Create records from a file:
        $ tabsync create-batch "Voice Mails" records.json

    Update the record whose Call ID matches:
        $ tabsync find-update "Voice Mails" --where "Call ID" --equals CA42 -f '{"Transcript": "hi"}'

    Run a hook for each unprocessed record, once a minute:
        $ tabsync poll "Voice Mails" --formula 'Processed = FALSE()' \
            --correlation-field "Call ID" --hook ./notify.sh

CONFIGURATION
    Tabsync reads configuration from:
      1. ~/.config/tabsync/config.toml (or $XDG_CONFIG_HOME/tabsync/config.toml)
      2. ./tabsync.toml
      3. Environment variables (TABSYNC_* prefix, e.g., TABSYNC_STORE__API_KEY)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    TABSYNC_STORE__API_KEY        Store API key
    TABSYNC_STORE__BASE_ID        Default base id
    TABSYNC_STORE__API_URL        API root (default: https://api.airtable.com/v0)
    TABSYNC_POLL__INTERVAL_SECS   Seconds between poll cycles (default: 60)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Table addressing shared by every store command.
#[derive(Debug, Clone, clap::Args)]
struct TableArgs {
    /// Table name or id
    table: String,

    /// Base id (default from config)
    #[arg(short, long)]
    base: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create one record
    Create {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        args: CreateArgs,
    },
    /// Create many records in batches of ten
    CreateBatch {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        args: BatchFileArgs,
    },
    /// Update one record by id
    Update {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        args: UpdateArgs,
    },
    /// Update many records in batches of ten
    UpdateBatch {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        args: BatchFileArgs,
    },
    /// Update the single record matching a field value
    FindUpdate {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        args: FindUpdateArgs,
    },
    /// Fetch records, following every page
    Fetch {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        args: FetchArgs,
    },
    /// Poll a view and run a hook per new record until Ctrl+C
    Poll {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        args: PollArgs,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man pages for tabsync and each store command
    Man {
        /// Write every page into this directory instead of printing one
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the page for one command, e.g. `poll`
        #[arg(long, conflicts_with = "output")]
        page: Option<String>,
    },
}

fn table_ref(args: &TableArgs, config: &config::Config) -> Result<TableRef, String> {
    let base_id = config.base_id(args.base.as_deref())?;
    Ok(TableRef::new(base_id, args.table.clone()))
}

/// Load configuration and resolve the target table for a store command.
fn store_context(
    args: &TableArgs,
) -> Result<(TableRef, config::Config), Box<dyn std::error::Error>> {
    let config = config::Config::load()?;
    let table = table_ref(args, &config)?;
    Ok((table, config))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("tabsync=info,tabsync_cli=info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(shell)?;
        }
        Commands::Man { output, page } => {
            commands::meta::handle_man(output, page)?;
        }
        Commands::Create { table, args } => {
            let (table, config) = store_context(&table)?;
            commands::records::handle_create(args, &table, &config).await?;
        }
        Commands::CreateBatch { table, args } => {
            let (table, config) = store_context(&table)?;
            commands::records::handle_create_batch(args, &table, &config).await?;
        }
        Commands::Update { table, args } => {
            let (table, config) = store_context(&table)?;
            commands::records::handle_update(args, &table, &config).await?;
        }
        Commands::UpdateBatch { table, args } => {
            let (table, config) = store_context(&table)?;
            commands::records::handle_update_batch(args, &table, &config).await?;
        }
        Commands::FindUpdate { table, args } => {
            let (table, config) = store_context(&table)?;
            commands::records::handle_find_update(args, &table, &config).await?;
        }
        Commands::Fetch { table, args } => {
            let (table, config) = store_context(&table)?;
            commands::fetch::handle_fetch(args, &table, &config).await?;
        }
        Commands::Poll { table, args } => {
            let (table, config) = store_context(&table)?;
            commands::poll::handle_poll(args, &table, &config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn poll_parses_hook_and_marker() {
        let cli = Cli::try_parse_from([
            "tabsync",
            "poll",
            "Voice Mails",
            "--base",
            "app1",
            "--formula",
            "Processed = FALSE()",
            "--correlation-field",
            "Call ID",
            "--internal",
            "Voice Mail=twilio",
            "--hook",
            "./notify.sh",
            "--hook-arg",
            "--verbose",
        ])
        .unwrap();

        let Commands::Poll { table, args } = cli.command else {
            panic!("expected poll");
        };
        assert_eq!(table.table, "Voice Mails");
        assert_eq!(table.base.as_deref(), Some("app1"));
        assert_eq!(args.hook, "./notify.sh");
        assert_eq!(args.hook_args, vec!["--verbose"]);
        assert!(args.internal.is_some());
        assert!(!args.all_pages);
    }

    #[test]
    fn poll_rejects_zero_interval() {
        let result = Cli::try_parse_from([
            "tabsync",
            "poll",
            "T",
            "--correlation-field",
            "Call ID",
            "--hook",
            "./notify.sh",
            "--interval-secs",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn man_page_and_output_are_exclusive() {
        let cli = Cli::try_parse_from(["tabsync", "man", "--page", "poll"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Man { output: None, page: Some(ref p) } if p == "poll"
        ));
        assert!(Cli::try_parse_from(["tabsync", "man", "--page", "poll", "-o", "out"]).is_err());
    }

    #[test]
    fn find_update_requires_where_and_equals() {
        let missing = Cli::try_parse_from([
            "tabsync",
            "find-update",
            "T",
            "--where",
            "Call ID",
            "-f",
            "{}",
        ]);
        assert!(missing.is_err());
    }

    #[test]
    fn table_ref_uses_config_base_when_flag_missing() {
        let args = TableArgs {
            table: "T".to_string(),
            base: None,
        };
        assert!(table_ref(&args, &config::Config::default()).is_err());

        let args = TableArgs {
            table: "T".to_string(),
            base: Some("appX".to_string()),
        };
        let table = table_ref(&args, &config::Config::default()).unwrap();
        assert_eq!(table.to_string(), "appX/T");
    }
}
