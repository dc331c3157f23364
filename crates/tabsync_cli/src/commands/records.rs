//! Record write commands: create, update and update-by-lookup.

use std::path::PathBuf;

use tabsync::batch::{create_many, update_many};
use tabsync::updater::{find_and_update, update_one};
use tabsync::{FilterPredicate, NewRecord, RecordPatch, TableRef, UpdateOutcome};

use crate::commands::shared::{OutputFormat, build_client, parse_fields, print_records, read_input};
use crate::config::Config;
use crate::progress::logging_callback;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CreateArgs {
    /// Field values as a JSON object, e.g. '{"Name": "Ada"}'
    #[arg(short, long)]
    pub fields: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct BatchFileArgs {
    /// JSON file with the records to write ('-' reads stdin)
    pub file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct UpdateArgs {
    /// Id of the record to update
    pub record_id: String,

    /// Field values to set, as a JSON object
    #[arg(short, long)]
    pub fields: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct FindUpdateArgs {
    /// Field to match on
    #[arg(long = "where")]
    pub field: String,

    /// Value the field must equal
    #[arg(long = "equals")]
    pub value: String,

    /// Field values to set, as a JSON object
    #[arg(short, long)]
    pub fields: String,
}

pub(crate) async fn handle_create(
    args: CreateArgs,
    table: &TableRef,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let fields = parse_fields(&args.fields)?;
    let client = build_client(config)?;

    let record = client.create_record(table, &fields).await?;
    tracing::info!(table = %table, record_id = %record.id, "Created record");
    print_records(&[record], args.output)
}

/// Accepts `[{"fields": {...}}, ...]`.
pub(crate) async fn handle_create_batch(
    args: BatchFileArgs,
    table: &TableRef,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let records: Vec<NewRecord> = serde_json::from_str(&read_input(&args.file)?)?;
    let client = build_client(config)?;
    let on_progress = logging_callback();

    let created = create_many(&client, table, &records, Some(&on_progress)).await?;
    print_records(&created, args.output)
}

pub(crate) async fn handle_update(
    args: UpdateArgs,
    table: &TableRef,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let fields = parse_fields(&args.fields)?;
    let client = build_client(config)?;

    let record = update_one(&client, table, &args.record_id, &fields).await?;
    print_records(&[record], args.output)
}

/// Accepts `[{"id": "rec...", "fields": {...}}, ...]`.
pub(crate) async fn handle_update_batch(
    args: BatchFileArgs,
    table: &TableRef,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let patches: Vec<RecordPatch> = serde_json::from_str(&read_input(&args.file)?)?;
    let client = build_client(config)?;
    let on_progress = logging_callback();

    let updated = update_many(&client, table, &patches, Some(&on_progress)).await?;
    print_records(&updated, args.output)
}

pub(crate) async fn handle_find_update(
    args: FindUpdateArgs,
    table: &TableRef,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let fields = parse_fields(&args.fields)?;
    let filter = FilterPredicate::new(args.field, args.value);
    let client = build_client(config)?;

    match find_and_update(&client, table, &fields, &filter).await? {
        UpdateOutcome::Updated(record) => {
            println!("Updated {}", record.id);
        }
        UpdateOutcome::NotFound => {
            println!("No record matched; nothing updated");
        }
        UpdateOutcome::Ambiguous { matches } => {
            println!("{matches} records matched; nothing updated");
        }
    }

    Ok(())
}
