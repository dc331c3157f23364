use std::io::Read;
use std::path::Path;

use clap::ValueEnum;
use serde_json::Value;
use tabsync::{Fields, Record, StoreClient};

use crate::config::Config;

/// Output format for record display.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Build a store client from the loaded configuration.
pub(crate) fn build_client(config: &Config) -> Result<StoreClient, Box<dyn std::error::Error>> {
    let api_key = config.api_key()?;
    let client = StoreClient::new(api_key, config.client_options())?;
    tracing::debug!(?client, "Store client ready");
    Ok(client)
}

/// Parse a JSON object of field values.
pub(crate) fn parse_fields(json: &str) -> Result<Fields, String> {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(format!("expected a JSON object of fields, got: {other}")),
        Err(e) => Err(format!("invalid fields JSON: {e}")),
    }
}

/// Read a JSON document from a file, or from stdin when the path is `-`.
pub(crate) fn read_input(path: &Path) -> std::io::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
    }
}

/// Record row for table display.
#[derive(Debug, Clone, tabled::Tabled)]
pub(crate) struct RecordDisplay {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Created")]
    pub created: String,
    #[tabled(rename = "Fields")]
    pub fields: String,
}

impl From<&Record> for RecordDisplay {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            created: record
                .created_time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string()),
            fields: Value::Object(record.fields.clone()).to_string(),
        }
    }
}

/// Print records in the chosen format.
pub(crate) fn print_records(
    records: &[Record],
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<RecordDisplay> = records.iter().map(RecordDisplay::from).collect();
            let mut table = tabled::Table::new(rows);
            table.with(tabled::settings::Style::rounded());
            println!("{}", table);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_format_defaults_to_table() {
        assert!(matches!(OutputFormat::default(), OutputFormat::Table));
    }

    #[test]
    fn parse_fields_accepts_objects_only() {
        let fields = parse_fields(r#"{"Name": "Ada", "Count": 3}"#).unwrap();
        assert_eq!(fields["Name"], json!("Ada"));
        assert_eq!(fields["Count"], json!(3));

        assert!(parse_fields("[1, 2]").unwrap_err().contains("expected a JSON object"));
        assert!(parse_fields("{oops").unwrap_err().contains("invalid fields JSON"));
    }

    #[test]
    fn record_display_renders_fields_as_json() {
        let record: Record = serde_json::from_value(json!({
            "id": "rec1",
            "createdTime": "2024-03-01T12:00:00.000Z",
            "fields": {"Name": "Ada"}
        }))
        .unwrap();

        let row = RecordDisplay::from(&record);
        assert_eq!(row.id, "rec1");
        assert_eq!(row.created, "2024-03-01 12:00:00 UTC");
        assert_eq!(row.fields, r#"{"Name":"Ada"}"#);

        let bare = RecordDisplay::from(&Record::new("rec2", Fields::new()));
        assert_eq!(bare.created, "-");
    }

    #[test]
    fn print_records_handles_both_formats() {
        let records = vec![Record::new("rec1", parse_fields(r#"{"A": 1}"#).unwrap())];
        print_records(&records, OutputFormat::Table).unwrap();
        print_records(&records, OutputFormat::Json).unwrap();
        print_records(&[], OutputFormat::Table).unwrap();
    }

    #[test]
    fn read_input_reads_files() {
        let path = std::env::temp_dir().join(format!("tabsync-input-{}.json", std::process::id()));
        std::fs::write(&path, "[]").unwrap();
        assert_eq!(read_input(&path).unwrap(), "[]");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn build_client_requires_api_key() {
        let err = build_client(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("No API key"));
    }
}
