use tabsync::paginate::{fetch_all, fetch_first_page};
use tabsync::{ListQuery, TableRef};

use crate::commands::shared::{OutputFormat, build_client, print_records};
use crate::config::Config;
use crate::progress::logging_callback;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct QueryArgs {
    /// View to read through (default "Grid view")
    #[arg(long)]
    pub view: Option<String>,

    /// Read the table directly instead of through a view
    #[arg(long, conflicts_with = "view")]
    pub no_view: bool,

    /// Filter formula, e.g. 'Processed = FALSE()'
    #[arg(long)]
    pub formula: Option<String>,

    /// Records per page
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Only return these fields (repeatable)
    #[arg(long = "field")]
    pub fields: Vec<String>,
}

impl QueryArgs {
    pub(crate) fn to_query(&self) -> ListQuery {
        let mut query = match (&self.view, self.no_view) {
            (Some(view), _) => ListQuery::view(view.clone()),
            (None, true) => ListQuery::all(),
            (None, false) => ListQuery::default(),
        };
        if let Some(formula) = &self.formula {
            query = query.with_formula(formula.clone());
        }
        if let Some(page_size) = self.page_size {
            query = query.with_page_size(page_size);
        }
        query.with_fields(self.fields.iter().cloned())
    }
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct FetchArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Cap on the total number of records
    #[arg(long)]
    pub max_records: Option<u32>,

    /// Only fetch the first page (no retry)
    #[arg(long)]
    pub first_page: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

pub(crate) async fn handle_fetch(
    args: FetchArgs,
    table: &TableRef,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut query = args.query.to_query();
    if let Some(max_records) = args.max_records {
        query = query.with_max_records(max_records);
    }
    let client = build_client(config)?;

    let records = if args.first_page {
        fetch_first_page(&client, table, &query).await?
    } else {
        let on_progress = logging_callback();
        fetch_all(
            &client,
            table,
            &query,
            &config.retry_config(),
            Some(&on_progress),
        )
        .await?
    };

    print_records(&records, args.output)
}
