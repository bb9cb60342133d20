use clap::Args;

use super::OutputFormat;
use crate::error::Result;
use crate::logger::Logger;
use crate::query::{self, group_by_request, FilterArgs, QueryPage};
use crate::types::LogEntry;

/// Filters and output options for `list`.
#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    /// Owner slug(s), comma-separated
    #[arg(long)]
    pub owner: Option<String>,

    /// Action type key(s), comma-separated
    #[arg(long = "type")]
    pub action_type: Option<String>,

    /// Object type(s), comma-separated
    #[arg(long)]
    pub object_type: Option<String>,

    /// Behaviour(s): 0/error, 1/success, 2/warning
    #[arg(long)]
    pub behaviour: Option<String>,

    /// Level(s): editor, developer
    #[arg(long)]
    pub level: Option<String>,

    /// Acting user id
    #[arg(long)]
    pub user: Option<String>,

    /// Correlation id
    #[arg(long)]
    pub request_id: Option<String>,

    /// Earliest entry (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub from: Option<String>,

    /// Latest entry (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub to: Option<String>,

    /// Maximum entries to show (default 50, max 500)
    #[arg(long)]
    pub limit: Option<String>,

    /// Entries to skip
    #[arg(long)]
    pub offset: Option<String>,

    /// asc or desc
    #[arg(long)]
    pub order: Option<String>,

    /// Group adjacent entries of the same request in table output
    #[arg(long)]
    pub group: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl ListArgs {
    fn filter_args(&self) -> FilterArgs {
        FilterArgs {
            owner: self.owner.clone(),
            action_type: self.action_type.clone(),
            object_type: self.object_type.clone(),
            behaviour: self.behaviour.clone(),
            level: self.level.clone(),
            user_id: self.user.clone(),
            date_from: self.from.clone(),
            date_to: self.to.clone(),
            request_id: self.request_id.clone(),
            limit: self.limit.clone(),
            offset: self.offset.clone(),
            order: self.order.clone(),
            ..Default::default()
        }
    }
}

/// Execute the `list` command: print matching entries.
pub fn execute(logger: &Logger, args: &ListArgs) -> Result<()> {
    let page = query::execute(logger.storage().as_ref(), &args.filter_args())?;
    print!("{}", render(&page, args.format, args.group)?);
    Ok(())
}

/// Render one page of entries in the requested format.
pub fn render(page: &QueryPage, format: OutputFormat, group: bool) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(page)? + "\n"),
        OutputFormat::Csv => render_csv(&page.data),
        OutputFormat::Table => Ok(render_table(page, group)),
    }
}

fn render_table(page: &QueryPage, group: bool) -> String {
    if page.data.is_empty() {
        return "No activity entries found.\n".to_string();
    }

    let mut out = format!(
        "{:<20} {:<16} {:<20} {:<9} {:<10} {:<6} MESSAGE\n",
        "TIME", "OWNER", "ACTION", "BEHAVIOUR", "LEVEL", "USER"
    );
    if group {
        for request in group_by_request(&page.data) {
            let context = request
                .entries
                .first()
                .map(|e| e.request_context.as_str())
                .unwrap_or_default();
            if request.request_id.is_empty() {
                out.push_str("-- (uncorrelated)\n");
            } else {
                out.push_str(&format!("-- request {} {}\n", request.request_id, context));
            }
            for entry in request.entries {
                out.push_str(&table_row(entry));
            }
        }
    } else {
        for entry in &page.data {
            out.push_str(&table_row(entry));
        }
    }

    out.push_str(&format!(
        "\n{} of {} entries (page {})\n",
        page.data.len(),
        page.total,
        page.page
    ));
    out
}

fn table_row(entry: &LogEntry) -> String {
    let user = if entry.user_id == 0 {
        "-".to_string()
    } else {
        entry.user_id.to_string()
    };
    format!(
        "{:<20} {:<16} {:<20} {:<9} {:<10} {:<6} {}\n",
        entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        entry.owner,
        entry.action_type,
        entry.behaviour,
        entry.level,
        user,
        entry.message,
    )
}

fn render_csv(entries: &[LogEntry]) -> Result<String> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record([
            "log_id",
            "created_at",
            "owner",
            "action_type",
            "object_type",
            "behaviour",
            "level",
            "user_id",
            "object_id",
            "message",
            "request_id",
            "request_context",
            "data",
        ])?;
        for entry in entries {
            writer.write_record([
                entry.log_id.clone().unwrap_or_default(),
                entry.created_at.to_rfc3339(),
                entry.owner.clone(),
                entry.action_type.clone(),
                entry.object_type.clone(),
                entry.behaviour.code().to_string(),
                entry.level.to_string(),
                entry.user_id.to_string(),
                entry.object_id.to_string(),
                entry.message.clone(),
                entry.request_id.clone(),
                entry.request_context.clone(),
                serde_json::to_string(&entry.data.payload)?,
            ])?;
        }
        writer.flush()?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
