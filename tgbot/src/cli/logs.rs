//! logs subcommand
//!
//! Lists, shows and purges stored HTTP audit records.

use clap::{Args, Subcommand};
use std::io::Write;
use uuid::Uuid;

use crate::audit::types::{fields, HttpLogRecord};
use crate::db::filter::Filter;
use crate::db::http_logs::{by_client, cutoff_days_ago, older_than};
use crate::db::repository::Repository;

/// Arguments for the logs subcommand
#[derive(Args, Debug, Clone)]
pub struct LogsArgs {
    /// Operation to run
    #[command(subcommand)]
    pub command: LogsCommand,
}

/// logs operations
#[derive(Subcommand, Debug, Clone)]
pub enum LogsCommand {
    /// List the most recent records
    List {
        /// Maximum number of records to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Only records with this client name
        #[arg(long)]
        client: Option<String>,
        /// Only records with this status code (e.g. 200)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one record in full
    Show {
        /// Record id
        id: Uuid,
    },
    /// Delete records
    Purge {
        /// Delete records older than this many days
        #[arg(long)]
        older_than_days: Option<i64>,
        /// Delete records with this client name
        #[arg(long)]
        client: Option<String>,
        /// Delete every record
        #[arg(long, default_value_t = false, conflicts_with_all = ["older_than_days", "client"])]
        all: bool,
    },
}

/// Execute the logs command, writing human-readable output to `out`
pub async fn execute<W: Write>(
    command: &LogsCommand,
    repository: &dyn Repository<HttpLogRecord>,
    out: &mut W,
) -> Result<(), anyhow::Error> {
    match command {
        LogsCommand::List {
            limit,
            client,
            status,
        } => {
            let mut filter = Filter::All;
            if let Some(client) = client {
                filter = filter.and(by_client(client));
            }
            if let Some(status) = status {
                filter = filter.and(Filter::eq(fields::STATUS_CODE, status.as_str()));
            }

            // 新しい順に取得し、古い順に表示する
            let mut shown = repository.find_latest(&filter, *limit).await?;
            shown.reverse();
            if shown.is_empty() {
                writeln!(out, "No HTTP log records")?;
                return Ok(());
            }
            writeln!(out, "ID\tTIME\tCLIENT\tMETHOD\tSTATUS\tURI")?;
            for record in &shown {
                writeln!(out, "{}", format_row(record))?;
            }
        }
        LogsCommand::Show { id } => match repository.get_by_id(*id).await? {
            Some(record) => {
                writeln!(out, "Id: {}", id)?;
                writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?;
            }
            None => anyhow::bail!("HTTP log record {} not found", id),
        },
        LogsCommand::Purge {
            older_than_days,
            client,
            all,
        } => {
            let filter = purge_filter(*older_than_days, client.as_deref(), *all)?;
            let removed = repository.delete_many(&filter).await?;
            writeln!(out, "Removed {} HTTP log records", removed)?;
        }
    }
    Ok(())
}

fn purge_filter(
    older_than_days: Option<i64>,
    client: Option<&str>,
    all: bool,
) -> Result<Filter, anyhow::Error> {
    if all {
        return Ok(Filter::All);
    }
    let mut filter = Filter::All;
    if let Some(days) = older_than_days {
        if days < 0 {
            anyhow::bail!("--older-than-days must not be negative (got {})", days);
        }
        let Some(cutoff) = cutoff_days_ago(days) else {
            anyhow::bail!("--older-than-days {} is out of range", days);
        };
        filter = filter.and(older_than(cutoff));
    }
    if let Some(client) = client {
        filter = filter.and(by_client(client));
    }
    if filter == Filter::All {
        anyhow::bail!("Specify --older-than-days, --client or --all");
    }
    Ok(filter)
}

fn format_row(record: &HttpLogRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        record.id.map(|id| id.to_string()).unwrap_or_default(),
        crate::common::time::format_utc(&record.action_date_time),
        record.client_name,
        record.method,
        record.status_code,
        record.uri
    )
}
