//! CLI module for tgbot
//!
//! Provides the bot entry point and audit log administration commands.

pub mod logs;
pub mod run;

use clap::{Parser, Subcommand};

/// Telegram bot with persistent HTTP audit logging
#[derive(Parser, Debug)]
#[command(name = "tgbot")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    TGBOT_TOKEN                  Bot token (required for `run`)
    TGBOT_DATABASE_URL           Database URL (default: sqlite:data/tgbot.db)
    TGBOT_HTTP_LOGS_COLLECTION   Audit log collection (default: bot_http_logs)
    TGBOT_HTTP_CLIENT_NAME       Client name stored in audit records (default: tg-bot-client)
    TGBOT_API_URL                Bot API base URL (default: https://api.telegram.org)
    TGBOT_ASSETS_DIR             Directory holding exampleimg.jpg (default: assets)
    TGBOT_POLL_TIMEOUT_SECS      Long polling timeout (default: 30)
    TGBOT_AUDIT_PERSIST_MODE     inline | detached (default: inline)
    TGBOT_AUDIT_MAX_BODY_BYTES   Body capture limit (default: 262144)
    TGBOT_HTTP_LOG_RETENTION_DAYS         Audit retention, 0 disables (default: 30)
    TGBOT_HTTP_LOG_CLEANUP_INTERVAL_SECS  Cleanup interval (default: 3600)
    TGBOT_LOG_LEVEL              Log level (default: info)
    TGBOT_LOG_DIR                Also write daily log files here
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the bot (default)
    Run(run::RunArgs),
    /// Inspect or purge stored HTTP audit records
    Logs(logs::LogsArgs),
}
