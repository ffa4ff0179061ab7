//! tgbot entry point

use clap::Parser;
use std::path::Path;
use tgbot::bootstrap::{self, Settings};
use tgbot::cli::{run::RunArgs, Cli, Commands};
use tgbot::config::{self, AuditConfig, BotConfig, RetentionConfig};
use tgbot::logging;
use tgbot::shutdown::{spawn_signal_listener, ShutdownController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_dir = logging::dir_from_env();
    let _log_guard = logging::init(&logging::level_from_env(), log_dir.as_deref().map(Path::new))?;

    match cli.command {
        Some(Commands::Logs(args)) => {
            let audit = AuditConfig::from_env();
            let (pool, repository) =
                bootstrap::open_log_repository(&config::database_url(), &audit.collection_name)
                    .await?;
            let result =
                tgbot::cli::logs::execute(&args.command, &*repository, &mut std::io::stdout())
                    .await;
            pool.close().await;
            result
        }
        Some(Commands::Run(args)) => run_bot(args).await,
        None => run_bot(RunArgs::default()).await,
    }
}

async fn run_bot(args: RunArgs) -> anyhow::Result<()> {
    let settings = Settings {
        database_url: config::database_url(),
        bot: args.apply(BotConfig::from_env()?),
        audit: AuditConfig::from_env(),
        retention: RetentionConfig::from_env(),
    };

    let shutdown = ShutdownController::default();
    spawn_signal_listener(shutdown.clone());

    let context = bootstrap::initialize(settings, shutdown).await?;
    bootstrap::run(context).await;
    Ok(())
}
