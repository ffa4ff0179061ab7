//! ボット初期化ロジック
//!
//! データベース接続、監査ログ付きHTTPトランスポート、Telegramクライアント、
//! 保持期間クリーンアップなど、起動に必要なコンポーネントを組み立てる。
//! 各コンポーネントは引数で受け渡し、グローバルな状態は持たない。

use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::audit::logger::HttpAuditLogger;
use crate::audit::retention::start_cleanup_task;
use crate::audit::types::HttpLogRecord;
use crate::bot::handlers::UpdateHandler;
use crate::bot::BotService;
use crate::common::error::BotResult;
use crate::config::{AuditConfig, BotConfig, RetentionConfig};
use crate::db::document::DocumentStore;
use crate::db::http_logs::{http_log_repository, HttpLogRepository};
use crate::db::migrations::{database_name, initialize_database};
use crate::db::repository::Repository;
use crate::shutdown::ShutdownController;
use crate::telegram::TelegramClient;
use crate::transport::ReqwestTransport;

/// 接続確立のタイムアウト
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// 通常のAPI呼び出しのタイムアウト（getUpdatesは個別に延長する）
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// 起動時の全設定
#[derive(Debug, Clone)]
pub struct Settings {
    /// データベースURL
    pub database_url: String,
    /// ボット設定
    pub bot: BotConfig,
    /// 監査ログ設定
    pub audit: AuditConfig,
    /// 保持期間設定
    pub retention: RetentionConfig,
}

/// 初期化済みのボット
pub struct BotContext {
    /// データベース接続プール
    pub pool: SqlitePool,
    /// 監査ログRepository
    pub repository: Arc<HttpLogRepository>,
    /// ボットサービス
    pub service: BotService,
    /// 保持期間クリーンアップタスク（無効なら `None`）
    pub cleanup: Option<JoinHandle<()>>,
}

/// データベースを開き、監査ログRepositoryを返す
pub async fn open_log_repository(
    database_url: &str,
    collection_name: &str,
) -> BotResult<(SqlitePool, Arc<HttpLogRepository>)> {
    let pool = initialize_database(database_url).await?;
    info!(
        "Using database '{}' (collection: {})",
        database_name(database_url),
        collection_name
    );
    let store = DocumentStore::new(pool.clone());
    let repository = Arc::new(http_log_repository(&store, collection_name));
    Ok((pool, repository))
}

/// 送信用のreqwestクライアントを作成
pub fn build_http_client() -> BotResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

/// 監査ログ付きのTelegramクライアントを組み立てる
///
/// Detachedモードの保存タスクは `tasks` に登録される。
pub fn build_telegram_client(
    http: reqwest::Client,
    repository: Arc<dyn Repository<HttpLogRecord>>,
    bot: &BotConfig,
    audit: &AuditConfig,
    tasks: &TaskTracker,
) -> TelegramClient {
    let transport = HttpAuditLogger::new(
        ReqwestTransport::new(http.clone()),
        repository,
        audit.client_name.clone(),
    )
    .with_persist_mode(audit.persist_mode)
    .with_max_body_bytes(audit.max_body_bytes)
    .with_redacted_secret(bot.token.clone())
    .with_task_tracker(tasks.clone());

    TelegramClient::new(http, Arc::new(transport), bot.api_url.clone(), bot.token.clone())
}

/// ボットを初期化する
pub async fn initialize(settings: Settings, shutdown: ShutdownController) -> BotResult<BotContext> {
    info!("tgbot v{}", env!("CARGO_PKG_VERSION"));

    let (pool, repository) =
        open_log_repository(&settings.database_url, &settings.audit.collection_name).await?;

    let cleanup = start_cleanup_task(repository.clone(), settings.retention, shutdown.clone());

    // 更新処理と監査ログ保存のタスクを1つのトラッカーでまとめて待つ
    let tasks = TaskTracker::new();
    let client = build_telegram_client(
        build_http_client()?,
        repository.clone(),
        &settings.bot,
        &settings.audit,
        &tasks,
    );
    let handler = UpdateHandler::new(client.clone(), settings.bot.assets_dir.clone());
    let service = BotService::new(client, handler, settings.bot.poll_timeout, shutdown)
        .with_task_tracker(tasks);

    info!(
        "HTTP audit: client '{}', mode {:?}",
        settings.audit.client_name, settings.audit.persist_mode
    );

    Ok(BotContext {
        pool,
        repository,
        service,
        cleanup,
    })
}

/// シャットダウンまでボットを動かし、後片付けする
///
/// 処理中の更新と監査ログ保存が終わってから接続プールを閉じる。
pub async fn run(context: BotContext) {
    context.service.run().await;
    if let Some(cleanup) = context.cleanup {
        join_cleanup(cleanup).await;
    }
    context.pool.close().await;
    info!("Shutdown complete");
}

/// クリーンアップタスクの終了を待つ。異常終了なら `false`
async fn join_cleanup(cleanup: JoinHandle<()>) -> bool {
    match cleanup.await {
        Ok(()) => true,
        Err(e) => {
            warn!("HTTP log cleanup task failed: {}", e);
            false
        }
    }
}
