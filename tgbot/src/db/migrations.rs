//! データベースマイグレーション実行

use crate::common::error::{BotError, BotResult};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// SQLiteデータベース接続プールを作成してマイグレーションを実行
///
/// # Arguments
/// * `database_url` - データベースURL（例: "sqlite:data/tgbot.db"）
///
/// # Returns
/// * `Ok(SqlitePool)` - 初期化済みデータベースプール
/// * `Err(BotError)` - 初期化失敗
pub async fn initialize_database(database_url: &str) -> BotResult<SqlitePool> {
    if !is_in_memory(database_url) {
        ensure_parent_dir(database_url)?;

        // データベースファイルが存在しない場合は作成
        if !Sqlite::database_exists(database_url)
            .await
            .map_err(|e| BotError::Database(format!("Failed to check database: {}", e)))?
        {
            tracing::info!("Creating database: {}", database_url);
            Sqlite::create_database(database_url)
                .await
                .map_err(|e| BotError::Database(format!("Failed to create database: {}", e)))?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| BotError::Config(format!("Invalid database URL {}: {}", database_url, e)))?
        .busy_timeout(std::time::Duration::from_secs(5));

    let pool = SqlitePool::connect_with(options)
        .await
        .map_err(|e| BotError::Database(format!("Failed to connect to database: {}", e)))?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// マイグレーションを実行（sqlx::migrate!マクロを使用）
pub async fn run_migrations(pool: &SqlitePool) -> BotResult<()> {
    tracing::info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| BotError::Database(format!("Failed to run migrations: {}", e)))?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

/// 接続文字列からデータベース名を導出する
///
/// `sqlite:data/tgbot.db?mode=rwc` → `tgbot`、インメモリは `memory`
pub fn database_name(database_url: &str) -> String {
    if is_in_memory(database_url) {
        return "memory".to_string();
    }
    let path = file_path(database_url);
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("tgbot")
        .to_string()
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn file_path(database_url: &str) -> &str {
    let without_scheme = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    without_scheme.split('?').next().unwrap_or(without_scheme)
}

fn ensure_parent_dir(database_url: &str) -> BotResult<()> {
    if let Some(parent) = Path::new(file_path(database_url)).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
