//! 統合テスト用ヘルパー

#![allow(dead_code)]

use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tgbot::db::document::DocumentStore;
use tgbot::db::http_logs::{http_log_repository, HttpLogRepository};

/// マイグレーション済みのインメモリSQLiteプール
pub async fn test_db_pool() -> sqlx::SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// 監査ログRepository
pub async fn log_repository(collection: &str) -> Arc<HttpLogRepository> {
    let store = DocumentStore::new(test_db_pool().await);
    Arc::new(http_log_repository(&store, collection))
}

/// プロキシ設定に左右されないreqwestクライアント
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("Failed to build HTTP client")
}
