//! 監査ログの保持期間管理
//!
//! 保持期間を過ぎたレコードを起動時と一定間隔で削除する。

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::audit::types::HttpLogRecord;
use crate::common::error::{BotError, BotResult};
use crate::config::RetentionConfig;
use crate::db::http_logs::{cutoff_days_ago, older_than};
use crate::db::repository::Repository;
use crate::shutdown::ShutdownController;

/// 保持日数より古いレコードを削除し、削除件数を返す
///
/// 日数が負、または表現できる範囲を超える場合は `BotError::Config`。
pub async fn purge_expired(
    repository: &dyn Repository<HttpLogRecord>,
    retention_days: i64,
) -> BotResult<u64> {
    let cutoff = cutoff_days_ago(retention_days).ok_or_else(|| {
        BotError::Config(format!(
            "HTTP log retention of {} days is out of range",
            retention_days
        ))
    })?;
    repository.delete_many(&older_than(cutoff)).await
}

/// 定期クリーンアップタスクを開始
///
/// 保持日数が0以下、または範囲外なら何もしない。タスクはシャットダウン要求で終了する。
pub fn start_cleanup_task(
    repository: Arc<dyn Repository<HttpLogRecord>>,
    config: RetentionConfig,
    shutdown: ShutdownController,
) -> Option<JoinHandle<()>> {
    if config.retention_days <= 0 {
        tracing::info!(
            "HTTP log cleanup disabled ({} <= 0)",
            config.retention_days
        );
        return None;
    }
    if cutoff_days_ago(config.retention_days).is_none() {
        tracing::warn!(
            "HTTP log cleanup disabled: retention of {} days is out of range",
            config.retention_days
        );
        return None;
    }

    let retention_days = config.retention_days;
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.cleanup_interval);
        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    tracing::debug!("HTTP log cleanup task stopped");
                    return;
                }
                // 最初のtickは即時に発火するため起動時にも1回実行される
                _ = interval.tick() => {
                    match purge_expired(repository.as_ref(), retention_days).await {
                        Ok(0) => tracing::debug!("HTTP log cleanup: nothing to remove"),
                        Ok(removed) => tracing::info!("HTTP log cleanup removed {} records", removed),
                        Err(e) => tracing::error!("HTTP log cleanup failed: {}", e),
                    }
                }
            }
        }
    });
    Some(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use crate::audit::types::HttpLogRecord;
    use crate::db::document::DocumentStore;
    use crate::db::filter::Filter;
    use crate::db::http_logs::{http_log_repository, DEFAULT_COLLECTION_NAME};

    fn record_at(days_ago: i64) -> HttpLogRecord {
        HttpLogRecord {
            id: None,
            uri: "https://api.example.com/".to_string(),
            method: "GET".to_string(),
            request_body: None,
            request_headers: None,
            status_code: "200".to_string(),
            reason_phrase: Some("OK".to_string()),
            response_body: None,
            response_headers: None,
            action_date_time: Utc::now() - Duration::days(days_ago),
            duration_ms: None,
            client_name: "bot-client".to_string(),
        }
    }

    async fn create_test_repository() -> Arc<dyn Repository<HttpLogRecord>> {
        let store = DocumentStore::new(crate::db::test_utils::test_db_pool().await);
        Arc::new(http_log_repository(&store, DEFAULT_COLLECTION_NAME))
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_recent() {
        let repo = create_test_repository().await;
        repo.insert(&record_at(40)).await.unwrap();
        repo.insert(&record_at(31)).await.unwrap();
        repo.insert(&record_at(1)).await.unwrap();

        let removed = purge_expired(repo.as_ref(), 30).await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(repo.count(&Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disabled_when_retention_not_positive() {
        let repo = create_test_repository().await;
        let config = RetentionConfig {
            retention_days: 0,
            cleanup_interval: std::time::Duration::from_secs(60),
        };
        assert!(start_cleanup_task(repo, config, ShutdownController::default()).is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_rejects_out_of_range_days() {
        let repo = create_test_repository().await;
        repo.insert(&record_at(1)).await.unwrap();

        for days in [-1, 100_000_000, i64::MAX] {
            let err = purge_expired(repo.as_ref(), days).await.unwrap_err();
            assert!(matches!(err, BotError::Config(_)), "{days}: {err}");
        }
        assert_eq!(repo.count(&Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disabled_when_retention_out_of_range() {
        let repo = create_test_repository().await;
        let config = RetentionConfig {
            retention_days: 100_000_000,
            cleanup_interval: std::time::Duration::from_secs(60),
        };
        assert!(start_cleanup_task(repo, config, ShutdownController::default()).is_none());
    }

    #[tokio::test]
    async fn test_task_runs_at_startup_and_stops_on_shutdown() {
        let repo = create_test_repository().await;
        repo.insert(&record_at(10)).await.unwrap();
        let shutdown = ShutdownController::default();
        let config = RetentionConfig {
            retention_days: 7,
            cleanup_interval: std::time::Duration::from_secs(3600),
        };

        let handle = start_cleanup_task(repo.clone(), config, shutdown.clone()).unwrap();

        for _ in 0..50 {
            if repo.count(&Filter::All).await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(repo.count(&Filter::All).await.unwrap(), 0);

        shutdown.request_shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("cleanup task should stop")
            .unwrap();
    }
}
