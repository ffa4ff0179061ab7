//! HTTP監査ログのコレクション

use chrono::{DateTime, TimeDelta, Utc};

use crate::audit::types::{fields, HttpLogRecord};
use crate::common::time::format_utc;
use crate::db::document::DocumentStore;
use crate::db::filter::Filter;
use crate::db::repository::DocumentRepository;

/// 監査ログ用コレクション名のデフォルト
pub const DEFAULT_COLLECTION_NAME: &str = "bot_http_logs";

/// HTTP監査ログのRepository
pub type HttpLogRepository = DocumentRepository<HttpLogRecord>;

/// `collection_name` に束縛した監査ログRepositoryを作成
pub fn http_log_repository(store: &DocumentStore, collection_name: &str) -> HttpLogRepository {
    DocumentRepository::new(store, collection_name)
}

/// `cutoff` より前に実行された交換に一致する条件
pub fn older_than(cutoff: DateTime<Utc>) -> Filter {
    Filter::lt(fields::ACTION_DATE_TIME, format_utc(&cutoff))
}

/// 現在から `days` 日前の時刻
///
/// 負の日数や、chronoで表現できない過去を指す日数は `None` になる。
pub fn cutoff_days_ago(days: i64) -> Option<DateTime<Utc>> {
    if days < 0 {
        return None;
    }
    TimeDelta::try_days(days).and_then(|age| Utc::now().checked_sub_signed(age))
}

/// 論理クライアント名に一致する条件
pub fn by_client(client_name: &str) -> Filter {
    Filter::eq(fields::CLIENT_NAME, client_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::Repository;
    use chrono::Duration;

    fn record(client: &str, at: DateTime<Utc>) -> HttpLogRecord {
        HttpLogRecord {
            id: None,
            uri: "https://api.telegram.org/bot***/getUpdates".to_string(),
            method: "POST".to_string(),
            request_body: None,
            request_headers: None,
            status_code: "200".to_string(),
            reason_phrase: Some("OK".to_string()),
            response_body: Some("{\"ok\":true,\"result\":[]}".to_string()),
            response_headers: None,
            action_date_time: at,
            duration_ms: None,
            client_name: client.to_string(),
        }
    }

    #[tokio::test]
    async fn test_older_than_matches_by_time() {
        let store = DocumentStore::new(crate::db::test_utils::test_db_pool().await);
        let repo = http_log_repository(&store, DEFAULT_COLLECTION_NAME);
        let now = Utc::now();

        repo.insert(&record("a", now - Duration::days(8))).await.unwrap();
        let fresh = repo.insert(&record("a", now - Duration::days(6))).await.unwrap();

        let removed = repo
            .delete_many(&older_than(now - Duration::days(7)))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let remaining = repo.get_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, Some(fresh));
    }

    #[test]
    fn test_cutoff_days_ago_bounds() {
        let cutoff = cutoff_days_ago(7).unwrap();
        let age = Utc::now() - cutoff;
        assert!(age >= Duration::days(7) && age < Duration::days(7) + Duration::minutes(1));
        assert!(cutoff_days_ago(0).is_some());

        assert!(cutoff_days_ago(-1).is_none());
        assert!(cutoff_days_ago(100_000_000).is_none());
        assert!(cutoff_days_ago(i64::MAX).is_none());
    }

    #[tokio::test]
    async fn test_by_client_and_round_trip_timestamp() {
        let store = DocumentStore::new(crate::db::test_utils::test_db_pool().await);
        let repo = http_log_repository(&store, DEFAULT_COLLECTION_NAME);
        let at = Utc::now();
        let original = record("tg-bot-client", at);

        let id = repo.insert(&original).await.unwrap();
        repo.insert(&record("other", at)).await.unwrap();

        let found = repo.get(&by_client("tg-bot-client")).await.unwrap().unwrap();
        assert_eq!(found.id, Some(id));
        // マイクロ秒精度で保存される
        assert_eq!(
            found.action_date_time.timestamp_micros(),
            at.timestamp_micros()
        );
        assert_eq!(repo.count(&by_client("other")).await.unwrap(), 1);
    }
}
