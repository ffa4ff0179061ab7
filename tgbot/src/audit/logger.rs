//! HTTP監査ロガー
//!
//! 送信HTTPトランスポートをラップし、1回の送受信につき1件の `HttpLogRecord` を
//! Repositoryへ保存する。呼び出し元に返すレスポンスは変更しない。
//! トランスポートが失敗した場合はエラーをそのまま返し、レコードは作らない。

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::audit::types::{header_values, HttpLogRecord};
use crate::common::error::BotResult;
use crate::db::repository::Repository;
use crate::transport::{capture_request_body, reason_phrase, HttpTransport};

/// 本文キャプチャ上限のデフォルト（256 KiB）
pub const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024;

const REDACTED: &str = "***";

/// 監査レコードの保存方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditPersistMode {
    /// レスポンスを返す前に保存を待つ（失敗はログのみ）
    #[default]
    Inline,
    /// 保存をバックグラウンドタスクに任せる（タスクは `TaskTracker` で追跡する）
    Detached,
}

impl AuditPersistMode {
    /// 設定文字列から変換（不明な値は `None`）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Self::Inline),
            "detached" | "background" => Some(Self::Detached),
            _ => None,
        }
    }
}

/// HTTP監査ロガー
pub struct HttpAuditLogger<T> {
    inner: T,
    repository: Arc<dyn Repository<HttpLogRecord>>,
    client_name: String,
    persist_mode: AuditPersistMode,
    max_body_bytes: usize,
    redact: Vec<String>,
    tasks: TaskTracker,
}

impl<T: HttpTransport> HttpAuditLogger<T> {
    /// `inner` への呼び出しを記録するロガーを作成
    ///
    /// `client_name` は生成する全レコードの `ClientName` になる。
    pub fn new(
        inner: T,
        repository: Arc<dyn Repository<HttpLogRecord>>,
        client_name: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            repository,
            client_name: client_name.into(),
            persist_mode: AuditPersistMode::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            redact: Vec::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Detachedモードの保存タスクを登録する `TaskTracker` を設定
    ///
    /// シャットダウン時はこのトラッカーを待ってから接続プールを閉じる。
    pub fn with_task_tracker(mut self, tasks: TaskTracker) -> Self {
        self.tasks = tasks;
        self
    }

    /// 保存タスクを追跡している `TaskTracker`
    pub fn task_tracker(&self) -> &TaskTracker {
        &self.tasks
    }

    /// 保存方法を設定
    pub fn with_persist_mode(mut self, mode: AuditPersistMode) -> Self {
        self.persist_mode = mode;
        self
    }

    /// 本文キャプチャ上限を設定
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// 保存するURIから伏せる秘密値（ボットトークン等）を追加
    pub fn with_redacted_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.redact.push(secret);
        }
        self
    }

    /// 論理クライアント名
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    fn redact_uri(&self, uri: &str) -> String {
        self.redact
            .iter()
            .fold(uri.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }

    async fn persist(&self, record: HttpLogRecord) {
        match self.persist_mode {
            AuditPersistMode::Inline => {
                if let Err(e) = self.repository.insert(&record).await {
                    warn!(
                        client = %self.client_name,
                        uri = %record.uri,
                        "Failed to store HTTP audit record: {}",
                        e
                    );
                }
            }
            AuditPersistMode::Detached => {
                let repository = Arc::clone(&self.repository);
                let client = self.client_name.clone();
                self.tasks.spawn(async move {
                    if let Err(e) = repository.insert(&record).await {
                        warn!(
                            client = %client,
                            uri = %record.uri,
                            "Failed to store HTTP audit record: {}",
                            e
                        );
                    }
                });
            }
        }
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for HttpAuditLogger<T> {
    async fn send(&self, mut request: reqwest::Request) -> BotResult<http::Response<Bytes>> {
        // 保存形式と同じマイクロ秒精度に揃える
        let action_date_time = Utc::now().trunc_subsecs(6);
        let uri = self.redact_uri(request.url().as_str());
        let method = request.method().to_string();

        info!(client = %self.client_name, "Request: {} {}", method, uri);
        for (name, value) in request.headers() {
            debug!(client = %self.client_name, "Request Header: {}: {:?}", name, value);
        }
        let request_headers = header_values(request.headers());

        let request_body = capture_request_body(&mut request)
            .await?
            .and_then(|bytes| body_text(&bytes, self.max_body_bytes));
        if let Some(body) = &request_body {
            debug!(client = %self.client_name, "Request Body: {}", body);
        }

        let started = Instant::now();
        let response = self.inner.send(request).await?;
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let status = response.status();
        let reason = reason_phrase(&response);
        for (name, value) in response.headers() {
            debug!(client = %self.client_name, "Response Header: {}: {:?}", name, value);
        }
        info!(
            client = %self.client_name,
            duration_ms,
            "Response: {} {}",
            status.as_u16(),
            reason.as_deref().unwrap_or("")
        );

        // 本文は借用して読むだけで、呼び出し元へそのまま返す
        let response_body = body_text(response.body(), self.max_body_bytes);
        if let Some(body) = &response_body {
            debug!(client = %self.client_name, "Response Body: {}", body);
        }

        let record = HttpLogRecord {
            id: None,
            uri,
            method,
            request_body,
            request_headers: Some(request_headers),
            status_code: status.as_u16().to_string(),
            reason_phrase: reason,
            response_body,
            response_headers: Some(header_values(response.headers())),
            action_date_time,
            duration_ms: Some(duration_ms),
            client_name: self.client_name.clone(),
        };

        self.persist(record).await;

        Ok(response)
    }
}

/// 本文を保存用テキストに変換する
///
/// 空なら `None`。UTF-8でなければサイズのみ、上限を超えたら切り詰めて残量を付記する。
fn body_text(bytes: &Bytes, max_body_bytes: usize) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => return Some(format!("[binary body: {} bytes]", bytes.len())),
    };
    if text.len() <= max_body_bytes {
        return Some(text.to_string());
    }
    let mut cut = max_body_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    Some(format!(
        "{}…[truncated {} bytes]",
        &text[..cut],
        text.len() - cut
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::BotError;
    use crate::db::document::DocumentStore;
    use crate::db::filter::Filter;
    use crate::db::repository::DocumentRepository;
    use crate::db::test_utils::test_db_pool;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// 受け取ったリクエストを記録し、固定レスポンスを返すトランスポート
    struct StubTransport {
        seen_bodies: Mutex<Vec<Option<Bytes>>>,
        fail: bool,
    }

    impl StubTransport {
        fn ok() -> Self {
            Self {
                seen_bodies: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                seen_bodies: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn send(&self, request: reqwest::Request) -> BotResult<http::Response<Bytes>> {
            let body = request
                .body()
                .and_then(|b| b.as_bytes())
                .map(Bytes::copy_from_slice);
            self.seen_bodies.lock().unwrap().push(body);
            if self.fail {
                return Err(BotError::Internal("connection refused".to_string()));
            }
            let mut response = http::Response::new(Bytes::from_static(b"{\"ok\":true}"));
            response.headers_mut().insert(
                http::header::CONTENT_TYPE,
                http::HeaderValue::from_static("application/json"),
            );
            Ok(response)
        }
    }

    /// 常に失敗するRepository
    struct BrokenRepository;

    #[async_trait]
    impl Repository<HttpLogRecord> for BrokenRepository {
        async fn get_all(&self) -> BotResult<Vec<HttpLogRecord>> {
            Err(BotError::Database("down".into()))
        }
        async fn get(&self, _: &Filter) -> BotResult<Option<HttpLogRecord>> {
            Err(BotError::Database("down".into()))
        }
        async fn get_by_id(&self, _: Uuid) -> BotResult<Option<HttpLogRecord>> {
            Err(BotError::Database("down".into()))
        }
        async fn insert(&self, _: &HttpLogRecord) -> BotResult<Uuid> {
            Err(BotError::Database("down".into()))
        }
        async fn update(&self, _: Uuid, _: &HttpLogRecord) -> BotResult<bool> {
            Err(BotError::Database("down".into()))
        }
        async fn delete(&self, _: Uuid) -> BotResult<bool> {
            Err(BotError::Database("down".into()))
        }
        async fn delete_many(&self, _: &Filter) -> BotResult<u64> {
            Err(BotError::Database("down".into()))
        }
        async fn find(&self, _: &Filter, _: Option<usize>) -> BotResult<Vec<HttpLogRecord>> {
            Err(BotError::Database("down".into()))
        }
        async fn find_latest(&self, _: &Filter, _: usize) -> BotResult<Vec<HttpLogRecord>> {
            Err(BotError::Database("down".into()))
        }
        async fn count(&self, _: &Filter) -> BotResult<u64> {
            Err(BotError::Database("down".into()))
        }
    }

    async fn create_test_repository() -> Arc<DocumentRepository<HttpLogRecord>> {
        let store = DocumentStore::new(test_db_pool().await);
        Arc::new(DocumentRepository::new(&store, "bot_http_logs"))
    }

    fn post(url: &str, body: &str) -> reqwest::Request {
        reqwest::Client::new()
            .post(url)
            .header("content-type", "application/json")
            .body(body.to_string())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_records_exchange_and_forwards_body() {
        let repo = create_test_repository().await;
        let stub = Arc::new(StubTransport::ok());
        let logger = HttpAuditLogger::new(Arc::clone(&stub), repo.clone(), "bot-client");

        let response = logger
            .send(post("https://api.example.com/echo", "{\"chat_id\":1}"))
            .await
            .unwrap();

        assert_eq!(response.body(), &Bytes::from_static(b"{\"ok\":true}"));
        assert_eq!(
            stub.seen_bodies.lock().unwrap()[0].as_deref(),
            Some(&b"{\"chat_id\":1}"[..])
        );

        let records = repo.get_all().await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.method, "POST");
        assert_eq!(record.uri, "https://api.example.com/echo");
        assert_eq!(record.request_body.as_deref(), Some("{\"chat_id\":1}"));
        assert_eq!(
            record.request_headers.as_ref().unwrap()["content-type"],
            vec!["application/json"]
        );
        assert_eq!(record.status_code, "200");
        assert_eq!(record.reason_phrase.as_deref(), Some("OK"));
        assert_eq!(record.client_name, "bot-client");
        assert!(record.id.is_some());
    }

    #[tokio::test]
    async fn test_ping_record_reads_back_unchanged() {
        let repo = create_test_repository().await;
        let logger = HttpAuditLogger::new(StubTransport::ok(), repo.clone(), "bot-client");
        let request = reqwest::Client::new()
            .get("https://api.example.com/ping")
            .build()
            .unwrap();

        logger.send(request).await.unwrap();

        let stored = repo.get_all().await.unwrap().remove(0);
        assert_eq!(stored.method, "GET");
        assert_eq!(stored.uri, "https://api.example.com/ping");
        assert_eq!(stored.status_code, "200");
        assert_eq!(stored.response_body.as_deref(), Some("{\"ok\":true}"));
        assert_eq!(stored.client_name, "bot-client");

        // 再挿入したレコードはIDを除いて同じ内容で読み戻せる
        let copy_id = repo.insert(&stored).await.unwrap();
        let copy = repo.get_by_id(copy_id).await.unwrap().unwrap();
        assert_eq!(
            HttpLogRecord { id: None, ..copy },
            HttpLogRecord { id: None, ..stored }
        );
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_without_record() {
        let repo = create_test_repository().await;
        let logger = HttpAuditLogger::new(StubTransport::failing(), repo.clone(), "bot-client");

        let err = logger
            .send(post("https://api.example.com/echo", "x"))
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::Internal(ref m) if m == "connection refused"));
        assert_eq!(repo.count(&Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_break_caller() {
        let logger = HttpAuditLogger::new(
            StubTransport::ok(),
            Arc::new(BrokenRepository),
            "bot-client",
        );

        let response = logger
            .send(post("https://api.example.com/echo", "x"))
            .await
            .expect("store failure must not reach the caller");
        assert_eq!(response.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_detached_mode_eventually_stores() {
        let repo = create_test_repository().await;
        let logger = HttpAuditLogger::new(StubTransport::ok(), repo.clone(), "bot-client")
            .with_persist_mode(AuditPersistMode::Detached);

        logger
            .send(post("https://api.example.com/echo", "x"))
            .await
            .unwrap();

        for _ in 0..50 {
            if repo.count(&Filter::All).await.unwrap() == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("detached insert was not stored");
    }

    #[tokio::test]
    async fn test_detached_inserts_are_drained_by_tracker() {
        let repo = create_test_repository().await;
        let tasks = TaskTracker::new();
        let logger = HttpAuditLogger::new(StubTransport::ok(), repo.clone(), "bot-client")
            .with_persist_mode(AuditPersistMode::Detached)
            .with_task_tracker(tasks.clone());

        for i in 0..5 {
            logger
                .send(post("https://api.example.com/echo", &i.to_string()))
                .await
                .unwrap();
        }

        tasks.close();
        tokio::time::timeout(std::time::Duration::from_secs(2), tasks.wait())
            .await
            .expect("detached inserts should finish");
        assert!(logger.task_tracker().is_empty());
        assert_eq!(repo.count(&Filter::All).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_redacts_secret_from_uri() {
        let repo = create_test_repository().await;
        let logger = HttpAuditLogger::new(StubTransport::ok(), repo.clone(), "bot-client")
            .with_redacted_secret("123:SECRET");

        logger
            .send(post("https://api.telegram.org/bot123:SECRET/getMe", ""))
            .await
            .unwrap();

        let record = repo.get(&Filter::All).await.unwrap().unwrap();
        assert_eq!(record.uri, "https://api.telegram.org/bot***/getMe");
        assert_eq!(record.request_body, None);
    }

    #[test]
    fn test_body_text_rules() {
        assert_eq!(body_text(&Bytes::new(), 10), None);
        assert_eq!(
            body_text(&Bytes::from_static(b"hello"), 10).as_deref(),
            Some("hello")
        );
        assert_eq!(
            body_text(&Bytes::from_static(&[0xff, 0xfe, 0x00]), 10).as_deref(),
            Some("[binary body: 3 bytes]")
        );
        assert_eq!(
            body_text(&Bytes::from_static(b"abcdefgh"), 3).as_deref(),
            Some("abc…[truncated 5 bytes]")
        );
        // マルチバイト文字の途中では切らない
        assert_eq!(
            body_text(&Bytes::from("あい".as_bytes().to_vec()), 4).as_deref(),
            Some("あ…[truncated 3 bytes]")
        );
    }

    #[test]
    fn test_persist_mode_parse() {
        assert_eq!(AuditPersistMode::parse("inline"), Some(AuditPersistMode::Inline));
        assert_eq!(
            AuditPersistMode::parse(" Detached "),
            Some(AuditPersistMode::Detached)
        );
        assert_eq!(AuditPersistMode::parse("sometimes"), None);
    }
}
