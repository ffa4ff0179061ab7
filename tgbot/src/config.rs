//! Configuration management via environment variables
//!
//! Provides helper functions for reading environment variables with fallback
//! to deprecated variable names with warning logs, and the typed settings
//! resolved from them at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::audit::logger::{AuditPersistMode, DEFAULT_MAX_BODY_BYTES};
use crate::common::error::{BotError, BotResult};
use crate::db::http_logs::{cutoff_days_ago, DEFAULT_COLLECTION_NAME};

/// Telegram Bot APIのデフォルトURL
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
/// デフォルトのデータベースURL
pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/tgbot.db";
/// 監査レコードに付ける論理クライアント名のデフォルト
pub const DEFAULT_HTTP_CLIENT_NAME: &str = "tg-bot-client";

/// Get an environment variable with fallback to a deprecated name
///
/// If the new variable name is set, returns its value.
/// If only the old (deprecated) variable name is set, returns its value
/// and logs a deprecation warning.
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback and default value
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Returns `default` if neither is set or parsing fails.
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    get_env_with_fallback(new_name, old_name)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// ボット本体の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// ボットトークン
    pub token: String,
    /// Bot APIのベースURL
    pub api_url: String,
    /// 送信する画像・ファイルの置き場所
    pub assets_dir: PathBuf,
    /// getUpdatesのロングポーリング待ち時間
    pub poll_timeout: Duration,
}

impl BotConfig {
    /// 環境変数から読み込む
    ///
    /// トークン（`TGBOT_TOKEN`、旧: `TG_BOT_TOKEN`）は必須。
    pub fn from_env() -> BotResult<Self> {
        let token = get_env_with_fallback("TGBOT_TOKEN", "TG_BOT_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BotError::Config("TGBOT_TOKEN is not set".to_string()))?;

        Ok(Self {
            token,
            api_url: get_env_with_fallback_or("TGBOT_API_URL", "TG_BOT_API_URL", DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            assets_dir: PathBuf::from(get_env_with_fallback_or(
                "TGBOT_ASSETS_DIR",
                "TG_BOT_ASSETS_DIR",
                "assets",
            )),
            poll_timeout: Duration::from_secs(get_env_with_fallback_parse(
                "TGBOT_POLL_TIMEOUT_SECS",
                "TG_BOT_POLL_TIMEOUT_SECS",
                30u64,
            )),
        })
    }
}

/// データベースURLを取得
///
/// `TGBOT_DATABASE_URL`（旧: `DATABASE_URL`）、未設定なら `sqlite:data/tgbot.db`。
pub fn database_url() -> String {
    get_env_with_fallback_or("TGBOT_DATABASE_URL", "DATABASE_URL", DEFAULT_DATABASE_URL)
}

/// HTTP監査ログの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    /// 保存先コレクション名
    pub collection_name: String,
    /// レコードの `ClientName`
    pub client_name: String,
    /// 保存方法
    pub persist_mode: AuditPersistMode,
    /// 本文キャプチャ上限（バイト）
    pub max_body_bytes: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            client_name: DEFAULT_HTTP_CLIENT_NAME.to_string(),
            persist_mode: AuditPersistMode::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl AuditConfig {
    /// 環境変数から読み込む
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let persist_mode = match get_env_with_fallback(
            "TGBOT_AUDIT_PERSIST_MODE",
            "BOT_AUDIT_PERSIST_MODE",
        ) {
            Some(value) => AuditPersistMode::parse(&value).unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown TGBOT_AUDIT_PERSIST_MODE '{}', using {:?}",
                    value,
                    defaults.persist_mode
                );
                defaults.persist_mode
            }),
            None => defaults.persist_mode,
        };

        Self {
            collection_name: get_env_with_fallback_or(
                "TGBOT_HTTP_LOGS_COLLECTION",
                "BOT_HTTP_LOGS_COLLECTION_NAME",
                &defaults.collection_name,
            ),
            client_name: get_env_with_fallback_or(
                "TGBOT_HTTP_CLIENT_NAME",
                "BOT_HTTP_CLIENT_NAME",
                &defaults.client_name,
            ),
            persist_mode,
            max_body_bytes: get_env_with_fallback_parse(
                "TGBOT_AUDIT_MAX_BODY_BYTES",
                "BOT_AUDIT_MAX_BODY_BYTES",
                defaults.max_body_bytes,
            ),
        }
    }
}

/// 監査ログの保持期間設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// 保持日数（0以下で削除しない。範囲外の値は読み込み時に0になる）
    pub retention_days: i64,
    /// クリーンアップ間隔
    pub cleanup_interval: Duration,
}

impl RetentionConfig {
    /// 環境変数から読み込む（デフォルト: 30日、1時間ごと）
    pub fn from_env() -> Self {
        let mut retention_days = get_env_with_fallback_parse(
            "TGBOT_HTTP_LOG_RETENTION_DAYS",
            "BOT_HTTP_LOG_RETENTION_DAYS",
            30i64,
        );
        if retention_days > 0 && cutoff_days_ago(retention_days).is_none() {
            tracing::warn!(
                "HTTP log retention of {} days is out of range, cleanup disabled",
                retention_days
            );
            retention_days = 0;
        }
        let interval_secs = get_env_with_fallback_parse(
            "TGBOT_HTTP_LOG_CLEANUP_INTERVAL_SECS",
            "BOT_HTTP_LOG_CLEANUP_INTERVAL_SECS",
            3600u64,
        );
        Self {
            retention_days,
            // interval(0) はpanicするため最低1秒
            cleanup_interval: Duration::from_secs(interval_secs.max(1)),
        }
    }
}
