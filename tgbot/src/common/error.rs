//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! ストア層のエラーは `BotError::Database` に包んで返すため、
//! 呼び出し側は永続化失敗を他の失敗と区別できる。

use thiserror::Error;

/// tgbot error type
#[derive(Debug, Error)]
pub enum BotError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence failure (record store unreachable, constraint violation, ...)
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outbound HTTP transport error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request/response body could not be buffered or rebuilt
    #[error("HTTP body error: {0}")]
    Body(String),

    /// Telegram Bot API returned `ok: false`
    #[error("Telegram API error [{code}]: {description}")]
    TelegramApi {
        /// error_code from the API envelope
        code: i64,
        /// description from the API envelope
        description: String,
    },

    /// I/O error (asset files, log directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// Returns a safe error message for chat users.
    ///
    /// `Display` carries full details (URLs, SQL errors) and belongs in logs only.
    pub fn external_message(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration error",
            Self::Database(_) => "Storage error",
            Self::Serialization(_) => "Malformed data",
            Self::Http(_) => "Upstream service unavailable",
            Self::Body(_) => "Malformed request",
            Self::TelegramApi { .. } => "Telegram rejected the request",
            Self::Io(_) => "File access error",
            Self::NotFound(_) => "Not found",
            Self::Internal(_) => "Internal error",
        }
    }

    /// 永続化層の失敗かどうか
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<sqlx::Error> for BotError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// tgbot result type
pub type BotResult<T> = Result<T, BotError>;
