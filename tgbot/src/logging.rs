//! ロギング初期化ユーティリティ
//!
//! 標準出力へのログに加え、ログディレクトリ指定時は日次ローテーションの
//! ファイルにも書き出す。

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::common::error::{BotError, BotResult};
use crate::config::get_env_with_fallback;

/// ログファイル名の接頭辞
const LOG_FILE_PREFIX: &str = "tgbot.log";

/// 環境変数からログレベルを取得（`TGBOT_LOG_LEVEL`、旧: `LOG_LEVEL`、デフォルト: info）
pub fn level_from_env() -> String {
    get_env_with_fallback("TGBOT_LOG_LEVEL", "LOG_LEVEL").unwrap_or_else(|| "info".to_string())
}

/// 環境変数からログディレクトリを取得（`TGBOT_LOG_DIR`）
pub fn dir_from_env() -> Option<String> {
    get_env_with_fallback("TGBOT_LOG_DIR", "LOG_DIR").filter(|dir| !dir.trim().is_empty())
}

/// `RUST_LOG` があればそれを、無ければ `level` を使うフィルタ
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// tracingサブスクライバーを初期化する
///
/// 返される `WorkerGuard` はプロセス終了まで保持すること。
/// 破棄するとファイルへの書き出しが止まる。
pub fn init(level: &str, log_dir: Option<&Path>) -> BotResult<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| BotError::Internal(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}
