//! Telegram bot with persistent HTTP audit logging
//!
//! ボットがTelegramと交わすHTTP通信をすべて記録し、ドキュメントストアに保存する。

#![warn(missing_docs)]

/// 共通型定義（エラー、時刻）
pub mod common;

/// データベースアクセス（ドキュメントストア、汎用Repository）
pub mod db;

/// HTTP監査ログ（レコード型、ロガー、保持期間）
pub mod audit;

/// 送信HTTPトランスポート
pub mod transport;

/// Telegram Bot APIクライアント
pub mod telegram;

/// ボットサービスとコマンドハンドラー
pub mod bot;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// ロギング初期化ユーティリティ
pub mod logging;

/// シャットダウン制御
pub mod shutdown;

/// 起動処理
pub mod bootstrap;

/// CLI
pub mod cli;
