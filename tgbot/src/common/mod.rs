//! 共通型定義

/// エラー型
pub mod error;

/// 固定長UTCタイムスタンプ
pub mod time;
