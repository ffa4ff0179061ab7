//! HTTP監査ログ
//!
//! 送信HTTPの送受信内容を1件ずつドキュメントストアへ記録する

/// 監査ログの型定義
pub mod types;

/// 送信HTTPをラップする監査ロガー
pub mod logger;

/// 保持期間を過ぎたレコードの定期削除
pub mod retention;
