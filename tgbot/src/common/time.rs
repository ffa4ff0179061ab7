//! 固定長UTCタイムスタンプ
//!
//! ドキュメントに保存する日時は常にマイクロ秒精度・`Z`終端のRFC 3339で書く。
//! 桁数が揃うため、SQLite上の文字列比較がそのまま時系列比較になる。

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// 保存形式に整形する
pub fn format_utc(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `#[serde(with = "crate::common::time::fixed_utc")]` 用
pub mod fixed_utc {
    use super::*;

    /// シリアライズ
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_utc(value))
    }

    /// デシリアライズ（任意のRFC 3339を受け付ける）
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
