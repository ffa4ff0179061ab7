//! HTTP監査ログの型定義

use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::db::repository::Document;

/// ヘッダー名 → 値のリスト（同名ヘッダーは出現順を保持）
pub type HeaderValues = BTreeMap<String, Vec<String>>;

/// HTTP監査ログの保存先フィールド名
pub mod fields {
    /// リクエストURI
    pub const URI: &str = "Uri";
    /// HTTPメソッド
    pub const METHOD: &str = "Method";
    /// ステータスコード
    pub const STATUS_CODE: &str = "StatusCode";
    /// 実行日時
    pub const ACTION_DATE_TIME: &str = "ActionDateTime";
    /// 論理クライアント名
    pub const CLIENT_NAME: &str = "ClientName";
}

/// HTTP監査ログレコード（1回のHTTP交換につき1件）
///
/// 作成後に変更されることはなく、ロガーは挿入のみを行う。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HttpLogRecord {
    /// ストアが割り当てるID
    #[serde(skip)]
    pub id: Option<Uuid>,
    /// リクエストURI
    pub uri: String,
    /// HTTPメソッド
    pub method: String,
    /// リクエストボディ（テキスト）
    pub request_body: Option<String>,
    /// リクエストヘッダー
    pub request_headers: Option<HeaderValues>,
    /// ステータスコード（"200" 等）
    pub status_code: String,
    /// 理由句（"OK" 等）
    pub reason_phrase: Option<String>,
    /// レスポンスボディ（テキスト）
    pub response_body: Option<String>,
    /// レスポンスヘッダー
    pub response_headers: Option<HeaderValues>,
    /// リクエスト開始時刻（UTC）
    #[serde(with = "crate::common::time::fixed_utc")]
    pub action_date_time: DateTime<Utc>,
    /// 送信からレスポンス受信までの時間（ミリ秒）
    #[serde(default)]
    pub duration_ms: Option<i64>,
    /// 論理HTTPクライアント名
    pub client_name: String,
}

impl Document for HttpLogRecord {
    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }
}

/// `HeaderMap` を名前ごとの値リストに変換する
///
/// 値がUTF-8でない場合は非可逆変換する。
pub fn header_values(headers: &HeaderMap) -> HeaderValues {
    let mut values = HeaderValues::new();
    for name in headers.keys() {
        let entry = values.entry(name.as_str().to_string()).or_default();
        for value in headers.get_all(name) {
            entry.push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderValue, CONTENT_TYPE, SET_COOKIE};

    fn sample_record() -> HttpLogRecord {
        HttpLogRecord {
            id: None,
            uri: "https://api.example.com/ping".to_string(),
            method: "GET".to_string(),
            request_body: None,
            request_headers: Some(HeaderValues::new()),
            status_code: "200".to_string(),
            reason_phrase: Some("OK".to_string()),
            response_body: Some("{\"ok\":true}".to_string()),
            response_headers: None,
            action_date_time: Utc::now(),
            duration_ms: Some(12),
            client_name: "bot-client".to_string(),
        }
    }

    #[test]
    fn test_record_serializes_with_persisted_field_names() {
        let json = serde_json::to_value(sample_record()).unwrap();
        let object = json.as_object().unwrap();
        for key in [
            "Uri",
            "Method",
            "RequestBody",
            "RequestHeaders",
            "StatusCode",
            "ReasonPhrase",
            "ResponseBody",
            "ResponseHeaders",
            "ActionDateTime",
            "ClientName",
        ] {
            assert!(object.contains_key(key), "missing {}", key);
        }
        assert!(!object.contains_key("Id"), "id is owned by the store");
        assert_eq!(object[fields::STATUS_CODE], "200");
    }

    #[test]
    fn test_record_deserializes_without_duration() {
        let mut json = serde_json::to_value(sample_record()).unwrap();
        json.as_object_mut().unwrap().remove("DurationMs");
        let record: HttpLogRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.duration_ms, None);
    }

    #[test]
    fn test_header_values_keep_repeated_values_in_order() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));

        let values = header_values(&headers);
        assert_eq!(values["content-type"], vec!["application/json"]);
        assert_eq!(values["set-cookie"], vec!["a=1", "b=2"]);
    }
}
