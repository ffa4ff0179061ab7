//! Telegram Bot APIクライアント
//!
//! すべての呼び出しを `HttpTransport` 経由で送るため、トランスポートに
//! 監査ロガーを挟めば全API呼び出しが記録される。

pub mod types;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::common::error::{BotError, BotResult};
use crate::transport::HttpTransport;
use types::{ApiResponse, BotCommand, InlineKeyboardMarkup, Message, Update, User};

/// ロングポーリング待ち時間に上乗せするHTTPタイムアウトの余裕
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// アップロードするファイル
#[derive(Debug, Clone)]
pub struct InputFile {
    /// Telegram上で見えるファイル名
    pub file_name: String,
    /// 内容
    pub bytes: Vec<u8>,
}

impl InputFile {
    /// メモリ上のバイト列から作成
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Telegram Bot APIクライアント
#[derive(Clone)]
pub struct TelegramClient {
    builder: reqwest::Client,
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    token: String,
}

impl TelegramClient {
    /// クライアントを作成
    ///
    /// `builder` はリクエストの組み立てにのみ使い、送信は `transport` が行う。
    pub fn new(
        builder: reqwest::Client,
        transport: Arc<dyn HttpTransport>,
        api_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            builder,
            transport,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// ボット自身の情報
    pub async fn get_me(&self) -> BotResult<User> {
        let request = self.builder.get(self.method_url("getMe")).build()?;
        self.execute(request).await
    }

    /// 新着更新をロングポーリングで取得
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
        allowed_updates: &[&str],
    ) -> BotResult<Vec<Update>> {
        let mut params = json!({
            "timeout": timeout.as_secs(),
            "allowed_updates": allowed_updates,
        });
        if let Some(offset) = offset {
            params["offset"] = json!(offset);
        }
        let request = self
            .builder
            .post(self.method_url("getUpdates"))
            .timeout(timeout + POLL_TIMEOUT_MARGIN)
            .json(&params)
            .build()?;
        self.execute(request).await
    }

    /// コマンド一覧を登録
    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> BotResult<bool> {
        self.call_json("setMyCommands", &json!({ "commands": commands }))
            .await
    }

    /// テキストメッセージを送信
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> BotResult<Message> {
        let mut params = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = reply_markup {
            params["reply_markup"] = serde_json::to_value(markup)?;
        }
        self.call_json("sendMessage", &params).await
    }

    /// 画像をアップロードして送信
    pub async fn send_photo(
        &self,
        chat_id: i64,
        photo: InputFile,
        caption: Option<&str>,
    ) -> BotResult<Message> {
        let form = upload_form(chat_id, "photo", photo, caption);
        self.call_multipart("sendPhoto", form).await
    }

    /// ファイルをアップロードして送信
    pub async fn send_document(
        &self,
        chat_id: i64,
        document: InputFile,
        caption: Option<&str>,
    ) -> BotResult<Message> {
        let form = upload_form(chat_id, "document", document, caption);
        self.call_multipart("sendDocument", form).await
    }

    async fn call_json<P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> BotResult<R> {
        let request = self
            .builder
            .post(self.method_url(method))
            .json(params)
            .build()?;
        self.execute(request).await
    }

    async fn call_multipart<R: DeserializeOwned>(&self, method: &str, form: Form) -> BotResult<R> {
        let request = self
            .builder
            .post(self.method_url(method))
            .multipart(form)
            .build()?;
        self.execute(request).await
    }

    async fn execute<R: DeserializeOwned>(&self, request: reqwest::Request) -> BotResult<R> {
        let response = self.transport.send(request).await?;
        decode_envelope(response.status(), response.body())
    }
}

fn upload_form(chat_id: i64, field: &'static str, file: InputFile, caption: Option<&str>) -> Form {
    let mut form = Form::new()
        .text("chat_id", chat_id.to_string())
        .part(field, Part::bytes(file.bytes).file_name(file.file_name));
    if let Some(caption) = caption {
        form = form.text("caption", caption.to_string());
    }
    form
}

/// `{ok, result, description, error_code}` を結果に変換する
fn decode_envelope<R: DeserializeOwned>(status: http::StatusCode, body: &[u8]) -> BotResult<R> {
    let envelope: ApiResponse<R> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        // JSONでないエラー応答（プロキシ等）はステータスで表す
        Err(_) if !status.is_success() => {
            return Err(BotError::TelegramApi {
                code: i64::from(status.as_u16()),
                description: status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    if !envelope.ok {
        return Err(BotError::TelegramApi {
            code: envelope
                .error_code
                .unwrap_or_else(|| i64::from(status.as_u16())),
            description: envelope
                .description
                .unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    envelope
        .result
        .ok_or_else(|| BotError::Internal("Telegram response has no result".to_string()))
}
