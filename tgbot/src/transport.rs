//! 送信HTTPトランスポート
//!
//! 外部へのHTTP呼び出しはすべて `HttpTransport` を通す。
//! 監査ロガーのようなデコレーターを挟めるよう、レスポンスは本文をバッファ済みの
//! `http::Response<Bytes>` で返す。

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::ext::ReasonPhrase;

use crate::common::error::{BotError, BotResult};

/// 送信HTTPの1段
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// リクエストを送信し、本文をバッファ済みのレスポンスを返す
    async fn send(&self, request: reqwest::Request) -> BotResult<http::Response<Bytes>>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for std::sync::Arc<T> {
    async fn send(&self, request: reqwest::Request) -> BotResult<http::Response<Bytes>> {
        (**self).send(request).await
    }
}

/// reqwestによる末端トランスポート
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// 共有クライアントから作成
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// 内部のクライアント（リクエスト構築用）
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: reqwest::Request) -> BotResult<http::Response<Bytes>> {
        let response = self.client.execute(request).await?;

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        // 標準と異なる理由句はhyperが拡張として残している
        let reason = response.extensions().get::<ReasonPhrase>().cloned();
        let body = response.bytes().await?;

        let mut buffered = http::Response::new(body);
        *buffered.status_mut() = status;
        *buffered.version_mut() = version;
        *buffered.headers_mut() = headers;
        if let Some(reason) = reason {
            buffered.extensions_mut().insert(reason);
        }
        Ok(buffered)
    }
}

/// レスポンスの理由句
///
/// サーバーが標準と異なる理由句を返した場合はそれを、そうでなければ
/// ステータスコードの標準の理由句を返す。
pub fn reason_phrase<B>(response: &http::Response<B>) -> Option<String> {
    match response.extensions().get::<ReasonPhrase>() {
        Some(reason) => Some(String::from_utf8_lossy(reason.as_bytes()).into_owned()),
        None => response.status().canonical_reason().map(str::to_string),
    }
}

/// リクエスト本文を非破壊でバッファする
///
/// メモリ上の本文はそのまま複製し、ストリーム本文（multipart等）は読み切ってから
/// 同じバイト列を本文として付け直す。どちらの場合も送信先には同じ内容が届く。
pub async fn capture_request_body(request: &mut reqwest::Request) -> BotResult<Option<Bytes>> {
    if let Some(bytes) = request.body().and_then(|body| body.as_bytes()) {
        return Ok(Some(Bytes::copy_from_slice(bytes)));
    }

    let Some(body) = request.body_mut().take() else {
        return Ok(None);
    };

    let collected = body
        .collect()
        .await
        .map_err(|e| BotError::Body(format!("Failed to buffer request body: {}", e)))?
        .to_bytes();
    *request.body_mut() = Some(reqwest::Body::from(collected.clone()));
    Ok(Some(collected))
}
