//! Telegram Bot APIの型（ボットが使う範囲のみ）

use serde::{Deserialize, Serialize};

/// `bot_command` エンティティの種別名
pub const ENTITY_BOT_COMMAND: &str = "bot_command";

/// Bot APIの応答エンベロープ
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// 成功したか
    pub ok: bool,
    /// 成功時の結果
    pub result: Option<T>,
    /// 失敗理由
    pub description: Option<String>,
    /// 失敗時のエラーコード
    pub error_code: Option<i64>,
}

/// getUpdatesで受け取る1件の更新
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// 更新ID（次回のoffsetはこれ+1）
    pub update_id: i64,
    /// 新着メッセージ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// インラインボタンの押下
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

/// メッセージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// メッセージID
    pub message_id: i64,
    /// 送信者
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    /// 送信先チャット
    pub chat: Chat,
    /// 送信日時（UNIX秒）
    #[serde(default)]
    pub date: i64,
    /// 本文
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// 本文中のエンティティ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<MessageEntity>>,
}

impl Message {
    /// 最初の `bot_command` エンティティが指すコマンド文字列
    pub fn command(&self) -> Option<String> {
        let text = self.text.as_deref()?;
        let entity = self
            .entities
            .as_ref()?
            .iter()
            .find(|e| e.kind == ENTITY_BOT_COMMAND)?;
        entity.text_in(text)
    }
}

/// チャット
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// チャットID
    pub id: i64,
    /// private / group / supergroup / channel
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// ユーザー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// ユーザーID
    pub id: i64,
    /// ボットかどうか
    #[serde(default)]
    pub is_bot: bool,
    /// 名
    #[serde(default)]
    pub first_name: String,
    /// ユーザー名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// メッセージ内のエンティティ
///
/// `offset` と `length` はUTF-16コード単位で数える。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntity {
    /// 種別（`bot_command` 等）
    #[serde(rename = "type")]
    pub kind: String,
    /// 開始位置（UTF-16）
    pub offset: usize,
    /// 長さ（UTF-16）
    pub length: usize,
}

impl MessageEntity {
    /// `text` からこのエンティティの部分文字列を取り出す
    ///
    /// 範囲外やサロゲートペアの途中を指す場合は `None`。
    pub fn text_in(&self, text: &str) -> Option<String> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let end = self.offset.checked_add(self.length)?;
        let slice = units.get(self.offset..end)?;
        String::from_utf16(slice).ok()
    }
}

/// インラインボタンの押下
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// クエリID
    pub id: String,
    /// 押したユーザー
    pub from: User,
    /// ボタンが付いていたメッセージ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// ボタンのcallback_data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// setMyCommandsに渡すコマンド
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotCommand {
    /// コマンド名（先頭の `/` なし）
    pub command: String,
    /// 説明
    pub description: String,
}

impl BotCommand {
    /// コマンドを作成
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// インラインキーボード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    /// 行ごとのボタン
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// インラインキーボードのボタン
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    /// 表示文字列
    pub text: String,
    /// 押下時に送られるデータ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineKeyboardButton {
    /// callback_data付きのボタン
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
        }
    }
}
