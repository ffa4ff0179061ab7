//! 更新の振り分けとコマンドハンドラー
//!
//! 各ハンドラーは自分の失敗をログに出し、ユーザーへお詫びを返す。
//! 失敗がポーリングループまで伝わることはない。

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::common::error::{BotError, BotResult};
use crate::telegram::types::{
    BotCommand, CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update,
};
use crate::telegram::{InputFile, TelegramClient};

/// インラインボタンのcallback_data
pub mod callbacks {
    /// テキスト例
    pub const EXAMPLE_TEXT: &str = "example-text";
    /// 画像例
    pub const EXAMPLE_PHOTO: &str = "example-photo";
    /// ファイル例（前方一致）
    pub const EXAMPLE_FILE: &str = "example-file";
}

/// 画像例として送るファイル名（assetsディレクトリ内）
pub const EXAMPLE_IMAGE_FILE: &str = "exampleimg.jpg";
/// ファイル例のファイル名
pub const EXAMPLE_TEXT_FILE: &str = "ExampleFile.txt";
/// ファイル例の内容
pub const EXAMPLE_TEXT_FILE_CONTENT: &str =
    "Believe you can and you're halfway there. - Theodore Roosevelt";

const START_TEXT: &str = "Test Examples";
const TEXT_EXAMPLE: &str = "Text example: You are the best!";
const UNKNOWN_COMMAND_TEXT: &str = "Sorry, I don't understand that command.";
const LEGAL_TEXT: &str = "Legal notice: this bot is provided as-is, without warranty of any kind. \
Messages and HTTP exchanges with Telegram may be stored for diagnostics and removed after the \
retention period. By using this bot you agree to these terms.";

const START_ERROR: &str =
    "Sorry, an error occurred while fetching test data. Please try again later.";
const LEGAL_ERROR: &str =
    "Sorry, an error occurred while fetching legal notices. Please try again later.";
const TEXT_EXAMPLE_ERROR: &str =
    "Sorry, an error occurred while sending test message. Please try again later.";
const PHOTO_EXAMPLE_ERROR: &str = "Sorry, an error occurred while processing your request to show the example image. Please try again later.";
const FILE_EXAMPLE_ERROR: &str = "Sorry, an error occurred while processing your request to download the sample file. Please try again later.";

/// ボットが登録するコマンド一覧
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Start using the bot"),
        BotCommand::new("legal", "Get legal notices and terms of service"),
    ]
}

/// 更新の分類
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    /// `/command` 付きのテキストメッセージ
    Command {
        /// `@botname` を除いたコマンド（例: `/start`）
        command: String,
        /// 元のメッセージ
        message: Message,
    },
    /// コマンドを含まないテキストメッセージ
    Text(Message),
    /// インラインボタンの押下
    Callback(CallbackQuery),
    /// 扱わない更新
    Ignored,
}

/// 更新を分類する
pub fn classify(update: Update) -> UpdateKind {
    if let Some(message) = update.message {
        if message.text.is_none() {
            return UpdateKind::Ignored;
        }
        return match message.command() {
            Some(raw) => UpdateKind::Command {
                command: strip_bot_name(&raw).to_string(),
                message,
            },
            None => UpdateKind::Text(message),
        };
    }
    match update.callback_query {
        Some(query) => UpdateKind::Callback(query),
        None => UpdateKind::Ignored,
    }
}

/// グループで付く `/start@my_bot` の `@my_bot` を落とす
fn strip_bot_name(command: &str) -> &str {
    command.split('@').next().unwrap_or(command)
}

/// 1件の更新を処理するハンドラー群
#[derive(Clone)]
pub struct UpdateHandler {
    client: TelegramClient,
    assets_dir: PathBuf,
}

impl UpdateHandler {
    /// ハンドラーを作成
    pub fn new(client: TelegramClient, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            assets_dir: assets_dir.into(),
        }
    }

    /// 更新を分類して対応するハンドラーを呼ぶ
    pub async fn handle(&self, update: Update) {
        let update_id = update.update_id;
        match classify(update) {
            UpdateKind::Command { command, message } => {
                info!(update_id, chat_id = message.chat.id, "Command: {}", command);
                match command.as_str() {
                    "/start" => self.handle_start(&message).await,
                    "/legal" => self.handle_legal(&message).await,
                    _ => self.handle_unknown_command(&message).await,
                }
            }
            UpdateKind::Text(message) => self.handle_text(&message),
            UpdateKind::Callback(query) => self.handle_callback(&query).await,
            UpdateKind::Ignored => debug!(update_id, "Ignoring update"),
        }
    }

    async fn handle_start(&self, message: &Message) {
        let keyboard = InlineKeyboardMarkup {
            inline_keyboard: vec![
                vec![InlineKeyboardButton::callback(
                    "Send Text Example",
                    callbacks::EXAMPLE_TEXT,
                )],
                vec![InlineKeyboardButton::callback(
                    "Send Photo Example",
                    callbacks::EXAMPLE_PHOTO,
                )],
                vec![InlineKeyboardButton::callback(
                    "Send File Example",
                    callbacks::EXAMPLE_FILE,
                )],
            ],
        };
        let result = self
            .client
            .send_message(message.chat.id, START_TEXT, Some(&keyboard))
            .await
            .map(|_| ());
        self.recover(message.chat.id, "/start command", START_ERROR, result)
            .await;
    }

    async fn handle_legal(&self, message: &Message) {
        let result = self
            .client
            .send_message(message.chat.id, LEGAL_TEXT, None)
            .await
            .map(|_| ());
        self.recover(message.chat.id, "/legal command", LEGAL_ERROR, result)
            .await;
    }

    async fn handle_unknown_command(&self, message: &Message) {
        if let Err(e) = self
            .client
            .send_message(message.chat.id, UNKNOWN_COMMAND_TEXT, None)
            .await
        {
            error!(chat_id = message.chat.id, "Error handling unknown command: {}", e);
        }
    }

    fn handle_text(&self, message: &Message) {
        debug!(
            chat_id = message.chat.id,
            "Text message: {}",
            message.text.as_deref().unwrap_or_default()
        );
    }

    async fn handle_callback(&self, query: &CallbackQuery) {
        let Some(data) = query.data.as_deref() else {
            debug!(query_id = %query.id, "Callback query without data");
            return;
        };
        let Some(message) = query.message.as_ref() else {
            warn!(query_id = %query.id, "Callback query without message: {}", data);
            return;
        };
        let chat_id = message.chat.id;

        if data == callbacks::EXAMPLE_TEXT {
            let result = self
                .client
                .send_message(chat_id, TEXT_EXAMPLE, None)
                .await
                .map(|_| ());
            self.recover(chat_id, "text example", TEXT_EXAMPLE_ERROR, result)
                .await;
        } else if data == callbacks::EXAMPLE_PHOTO {
            let result = self.send_example_photo(chat_id).await;
            self.recover(chat_id, "photo example", PHOTO_EXAMPLE_ERROR, result)
                .await;
        } else if data.starts_with(callbacks::EXAMPLE_FILE) {
            let file = InputFile::from_bytes(EXAMPLE_TEXT_FILE, EXAMPLE_TEXT_FILE_CONTENT);
            let caption = format!("Here is the {}", EXAMPLE_TEXT_FILE);
            let result = self
                .client
                .send_document(chat_id, file, Some(&caption))
                .await
                .map(|_| ());
            self.recover(chat_id, "file example", FILE_EXAMPLE_ERROR, result)
                .await;
        } else {
            debug!(query_id = %query.id, "Unhandled callback data: {}", data);
        }
    }

    async fn send_example_photo(&self, chat_id: i64) -> BotResult<()> {
        let bytes = read_asset(&self.assets_dir, EXAMPLE_IMAGE_FILE).await?;
        self.client
            .send_photo(
                chat_id,
                InputFile::from_bytes("example.jpg", bytes),
                Some("Example"),
            )
            .await?;
        Ok(())
    }

    /// 失敗をログに出し、ユーザーへお詫びを送る
    async fn recover(&self, chat_id: i64, action: &str, apology: &str, result: BotResult<()>) {
        let Err(e) = result else {
            return;
        };
        error!(chat_id, "Error handling {}: {}", action, describe(&e));
        if let Err(e) = self.client.send_message(chat_id, apology, None).await {
            error!(chat_id, "Failed to send error reply: {}", describe(&e));
        }
    }
}

async fn read_asset(dir: &Path, name: &str) -> BotResult<Vec<u8>> {
    let path = dir.join(name);
    tokio::fs::read(&path).await.map_err(|e| {
        BotError::NotFound(format!("Failed to read {}: {}", path.display(), e))
    })
}

/// ポーリング失敗の表示形式
///
/// APIエラーは `Telegram API Error:\n[code]\nmessage`、それ以外はエラー全文。
pub fn describe(error: &BotError) -> String {
    match error {
        BotError::TelegramApi { code, description } => {
            format!("Telegram API Error:\n[{}]\n{}", code, description)
        }
        other => other.to_string(),
    }
}
