//! ボットサービス（ロングポーリング）
//!
//! getUpdatesでシャットダウンまで更新を受け取り、1件ごとに別タスクで処理する。
//! 処理タスクは `TaskTracker` で追跡し、ポーリング終了後に完了を待つ。

pub mod handlers;

use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::shutdown::ShutdownController;
use crate::telegram::TelegramClient;
use handlers::{bot_commands, describe, UpdateHandler};

/// 受け取る更新の種類
const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];
/// ポーリング失敗時の最初の待ち時間
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// ポーリング失敗時の待ち時間の上限
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// ボットサービス
pub struct BotService {
    client: TelegramClient,
    handler: UpdateHandler,
    poll_timeout: Duration,
    shutdown: ShutdownController,
    tasks: TaskTracker,
}

impl BotService {
    /// サービスを作成
    pub fn new(
        client: TelegramClient,
        handler: UpdateHandler,
        poll_timeout: Duration,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            client,
            handler,
            poll_timeout,
            shutdown,
            tasks: TaskTracker::new(),
        }
    }

    /// 更新処理タスクを登録する `TaskTracker` を設定
    ///
    /// 監査ロガーと同じトラッカーを渡すと、`run` は保存タスクの完了も待つ。
    pub fn with_task_tracker(mut self, tasks: TaskTracker) -> Self {
        self.tasks = tasks;
        self
    }

    /// コマンドを登録する（失敗はログのみ）
    pub async fn register_commands(&self) {
        match self.client.set_my_commands(&bot_commands()).await {
            Ok(_) => info!("Custom commands set successfully."),
            Err(e) => error!("Error setting custom commands: {}", describe(&e)),
        }
    }

    /// シャットダウンが要求されるまでポーリングする
    ///
    /// 戻るのは、受け取った更新の処理タスクがすべて終わった後。
    pub async fn run(&self) {
        self.register_commands().await;

        let mut offset: Option<i64> = None;
        let mut backoff = INITIAL_BACKOFF;
        info!("Polling for updates");

        while !self.shutdown.is_shutdown_requested() {
            let polled = tokio::select! {
                _ = self.shutdown.wait() => break,
                polled = self.client.get_updates(offset, self.poll_timeout, ALLOWED_UPDATES) => polled,
            };

            match polled {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    for update in updates {
                        offset = Some(next_offset(offset, update.update_id));
                        let handler = self.handler.clone();
                        self.tasks.spawn(async move { handler.handle(update).await });
                    }
                }
                Err(e) => {
                    error!("{}", describe(&e));
                    tokio::select! {
                        _ = self.shutdown.wait() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        info!("Polling stopped");
        self.drain().await;
    }

    async fn drain(&self) {
        self.tasks.close();
        if !self.tasks.is_empty() {
            info!("Waiting for {} in-flight tasks", self.tasks.len());
        }
        self.tasks.wait().await;
    }
}

/// 受け取った更新の次から取得するoffset
fn next_offset(current: Option<i64>, update_id: i64) -> i64 {
    let next = update_id + 1;
    current.map_or(next, |c| c.max(next))
}
