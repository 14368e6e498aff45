use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio::task::JoinHandle;
use tracing::warn;

/// Telegram clears a chat action after about five seconds.
const CHAT_ACTION_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(4);

/// Keeps a chat action such as "sending photo..." visible while a request
/// runs. The refresh loop stops when the heartbeat is dropped.
pub struct ChatActionHeartbeat {
    task_handle: JoinHandle<()>,
}

impl ChatActionHeartbeat {
    pub fn start(bot: Bot, chat_id: ChatId, action: ChatAction) -> Self {
        let task_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CHAT_ACTION_HEARTBEAT_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(err) = bot.send_chat_action(chat_id, action.clone()).await {
                    warn!("send_chat_action failed for chat {chat_id}: {err}");
                }
            }
        });
        Self { task_handle }
    }
}

impl Drop for ChatActionHeartbeat {
    fn drop(&mut self) {
        self.task_handle.abort();
    }
}
