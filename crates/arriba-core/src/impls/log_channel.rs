//! LogChannel - 送信先が無いときの通知チャネル
//!
//! メッセージを tracing に出すだけで、常に成功する。

use async_trait::async_trait;
use tracing::info;

use crate::domain::{NotifyError, Sent};
use crate::ports::NotificationChannel;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, destination: &str, message: &str) -> Result<Sent, NotifyError> {
        info!(%destination, %message, "notification");
        Ok(Sent)
    }
}
