//! NotificationChannel port - 通知チャネルの抽象化
//!
//! 宛先は事前に用意された固定の識別子。送信は並行に呼ばれてよく、順序は保証しない。

use async_trait::async_trait;

use crate::domain::{NotifyError, Sent};

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<Sent, NotifyError>;
}
