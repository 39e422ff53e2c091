//! Notifier - 新規タスク 1 件につき 1 通のメッセージ
//!
//! 送信失敗はここでは再送しない。呼び出し側に返して
//! 「保存済み・未通知」として報告してもらう。

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{NotifyError, Sent, Task};
use crate::ports::NotificationChannel;

pub struct Notifier {
    channel: Arc<dyn NotificationChannel>,
    destination: Option<String>,
    link_base: String,
}

impl Notifier {
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        destination: Option<String>,
        link_base: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            destination,
            link_base: link_base.into(),
        }
    }

    pub fn message_for(&self, task: &Task) -> String {
        format_message(task, &self.link_base)
    }

    pub async fn notify(&self, task: &Task) -> Result<Sent, NotifyError> {
        let destination = self
            .destination
            .as_deref()
            .ok_or(NotifyError::NoDestination)?;
        let message = self.message_for(task);

        info!(number = %task.number, "sending notification");
        self.channel
            .send(destination, &message)
            .await
            .inspect_err(|e| warn!(number = %task.number, error = %e, "notification failed"))
    }
}

/// Message body: label, `number - name`, then the link when the row had one.
pub fn format_message(task: &Task, link_base: &str) -> String {
    let mut message = format!(
        "Nova tarefa: {}\n{} - {}",
        task.category.label(),
        task.number,
        task.name.as_deref().unwrap_or_default()
    );
    if let Some(pdf_path) = &task.pdf_path {
        message.push('\n');
        message.push_str(link_base);
        message.push_str(pdf_path);
    }
    message
}
