// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 状态消息通道
//! Fire-and-forget status messages for any listener (e.g. a display layer).
//!
//! Each subscriber gets its own bounded channel. A full channel drops the
//! message for that subscriber; a disconnected one is forgotten.

use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl std::fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.level {
            StatusLevel::Info => "INFO",
            StatusLevel::Warning => "WARN",
            StatusLevel::Error => "ERROR",
        };
        write!(f, "[{} {}] {}", self.timestamp.format("%H:%M:%S%.3f"), tag, self.text)
    }
}

pub struct Notifier {
    subscribers: Mutex<Vec<Sender<StatusMessage>>>,
    capacity: usize,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Receiver<StatusMessage> {
        let (tx, rx) = bounded(self.capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// 写日志并发送给所有订阅者, 不等待
    pub fn publish(&self, level: StatusLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            StatusLevel::Info => info!("{}", text),
            StatusLevel::Warning => warn!("{}", text),
            StatusLevel::Error => error!("{}", text),
        }

        let message = StatusMessage {
            level,
            text,
            timestamp: Local::now(),
        };
        self.subscribers
            .lock()
            .retain(|tx| !matches!(tx.try_send(message.clone()), Err(TrySendError::Disconnected(_))));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.publish(StatusLevel::Info, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.publish(StatusLevel::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.publish(StatusLevel::Error, text);
    }
}
