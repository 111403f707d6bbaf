//! 日志接收端 - 将所有展示事件写入 tracing 日志

use anyhow::Result;
use tracing::{debug, info};

use crate::relay::sink::{PresentationSink, SinkEvent};

/// 日志接收端，记录所有事件
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&self, event: &SinkEvent) -> Result<()> {
        match event {
            SinkEvent::Alert(record) => {
                info!(
                    seq = record.seq,
                    title = %record.title,
                    preview = %record.preview(),
                    timestamp = %record.timestamp,
                    "Notification alert"
                );
            }
            SinkEvent::StateChanged { unread, total } => {
                debug!(unread, total, "History state changed");
            }
        }
        Ok(())
    }
}
