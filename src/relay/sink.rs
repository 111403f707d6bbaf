//! 展示层边界 - 核心到展示层的事件分发
//!
//! 核心不直接调用任何 UI 代码：提交一条通知后，按顺序向所有
//! 注册的接收端派发两个独立事件（瞬时提醒、状态变化）。
//! 接收端可以合并多余的状态刷新，但不允许丢弃提醒事件。

use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use super::record::NotificationRecord;

/// 展示层事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// 新通知提交（瞬时弹窗、提示音、系统级提醒）
    Alert(NotificationRecord),
    /// 历史或未读状态变化（角标与历史菜单刷新）
    StateChanged { unread: usize, total: usize },
}

/// 展示层接收端
pub trait PresentationSink: Send + Sync {
    /// 接收端名称（日志用）
    fn name(&self) -> &str;

    /// 处理一个事件；错误由分发方记录，不向调用链传播
    fn deliver(&self, event: &SinkEvent) -> Result<()>;
}

/// 接收端注册表 - 将核心事件依次派发给所有接收端
pub struct SinkHub {
    sinks: Vec<Arc<dyn PresentationSink>>,
}

impl SinkHub {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// 注册接收端
    pub fn register(&mut self, sink: Arc<dyn PresentationSink>) {
        self.sinks.push(sink);
    }

    /// 派发事件；单个接收端失败只记日志，不影响其余接收端
    pub fn dispatch(&self, event: &SinkEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(event) {
                warn!(sink = sink.name(), error = %e, "Sink delivery failed");
            }
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

impl Default for SinkHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 测试用接收端：记录收到的全部事件
    pub(crate) struct CaptureSink {
        name: String,
        pub events: Mutex<Vec<SinkEvent>>,
    }

    impl CaptureSink {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                events: Mutex::new(Vec::new()),
            }
        }
    }

    impl PresentationSink for CaptureSink {
        fn name(&self) -> &str {
            &self.name
        }

        fn deliver(&self, event: &SinkEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// 测试用接收端：总是失败
    struct FailingSink {
        attempts: AtomicUsize,
    }

    impl PresentationSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn deliver(&self, _event: &SinkEvent) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("sink unavailable")
        }
    }

    #[test]
    fn test_hub_register_and_dispatch() {
        let mut hub = SinkHub::new();
        assert_eq!(hub.sink_count(), 0);

        let sink = Arc::new(CaptureSink::new("capture"));
        hub.register(sink.clone());
        assert_eq!(hub.sink_names(), vec!["capture"]);

        hub.dispatch(&SinkEvent::StateChanged {
            unread: 1,
            total: 1,
        });
        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failing_sink_does_not_block_others() {
        let mut hub = SinkHub::new();
        let failing = Arc::new(FailingSink {
            attempts: AtomicUsize::new(0),
        });
        let capture = Arc::new(CaptureSink::new("capture"));
        hub.register(failing.clone());
        hub.register(capture.clone());

        hub.dispatch(&SinkEvent::StateChanged {
            unread: 0,
            total: 0,
        });

        // 失败的接收端不影响后续接收端
        assert_eq!(failing.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(capture.events.lock().unwrap().len(), 1);
    }
}
