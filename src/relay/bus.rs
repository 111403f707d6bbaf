//! 事件总线 - 并发生产者到单一消费者的汇聚点
//!
//! 推送监听器和轮询器只向总线提交归一化通知，历史存储的写路径
//! 由唯一的消费者任务驱动：插入、未读计数、通知展示层，全部完成
//! 后才处理下一条。同一生产者的提交顺序端到端保持。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::history::SharedHistory;
use super::record::RawNotification;
use super::sink::{SinkEvent, SinkHub};

/// 总线入口句柄 - 生产者侧，可随意克隆
#[derive(Debug, Clone)]
pub struct BusSender {
    tx: mpsc::UnboundedSender<RawNotification>,
}

impl BusSender {
    /// 提交一条归一化通知
    ///
    /// 消费者退出后的提交被静默丢弃（只发生在关停期间）。
    pub fn emit(&self, raw: RawNotification) {
        if self.tx.send(raw).is_err() {
            debug!("Event bus consumer gone, notification dropped");
        }
    }
}

/// 事件总线
pub struct EventBus;

impl EventBus {
    /// 启动消费者任务，返回生产者句柄与任务句柄
    ///
    /// 所有生产者句柄释放后消费者清空队列并退出。
    pub fn start(history: SharedHistory, sinks: Arc<SinkHub>) -> (BusSender, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<RawNotification>();

        let consumer = tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                let record = history.insert(raw);
                let (unread, total) = history.counts();
                debug!(
                    seq = record.seq,
                    title = %record.title,
                    unread,
                    "Notification committed"
                );
                // 先派发瞬时提醒，再派发状态变化，两者缺一不可
                sinks.dispatch(&SinkEvent::Alert(record));
                sinks.dispatch(&SinkEvent::StateChanged { unread, total });
            }
            info!("Event bus consumer stopped");
        });

        (BusSender { tx }, consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::sink::PresentationSink;
    use std::sync::Mutex;

    struct CaptureSink {
        events: Mutex<Vec<SinkEvent>>,
    }

    impl CaptureSink {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }
    }

    impl PresentationSink for CaptureSink {
        fn name(&self) -> &str {
            "capture"
        }

        fn deliver(&self, event: &SinkEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn start_bus() -> (SharedHistory, Arc<CaptureSink>, BusSender, JoinHandle<()>) {
        let history = SharedHistory::new(20);
        let sink = Arc::new(CaptureSink::new());
        let mut hub = SinkHub::new();
        hub.register(sink.clone());
        let (bus, consumer) = EventBus::start(history.clone(), Arc::new(hub));
        (history, sink, bus, consumer)
    }

    #[tokio::test]
    async fn test_sequential_emissions_preserve_order() {
        let (history, _sink, bus, consumer) = start_bus();

        bus.emit(RawNotification::new("P1", "m1"));
        bus.emit(RawNotification::new("P2", "m2"));
        bus.emit(RawNotification::new("P3", "m3"));
        drop(bus);
        consumer.await.unwrap();

        let snapshot = history.snapshot();
        assert_eq!(snapshot.total, 3);
        // 内部最旧在前，快照最新在前
        assert_eq!(snapshot.records[0].title, "P3");
        assert_eq!(snapshot.records[1].title, "P2");
        assert_eq!(snapshot.records[2].title, "P1");
    }

    #[tokio::test]
    async fn test_alert_precedes_state_changed_per_insert() {
        let (_history, sink, bus, consumer) = start_bus();

        bus.emit(RawNotification::new("A", "m"));
        bus.emit(RawNotification::new("B", "m"));
        drop(bus);
        consumer.await.unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 4);
        // 每次插入：Alert 在前，StateChanged 在后，且计数与插入进度一致
        assert!(matches!(&events[0], SinkEvent::Alert(r) if r.title == "A"));
        assert!(matches!(
            events[1],
            SinkEvent::StateChanged { unread: 1, total: 1 }
        ));
        assert!(matches!(&events[2], SinkEvent::Alert(r) if r.title == "B"));
        assert!(matches!(
            events[3],
            SinkEvent::StateChanged { unread: 2, total: 2 }
        ));
    }

    #[tokio::test]
    async fn test_cloned_senders_feed_one_consumer() {
        let (history, _sink, bus, consumer) = start_bus();

        let bus2 = bus.clone();
        bus.emit(RawNotification::new("来源A", "m"));
        bus2.emit(RawNotification::new("来源B", "m"));
        drop(bus);
        drop(bus2);
        consumer.await.unwrap();

        let (unread, total) = history.counts();
        assert_eq!((unread, total), (2, 2));
    }
}
