//! Pi Relay - 本地通知中继
//!
//! 两个并发事件源（HTTP 推送端点、远端 API 轮询器）汇入单一事件
//! 总线，由唯一消费者写入有界历史存储（含已读/未读计数），每条
//! 提交的通知按序通知展示层接收端。

pub mod app;
pub mod cli;
pub mod listener;
pub mod poller;
pub mod relay;
pub mod settings;
pub mod sinks;

pub use app::Relay;
pub use listener::PushListener;
pub use poller::{poll_once, PollOutcome, Poller};
pub use relay::bus::{BusSender, EventBus};
pub use relay::history::{HistorySnapshot, HistoryStore, SharedHistory, DEFAULT_CAPACITY};
pub use relay::record::{
    IncomingNotification, NotificationRecord, RawNotification, DEFAULT_MESSAGE, DEFAULT_TITLE,
};
pub use relay::sink::{PresentationSink, SinkEvent, SinkHub};
pub use settings::{Settings, SettingsHandle};
pub use sinks::{DesktopSink, LogSink};
