//! 中继核心 - 通知记录、有界历史、事件总线与展示层边界

pub mod bus;
pub mod history;
pub mod record;
pub mod sink;

pub use bus::{BusSender, EventBus};
pub use history::{HistorySnapshot, HistoryStore, SharedHistory, DEFAULT_CAPACITY};
pub use record::{
    IncomingNotification, NotificationRecord, RawNotification, DEFAULT_MESSAGE, DEFAULT_TITLE,
};
pub use sink::{PresentationSink, SinkEvent, SinkHub};
