//! 通知记录与归一化 - 入站载荷到规范记录的转换

use chrono::Local;
use serde::{Deserialize, Serialize};

/// 默认标题（入站字段缺失时使用）
pub const DEFAULT_TITLE: &str = "通知";
/// 默认消息内容
pub const DEFAULT_MESSAGE: &str = "这是一条通知消息";

/// 历史记录时间戳格式（本地时间）
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 菜单摘要最大字符数
const PREVIEW_CHARS: usize = 20;

/// 入站通知载荷 - HTTP 推送和 API 轮询共用的反序列化目标
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingNotification {
    pub title: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<String>,
}

/// 归一化后的通知 - 缺省字段已替换为默认值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub title: String,
    pub message: String,
    /// 入站时缺失则由历史存储在插入时分配
    pub timestamp: Option<String>,
}

impl RawNotification {
    /// 从入站载荷构造，应用默认值（标题不允许为空）
    pub fn normalize(incoming: IncomingNotification) -> Self {
        Self {
            title: incoming
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            message: incoming
                .message
                .unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            timestamp: incoming.timestamp,
        }
    }

    /// 创建通知（测试和 CLI 用的便捷构造）
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::normalize(IncomingNotification {
            title: Some(title.into()),
            message: Some(message.into()),
            timestamp: None,
        })
    }

    /// 设置时间戳（链式调用）
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// 通知记录 - 只由历史存储创建和变更
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// 单调序号，用于展示层在变更中稳定引用记录
    pub seq: u64,
    pub title: String,
    pub message: String,
    /// 本地时间 YYYY-MM-DD HH:MM:SS
    pub timestamp: String,
    /// 已读标记，只允许 false -> true
    pub read: bool,
}

impl NotificationRecord {
    /// 菜单展示用摘要（超长消息按字符截断）
    pub fn preview(&self) -> String {
        let mut preview: String = self.message.chars().take(PREVIEW_CHARS).collect();
        if self.message.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        preview
    }
}

/// 当前本地时间的记录时间戳
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
