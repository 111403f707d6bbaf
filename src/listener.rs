//! 推送监听器 - 入站 HTTP 通知端点
//!
//! 任意路径的 POST 都接受 JSON 载荷（与上游行为一致，这里收敛到
//! `/` 和 `/notify`）。无论成功失败都返回 200，结果在信封的
//! `status` 字段里。处理器自身不持有可变状态，所有变更经由
//! 事件总线进入历史存储。

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::relay::bus::BusSender;
use crate::relay::record::{IncomingNotification, RawNotification};

/// 解析失败时返回给调用方的提示
const PARSE_HINT: &str = "请确保发送的是有效的JSON格式，包含title和message字段";

/// 应答信封
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Envelope {
    fn success(raw: &RawNotification) -> Self {
        Self {
            status: "success",
            message: "通知已发送".to_string(),
            data: Some(json!({
                "title": raw.title,
                "message": raw.message,
                "timestamp": raw.timestamp,
            })),
            details: None,
        }
    }

    fn error(error: impl ToString) -> Self {
        Self {
            status: "error",
            message: error.to_string(),
            data: None,
            details: Some(PARSE_HINT.to_string()),
        }
    }
}

/// 处理一次推送请求
///
/// 成功路径恰好向总线发出一条归一化事件；解析失败不发出任何事件。
async fn handle_push(State(bus): State<BusSender>, body: Bytes) -> Json<Envelope> {
    match serde_json::from_slice::<IncomingNotification>(&body) {
        Ok(incoming) => {
            let raw = RawNotification::normalize(incoming);
            let envelope = Envelope::success(&raw);
            debug!(title = %raw.title, "Push notification accepted");
            bus.emit(raw);
            Json(envelope)
        }
        Err(e) => {
            warn!(error = %e, "Rejected malformed push payload");
            Json(Envelope::error(e))
        }
    }
}

/// 构建路由
pub fn router(bus: BusSender) -> Router {
    Router::new()
        .route("/", post(handle_push))
        .route("/notify", post(handle_push))
        .with_state(bus)
}

/// 推送监听器
pub struct PushListener {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl PushListener {
    /// 绑定监听地址；端口 0 表示随机端口（测试用）
    pub async fn bind(addr: &str, bus: BusSender) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("无法绑定推送监听地址 {}", addr))?;
        let local_addr = listener.local_addr()?;

        info!(address = %local_addr, "Push listener bound");
        if !local_addr.ip().is_loopback() {
            // 入站端点无认证，非回环绑定时明确提示运维
            warn!(
                address = %local_addr,
                "Push listener accepts unauthenticated requests on a non-loopback interface"
            );
        }

        Ok(Self {
            listener,
            router: router(bus),
            local_addr,
        })
    }

    /// 实际绑定到的地址
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 运行直到取消
    ///
    /// 取消后停止接受新连接，在途请求在宽限期内完成。
    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .context("推送监听器异常退出")?;
        info!("Push listener stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_echoes_normalized_fields() {
        let raw = RawNotification::new("标题", "消息");
        let envelope = Envelope::success(&raw);
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], "通知已发送");
        assert_eq!(value["data"]["title"], "标题");
        // 未提供时间戳时回显 null，由历史存储在插入时分配
        assert!(value["data"]["timestamp"].is_null());
        assert!(value.get("details").is_none());
    }

    #[test]
    fn test_error_envelope_carries_hint() {
        let envelope = Envelope::error("expected value at line 1");
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["status"], "error");
        assert_eq!(value["details"], PARSE_HINT);
        assert!(value.get("data").is_none());
    }
}
