//! API 轮询器 - 定时拉取远端通知
//!
//! 固定间隔、无指数退避：每个失败周期只记日志并等待下一次
//! 定时器触发。设置变更时在同一任务内重置定时器，不存在两个
//! 定时器同时武装的窗口。

use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::relay::bus::BusSender;
use crate::relay::record::{IncomingNotification, RawNotification};
use crate::settings::Settings;

/// 单次拉取超时
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// 启动后的首次拉取延迟，提前暴露连通性问题
const INITIAL_POLL_DELAY: Duration = Duration::from_secs(5);

/// 单个轮询周期的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// 未启用或 URL 为空，本周期跳过
    Skipped,
    /// 成功但远端没有新通知
    Empty,
    /// 成功发出 N 条通知
    Emitted(usize),
    /// 远端失败（超时、非 200、响应格式错误），下个周期重试
    Failed,
}

/// API 轮询器
pub struct Poller {
    client: Client,
    bus: BusSender,
    settings: watch::Receiver<Settings>,
}

impl Poller {
    pub fn new(bus: BusSender, settings: watch::Receiver<Settings>) -> Result<Self> {
        let client = Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            bus,
            settings,
        })
    }

    /// 启动轮询任务
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// 运行轮询循环直到取消
    ///
    /// 设置变更立即生效：定时器以新间隔重新武装；停用/启用
    /// 同样走这条路径。首次拉取固定在启动后短延迟处。
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut current = self.settings.borrow().clone();
        let mut next_delay = INITIAL_POLL_DELAY;
        let mut settings_closed = false;

        info!(
            enabled = current.api_enabled,
            interval = current.poll_interval,
            "Poller started"
        );

        loop {
            let sleep = tokio::time::sleep(next_delay);
            tokio::pin!(sleep);

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Poller stopped");
                    return;
                }
                changed = self.settings.changed(), if !settings_closed => {
                    match changed {
                        Ok(()) => {
                            current = self.settings.borrow_and_update().clone();
                            next_delay = current.poll_interval_duration();
                            info!(
                                enabled = current.api_enabled,
                                interval = current.poll_interval,
                                "Poller reconfigured"
                            );
                        }
                        Err(_) => {
                            // 设置源已关闭，保持当前配置继续运行
                            settings_closed = true;
                        }
                    }
                }
                _ = &mut sleep => {
                    self.tick(&current).await;
                    next_delay = current.poll_interval_duration();
                }
            }
        }
    }

    /// 单个定时器周期
    async fn tick(&self, settings: &Settings) -> PollOutcome {
        if !settings.api_enabled || settings.api_url.is_empty() {
            debug!("API polling disabled or URL empty, skipping tick");
            return PollOutcome::Skipped;
        }
        poll_once(&self.client, &settings.api_url, &self.bus).await
    }
}

/// 执行一次拉取并把结果发到总线
///
/// 所有失败路径只记日志，永不向上传播；状态机始终回到 Idle。
pub async fn poll_once(client: &Client, url: &str, bus: &BusSender) -> PollOutcome {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            error!(url, error = %e, "API fetch failed");
            return PollOutcome::Failed;
        }
    };

    let status = response.status();
    if status != StatusCode::OK {
        warn!(url, status = %status, "API returned non-200 status");
        return PollOutcome::Failed;
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            error!(url, error = %e, "Failed to read API response body");
            return PollOutcome::Failed;
        }
    };

    let value: serde_json::Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            error!(url, error = %e, "API returned invalid JSON");
            return PollOutcome::Failed;
        }
    };

    let Some(list) = value.get("notifications").and_then(|v| v.as_array()) else {
        info!(url, "API response has no notifications list");
        return PollOutcome::Empty;
    };
    if list.is_empty() {
        info!(url, "No new notifications from API");
        return PollOutcome::Empty;
    }

    // 按列表顺序逐条归一化发出；畸形元素按全缺省处理而非丢弃
    let count = list.len();
    for element in list {
        let incoming: IncomingNotification =
            serde_json::from_value(element.clone()).unwrap_or_default();
        bus.emit(RawNotification::normalize(incoming));
    }

    info!(url, count, "Fetched notifications from API");
    PollOutcome::Emitted(count)
}
