//! 应用装配 - 组装中继各组件并管理生命周期
//!
//! 所有共享状态（历史存储、总线句柄、设置订阅）在这里构造一次，
//! 以句柄形式传入各组件，不存在进程级全局变量。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::listener::PushListener;
use crate::poller::Poller;
use crate::relay::bus::{BusSender, EventBus};
use crate::relay::history::{HistorySnapshot, SharedHistory};
use crate::relay::record::RawNotification;
use crate::relay::sink::SinkHub;
use crate::settings::SettingsHandle;
use crate::sinks::{DesktopSink, LogSink};

/// 关停宽限期：等待各任务退出的上限
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// 中继句柄 - 持有全部运行中的组件
pub struct Relay {
    history: SharedHistory,
    bus: BusSender,
    settings: SettingsHandle,
    cancel: CancellationToken,
    listener_addr: SocketAddr,
    listener_task: JoinHandle<Result<()>>,
    poller_task: JoinHandle<()>,
    consumer_task: JoinHandle<()>,
}

impl Relay {
    /// 启动全部组件，注册默认接收端（日志 + 桌面）
    pub async fn start(settings: SettingsHandle) -> Result<Self> {
        let mut hub = SinkHub::new();
        hub.register(Arc::new(LogSink::new()));
        hub.register(Arc::new(DesktopSink::new(settings.subscribe())));
        Self::start_with_sinks(settings, hub).await
    }

    /// 启动全部组件，使用调用方提供的接收端注册表
    pub async fn start_with_sinks(settings: SettingsHandle, hub: SinkHub) -> Result<Self> {
        let current = settings.current();
        let cancel = CancellationToken::new();

        let history = SharedHistory::new(current.history_capacity);
        let (bus, consumer_task) = EventBus::start(history.clone(), Arc::new(hub));

        let listener = PushListener::bind(&current.listen_addr(), bus.clone()).await?;
        let listener_addr = listener.local_addr();
        let listener_task = tokio::spawn(listener.serve(cancel.clone()));

        let poller = Poller::new(bus.clone(), settings.subscribe())?;
        let poller_task = poller.spawn(cancel.clone());

        info!(address = %listener_addr, "Relay started");

        Ok(Self {
            history,
            bus,
            settings,
            cancel,
            listener_addr,
            listener_task,
            poller_task,
            consumer_task,
        })
    }

    /// 推送监听器实际绑定的地址
    pub fn listener_addr(&self) -> SocketAddr {
        self.listener_addr
    }

    /// 历史存储句柄（展示层标记已读、拉取快照用）
    pub fn history(&self) -> SharedHistory {
        self.history.clone()
    }

    /// 总线句柄（额外的进程内生产者用）
    pub fn bus(&self) -> BusSender {
        self.bus.clone()
    }

    /// 设置句柄
    pub fn settings(&self) -> SettingsHandle {
        self.settings.clone()
    }

    /// 关停令牌，供伴随任务（如配置文件监视）挂接生命周期
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 当前历史快照
    pub fn snapshot(&self) -> HistorySnapshot {
        self.history.snapshot()
    }

    /// 标记单条已读（展示层回调的串行入口）
    pub fn mark_read(&self, seq: u64) -> bool {
        self.history.mark_read(seq)
    }

    /// 标记全部已读
    pub fn mark_all_read(&self) -> usize {
        self.history.mark_all_read()
    }

    /// 进程内直接提交一条通知（绕过 HTTP，测试用）
    pub fn emit(&self, raw: RawNotification) {
        self.bus.emit(raw);
    }

    /// 运行到收到关停信号为止，然后优雅关停
    pub async fn run_until_shutdown(self) -> Result<()> {
        shutdown_signal().await;
        self.shutdown().await
    }

    /// 触发关停并在宽限期内回收全部任务
    ///
    /// 顺序：停止接受新连接与新定时周期，释放生产者句柄让消费者
    /// 清空队列退出，最后限时等待各任务结束。
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down relay");
        self.cancel.cancel();

        let Self {
            bus,
            listener_task,
            poller_task,
            consumer_task,
            ..
        } = self;

        join_within(listener_task, "listener").await;
        join_within(poller_task, "poller").await;

        // 监听器与轮询器已退出，释放最后的生产者句柄
        drop(bus);
        join_within(consumer_task, "consumer").await;

        info!("Relay stopped");
        Ok(())
    }
}

/// 限时等待任务结束，超时只告警不阻塞关停
async fn join_within<T>(task: JoinHandle<T>, name: &str) {
    if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
        warn!(task = name, "Task did not stop within grace period");
    }
}

/// 等待关停信号（Ctrl+C 或 SIGTERM）
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
