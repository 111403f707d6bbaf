//! 设置 - 可热更新的运行配置
//!
//! JSON 配置文件位于 `~/.config/pi-relay/config.json`，字段全部可缺省。
//! 运行期通过 watch 通道广播变更：轮询器据此重新武装定时器，
//! 桌面接收端据此开关提示音。文件变更由 mtime 轮询任务发现。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 轮询间隔允许范围（秒）
const MIN_POLL_INTERVAL: u64 = 1;
const MAX_POLL_INTERVAL: u64 = 86_400;

/// 配置文件 mtime 检查间隔
const FILE_WATCH_INTERVAL: Duration = Duration::from_secs(2);

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    60
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8000
}

fn default_capacity() -> usize {
    20
}

/// 运行设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// 是否播放提示音
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    /// 提示音文件路径（缺省时按常见路径查找 alarm.wav）
    #[serde(default)]
    pub sound_file: Option<String>,
    /// 是否启用远端 API 轮询
    #[serde(default)]
    pub api_enabled: bool,
    /// 轮询目标 URL
    #[serde(default)]
    pub api_url: String,
    /// 轮询间隔（秒，1..=86400，越界值在加载时收紧）
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// 推送监听地址；默认绑定所有接口，与上游行为一致，
    /// 本机部署建议改为 127.0.0.1
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    /// 推送监听端口
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// 历史容量
    #[serde(default = "default_capacity")]
    pub history_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            sound_file: None,
            api_enabled: false,
            api_url: String::new(),
            poll_interval: default_poll_interval(),
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            history_capacity: default_capacity(),
        }
    }
}

impl Settings {
    /// 默认配置文件路径
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("pi-relay")
            .join("config.json")
    }

    /// 从指定文件加载；文件不存在时返回默认设置
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件 {}", path.display()))?;
        let mut settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("配置文件格式错误 {}", path.display()))?;
        settings.clamp();
        Ok(settings)
    }

    /// 从默认路径加载；解析失败时回退默认值并告警
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to load settings, using defaults");
                Self::default()
            }
        }
    }

    /// 写入指定文件（自动创建父目录）
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("无法写入配置文件 {}", path.display()))?;
        Ok(())
    }

    /// 写入默认路径
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// 越界值收紧到合法范围（默认而非拒绝）
    pub fn clamp(&mut self) {
        self.poll_interval = self.poll_interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        self.history_capacity = self.history_capacity.max(1);
    }

    pub fn poll_interval_duration(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// 按键名更新单个字段（`pin config set` 用）
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "sound-enabled" => self.sound_enabled = parse_bool(value)?,
            "sound-file" => {
                self.sound_file = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "api-enabled" => self.api_enabled = parse_bool(value)?,
            "api-url" => self.api_url = value.to_string(),
            "poll-interval" => {
                self.poll_interval = value
                    .parse()
                    .with_context(|| format!("poll-interval 不是合法秒数: {}", value))?
            }
            "listen-host" => self.listen_host = value.to_string(),
            "listen-port" => {
                self.listen_port = value
                    .parse()
                    .with_context(|| format!("listen-port 不是合法端口: {}", value))?
            }
            "history-capacity" => {
                self.history_capacity = value
                    .parse()
                    .with_context(|| format!("history-capacity 不是合法数量: {}", value))?
            }
            other => anyhow::bail!("未知配置项: {}", other),
        }
        self.clamp();
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        other => anyhow::bail!("期望 true/false，得到: {}", other),
    }
}

/// 设置句柄 - 进程内唯一的设置发布入口，可克隆
#[derive(Clone)]
pub struct SettingsHandle {
    tx: Arc<watch::Sender<Settings>>,
}

impl SettingsHandle {
    pub fn new(initial: Settings) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// 当前设置的副本
    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    /// 订阅变更（轮询器、桌面接收端使用）
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// 原子替换设置；内容未变化时不广播，返回是否广播
    pub fn update(&self, mut settings: Settings) -> bool {
        settings.clamp();
        self.tx.send_if_modified(|current| {
            if *current == settings {
                false
            } else {
                *current = settings;
                true
            }
        })
    }
}

/// 启动配置文件监视任务
///
/// 每 2 秒检查一次 mtime，文件变化时重新加载并通过句柄广播。
/// 读取或解析失败只告警，保留当前设置。
pub fn spawn_file_watch(
    path: PathBuf,
    handle: SettingsHandle,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_mtime = file_mtime(&path);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Settings file watch stopped");
                    return;
                }
                _ = tokio::time::sleep(FILE_WATCH_INTERVAL) => {}
            }

            let mtime = file_mtime(&path);
            if mtime == last_mtime {
                continue;
            }
            last_mtime = mtime;

            match Settings::load_from(&path) {
                Ok(settings) => {
                    if handle.update(settings) {
                        info!(path = %path.display(), "Settings reloaded");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to reload settings, keeping current");
                }
            }
        }
    })
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
