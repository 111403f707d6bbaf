//! 桌面接收端 - 系统级通知与提示音
//!
//! macOS 走 `osascript display notification`，其他平台走
//! `notify-send`；提示音用 `afplay`/`paplay` 播放本地音频文件。
//! 命令以 fire-and-forget 方式派生，失败只记日志。

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::relay::record::NotificationRecord;
use crate::relay::sink::{PresentationSink, SinkEvent};
use crate::settings::Settings;

/// 桌面接收端
///
/// 持有设置订阅，`sound_enabled` 的热更新对下一条通知立即生效。
pub struct DesktopSink {
    settings: watch::Receiver<Settings>,
}

impl DesktopSink {
    pub fn new(settings: watch::Receiver<Settings>) -> Self {
        Self { settings }
    }

    /// 派发系统级通知
    fn show_alert(&self, record: &NotificationRecord) {
        let result = if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                escape_osascript(&record.message),
                escape_osascript(&record.title),
            );
            spawn_quiet(Command::new("osascript").args(["-e", &script]))
        } else {
            spawn_quiet(Command::new("notify-send").args([&record.title, &record.message]))
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to spawn desktop alert command");
        }
    }

    /// 播放提示音（设置关闭或找不到音频文件时静默跳过）
    fn play_sound(&self, settings: &Settings) {
        if !settings.sound_enabled {
            return;
        }
        let Some(sound_file) = find_sound_file(settings.sound_file.as_deref()) else {
            debug!("No alarm sound file found, skipping sound");
            return;
        };

        let player = if cfg!(target_os = "macos") {
            "afplay"
        } else {
            "paplay"
        };
        if let Err(e) = spawn_quiet(Command::new(player).arg(&sound_file)) {
            warn!(player, file = %sound_file.display(), error = %e, "Failed to play alert sound");
        }
    }
}

impl PresentationSink for DesktopSink {
    fn name(&self) -> &str {
        "desktop"
    }

    fn deliver(&self, event: &SinkEvent) -> Result<()> {
        match event {
            SinkEvent::Alert(record) => {
                let settings = self.settings.borrow().clone();
                self.show_alert(record);
                self.play_sound(&settings);
            }
            SinkEvent::StateChanged { .. } => {
                // 角标与菜单刷新属于托盘 UI，桌面接收端无需处理
            }
        }
        Ok(())
    }
}

/// 派生命令并立即返回，标准输出/错误全部丢弃
fn spawn_quiet(command: &mut Command) -> std::io::Result<()> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

/// 查找提示音文件：配置优先，其次按常见路径查找 alarm.wav
fn find_sound_file(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = configured {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!(file = %path.display(), "Configured sound file does not exist");
    }

    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("alarm.wav"));
    }
    candidates.push(PathBuf::from("/usr/share/sounds/alarm.wav"));
    candidates.push(PathBuf::from("/usr/local/share/sounds/alarm.wav"));

    candidates.into_iter().find(|p| p.exists())
}

/// AppleScript 字符串转义，避免标题/消息中的引号截断脚本
fn escape_osascript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_osascript() {
        assert_eq!(escape_osascript("plain"), "plain");
        assert_eq!(escape_osascript(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_osascript(r"back\slash"), r"back\\slash");
    }

    #[test]
    fn test_find_sound_file_prefers_configured() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ding.wav");
        std::fs::write(&file, b"RIFF").unwrap();

        let found = find_sound_file(Some(file.to_str().unwrap()));
        assert_eq!(found, Some(file));
    }

    #[test]
    fn test_find_sound_file_missing_configured_falls_back() {
        // 配置的文件不存在时回退到默认查找路径（可能也为空）
        let found = find_sound_file(Some("/nonexistent/alarm.wav"));
        if let Some(path) = found {
            assert!(path.exists());
        }
    }
}
