//! CLI 子命令参数与处理

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::settings::Settings;

/// `pin send` 参数
#[derive(Args, Debug)]
pub struct SendArgs {
    /// 通知标题（缺省由中继填充）
    #[arg(long, short)]
    pub title: Option<String>,
    /// 通知内容
    #[arg(long, short)]
    pub message: Option<String>,
    /// 自定义时间戳（缺省由中继在插入时分配）
    #[arg(long)]
    pub timestamp: Option<String>,
    /// 中继推送端点
    #[arg(long, default_value = "http://127.0.0.1:8000/notify")]
    pub url: String,
}

/// 向运行中的中继发送一条通知
pub async fn handle_send(args: SendArgs) -> Result<()> {
    let payload = serde_json::json!({
        "title": args.title,
        "message": args.message,
        "timestamp": args.timestamp,
    });

    let client = reqwest::Client::new();
    let response = client
        .post(&args.url)
        .json(&payload)
        .send()
        .await
        .with_context(|| format!("无法连接中继 {}", args.url))?;

    let body: serde_json::Value = response.json().await.context("中继应答不是合法 JSON")?;
    if body["status"] == "success" {
        println!("通知已发送");
        Ok(())
    } else {
        anyhow::bail!(
            "发送失败: {}",
            body["message"].as_str().unwrap_or("未知错误")
        )
    }
}

/// `pin config` 子命令
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// 查看当前配置
    Show {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 修改单个配置项（运行中的 serve 自动热加载）
    Set {
        /// 配置项: sound-enabled | sound-file | api-enabled | api-url |
        /// poll-interval | listen-host | listen-port | history-capacity
        key: String,
        /// 新值
        value: String,
    },
    /// 打印配置文件路径
    Path,
}

/// 处理 `pin config`
pub fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { json } => {
            let settings = Settings::load();
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                println!("提示音: {}", settings.sound_enabled);
                println!("API 轮询: {}", settings.api_enabled);
                println!("API 地址: {}", display_or(&settings.api_url, "(未设置)"));
                println!("轮询间隔: {} 秒", settings.poll_interval);
                println!("监听地址: {}", settings.listen_addr());
                println!("历史容量: {}", settings.history_capacity);
            }
        }
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load();
            settings.set_key(&key, &value)?;
            settings.save()?;
            println!("已更新 {} = {}", key, value);
        }
        ConfigAction::Path => {
            println!("{}", Settings::config_path().display());
        }
    }
    Ok(())
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}
