//! Pi Relay CLI
//!
//! 本地通知中继：HTTP 推送 + 远端 API 轮询 → 有界历史 → 桌面提醒

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use pi_relay::cli::{handle_config, handle_send, ConfigAction, SendArgs};
use pi_relay::settings::{spawn_file_watch, Settings, SettingsHandle};
use pi_relay::Relay;

#[derive(Parser)]
#[command(name = "pin")]
#[command(about = "Pi Relay - 本地通知中继")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动通知中继（监听推送 + 轮询远端 API）
    Serve {
        /// 覆盖监听端口
        #[arg(long)]
        port: Option<u16>,
        /// 覆盖监听地址
        #[arg(long)]
        host: Option<String>,
    },
    /// 向运行中的中继发送一条通知
    Send(SendArgs),
    /// 查看或修改配置
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化 tracing 日志系统
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug pin serve
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pi_relay=info,pin=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => {
            let mut initial = Settings::load();
            if let Some(port) = port {
                initial.listen_port = port;
            }
            if let Some(host) = host {
                initial.listen_host = host;
            }

            let settings = SettingsHandle::new(initial);
            let relay = Relay::start(settings.clone()).await?;

            // 监视配置文件：`pin config set` 的修改对运行中的进程生效
            let _watch = spawn_file_watch(
                Settings::config_path(),
                settings,
                relay.cancellation_token(),
            );

            relay.run_until_shutdown().await?;
        }
        Commands::Send(args) => {
            handle_send(args).await?;
        }
        Commands::Config { action } => {
            handle_config(action)?;
        }
    }

    Ok(())
}
