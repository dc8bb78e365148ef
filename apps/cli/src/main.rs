//! # Dynamixel CLI
//!
//! 主从遥操作与单执行器调试的命令行工具。
//!
//! ```bash
//! # 生成默认配置
//! dxl-cli config init
//!
//! # 主从遥操作（Ctrl-C 停止）
//! dxl-cli teleop
//!
//! # 单执行器扫动
//! dxl-cli sweep --id 8 --ticks 500
//!
//! # 查询 / 急停
//! dxl-cli position
//! dxl-cli stop
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod utils;

use commands::{
    ConfigCommand, PingCommand, PositionCommand, StopCommand, SweepCommand, TeleopCommand,
};

const DEFAULT_LOG_FILTER: &str = "dxl_cli=info,dxl_teleop=info";

/// Dynamixel CLI - 串口舵机遥操作工具
#[derive(Parser, Debug)]
#[command(name = "dxl-cli")]
#[command(about = "Command-line interface for Dynamixel teleoperation", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认位于用户配置目录）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 主从遥操作
    Teleop {
        #[command(flatten)]
        args: TeleopCommand,
    },

    /// 单执行器扫动
    Sweep {
        #[command(flatten)]
        args: SweepCommand,
    },

    /// 查询当前角度
    Position {
        #[command(flatten)]
        args: PositionCommand,
    },

    /// 检查总线上的执行器
    Ping {
        #[command(flatten)]
        args: PingCommand,
    },

    /// 关闭扭矩
    Stop {
        #[command(flatten)]
        args: StopCommand,
    },
}

fn main() -> Result<()> {
    // RUST_LOG 优先，未设置时使用默认过滤
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let path = cli.config.as_deref();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(path),
        Commands::Teleop { args } => args.execute(&utils::load_config(path)?),
        Commands::Sweep { args } => args.execute(&utils::load_config(path)?),
        Commands::Position { args } => args.execute(&utils::load_config(path)?),
        Commands::Ping { args } => args.execute(&utils::load_config(path)?),
        Commands::Stop { args } => args.execute(&utils::load_config(path)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["dxl-cli", "position", "--config", "/tmp/dxl.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/dxl.toml")));
        assert!(matches!(cli.command, Commands::Position { .. }));
    }

    #[test]
    fn test_teleop_ticks_flag() {
        let cli = Cli::parse_from(["dxl-cli", "teleop", "--ticks", "100"]);
        let Commands::Teleop { args } = cli.command else {
            panic!("expected teleop command");
        };
        assert_eq!(args.ticks, Some(100));
    }
}
