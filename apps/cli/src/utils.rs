//! 命令共用的工具函数

use anyhow::{Context, Result};
use clap::Args;
use dxl_bus::{SerialBus, SharedBus, share};
use dxl_teleop::{BusConfig, SessionReport, StopSignal, TeleopConfig};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 默认配置文件路径：`<config dir>/dxl-teleop/config.toml`
pub fn config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("dxl-teleop");
    path.push("config.toml");
    Ok(path)
}

/// 解析配置路径（命令行参数优先）
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => config_file(),
    }
}

/// 加载配置
///
/// 显式指定的文件必须存在；默认位置没有文件时使用内置默认值。
pub fn load_config(explicit: Option<&Path>) -> Result<TeleopConfig> {
    if let Some(path) = explicit {
        return TeleopConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }

    let path = config_file()?;
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(TeleopConfig::default());
    }
    TeleopConfig::load(&path).with_context(|| format!("failed to load config {}", path.display()))
}

/// 打开串口并包装为共享总线
pub fn open_bus(config: &BusConfig) -> Result<SharedBus> {
    let bus = SerialBus::open_with_timeout(&config.port, config.baud_rate, config.timeout())
        .with_context(|| format!("failed to open {} at {} baud", config.port, config.baud_rate))?;
    info!("Opened {} at {} baud", config.port, config.baud_rate);
    Ok(share(bus))
}

/// 注册 Ctrl-C 处理：只置位停止信号，由控制循环在节拍边界响应
pub fn install_stop_handler() -> Result<StopSignal> {
    let signal = StopSignal::new();
    let handler_signal = signal.clone();
    ctrlc::set_handler(move || {
        if !handler_signal.is_triggered() {
            eprintln!("\n⏹ 收到停止信号，正在关闭执行器...");
        }
        handler_signal.trigger();
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(signal)
}

/// 覆盖配置中的总线参数
#[derive(Args, Debug, Clone, Default)]
pub struct BusArgs {
    /// 串口（覆盖配置）
    #[arg(short, long)]
    pub port: Option<String>,

    /// 波特率（覆盖配置）
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// 执行器 ID，逗号分隔（覆盖配置）
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<u8>,

    /// 以主臂总线为基础（默认从臂）
    #[arg(long)]
    pub leader: bool,
}

impl BusArgs {
    /// 选择主臂或从臂总线并应用覆盖
    pub fn resolve(&self, config: &TeleopConfig) -> BusConfig {
        let base = if self.leader {
            &config.leader
        } else {
            &config.follower
        };
        self.apply(base)
    }

    pub fn apply(&self, base: &BusConfig) -> BusConfig {
        let mut config = base.clone();
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if !self.ids.is_empty() {
            config.ids = self.ids.clone();
        }
        config
    }
}

/// 输出会话统计与关闭结果
pub fn print_session_report(report: &SessionReport) {
    let stats = &report.stats;
    println!("📊 会话统计:");
    println!("  节拍: {}", stats.ticks);
    println!("  含失败的节拍: {}", stats.ticks_with_failures);
    println!("  关节失败次数: {}", stats.joint_failures);
    println!("  跳过的节拍: {}", stats.skipped_ticks);
    println!("  超时节拍: {}", stats.overruns);

    if report.is_clean_shutdown() {
        println!("✅ 所有执行器已停止");
    } else {
        for failure in &report.shutdown_failures {
            warn!("{}", failure);
            println!("❌ {}", failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_file_location() {
        // 测试环境可能没有配置目录
        if let Ok(path) = config_file() {
            assert!(path.ends_with("dxl-teleop/config.toml"));
        }
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let result = load_config(Some(Path::new("/nonexistent/dxl-cli.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "period_ms = 25").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.period_ms, 25);
    }

    #[test]
    fn test_bus_args_override() {
        let base = BusConfig::default();
        let args = BusArgs {
            port: Some("/dev/ttyACM0".to_string()),
            baud: None,
            ids: vec![1, 2],
            leader: false,
        };
        let config = args.apply(&base);
        assert_eq!(config.port, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, base.baud_rate);
        assert_eq!(config.ids, vec![1, 2]);

        assert_eq!(BusArgs::default().apply(&base), base);
    }

    #[test]
    fn test_bus_args_select_leader() {
        let config = TeleopConfig::default();
        let args = BusArgs {
            leader: true,
            ..BusArgs::default()
        };
        assert_eq!(args.resolve(&config), config.leader);
        assert_eq!(BusArgs::default().resolve(&config), config.follower);
    }
}
