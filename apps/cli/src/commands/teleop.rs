//! 主从遥操作命令

use crate::utils::{install_stop_handler, open_bus, print_session_report};
use anyhow::{Context, Result, bail};
use clap::Args;
use dxl_driver::ActuatorGroup;
use dxl_protocol::X_SERIES;
use dxl_teleop::{DynamixelLeader, TeleopConfig, TeleopSession, run_loop};
use tracing::info;

/// 遥操作命令参数
#[derive(Args, Debug)]
pub struct TeleopCommand {
    /// 从臂串口（覆盖配置）
    #[arg(long)]
    pub follower_port: Option<String>,

    /// 主臂串口（覆盖配置）
    #[arg(long)]
    pub leader_port: Option<String>,

    /// 节拍周期（毫秒）
    #[arg(long)]
    pub period_ms: Option<u64>,

    /// 从臂电流上限（mA）
    #[arg(long)]
    pub current_limit: Option<f64>,

    /// 运行指定节拍数后退出（默认直到 Ctrl-C）
    #[arg(long)]
    pub ticks: Option<u64>,
}

impl TeleopCommand {
    /// 合并命令行参数与配置
    pub fn resolve(&self, base: &TeleopConfig) -> Result<TeleopConfig> {
        let mut config = base.clone();
        if let Some(port) = &self.follower_port {
            config.follower.port = port.clone();
        }
        if let Some(port) = &self.leader_port {
            config.leader.port = port.clone();
        }
        if let Some(period_ms) = self.period_ms {
            config.period_ms = period_ms;
        }
        if let Some(current) = self.current_limit {
            config.current_limit_ma = current;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn execute(&self, base: &TeleopConfig) -> Result<()> {
        let config = self.resolve(base)?;
        let stop = install_stop_handler()?;

        println!("🔌 连接从臂 {}...", config.follower.port);
        let followers = ActuatorGroup::open(
            open_bus(&config.follower)?,
            &config.follower.actuator_ids()?,
            &X_SERIES,
        )?;

        println!("🔌 连接主臂 {}...", config.leader.port);
        let mut leader = DynamixelLeader::open(
            open_bus(&config.leader)?,
            &config.leader.actuator_ids()?,
            &X_SERIES,
        )?;
        // 主臂由人手拖动，保持扭矩关闭
        leader.release().context("failed to release leader torque")?;

        let mut loop_config = config.loop_config();
        loop_config.max_ticks = self.ticks;
        info!(
            "Teleoperating {} followers at {:?} per tick",
            followers.len(),
            loop_config.period
        );

        let mut session = TeleopSession::new(leader, followers, config.follower_settings());
        println!("▶ 遥操作已开始，按 Ctrl-C 停止");
        let report = run_loop(&mut session, &loop_config, &stop)?;
        print_session_report(&report);

        if !report.is_clean_shutdown() {
            bail!(
                "{} actuators failed to stop",
                report.shutdown_failures.len()
            );
        }
        Ok(())
    }
}
