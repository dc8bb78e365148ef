//! 单执行器扫动命令

use crate::utils::{BusArgs, install_stop_handler, open_bus, print_session_report};
use anyhow::{Context, Result, bail};
use clap::Args;
use dxl_driver::Actuator;
use dxl_protocol::{ActuatorId, X_SERIES};
use dxl_teleop::{SweepConfig, SweepSession, TeleopConfig, run_loop};
use tracing::warn;

/// 扫动命令参数
#[derive(Args, Debug)]
pub struct SweepCommand {
    /// 执行器 ID
    #[arg(long)]
    pub id: u8,

    /// 每个节拍前进的角度（度）
    #[arg(long)]
    pub step: Option<f64>,

    /// 电流上限（mA）
    #[arg(long)]
    pub current_limit: Option<f64>,

    /// 运行指定节拍数后退出（默认直到 Ctrl-C）
    #[arg(long)]
    pub ticks: Option<u64>,

    #[command(flatten)]
    pub bus: BusArgs,
}

impl SweepCommand {
    pub fn resolve(&self, base: &SweepConfig) -> Result<SweepConfig> {
        let mut config = base.clone();
        if let Some(step) = self.step {
            config.step_deg = step;
        }
        if let Some(current) = self.current_limit {
            config.current_limit_ma = current;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn execute(&self, base: &TeleopConfig) -> Result<()> {
        let config = self.resolve(&base.sweep)?;
        let bus_config = self.bus.resolve(base);
        let id = ActuatorId::new(self.id)?;
        let stop = install_stop_handler()?;

        let actuator = Actuator::new(open_bus(&bus_config)?, id, &X_SERIES);
        let model = actuator
            .ping()
            .with_context(|| format!("actuator {} not responding", id))?;
        if model != X_SERIES.model_number {
            warn!("Actuator {} reports model {}", id, model);
        }

        let mut loop_config = config.loop_config();
        loop_config.max_ticks = self.ticks;
        println!(
            "▶ 扫动执行器 {}（{:.2}°/节拍），按 Ctrl-C 停止",
            id, config.step_deg
        );

        let mut session = SweepSession::new(actuator, config);
        let report = run_loop(&mut session, &loop_config, &stop)?;
        print_session_report(&report);

        if !report.is_clean_shutdown() {
            bail!("actuator {} failed to stop", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_command_creation() {
        let cmd = SweepCommand {
            id: 8,
            step: Some(0.5),
            current_limit: None,
            ticks: Some(100),
            bus: BusArgs::default(),
        };
        let config = cmd.resolve(&SweepConfig::default()).unwrap();
        assert_eq!(config.step_deg, 0.5);
        assert_eq!(config.current_limit_ma, 50.0);
    }

    #[test]
    fn test_sweep_rejects_invalid_current() {
        let cmd = SweepCommand {
            id: 8,
            step: None,
            current_limit: Some(f64::NAN),
            ticks: None,
            bus: BusArgs::default(),
        };
        assert!(cmd.resolve(&SweepConfig::default()).is_err());
    }
}
