//! 关闭扭矩命令
//!
//! 对总线上配置的所有执行器关闭扭矩，单个失败不影响其余。

use crate::utils::{BusArgs, open_bus};
use anyhow::{Result, bail};
use clap::Args;
use dxl_driver::ActuatorGroup;
use dxl_protocol::X_SERIES;
use dxl_teleop::TeleopConfig;

/// 停止命令参数
#[derive(Args, Debug)]
pub struct StopCommand {
    #[command(flatten)]
    pub bus: BusArgs,
}

impl StopCommand {
    pub fn execute(&self, config: &TeleopConfig) -> Result<()> {
        let bus_config = self.bus.resolve(config);
        println!("🛑 关闭 {} 上的执行器扭矩...", bus_config.port);

        let mut group =
            ActuatorGroup::open(open_bus(&bus_config)?, &bus_config.actuator_ids()?, &X_SERIES)?;
        let count = group.len();

        match group.stop_all() {
            Ok(()) => {
                println!("✅ {} 个执行器已停止", count);
                Ok(())
            },
            Err(e) => {
                let failures = e.into_failures();
                for failure in &failures {
                    println!("  ❌ {}", failure);
                }
                bail!("{} of {} actuators failed to stop", failures.len(), count)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_command_creation() {
        let cmd = StopCommand {
            bus: BusArgs::default(),
        };
        assert!(cmd.bus.port.is_none());
        assert!(!cmd.bus.leader);
    }
}
