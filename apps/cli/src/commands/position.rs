//! 位置查询命令

use crate::utils::{BusArgs, open_bus};
use anyhow::{Result, bail};
use clap::Args;
use dxl_driver::ActuatorGroup;
use dxl_protocol::X_SERIES;
use dxl_teleop::TeleopConfig;

/// 位置查询命令参数
#[derive(Args, Debug)]
pub struct PositionCommand {
    #[command(flatten)]
    pub bus: BusArgs,
}

impl PositionCommand {
    /// 逐个读取当前角度，单个执行器失败不影响其余
    pub fn execute(&self, config: &TeleopConfig) -> Result<()> {
        let bus_config = self.bus.resolve(config);
        println!("⏳ 正在查询 {} 上的执行器位置...", bus_config.port);

        let group =
            ActuatorGroup::open(open_bus(&bus_config)?, &bus_config.actuator_ids()?, &X_SERIES)?;

        let mut failed = 0;
        println!("📊 当前角度:");
        for actuator in group.members() {
            match actuator.get_position() {
                Ok(angle) => println!(
                    "  {}: {:>9.2}° ({} ticks)",
                    actuator.id(),
                    angle.0,
                    actuator.angle_to_ticks(angle)
                ),
                Err(e) => {
                    failed += 1;
                    println!("  {}: ❌ {}", actuator.id(), e);
                },
            }
        }

        if failed > 0 {
            bail!("{} of {} actuators did not report a position", failed, group.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_command_creation() {
        let cmd = PositionCommand {
            bus: BusArgs {
                port: Some("/dev/ttyUSB1".to_string()),
                ..BusArgs::default()
            },
        };
        let config = cmd.bus.resolve(&TeleopConfig::default());
        assert_eq!(config.port, "/dev/ttyUSB1");
        assert_eq!(config.ids, vec![8, 9, 10, 11, 12, 13]);
    }
}
