//! 执行器检查命令

use crate::utils::{BusArgs, open_bus};
use anyhow::{Result, bail};
use clap::Args;
use dxl_driver::Actuator;
use dxl_protocol::X_SERIES;
use dxl_teleop::TeleopConfig;

/// Ping 命令参数
#[derive(Args, Debug)]
pub struct PingCommand {
    #[command(flatten)]
    pub bus: BusArgs,
}

impl PingCommand {
    pub fn execute(&self, config: &TeleopConfig) -> Result<()> {
        let bus_config = self.bus.resolve(config);
        let ids = bus_config.actuator_ids()?;
        let bus = open_bus(&bus_config)?;

        let mut missing = 0;
        for id in &ids {
            let actuator = Actuator::new(bus.clone(), *id, &X_SERIES);
            match actuator.ping() {
                Ok(model) if model == X_SERIES.model_number => {
                    println!("  {}: ✅ {} (model {})", id, X_SERIES.name, model);
                },
                Ok(model) => println!("  {}: ⚠️ unexpected model {}", id, model),
                Err(e) => {
                    missing += 1;
                    println!("  {}: ❌ {}", id, e);
                },
            }
        }

        if missing > 0 {
            bail!("{} of {} actuators did not answer", missing, ids.len());
        }
        println!("✅ {} 上的 {} 个执行器均已响应", bus_config.port, ids.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_command_creation() {
        let cmd = PingCommand {
            bus: BusArgs {
                ids: vec![1],
                leader: true,
                ..BusArgs::default()
            },
        };
        let config = cmd.bus.resolve(&TeleopConfig::default());
        assert_eq!(config.port, "/dev/ttyUSB1");
        assert_eq!(config.ids, vec![1]);
    }
}
