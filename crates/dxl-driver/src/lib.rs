//! # Dynamixel Driver Layer
//!
//! 执行器驱动层，构建在 [`dxl_bus`] 的请求/应答交换之上：
//!
//! - [`RegisterCodec`]：按宽度读写寄存器，区分通讯错误与设备错误
//! - [`Actuator`]：单个执行器句柄（扭矩、模式、电流上限、目标/当前位置、stop）
//! - [`ActuatorGroup`]：按 ID 升序排列的执行器组（批量配置、下发目标、批量 stop）
//! - [`Deg`]：角度单位
//!
//! 驱动层不感知主臂与标定，这些由 `dxl-teleop` 负责。
//!
//! ```rust,ignore
//! use dxl_bus::{SerialBus, share};
//! use dxl_driver::{ActuatorGroup, Deg};
//! use dxl_protocol::{ActuatorId, OperatingMode, X_SERIES};
//!
//! let bus = share(SerialBus::open("/dev/ttyUSB0", 57_600)?);
//! let ids: Vec<_> = (8..=13).map(ActuatorId::new).collect::<Result<_, _>>()?;
//! let mut group = ActuatorGroup::open(bus, &ids, &X_SERIES)?;
//! group.configure_all(OperatingMode::CurrentBasedPosition, 400.0)?;
//! group.apply_goals(&[Deg(90.0); 6])?;
//! group.stop_all()?;
//! ```

pub mod actuator;
pub mod codec;
mod error;
pub mod group;
pub mod state;
mod units;

pub use actuator::Actuator;
pub use codec::RegisterCodec;
pub use error::{ActuatorError, CodecError, CommError, GroupError, MemberFailure, Operation};
pub use group::ActuatorGroup;
pub use state::{ActuatorState, TorqueState};
pub use units::{Deg, degrees};

#[cfg(test)]
mod proptests {
    use super::*;
    use dxl_bus::{MockBus, share};
    use dxl_protocol::{ActuatorId, OperatingMode, X_SERIES};
    use proptest::prelude::*;

    proptest! {
        /// 经过总线写入目标再读回当前位置，误差不超过一个编码器计数
        #[test]
        fn goal_then_read_back_within_one_tick(deg in 0.0..360.0f64) {
            let bus = MockBus::with_actuators(&[1]);
            let mut actuator = Actuator::new(share(bus), ActuatorId::new(1).unwrap(), &X_SERIES);
            actuator.set_operating_mode(OperatingMode::Position).unwrap();
            actuator.enable_torque().unwrap();

            actuator.set_goal_position(Deg(deg)).unwrap();
            let back = actuator.get_position().unwrap();
            prop_assert!((back.0 - deg).abs() <= X_SERIES.degrees_per_tick());
        }
    }
}
