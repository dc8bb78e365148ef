//! 执行器本地状态
//!
//! 只在写入被设备确认后更新。当前位置不缓存，始终以设备为准。

use crate::Deg;
use dxl_protocol::OperatingMode;

/// 扭矩状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TorqueState {
    /// 句柄创建后尚未写过扭矩寄存器
    #[default]
    Unknown,
    Enabled,
    Disabled,
}

/// 句柄最后一次确认写入的状态
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActuatorState {
    pub torque: TorqueState,
    pub mode: Option<OperatingMode>,
    /// 电流上限（设备单位，mA）
    pub current_limit: Option<u16>,
    pub last_goal: Option<Deg>,
}

impl ActuatorState {
    #[inline]
    pub fn torque_enabled(&self) -> bool {
        self.torque == TorqueState::Enabled
    }
}
