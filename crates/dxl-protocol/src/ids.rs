//! 设备 ID 定义

use crate::ProtocolError;
use std::fmt;

/// 广播 ID（设备不会回复状态包）
pub const BROADCAST_ID: u8 = 0xFE;

/// 最大可用设备 ID
pub const MAX_ACTUATOR_ID: u8 = 252;

/// 总线上单个执行器的 ID
///
/// 同一总线段内唯一，构造后不可变。只接受 `1..=252`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct ActuatorId(u8);

impl ActuatorId {
    pub fn new(raw: u8) -> Result<Self, ProtocolError> {
        if raw == 0 || raw > MAX_ACTUATOR_ID {
            return Err(ProtocolError::InvalidId(raw));
        }
        Ok(ActuatorId(raw))
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ActuatorId {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        ActuatorId::new(raw)
    }
}

impl From<ActuatorId> for u8 {
    fn from(id: ActuatorId) -> u8 {
        id.0
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
