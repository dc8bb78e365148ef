//! 状态包错误字节
//!
//! Bit 7 为硬件告警标志（需要读取 Hardware Error Status 寄存器），
//! Bit 0-6 为错误编号。任意非零值都视为设备报告的错误。

use num_enum::TryFromPrimitive;
use std::fmt;

/// 错误编号（Bit 0-6）
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum DeviceErrorKind {
    /// 指令处理失败
    ResultFail = 0x01,
    /// 未定义的指令，或未先 Reg Write 就 Action
    Instruction = 0x02,
    /// 设备收到的包 CRC 不匹配
    Crc = 0x03,
    /// 写入的值超出寄存器范围
    DataRange = 0x04,
    /// 数据长度与寄存器宽度不符
    DataLength = 0x05,
    /// 写入的值超出限制（如 Current Limit 上限）
    DataLimit = 0x06,
    /// 访问被拒绝（只读寄存器、扭矩使能时写 EEPROM 区）
    Access = 0x07,
}

impl DeviceErrorKind {
    pub fn description(self) -> &'static str {
        match self {
            DeviceErrorKind::ResultFail => "failed to process the instruction",
            DeviceErrorKind::Instruction => "undefined instruction",
            DeviceErrorKind::Crc => "CRC of the received packet does not match",
            DeviceErrorKind::DataRange => "data is out of range",
            DeviceErrorKind::DataLength => "data length does not match the register",
            DeviceErrorKind::DataLimit => "data exceeds the limit",
            DeviceErrorKind::Access => "access denied (read-only or torque enabled)",
        }
    }
}

const HARDWARE_ALERT: u8 = 0x80;

/// 状态包中的错误字节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusError(pub u8);

impl StatusError {
    pub const NONE: StatusError = StatusError(0);

    /// 设备是否未报告任何错误
    #[inline]
    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// 硬件告警（过热、过载、电压异常等）
    #[inline]
    pub fn hardware_alert(self) -> bool {
        self.0 & HARDWARE_ALERT != 0
    }

    /// 错误编号；0 或未知编号返回 `None`
    pub fn kind(self) -> Option<DeviceErrorKind> {
        DeviceErrorKind::try_from(self.0 & !HARDWARE_ALERT).ok()
    }

    pub fn from_kind(kind: DeviceErrorKind) -> Self {
        StatusError(kind as u8)
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "no error");
        }
        match self.kind() {
            Some(kind) => write!(f, "{} ({:#04x})", kind.description(), self.0)?,
            None if self.0 & !HARDWARE_ALERT == 0 => write!(f, "hardware alert")?,
            None => write!(f, "unknown device error ({:#04x})", self.0)?,
        }
        if self.hardware_alert() && self.kind().is_some() {
            write!(f, ", hardware alert")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_decode() {
        assert!(StatusError(0).is_ok());
        assert_eq!(StatusError(0x06).kind(), Some(DeviceErrorKind::DataLimit));
        assert!(!StatusError(0x06).hardware_alert());

        let alert = StatusError(0x80);
        assert!(!alert.is_ok());
        assert!(alert.hardware_alert());
        assert_eq!(alert.kind(), None);
        assert_eq!(format!("{}", alert), "hardware alert");
    }

    #[test]
    fn test_status_error_display() {
        let e = StatusError::from_kind(DeviceErrorKind::Access);
        assert!(format!("{}", e).contains("access denied"));

        let combined = StatusError(0x84);
        let msg = format!("{}", combined);
        assert!(msg.contains("out of range") && msg.contains("hardware alert"));

        assert!(format!("{}", StatusError(0x3F)).contains("unknown"));
    }
}
