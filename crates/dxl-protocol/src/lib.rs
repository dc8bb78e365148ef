//! # Dynamixel Protocol
//!
//! Dynamixel Protocol 2.0 串口总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: 设备 ID 定义
//! - `crc`: CRC-16 校验
//! - `packet`: 指令包构建 / 状态包解析（含字节填充）
//! - `status`: 状态包错误字节解码
//! - `control_table`: 寄存器描述符与型号能力描述
//!
//! ## 字节序
//!
//! 协议使用小端字节序（低位在前），长度字段与 CRC 同样为小端。

pub mod control_table;
pub mod crc;
pub mod ids;
pub mod packet;
pub mod status;

pub use control_table::*;
pub use crc::crc16;
pub use ids::*;
pub use packet::*;
pub use status::*;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 包长度与头部声明不一致
    #[error("Invalid packet length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// 包头不是 `FF FF FD 00`
    #[error("Invalid packet header")]
    InvalidHeader,

    /// CRC 校验失败
    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// 非预期的指令字节
    #[error("Unexpected instruction byte {0:#04x}")]
    UnexpectedInstruction(u8),

    /// 设备 ID 超出范围
    #[error("Invalid actuator id {0} (valid range 1..=252)")]
    InvalidId(u8),

    /// 寄存器宽度非法（只支持 1/2/4 字节）
    #[error("Invalid register width {0} (must be 1, 2 or 4)")]
    InvalidWidth(usize),

    /// 数值超出寄存器宽度
    #[error("Value {value} does not fit in a {width}-byte register")]
    ValueOutOfRange { value: i64, width: usize },

    /// 数值为 NaN 或无穷大，无法换算为寄存器值
    #[error("Value is not a finite number")]
    NonFinite,
}
