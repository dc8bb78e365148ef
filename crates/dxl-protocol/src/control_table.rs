//! 控制表（Control Table）描述符
//!
//! 寄存器地址、宽度与单位换算常量由硬件型号决定，不允许在应用层修改。
//! 每个型号族用一个静态的 [`ModelSpec`] 描述，句柄逻辑只依赖描述符，
//! 增加新型号时无需复制句柄代码。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use smallvec::SmallVec;

/// 寄存器字节宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegisterWidth {
    One = 1,
    Two = 2,
    Four = 4,
}

impl RegisterWidth {
    /// 字节数
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// 该宽度可表示的最大无符号值
    #[inline]
    pub const fn max_value(self) -> u32 {
        match self {
            RegisterWidth::One => u8::MAX as u32,
            RegisterWidth::Two => u16::MAX as u32,
            RegisterWidth::Four => u32::MAX,
        }
    }

    /// 从字节数构造
    pub fn from_bytes(bytes: usize) -> Result<Self, ProtocolError> {
        match bytes {
            1 => Ok(RegisterWidth::One),
            2 => Ok(RegisterWidth::Two),
            4 => Ok(RegisterWidth::Four),
            other => Err(ProtocolError::InvalidWidth(other)),
        }
    }

    /// 小端编码，值必须能放入该宽度
    pub fn encode(self, value: u32) -> Result<SmallVec<[u8; 4]>, ProtocolError> {
        if value > self.max_value() {
            return Err(ProtocolError::ValueOutOfRange {
                value: value as i64,
                width: self.bytes(),
            });
        }
        Ok(SmallVec::from_slice(&value.to_le_bytes()[..self.bytes()]))
    }

    /// 小端解码
    pub fn decode(self, bytes: &[u8]) -> Result<u32, ProtocolError> {
        if bytes.len() != self.bytes() {
            return Err(ProtocolError::InvalidLength {
                expected: self.bytes(),
                actual: bytes.len(),
            });
        }
        let mut raw = [0u8; 4];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(u32::from_le_bytes(raw))
    }
}

/// 单个寄存器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub name: &'static str,
    pub address: u16,
    pub width: RegisterWidth,
    /// 是否按二进制补码解释
    pub signed: bool,
}

impl Register {
    pub const fn new(name: &'static str, address: u16, width: RegisterWidth, signed: bool) -> Self {
        Register {
            name,
            address,
            width,
            signed,
        }
    }

    /// 把有符号值转换为线上的原始值
    pub fn to_raw(&self, value: i64) -> Result<u32, ProtocolError> {
        let out_of_range = ProtocolError::ValueOutOfRange {
            value,
            width: self.width.bytes(),
        };
        if self.signed {
            let bits = (self.width.bytes() * 8) as u32;
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            if value < min || value > max {
                return Err(out_of_range);
            }
            let mask = self.width.max_value() as i64;
            Ok((value & mask) as u32)
        } else {
            if value < 0 || value > self.width.max_value() as i64 {
                return Err(out_of_range);
            }
            Ok(value as u32)
        }
    }

    /// 把线上的原始值解释为有符号值
    pub fn from_raw(&self, raw: u32) -> i64 {
        if !self.signed {
            return raw as i64;
        }
        match self.width {
            RegisterWidth::One => raw as u8 as i8 as i64,
            RegisterWidth::Two => raw as u16 as i16 as i64,
            RegisterWidth::Four => raw as i32 as i64,
        }
    }
}

/// 工作模式（Operating Mode 寄存器）
///
/// 只能在扭矩关闭时修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum OperatingMode {
    Current = 0,
    Velocity = 1,
    Position = 3,
    ExtendedPosition = 4,
    /// 限流位置控制（遥操作默认模式）
    #[default]
    CurrentBasedPosition = 5,
    Pwm = 16,
}

/// 型号能力描述
///
/// 包含遥操作用到的寄存器以及角度换算常量。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub name: &'static str,
    /// Ping 回复中的型号编号
    pub model_number: u16,
    /// 一整圈对应的编码器计数
    pub ticks_per_revolution: f64,
    /// EEPROM 区结束地址；该区寄存器只能在扭矩关闭时写入
    pub eeprom_end: u16,
    pub operating_mode: Register,
    pub current_limit: Register,
    pub torque_enable: Register,
    pub goal_position: Register,
    pub present_position: Register,
}

impl ModelSpec {
    /// 角度 → 编码器计数：`round(deg / 360 * ticks_per_revolution)`
    #[inline]
    pub fn angle_to_ticks(&self, degrees: f64) -> i64 {
        (degrees / 360.0 * self.ticks_per_revolution).round() as i64
    }

    /// 编码器计数 → 角度：`ticks / ticks_per_revolution * 360`，不做回绕
    #[inline]
    pub fn ticks_to_angle(&self, ticks: i64) -> f64 {
        ticks as f64 / self.ticks_per_revolution * 360.0
    }

    /// 写入该寄存器是否要求扭矩关闭
    #[inline]
    pub fn requires_torque_off(&self, register: &Register) -> bool {
        register.address < self.eeprom_end
    }

    /// 一个编码器计数对应的角度
    #[inline]
    pub fn degrees_per_tick(&self) -> f64 {
        360.0 / self.ticks_per_revolution
    }
}

/// X 系列（XM430 等）
pub const X_SERIES: ModelSpec = ModelSpec {
    name: "X-series",
    model_number: 1020,
    ticks_per_revolution: 4095.0,
    eeprom_end: 64,
    operating_mode: Register::new("operating mode", 11, RegisterWidth::One, false),
    current_limit: Register::new("current limit", 38, RegisterWidth::Two, false),
    torque_enable: Register::new("torque enable", 64, RegisterWidth::One, false),
    goal_position: Register::new("goal position", 116, RegisterWidth::Four, true),
    present_position: Register::new("present position", 132, RegisterWidth::Four, true),
};

/// 扭矩使能寄存器的取值
pub const TORQUE_ENABLE: u32 = 1;
pub const TORQUE_DISABLE: u32 = 0;


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// 角度 → 计数 → 角度的误差不超过一个计数
        #[test]
        fn angle_tick_roundtrip(deg in 0.0..360.0f64) {
            let ticks = X_SERIES.angle_to_ticks(deg);
            let back = X_SERIES.ticks_to_angle(ticks);
            prop_assert!((back - deg).abs() <= X_SERIES.degrees_per_tick());
        }

        /// 有符号寄存器的原始值转换可逆
        #[test]
        fn signed_raw_roundtrip(ticks in -1_048_575i64..1_048_575i64) {
            let reg = X_SERIES.present_position;
            prop_assert_eq!(reg.from_raw(reg.to_raw(ticks).unwrap()), ticks);
        }
    }
}
