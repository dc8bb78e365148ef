//! 角度单位
//!
//! 关节角度统一使用 [`Deg`]（NewType），防止与编码器计数混用。
//!
//! ```rust
//! use dxl_driver::Deg;
//!
//! let start = Deg(10.0);
//! let goal = start + Deg(5.0);
//! assert_eq!(goal, Deg(15.0));
//! ```

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// 角度（度）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Deg(pub f64);

impl Deg {
    pub const ZERO: Self = Deg(0.0);

    #[inline]
    pub const fn new(value: f64) -> Self {
        Deg(value)
    }

    /// 获取原始值
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn abs(self) -> Self {
        Deg(self.0.abs())
    }
}

impl fmt::Display for Deg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}°", self.0)
    }
}

impl From<f64> for Deg {
    fn from(value: f64) -> Self {
        Deg(value)
    }
}

// 运算符重载
impl Add for Deg {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Deg(self.0 + rhs.0)
    }
}

impl Sub for Deg {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Deg(self.0 - rhs.0)
    }
}

impl Neg for Deg {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Deg(-self.0)
    }
}

impl AddAssign for Deg {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Deg {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// 把原始浮点数组转换为角度向量
pub fn degrees(values: &[f64]) -> Vec<Deg> {
    values.iter().copied().map(Deg).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deg_arithmetic() {
        let mut a = Deg(10.0);
        a += Deg(5.0);
        assert_eq!(a, Deg(15.0));
        a -= Deg(20.0);
        assert_eq!(a, Deg(-5.0));
        assert_eq!(-a, Deg(5.0));
        assert_eq!(a.abs(), Deg(5.0));
        assert_eq!(Deg(1.5) - Deg(0.5), Deg(1.0));
    }

    #[test]
    fn test_deg_display() {
        assert_eq!(format!("{}", Deg(12.5)), "12.50°");
    }

    #[test]
    fn test_degrees_helper() {
        assert_eq!(degrees(&[1.0, 2.0]), vec![Deg(1.0), Deg(2.0)]);
    }
}
