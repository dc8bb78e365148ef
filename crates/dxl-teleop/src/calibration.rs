//! 主从标定
//!
//! 会话开始时记录一次主臂与从臂的起始角度，之后保持不变：
//!
//! ```text
//! offset[i] = follower_start[i] - leader_start[i]
//! goal[i]   = leader[i] - leader_start[i] + follower_start[i]
//! ```
//!
//! 目标按第二个式子计算，当主臂位于起始位置时目标严格等于从臂起始位置。
//! 标定只存在于会话生命周期内，不做持久化。

use crate::error::LeaderError;
use dxl_driver::Deg;

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    leader_start: Vec<Deg>,
    follower_start: Vec<Deg>,
}

impl Calibration {
    /// 由起始角度构造
    ///
    /// 主臂向量可以比从臂长（只使用前 N 个关节），比从臂短则报错。
    pub fn new(leader_start: &[Deg], follower_start: Vec<Deg>) -> Result<Self, LeaderError> {
        let leader_start = tracked(leader_start, follower_start.len())?.to_vec();
        Ok(Calibration {
            leader_start,
            follower_start,
        })
    }

    /// 跟踪的关节数
    #[inline]
    pub fn joints(&self) -> usize {
        self.follower_start.len()
    }

    pub fn leader_start(&self) -> &[Deg] {
        &self.leader_start
    }

    pub fn follower_start(&self) -> &[Deg] {
        &self.follower_start
    }

    /// 每个关节的标定偏移 `follower_start - leader_start`
    pub fn offsets(&self) -> Vec<Deg> {
        self.follower_start
            .iter()
            .zip(&self.leader_start)
            .map(|(&f, &l)| f - l)
            .collect()
    }

    /// 由主臂读数计算从臂目标
    pub fn goals(&self, leader: &[Deg]) -> Result<Vec<Deg>, LeaderError> {
        let leader = tracked(leader, self.joints())?;
        Ok(leader
            .iter()
            .zip(&self.leader_start)
            .zip(&self.follower_start)
            .map(|((&l, &ls), &fs)| (l - ls) + fs)
            .collect())
    }
}

fn tracked(leader: &[Deg], joints: usize) -> Result<&[Deg], LeaderError> {
    leader.get(..joints).ok_or(LeaderError::TooFewJoints {
        required: joints,
        actual: leader.len(),
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;

    proptest! {
        /// 主臂处于起始位置时，目标严格等于从臂起始位置
        #[test]
        fn goal_at_leader_start_is_follower_start(
            pairs in vec((-360.0..360.0f64, -360.0..360.0f64), 1..8)
        ) {
            let leader: Vec<Deg> = pairs.iter().map(|p| Deg(p.0)).collect();
            let follower: Vec<Deg> = pairs.iter().map(|p| Deg(p.1)).collect();
            let cal = Calibration::new(&leader, follower.clone()).unwrap();
            prop_assert_eq!(cal.goals(&leader).unwrap(), follower);
        }

        /// 目标 = 主臂读数 + 偏移（浮点误差内）
        #[test]
        fn goal_is_leader_plus_offset(
            start in vec((-360.0..360.0f64, -360.0..360.0f64), 6),
            reading in vec(-360.0..360.0f64, 6),
        ) {
            let leader: Vec<Deg> = start.iter().map(|p| Deg(p.0)).collect();
            let follower: Vec<Deg> = start.iter().map(|p| Deg(p.1)).collect();
            let cal = Calibration::new(&leader, follower).unwrap();
            let reading: Vec<Deg> = reading.into_iter().map(Deg).collect();

            let goals = cal.goals(&reading).unwrap();
            for ((goal, l), offset) in goals.iter().zip(&reading).zip(cal.offsets()) {
                prop_assert!((goal.0 - (l.0 + offset.0)).abs() < 1e-9);
            }
        }
    }
}
