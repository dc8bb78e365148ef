//! 主臂读数来源
//!
//! 遥操作循环只依赖 [`LeaderSource`]：每次调用返回一组按关节顺序排列的瞬时角度。

use crate::error::LeaderError;
use dxl_bus::SharedBus;
use dxl_driver::{ActuatorGroup, Deg};
use dxl_protocol::{ActuatorId, ModelSpec};
use tracing::info;

/// 主臂关节角度来源
pub trait LeaderSource {
    /// 读取当前关节角度（长度固定）
    fn sample(&mut self) -> Result<Vec<Deg>, LeaderError>;

    /// 会话结束时释放主臂资源
    fn shutdown(&mut self) -> Result<(), LeaderError> {
        Ok(())
    }
}

impl<F> LeaderSource for F
where
    F: FnMut() -> Result<Vec<Deg>, LeaderError>,
{
    fn sample(&mut self) -> Result<Vec<Deg>, LeaderError> {
        self()
    }
}

/// 由另一组 Dynamixel 执行器构成的主臂
///
/// 主臂扭矩保持关闭，操作者可以手动拖动；读数即各关节的当前位置。
#[derive(Debug)]
pub struct DynamixelLeader {
    group: ActuatorGroup,
}

impl DynamixelLeader {
    pub fn new(group: ActuatorGroup) -> Self {
        DynamixelLeader { group }
    }

    pub fn open(
        bus: SharedBus,
        ids: &[ActuatorId],
        model: &'static ModelSpec,
    ) -> Result<Self, LeaderError> {
        Ok(Self::new(ActuatorGroup::open(bus, ids, model)?))
    }

    pub fn group(&self) -> &ActuatorGroup {
        &self.group
    }

    /// 关闭主臂扭矩，使其可以被手动拖动
    pub fn release(&mut self) -> Result<(), LeaderError> {
        self.group.disable_all()?;
        info!("Leader arm released ({} joints)", self.group.len());
        Ok(())
    }

    /// 停止主臂并释放端口引用
    pub fn stop(&mut self) -> Result<(), LeaderError> {
        self.group.stop_all()?;
        Ok(())
    }
}

impl LeaderSource for DynamixelLeader {
    fn sample(&mut self) -> Result<Vec<Deg>, LeaderError> {
        Ok(self.group.positions()?)
    }

    fn shutdown(&mut self) -> Result<(), LeaderError> {
        self.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxl_bus::{MockBus, MockFault, MockTrigger, share};
    use dxl_protocol::X_SERIES;

    #[test]
    fn test_closure_source() {
        let mut calls = 0;
        let mut source = || {
            calls += 1;
            Ok::<_, LeaderError>(vec![Deg(calls as f64)])
        };
        assert_eq!(source.sample().unwrap(), vec![Deg(1.0)]);
        assert_eq!(source.sample().unwrap(), vec![Deg(2.0)]);
    }

    #[test]
    fn test_dynamixel_leader_reads_positions() {
        let bus = MockBus::with_actuators(&[1, 2, 3]);
        let handle = bus.handle();
        let ids: Vec<_> = [1, 2, 3].iter().map(|&i| ActuatorId::new(i).unwrap()).collect();
        let mut leader = DynamixelLeader::open(share(bus), &ids, &X_SERIES).unwrap();

        handle.set_position_ticks(2, 4095);
        leader.release().unwrap();
        assert_eq!(handle.torque_enabled(1), Some(false));

        let sample = leader.sample().unwrap();
        assert_eq!(sample.len(), 3);
        assert_eq!(sample[0], Deg(0.0));
        assert!((sample[1].0 - 360.0).abs() < 1e-9);

        handle.inject(3, MockTrigger::Any, MockFault::Timeout);
        assert!(matches!(leader.sample(), Err(LeaderError::Group(_))));
    }
}
