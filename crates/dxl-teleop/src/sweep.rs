//! 单执行器扫动
//!
//! 独立驱动一个执行器：从当前位置出发，每个节拍把目标前进固定角度。
//! 用于在接入主臂前检查接线、模式与电流上限。

use crate::config::SweepConfig;
use crate::error::TeleopError;
use crate::runner::{ControlLoop, SessionReport, SessionStats, TeleopPhase, TickReport};
use dxl_driver::{Actuator, Deg, MemberFailure};
use dxl_protocol::OperatingMode;
use tracing::{debug, info, warn};

pub struct SweepSession {
    actuator: Actuator,
    config: SweepConfig,
    phase: TeleopPhase,
    goal: Deg,
    stats: SessionStats,
}

impl SweepSession {
    pub fn new(actuator: Actuator, config: SweepConfig) -> Self {
        SweepSession {
            actuator,
            config,
            phase: TeleopPhase::Idle,
            goal: Deg::ZERO,
            stats: SessionStats::default(),
        }
    }

    #[inline]
    pub fn phase(&self) -> TeleopPhase {
        self.phase
    }

    pub fn actuator(&self) -> &Actuator {
        &self.actuator
    }

    /// 下一个节拍将下发的目标
    pub fn next_goal(&self) -> Deg {
        self.goal
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// 读取起始位置并配置执行器（限流位置模式）
    pub fn start(&mut self) -> Result<Deg, TeleopError> {
        if self.phase != TeleopPhase::Idle {
            return Err(TeleopError::invalid_phase(TeleopPhase::Idle, self.phase));
        }
        self.phase = TeleopPhase::Calibrating;

        match self.configure() {
            Ok(start) => {
                info!("Actuator {} sweeping from {}", self.actuator.id(), start);
                self.goal = start;
                self.phase = TeleopPhase::Running;
                Ok(start)
            },
            Err(e) => {
                warn!("Sweep setup failed: {}", e);
                self.shutdown();
                Err(e)
            },
        }
    }

    fn configure(&mut self) -> Result<Deg, TeleopError> {
        let start = self.actuator.get_position()?;
        self.actuator
            .set_operating_mode(OperatingMode::CurrentBasedPosition)?;
        self.actuator.set_current_limit(self.config.current_limit_ma)?;
        self.actuator.enable_torque()?;
        Ok(start)
    }

    pub fn tick(&mut self) -> Result<TickReport, TeleopError> {
        if self.phase != TeleopPhase::Running {
            return Err(TeleopError::invalid_phase(TeleopPhase::Running, self.phase));
        }
        let tick = self.stats.ticks;
        let id = self.actuator.id();
        let mut failures = Vec::new();

        match self.actuator.get_position() {
            Ok(present) => debug!("Tick {}: actuator {} at {}", tick, id, present),
            Err(error) => {
                warn!("Tick {}: {}", tick, error);
                failures.push(MemberFailure {
                    index: 0,
                    id,
                    error,
                });
            },
        }

        let goal = self.goal;
        if let Err(error) = self.actuator.set_goal_position(goal) {
            warn!("Tick {}: {}", tick, error);
            failures.push(MemberFailure {
                index: 0,
                id,
                error,
            });
        }
        self.goal += Deg(self.config.step_deg);

        let report = TickReport {
            tick,
            goals: vec![goal],
            failures,
            leader_error: None,
        };
        self.stats.record(&report);
        Ok(report)
    }

    /// 停止执行器（只调用一次 `stop()`）
    pub fn shutdown(&mut self) -> SessionReport {
        if self.phase == TeleopPhase::Stopped {
            return SessionReport {
                stats: self.stats,
                shutdown_failures: Vec::new(),
            };
        }
        self.phase = TeleopPhase::ShuttingDown;
        info!("Stopping actuator {}", self.actuator.id());

        let mut shutdown_failures = Vec::new();
        if let Err(error) = self.actuator.stop() {
            warn!("Failed to stop actuator {}: {}", self.actuator.id(), error);
            shutdown_failures.push(MemberFailure {
                index: 0,
                id: self.actuator.id(),
                error,
            });
        }
        self.phase = TeleopPhase::Stopped;
        SessionReport {
            stats: self.stats,
            shutdown_failures,
        }
    }
}

impl ControlLoop for SweepSession {
    fn phase(&self) -> TeleopPhase {
        self.phase
    }

    fn start(&mut self) -> Result<(), TeleopError> {
        SweepSession::start(self).map(|_| ())
    }

    fn tick(&mut self) -> Result<TickReport, TeleopError> {
        SweepSession::tick(self)
    }

    fn shutdown(&mut self) -> SessionReport {
        SweepSession::shutdown(self)
    }
}

impl Drop for SweepSession {
    fn drop(&mut self) {
        if !matches!(self.phase, TeleopPhase::Idle | TeleopPhase::Stopped) {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoopConfig;
    use crate::runner::run_loop;
    use crate::signal::StopSignal;
    use dxl_bus::{MockBus, MockBusHandle, MockFault, MockTrigger, share};
    use dxl_driver::Operation;
    use dxl_protocol::{ActuatorId, X_SERIES};
    use std::time::Duration;

    fn setup() -> (SweepSession, MockBusHandle) {
        let bus = MockBus::with_actuators(&[1]);
        let handle = bus.handle();
        let actuator = Actuator::new(share(bus), ActuatorId::new(1).unwrap(), &X_SERIES);
        let config = SweepConfig {
            step_deg: 1.0,
            ..SweepConfig::default()
        };
        (SweepSession::new(actuator, config), handle)
    }

    #[test]
    fn test_start_configures_mode_and_current() {
        let (mut session, handle) = setup();
        handle.set_position_deg(1, 90.0);

        let start = session.start().unwrap();
        assert!((start.0 - 90.0).abs() <= X_SERIES.degrees_per_tick());
        assert_eq!(handle.operating_mode(1), Some(5));
        assert_eq!(handle.current_limit(1), Some(50));
        assert_eq!(handle.torque_enabled(1), Some(true));
    }

    #[test]
    fn test_goal_advances_each_tick() {
        let (mut session, handle) = setup();
        session.start().unwrap();

        let first = session.tick().unwrap();
        let second = session.tick().unwrap();
        assert_eq!(first.goals, vec![Deg(0.0)]);
        assert_eq!(second.goals, vec![Deg(1.0)]);
        assert_eq!(
            handle.writes_to(1, X_SERIES.goal_position.address),
            vec![0, X_SERIES.angle_to_ticks(1.0) as u32]
        );
    }

    #[test]
    fn test_failed_position_read_is_reported() {
        let (mut session, handle) = setup();
        session.start().unwrap();
        handle.inject_times(
            1,
            MockTrigger::Read(X_SERIES.present_position.address),
            MockFault::Timeout,
            1,
        );

        let report = session.tick().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].error.op(), Operation::GetPosition);
        // 读取失败不影响目标下发
        assert_eq!(handle.writes_to(1, X_SERIES.goal_position.address).len(), 1);

        assert!(session.tick().unwrap().is_clean());
        let stats = session.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.ticks_with_failures, 1);
        assert_eq!(stats.joint_failures, 1);
    }

    #[test]
    fn test_run_stops_exactly_once() {
        let (mut session, handle) = setup();
        let config = LoopConfig {
            period: Duration::from_millis(1),
            max_ticks: Some(3),
        };
        let report = run_loop(&mut session, &config, &StopSignal::new()).unwrap();
        assert_eq!(report.stats.ticks, 3);
        assert!(report.is_clean_shutdown());
        assert_eq!(session.phase(), TeleopPhase::Stopped);

        // enable 一次，stop 一次
        assert_eq!(handle.writes_to(1, X_SERIES.torque_enable.address), vec![0, 1, 0]);
        assert_eq!(handle.close_count(), 1);
    }
}
