//! 主从遥操作会话
//!
//! 会话持有主臂来源、从臂执行器组与本次会话的标定。
//! 每个节拍：采样主臂 → `goal = leader - leader_start + follower_start` → `apply_goals`。
//!
//! 错误策略：
//! - 标定阶段（读初始角度、配置从臂）的错误是致命的，会话执行关闭流程后返回错误
//! - 运行阶段的单关节失败只记录到 [`TickReport`]，下一个节拍自然重试（目标是绝对角度）
//! - 关闭流程总是尝试停止所有从臂，失败统一收集

use crate::calibration::Calibration;
use crate::error::TeleopError;
use crate::leader::LeaderSource;
use crate::runner::{ControlLoop, SessionReport, SessionStats, TeleopPhase, TickReport};
use dxl_driver::{ActuatorGroup, Deg};
use dxl_protocol::OperatingMode;
use tracing::{debug, info, warn};

/// 从臂配置参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowerSettings {
    pub mode: OperatingMode,
    pub current_limit_ma: f64,
}

impl Default for FollowerSettings {
    fn default() -> Self {
        FollowerSettings {
            mode: OperatingMode::CurrentBasedPosition,
            current_limit_ma: 400.0,
        }
    }
}

pub struct TeleopSession<L: LeaderSource> {
    leader: L,
    followers: ActuatorGroup,
    settings: FollowerSettings,
    phase: TeleopPhase,
    calibration: Option<Calibration>,
    stats: SessionStats,
}

impl<L: LeaderSource> TeleopSession<L> {
    pub fn new(leader: L, followers: ActuatorGroup, settings: FollowerSettings) -> Self {
        TeleopSession {
            leader,
            followers,
            settings,
            phase: TeleopPhase::Idle,
            calibration: None,
            stats: SessionStats::default(),
        }
    }

    #[inline]
    pub fn phase(&self) -> TeleopPhase {
        self.phase
    }

    /// 当前会话的标定（仅在 `Running` 阶段存在）
    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn followers(&self) -> &ActuatorGroup {
        &self.followers
    }

    pub fn leader(&self) -> &L {
        &self.leader
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// 标定并配置从臂
    pub fn start(&mut self) -> Result<&Calibration, TeleopError> {
        if self.phase != TeleopPhase::Idle {
            return Err(TeleopError::invalid_phase(TeleopPhase::Idle, self.phase));
        }
        self.phase = TeleopPhase::Calibrating;
        info!("Calibrating {} follower joints", self.followers.len());

        match self.calibrate() {
            Ok(calibration) => {
                info!("Calibration offsets: {}", format_angles(&calibration.offsets()));
                self.phase = TeleopPhase::Running;
                Ok(&*self.calibration.insert(calibration))
            },
            Err(e) => {
                warn!("Calibration failed: {}", e);
                self.shutdown();
                Err(e)
            },
        }
    }

    fn calibrate(&mut self) -> Result<Calibration, TeleopError> {
        let leader_start = self
            .leader
            .sample()
            .map_err(TeleopError::LeaderCalibration)?;
        let follower_start = self
            .followers
            .positions()
            .map_err(TeleopError::FollowerCalibration)?;
        let calibration = Calibration::new(&leader_start, follower_start)
            .map_err(TeleopError::LeaderCalibration)?;
        debug!(
            "Leader start {}, follower start {}",
            format_angles(calibration.leader_start()),
            format_angles(calibration.follower_start())
        );

        self.followers
            .configure_all(self.settings.mode, self.settings.current_limit_ma)
            .map_err(TeleopError::Configure)?;
        Ok(calibration)
    }

    /// 执行一个控制节拍
    pub fn tick(&mut self) -> Result<TickReport, TeleopError> {
        if self.phase != TeleopPhase::Running {
            return Err(TeleopError::invalid_phase(TeleopPhase::Running, self.phase));
        }
        let Some(calibration) = self.calibration.as_ref() else {
            return Err(TeleopError::invalid_phase(TeleopPhase::Running, self.phase));
        };

        let tick = self.stats.ticks;
        let goals = self
            .leader
            .sample()
            .and_then(|angles| calibration.goals(&angles));

        let report = match goals {
            Ok(goals) => {
                let failures = match self.followers.apply_goals(&goals) {
                    Ok(()) => Vec::new(),
                    Err(e) => e.into_failures(),
                };
                for failure in &failures {
                    warn!("Tick {}: {}", tick, failure);
                }
                debug!("Tick {}: goals {}", tick, format_angles(&goals));
                TickReport {
                    tick,
                    goals,
                    failures,
                    leader_error: None,
                }
            },
            Err(e) => {
                warn!("Tick {}: skipped, {}", tick, e);
                TickReport {
                    tick,
                    goals: Vec::new(),
                    failures: Vec::new(),
                    leader_error: Some(e),
                }
            },
        };
        self.stats.record(&report);
        Ok(report)
    }

    /// 停止所有从臂并释放主臂，标定随之丢弃
    pub fn shutdown(&mut self) -> SessionReport {
        if self.phase == TeleopPhase::Stopped {
            return SessionReport {
                stats: self.stats,
                shutdown_failures: Vec::new(),
            };
        }
        self.phase = TeleopPhase::ShuttingDown;
        info!("Stopping {} follower actuators", self.followers.len());

        let shutdown_failures = match self.followers.stop_all() {
            Ok(()) => Vec::new(),
            Err(e) => e.into_failures(),
        };
        if let Err(e) = self.leader.shutdown() {
            warn!("Failed to release leader: {}", e);
        }

        self.calibration = None;
        self.phase = TeleopPhase::Stopped;
        if shutdown_failures.is_empty() {
            info!("All actuators stopped");
        } else {
            warn!("{} actuators failed to stop", shutdown_failures.len());
        }
        SessionReport {
            stats: self.stats,
            shutdown_failures,
        }
    }
}

impl<L: LeaderSource> ControlLoop for TeleopSession<L> {
    fn phase(&self) -> TeleopPhase {
        self.phase
    }

    fn start(&mut self) -> Result<(), TeleopError> {
        TeleopSession::start(self).map(|_| ())
    }

    fn tick(&mut self) -> Result<TickReport, TeleopError> {
        TeleopSession::tick(self)
    }

    fn shutdown(&mut self) -> SessionReport {
        TeleopSession::shutdown(self)
    }
}

impl<L: LeaderSource> Drop for TeleopSession<L> {
    fn drop(&mut self) {
        if !matches!(self.phase, TeleopPhase::Idle | TeleopPhase::Stopped) {
            self.shutdown();
        }
    }
}

impl<L: LeaderSource> std::fmt::Debug for TeleopSession<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeleopSession")
            .field("phase", &self.phase)
            .field("followers", &self.followers)
            .field("settings", &self.settings)
            .field("stats", &self.stats)
            .finish()
    }
}

pub(crate) fn format_angles(angles: &[Deg]) -> String {
    let parts: Vec<String> = angles.iter().map(|a| format!("{:.2}", a.0)).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LeaderError;
    use dxl_bus::{MockBus, MockBusHandle, MockFault, MockTrigger, share};
    use dxl_driver::degrees;
    use dxl_protocol::{ActuatorId, X_SERIES};

    const IDS: [u8; 6] = [8, 9, 10, 11, 12, 13];

    type Source = Box<dyn FnMut() -> Result<Vec<Deg>, LeaderError>>;

    fn followers() -> (ActuatorGroup, MockBusHandle) {
        let bus = MockBus::with_actuators(&IDS);
        let handle = bus.handle();
        let ids: Vec<_> = IDS.iter().map(|&i| ActuatorId::new(i).unwrap()).collect();
        (ActuatorGroup::open(share(bus), &ids, &X_SERIES).unwrap(), handle)
    }

    fn constant(angles: &[f64]) -> Source {
        let angles = degrees(angles);
        Box::new(move || Ok(angles.clone()))
    }

    #[test]
    fn test_phase_transitions() {
        let (group, handle) = followers();
        let mut session = TeleopSession::new(
            constant(&[0.0; 6]),
            group,
            FollowerSettings::default(),
        );
        assert_eq!(session.phase(), TeleopPhase::Idle);
        assert!(session.tick().is_err());

        session.start().unwrap();
        assert_eq!(session.phase(), TeleopPhase::Running);
        assert!(session.start().is_err());
        for id in IDS {
            assert_eq!(handle.torque_enabled(id), Some(true));
            assert_eq!(handle.current_limit(id), Some(400));
        }

        let report = session.shutdown();
        assert!(report.is_clean_shutdown());
        assert_eq!(session.phase(), TeleopPhase::Stopped);
        assert!(session.calibration().is_none());
        assert!(session.tick().is_err());
        assert_eq!(handle.close_count(), 1);
    }

    #[test]
    fn test_leader_failure_at_calibration_is_fatal() {
        let (group, handle) = followers();
        let source: Source = Box::new(|| Err(LeaderError::Source("unplugged".to_string())));
        let mut session = TeleopSession::new(source, group, FollowerSettings::default());

        let err = session.start().unwrap_err();
        assert!(matches!(err, TeleopError::LeaderCalibration(_)));
        assert_eq!(session.phase(), TeleopPhase::Stopped);
        // 未进入配置阶段
        assert!(handle
            .requests()
            .iter()
            .all(|r| !r.is_write_to(X_SERIES.operating_mode.address)));
    }

    #[test]
    fn test_configure_failure_stops_already_enabled_members() {
        let (group, handle) = followers();
        handle.inject(10, MockTrigger::Write(X_SERIES.current_limit.address), MockFault::Timeout);
        let mut session = TeleopSession::new(
            constant(&[0.0; 6]),
            group,
            FollowerSettings::default(),
        );

        let err = session.start().unwrap_err();
        assert!(matches!(err, TeleopError::Configure(_)));
        assert_eq!(handle.torque_enabled(8), Some(false));
        assert_eq!(handle.torque_enabled(9), Some(false));
        assert_eq!(handle.close_count(), 1);
    }

    #[test]
    fn test_tick_with_failing_joint_keeps_running() {
        let (group, handle) = followers();
        let mut session = TeleopSession::new(
            constant(&[0.0; 6]),
            group,
            FollowerSettings::default(),
        );
        session.start().unwrap();
        handle.inject(11, MockTrigger::Write(X_SERIES.goal_position.address), MockFault::Timeout);

        let report = session.tick().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 3);
        assert_eq!(report.goals.len(), 6);
        assert_eq!(session.phase(), TeleopPhase::Running);

        let report = session.tick().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(session.stats().ticks, 2);
        assert_eq!(session.stats().joint_failures, 2);
    }

    #[test]
    fn test_drop_while_running_stops_followers() {
        let (group, handle) = followers();
        let mut session = TeleopSession::new(
            constant(&[0.0; 6]),
            group,
            FollowerSettings::default(),
        );
        session.start().unwrap();
        drop(session);
        for id in IDS {
            assert_eq!(handle.torque_enabled(id), Some(false));
        }
        assert_eq!(handle.close_count(), 1);
    }
}
