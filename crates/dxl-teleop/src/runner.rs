//! 控制循环运行器
//!
//! 遥操作与单执行器扫动共用同一个阻塞循环：
//!
//! 1. 检查停止信号与 `max_ticks`
//! 2. 执行一个节拍（读主臂 → 计算目标 → 下发）
//! 3. 休眠到下一个锚点
//!
//! 停止信号只在节拍边界检查，观察到信号后不再下发任何目标，
//! 随后无条件执行关闭流程。

use crate::config::LoopConfig;
use crate::error::{LeaderError, TeleopError};
use crate::signal::StopSignal;
use crate::ticker::Ticker;
use dxl_driver::{Deg, MemberFailure};
use std::fmt;
use tracing::{info, warn};

/// 会话阶段
///
/// `Idle → Calibrating → Running → ShuttingDown → Stopped`，`Stopped` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleopPhase {
    Idle,
    Calibrating,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for TeleopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TeleopPhase::Idle => "idle",
            TeleopPhase::Calibrating => "calibrating",
            TeleopPhase::Running => "running",
            TeleopPhase::ShuttingDown => "shutting down",
            TeleopPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// 单个节拍的结果
#[derive(Debug)]
pub struct TickReport {
    /// 从 0 开始的节拍序号
    pub tick: u64,
    /// 本节拍下发的目标（主臂读数失败时为空）
    pub goals: Vec<Deg>,
    /// 下发失败的关节
    pub failures: Vec<MemberFailure>,
    /// 主臂读数失败时跳过本节拍
    pub leader_error: Option<LeaderError>,
}

impl TickReport {
    /// 本节拍是否完全成功
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.leader_error.is_none()
    }
}

/// 运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    /// 至少有一处失败的节拍数
    pub ticks_with_failures: u64,
    /// 关节级失败总数
    pub joint_failures: u64,
    /// 因主臂读数失败而跳过的节拍数
    pub skipped_ticks: u64,
    pub overruns: u64,
}

impl SessionStats {
    pub(crate) fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        if !report.is_clean() {
            self.ticks_with_failures += 1;
        }
        self.joint_failures += report.failures.len() as u64;
        if report.leader_error.is_some() {
            self.skipped_ticks += 1;
        }
    }
}

/// 会话结束时的报告
#[derive(Debug, Default)]
pub struct SessionReport {
    pub stats: SessionStats,
    /// 关闭流程中 stop 失败的执行器
    pub shutdown_failures: Vec<MemberFailure>,
}

impl SessionReport {
    /// 关闭流程是否全部成功
    pub fn is_clean_shutdown(&self) -> bool {
        self.shutdown_failures.is_empty()
    }
}

/// 可被 [`run_loop`] 驱动的会话
pub trait ControlLoop {
    fn phase(&self) -> TeleopPhase;

    /// `Idle → Calibrating → Running`；失败时会话已执行关闭流程
    fn start(&mut self) -> Result<(), TeleopError>;

    /// 执行一个节拍，只能在 `Running` 阶段调用
    fn tick(&mut self) -> Result<TickReport, TeleopError>;

    /// `→ ShuttingDown → Stopped`；重复调用返回空报告
    fn shutdown(&mut self) -> SessionReport;
}

/// 运行会话直到收到停止信号或达到 `max_ticks`
///
/// 处于 `Idle` 的会话会先执行 `start()`；启动前已收到停止信号时不再配置执行器，
/// 直接进入关闭流程。返回时会话总是处于 `Stopped`。
pub fn run_loop<S>(
    session: &mut S,
    config: &LoopConfig,
    stop: &StopSignal,
) -> Result<SessionReport, TeleopError>
where
    S: ControlLoop + ?Sized,
{
    if let Err(e) = config.validate() {
        session.shutdown();
        return Err(e.into());
    }
    if stop.is_triggered() {
        info!("Stop signal received before start");
        return Ok(session.shutdown());
    }
    if session.phase() == TeleopPhase::Idle {
        session.start()?;
    }
    if session.phase() != TeleopPhase::Running {
        let actual = session.phase();
        session.shutdown();
        return Err(TeleopError::invalid_phase(TeleopPhase::Running, actual));
    }

    let mut ticker = Ticker::new(config.period);
    let mut ticks = 0u64;
    let outcome = loop {
        if stop.is_triggered() {
            info!("Stop signal received after {} ticks", ticks);
            break Ok(());
        }
        if let Some(max_ticks) = config.max_ticks
            && ticks >= max_ticks
        {
            info!("Reached {} ticks", max_ticks);
            break Ok(());
        }

        if let Err(e) = session.tick() {
            break Err(e);
        }
        ticks += 1;

        ticker.wait();
    };

    let mut report = session.shutdown();
    report.stats.overruns = ticker.overruns();
    if ticker.overruns() > 0 {
        warn!("{} of {} ticks overran the {:?} period", ticker.overruns(), ticks, config.period);
    }
    outcome.map(|()| report)
}
