//! 遥操作层错误类型

use crate::TeleopPhase;
use crate::config::ConfigError;
use dxl_driver::{ActuatorError, GroupError};
use thiserror::Error;

/// 主臂读数错误
#[derive(Error, Debug)]
pub enum LeaderError {
    /// 主臂执行器组读取失败
    #[error("leader read failed: {0}")]
    Group(#[from] GroupError),

    /// 主臂关节数少于从臂
    #[error("leader reported {actual} joints, {required} required")]
    TooFewJoints { required: usize, actual: usize },

    /// 其他来源的错误（自定义 LeaderSource）
    #[error("leader source error: {0}")]
    Source(String),
}

/// 遥操作会话错误
///
/// 会话内只有标定阶段的错误是致命的；运行阶段的单关节失败记录在
/// [`TickReport`](crate::TickReport) 中，不会以错误形式返回。
#[derive(Error, Debug)]
pub enum TeleopError {
    /// 标定时读取主臂初始角度失败
    #[error("calibration failed: {0}")]
    LeaderCalibration(#[source] LeaderError),

    /// 标定时读取从臂初始位置失败
    #[error("calibration failed: follower position read: {0}")]
    FollowerCalibration(#[source] GroupError),

    /// 配置从臂（模式 / 电流上限 / 扭矩）失败
    #[error("failed to configure followers: {0}")]
    Configure(#[source] GroupError),

    /// 单执行器流程中的错误
    #[error(transparent)]
    Actuator(#[from] ActuatorError),

    /// 在错误的阶段调用了会话操作
    #[error("operation requires phase {expected}, session is {actual}")]
    InvalidPhase {
        expected: TeleopPhase,
        actual: TeleopPhase,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TeleopError {
    pub(crate) fn invalid_phase(expected: TeleopPhase, actual: TeleopPhase) -> Self {
        TeleopError::InvalidPhase { expected, actual }
    }
}
