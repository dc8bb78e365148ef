//! # Dynamixel Teleoperation
//!
//! 主从遥操作：采样主臂关节角度，按会话开始时的标定偏移换算为从臂目标，
//! 每个节拍下发给从臂执行器组。
//!
//! ```text
//! Idle → Calibrating → Running → ShuttingDown → Stopped
//! ```
//!
//! - [`TeleopSession`]：主从遥操作会话
//! - [`SweepSession`]：单执行器扫动
//! - [`run_loop`]：固定周期阻塞循环，在节拍边界检查 [`StopSignal`]
//! - [`LeaderSource`]：主臂读数来源（[`DynamixelLeader`] 或任意闭包）
//! - [`TeleopConfig`]：TOML 配置
//!
//! ```rust,ignore
//! use dxl_teleop::{FollowerSettings, StopSignal, TeleopSession, run_loop};
//!
//! let stop = StopSignal::new();
//! let mut session = TeleopSession::new(leader, followers, FollowerSettings::default());
//! let report = run_loop(&mut session, &config.loop_config(), &stop)?;
//! println!("{} ticks", report.stats.ticks);
//! ```

pub mod calibration;
pub mod config;
mod error;
pub mod leader;
pub mod runner;
pub mod session;
pub mod signal;
pub mod sweep;
pub mod ticker;

pub use calibration::Calibration;
pub use config::{BusConfig, ConfigError, LoopConfig, SweepConfig, TeleopConfig};
pub use error::{LeaderError, TeleopError};
pub use leader::{DynamixelLeader, LeaderSource};
pub use runner::{ControlLoop, SessionReport, SessionStats, TeleopPhase, TickReport, run_loop};
pub use session::{FollowerSettings, TeleopSession};
pub use signal::StopSignal;
pub use sweep::SweepSession;
pub use ticker::Ticker;
