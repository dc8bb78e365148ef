//! 命令定义和实现

pub mod config;
pub mod ping;
pub mod position;
pub mod stop;
pub mod sweep;
pub mod teleop;

pub use config::ConfigCommand;
pub use ping::PingCommand;
pub use position::PositionCommand;
pub use stop::StopCommand;
pub use sweep::SweepCommand;
pub use teleop::TeleopCommand;
