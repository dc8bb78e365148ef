//! 遥操作配置
//!
//! TOML 格式，所有字段都有默认值，缺省项按默认填充：
//!
//! ```toml
//! period_ms = 50
//! current_limit_ma = 400.0
//! operating_mode = "current_based_position"
//!
//! [follower]
//! port = "/dev/ttyUSB0"
//! baud_rate = 57600
//! ids = [8, 9, 10, 11, 12, 13]
//!
//! [leader]
//! port = "/dev/ttyUSB1"
//! ids = [1, 2, 3, 4, 5, 6, 7]
//!
//! [sweep]
//! step_deg = 0.1
//! period_ms = 10
//! current_limit_ma = 50.0
//! ```

use crate::session::FollowerSettings;
use dxl_protocol::{ActuatorId, OperatingMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// 控制循环配置
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// 节拍周期
    pub period: Duration,
    /// 最多运行的节拍数（None 表示直到收到停止信号）
    pub max_ticks: Option<u64>,
}

impl LoopConfig {
    pub fn with_period_ms(period_ms: u64) -> Self {
        LoopConfig {
            period: Duration::from_millis(period_ms),
            max_ticks: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period.is_zero() {
            return Err(ConfigError::Invalid(
                "loop period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::with_period_ms(DEFAULT_PERIOD_MS)
    }
}

const DEFAULT_PERIOD_MS: u64 = 50;
const DEFAULT_BAUD_RATE: u32 = 57_600;
const DEFAULT_TIMEOUT_MS: u64 = 100;

/// 一条总线及其上的执行器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub port: String,
    pub baud_rate: u32,
    pub ids: Vec<u8>,
    /// 单次交换的应答超时
    pub timeout_ms: u64,
}

impl BusConfig {
    fn new(port: &str, ids: impl IntoIterator<Item = u8>) -> Self {
        BusConfig {
            port: port.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            ids: ids.into_iter().collect(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// 校验并转换为执行器 ID
    pub fn actuator_ids(&self) -> Result<Vec<ActuatorId>, ConfigError> {
        if self.ids.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "no actuator ids configured for {}",
                self.port
            )));
        }
        let mut seen = BTreeSet::new();
        self.ids
            .iter()
            .map(|&raw| {
                let id = ActuatorId::new(raw)
                    .map_err(|e| ConfigError::Invalid(format!("{} on {}", e, self.port)))?;
                if !seen.insert(raw) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate actuator id {} on {}",
                        raw, self.port
                    )));
                }
                Ok(id)
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port.is_empty() {
            return Err(ConfigError::Invalid("serial port name is empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid(format!("invalid baud rate for {}", self.port)));
        }
        self.actuator_ids().map(|_| ())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig::new("/dev/ttyUSB0", 8..=13)
    }
}

/// 单执行器扫动流程配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// 每个节拍目标前进的角度
    pub step_deg: f64,
    pub period_ms: u64,
    pub current_limit_ma: f64,
}

impl SweepConfig {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig::with_period_ms(self.period_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.step_deg.is_finite() {
            return Err(ConfigError::Invalid("sweep step must be finite".to_string()));
        }
        validate_current(self.current_limit_ma)?;
        self.loop_config().validate()
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            step_deg: 0.1,
            period_ms: 10,
            current_limit_ma: 50.0,
        }
    }
}

/// 遥操作配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopConfig {
    pub period_ms: u64,
    /// 从臂电流上限（mA）
    pub current_limit_ma: f64,
    pub operating_mode: OperatingMode,
    pub follower: BusConfig,
    pub leader: BusConfig,
    pub sweep: SweepConfig,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        TeleopConfig {
            period_ms: DEFAULT_PERIOD_MS,
            current_limit_ma: 400.0,
            operating_mode: OperatingMode::CurrentBasedPosition,
            follower: BusConfig::default(),
            leader: BusConfig::new("/dev/ttyUSB1", 1..=7),
            sweep: SweepConfig::default(),
        }
    }
}

impl TeleopConfig {
    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: TeleopConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig::with_period_ms(self.period_ms)
    }

    pub fn follower_settings(&self) -> FollowerSettings {
        FollowerSettings {
            mode: self.operating_mode,
            current_limit_ma: self.current_limit_ma,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.loop_config().validate()?;
        validate_current(self.current_limit_ma)?;
        self.follower.validate()?;
        self.leader.validate()?;
        self.sweep.validate()
    }
}

fn validate_current(current_limit_ma: f64) -> Result<(), ConfigError> {
    if !current_limit_ma.is_finite() || current_limit_ma < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "invalid current limit {} mA",
            current_limit_ma
        )));
    }
    Ok(())
}
