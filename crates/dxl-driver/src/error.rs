//! 驱动层错误类型定义
//!
//! 分三层：
//! - [`CommError`]：没有应答或应答损坏（线缆、波特率、总线冲突）
//! - [`CodecError`]：寄存器读写的结果（通讯错误 / 设备报告的错误 / 本地编码错误）
//! - [`ActuatorError`]：附带执行器 ID 与操作名，供上层输出可定位的错误信息

use dxl_bus::BusError;
use dxl_protocol::{ActuatorId, ProtocolError, StatusError};
use std::fmt;
use thiserror::Error;

/// 通讯错误
#[derive(Error, Debug)]
pub enum CommError {
    /// 超时未收到应答
    #[error("no reply (timeout)")]
    Timeout,

    /// 应答无法解析（CRC、长度、包头）
    #[error("corrupt reply: {0}")]
    Corrupt(ProtocolError),

    /// 应答来自其他 ID
    #[error("reply from id {actual}, expected {expected}")]
    IdMismatch { expected: u8, actual: u8 },

    /// 端口级错误（IO、端口已关闭）
    #[error("bus error: {0}")]
    Bus(BusError),
}

impl From<BusError> for CommError {
    fn from(e: BusError) -> Self {
        match e {
            BusError::Timeout => CommError::Timeout,
            BusError::Framing(e) => CommError::Corrupt(e),
            other => CommError::Bus(other),
        }
    }
}

/// 寄存器读写错误
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("communication error: {0}")]
    Communication(#[from] CommError),

    /// 设备返回了非零错误字节
    #[error("device {id} reported: {error}")]
    Device { id: u8, error: StatusError },

    /// 数值无法编码到寄存器宽度（未发送）
    #[error("encode error: {0}")]
    Encode(ProtocolError),
}

/// 执行器操作名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Ping,
    EnableTorque,
    DisableTorque,
    SetOperatingMode,
    SetCurrentLimit,
    SetGoalPosition,
    GetPosition,
    Stop,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Ping => "ping",
            Operation::EnableTorque => "enable torque",
            Operation::DisableTorque => "disable torque",
            Operation::SetOperatingMode => "set operating mode",
            Operation::SetCurrentLimit => "set current limit",
            Operation::SetGoalPosition => "set goal position",
            Operation::GetPosition => "get position",
            Operation::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// 执行器错误
#[derive(Error, Debug)]
pub enum ActuatorError {
    /// 无应答 / 应答损坏
    #[error("actuator {id}: {op} failed: {source}")]
    Communication {
        id: ActuatorId,
        op: Operation,
        #[source]
        source: CommError,
    },

    /// 设备应答但报告了内部错误（超限、过热、模式冲突）
    #[error("actuator {id}: {op} failed: device fault: {error}")]
    Fault {
        id: ActuatorId,
        op: Operation,
        error: StatusError,
    },

    /// 调用时前置条件不满足
    #[error("actuator {id}: {op} rejected: {reason}")]
    Precondition {
        id: ActuatorId,
        op: Operation,
        reason: &'static str,
    },

    /// 数值无法编码（未发送到总线）
    #[error("actuator {id}: {op} failed: {source}")]
    Encode {
        id: ActuatorId,
        op: Operation,
        #[source]
        source: ProtocolError,
    },

    /// 句柄已 stop，端口已释放
    #[error("actuator {id}: {op} failed: handle already stopped")]
    Released { id: ActuatorId, op: Operation },
}

impl ActuatorError {
    pub(crate) fn from_codec(id: ActuatorId, op: Operation, e: CodecError) -> Self {
        match e {
            CodecError::Communication(source) => ActuatorError::Communication { id, op, source },
            CodecError::Device { error, .. } => ActuatorError::Fault { id, op, error },
            CodecError::Encode(source) => ActuatorError::Encode { id, op, source },
        }
    }

    pub fn id(&self) -> ActuatorId {
        match self {
            ActuatorError::Communication { id, .. }
            | ActuatorError::Fault { id, .. }
            | ActuatorError::Precondition { id, .. }
            | ActuatorError::Encode { id, .. }
            | ActuatorError::Released { id, .. } => *id,
        }
    }

    pub fn op(&self) -> Operation {
        match self {
            ActuatorError::Communication { op, .. }
            | ActuatorError::Fault { op, .. }
            | ActuatorError::Precondition { op, .. }
            | ActuatorError::Encode { op, .. }
            | ActuatorError::Released { op, .. } => *op,
        }
    }

    pub fn is_communication(&self) -> bool {
        matches!(self, ActuatorError::Communication { .. })
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, ActuatorError::Fault { .. })
    }
}

/// 组内单个成员的失败记录
#[derive(Error, Debug)]
#[error("member {index}: {error}")]
pub struct MemberFailure {
    /// 在组内的位置（按 ID 升序）
    pub index: usize,
    pub id: ActuatorId,
    #[source]
    pub error: ActuatorError,
}

/// 执行器组错误
#[derive(Error, Debug)]
pub enum GroupError {
    #[error("actuator group must not be empty")]
    Empty,

    #[error("duplicate actuator id {0} in group")]
    DuplicateId(ActuatorId),

    /// 目标向量长度与成员数不一致
    #[error("goal vector has {actual} entries, group has {expected} members")]
    LengthMismatch { expected: usize, actual: usize },

    /// 快速失败操作中第一个失败的成员
    #[error("{0}")]
    Member(MemberFailure),

    /// 尽力而为操作中所有失败的成员
    #[error("{} of {attempted} actuators failed: {}", .failures.len(), summarize(.failures))]
    Members {
        attempted: usize,
        failures: Vec<MemberFailure>,
    },
}

impl GroupError {
    /// 失败成员列表（`Member` 视为单元素列表）
    pub fn failures(&self) -> &[MemberFailure] {
        match self {
            GroupError::Member(f) => std::slice::from_ref(f),
            GroupError::Members { failures, .. } => failures,
            _ => &[],
        }
    }

    pub fn into_failures(self) -> Vec<MemberFailure> {
        match self {
            GroupError::Member(f) => vec![f],
            GroupError::Members { failures, .. } => failures,
            _ => Vec::new(),
        }
    }
}

fn summarize(failures: &[MemberFailure]) -> String {
    failures
        .iter()
        .map(|f| f.error.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxl_protocol::DeviceErrorKind;

    fn id(raw: u8) -> ActuatorId {
        ActuatorId::new(raw).unwrap()
    }

    #[test]
    fn test_comm_error_from_bus_error() {
        assert!(matches!(CommError::from(BusError::Timeout), CommError::Timeout));
        assert!(matches!(
            CommError::from(BusError::Framing(ProtocolError::InvalidHeader)),
            CommError::Corrupt(ProtocolError::InvalidHeader)
        ));
        assert!(matches!(CommError::from(BusError::Closed), CommError::Bus(BusError::Closed)));
    }

    #[test]
    fn test_actuator_error_identifies_actuator_and_operation() {
        let e = ActuatorError::from_codec(
            id(11),
            Operation::SetGoalPosition,
            CodecError::Device {
                id: 11,
                error: StatusError::from_kind(DeviceErrorKind::DataLimit),
            },
        );
        assert!(e.is_fault());
        assert_eq!(e.id(), id(11));
        assert_eq!(e.op(), Operation::SetGoalPosition);
        let msg = e.to_string();
        assert!(msg.contains("#11") && msg.contains("set goal position"), "{}", msg);

        let e = ActuatorError::from_codec(
            id(8),
            Operation::GetPosition,
            CodecError::Communication(CommError::Timeout),
        );
        assert!(e.is_communication());
        assert!(e.to_string().contains("timeout"));
    }

    #[test]
    fn test_group_error_failures() {
        let failure = MemberFailure {
            index: 1,
            id: id(9),
            error: ActuatorError::Released {
                id: id(9),
                op: Operation::Stop,
            },
        };
        let e = GroupError::Members {
            attempted: 6,
            failures: vec![failure],
        };
        assert_eq!(e.failures().len(), 1);
        assert!(e.to_string().starts_with("1 of 6 actuators failed"));
        assert!(GroupError::Empty.failures().is_empty());
    }
}
