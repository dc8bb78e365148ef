//! 寄存器读写编解码
//!
//! 每次调用恰好对应总线上的一次请求/应答交换。交换期间持有总线锁，
//! 因此同一总线上对不同 ID 的调用不会并发。
//!
//! 对外只提供按 [`Register`] 描述符读写的接口，地址与宽度由描述符固定；
//! 任意 `(address, width)` 组合的原始读写仅在 crate 内部使用。

use crate::error::{CodecError, CommError};
use dxl_bus::SharedBus;
use dxl_protocol::{InstructionPacket, Register, RegisterWidth, StatusPacket};
use tracing::trace;

/// 基于共享总线的寄存器编解码器
#[derive(Clone)]
pub struct RegisterCodec {
    bus: SharedBus,
}

impl RegisterCodec {
    pub fn new(bus: SharedBus) -> Self {
        RegisterCodec { bus }
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    /// 写寄存器；`value` 必须能放入 `width`
    pub(crate) fn write(
        &self,
        id: u8,
        address: u16,
        width: RegisterWidth,
        value: u32,
    ) -> Result<(), CodecError> {
        let data = width.encode(value).map_err(CodecError::Encode)?;
        trace!("write id={} addr={} value={}", id, address, value);
        self.transact(id, &InstructionPacket::write(id, address, &data))?;
        Ok(())
    }

    /// 读寄存器，返回原始无符号值
    pub(crate) fn read(&self, id: u8, address: u16, width: RegisterWidth) -> Result<u32, CodecError> {
        let status = self.transact(id, &InstructionPacket::read(id, address, width.bytes() as u16))?;
        let value = width
            .decode(&status.params)
            .map_err(|e| CodecError::Communication(CommError::Corrupt(e)))?;
        trace!("read id={} addr={} value={}", id, address, value);
        Ok(value)
    }

    /// 按寄存器描述符写入（处理有符号转换）
    pub fn write_register(&self, id: u8, register: &Register, value: i64) -> Result<(), CodecError> {
        let raw = register.to_raw(value).map_err(CodecError::Encode)?;
        self.write(id, register.address, register.width, raw)
    }

    /// 按寄存器描述符读取（处理有符号转换）
    pub fn read_register(&self, id: u8, register: &Register) -> Result<i64, CodecError> {
        let raw = self.read(id, register.address, register.width)?;
        Ok(register.from_raw(raw))
    }

    /// Ping，返回型号编号
    pub fn ping(&self, id: u8) -> Result<u16, CodecError> {
        let status = self.transact(id, &InstructionPacket::ping(id))?;
        match status.params.as_slice() {
            [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
            _ => Err(CodecError::Communication(CommError::Corrupt(
                dxl_protocol::ProtocolError::InvalidLength {
                    expected: 3,
                    actual: status.params.len(),
                },
            ))),
        }
    }

    fn transact(&self, id: u8, request: &InstructionPacket) -> Result<StatusPacket, CodecError> {
        let bytes = request.encode();
        let response = {
            let mut bus = self.bus.lock();
            bus.exchange(&bytes).map_err(CommError::from)?
        };

        let status = StatusPacket::decode(&response).map_err(CommError::Corrupt)?;
        if status.id != id {
            return Err(CommError::IdMismatch {
                expected: id,
                actual: status.id,
            }
            .into());
        }
        if !status.error.is_ok() {
            return Err(CodecError::Device {
                id,
                error: status.error,
            });
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxl_bus::{MockBus, MockFault, MockTrigger, share};
    use dxl_protocol::{DeviceErrorKind, ProtocolError, X_SERIES};

    fn setup(ids: &[u8]) -> (RegisterCodec, dxl_bus::MockBusHandle) {
        let bus = MockBus::with_actuators(ids);
        let handle = bus.handle();
        (RegisterCodec::new(share(bus)), handle)
    }

    #[test]
    fn test_write_and_read_back() {
        let (codec, handle) = setup(&[3]);
        codec.write(3, 38, RegisterWidth::Two, 400).unwrap();
        assert_eq!(handle.current_limit(3), Some(400));
        assert_eq!(codec.read(3, 38, RegisterWidth::Two).unwrap(), 400);
    }

    #[test]
    fn test_one_exchange_per_call() {
        let (codec, handle) = setup(&[3]);
        codec.write(3, 64, RegisterWidth::One, 1).unwrap();
        codec.read(3, 132, RegisterWidth::Four).unwrap();
        assert_eq!(handle.requests().len(), 2);
    }

    #[test]
    fn test_value_out_of_width_is_not_sent() {
        let (codec, handle) = setup(&[3]);
        let err = codec.write(3, 64, RegisterWidth::One, 300).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Encode(ProtocolError::ValueOutOfRange { value: 300, width: 1 })
        ));
        assert!(handle.requests().is_empty());
    }

    #[test]
    fn test_timeout_is_communication_error() {
        let (codec, _handle) = setup(&[3]);
        let err = codec.read(4, 132, RegisterWidth::Four).unwrap_err();
        assert!(matches!(err, CodecError::Communication(CommError::Timeout)));
    }

    #[test]
    fn test_corrupt_reply_is_communication_error() {
        let (codec, handle) = setup(&[3]);
        handle.inject(3, MockTrigger::Any, MockFault::Corrupt);
        let err = codec.read(3, 132, RegisterWidth::Four).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Communication(CommError::Corrupt(ProtocolError::CrcMismatch { .. }))
        ));
    }

    #[test]
    fn test_device_error_is_distinguished() {
        let (codec, handle) = setup(&[3]);
        handle.set_current_limit_max(3, 1000);
        let err = codec.write(3, 38, RegisterWidth::Two, 1500).unwrap_err();
        match err {
            CodecError::Device { id, error } => {
                assert_eq!(id, 3);
                assert_eq!(error.kind(), Some(DeviceErrorKind::DataLimit));
            },
            other => panic!("Expected Device error, got {:?}", other),
        }
    }

    #[test]
    fn test_signed_register_roundtrip() {
        let (codec, handle) = setup(&[3]);
        handle.set_position_ticks(3, -2048);
        assert_eq!(codec.read_register(3, &X_SERIES.present_position).unwrap(), -2048);
    }

    #[test]
    fn test_register_width_comes_from_descriptor() {
        let (codec, handle) = setup(&[3]);
        codec.write_register(3, &X_SERIES.current_limit, 400).unwrap();
        codec.write_register(3, &X_SERIES.goal_position, 2048).unwrap();
        codec.read_register(3, &X_SERIES.present_position).unwrap();

        let requests = handle.requests();
        assert_eq!(requests[0].address, Some(38));
        assert_eq!(requests[0].data, vec![0x90, 0x01]);
        assert_eq!(requests[1].address, Some(116));
        assert_eq!(requests[1].data, vec![0x00, 0x08, 0x00, 0x00]);
        // READ 的长度字段等于寄存器宽度
        assert_eq!(requests[2].address, Some(132));
        assert_eq!(requests[2].data, vec![4, 0]);
    }

    #[test]
    fn test_ping_returns_model_number() {
        let (codec, _handle) = setup(&[3]);
        assert_eq!(codec.ping(3).unwrap(), X_SERIES.model_number);
    }
}
