//! 指令包 / 状态包
//!
//! ```text
//! FF FF FD 00 | ID | LEN_L LEN_H | INST | PARAMS... | CRC_L CRC_H
//! ```
//!
//! `LEN` = 指令字节 + 参数（填充后）+ 2 字节 CRC。
//! 参数区中出现 `FF FF FD` 时，在其后插入一个 `FD`（字节填充）。

use crate::{ProtocolError, StatusError, crc16};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 包头
pub const HEADER: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

/// 包头 + ID + 长度字段
pub const PREFIX_LEN: usize = 7;

/// 最短的包：前缀 + 指令 + CRC
pub const MIN_PACKET_LEN: usize = PREFIX_LEN + 1 + 2;

/// 指令字节
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    Status = 0x55,
}

/// 主机 → 设备的指令包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPacket {
    pub id: u8,
    pub instruction: Instruction,
    pub params: Vec<u8>,
}

impl InstructionPacket {
    pub fn ping(id: u8) -> Self {
        InstructionPacket {
            id,
            instruction: Instruction::Ping,
            params: Vec::new(),
        }
    }

    /// 读取 `length` 字节，起始地址 `address`
    pub fn read(id: u8, address: u16, length: u16) -> Self {
        let mut params = Vec::with_capacity(4);
        params.extend_from_slice(&address.to_le_bytes());
        params.extend_from_slice(&length.to_le_bytes());
        InstructionPacket {
            id,
            instruction: Instruction::Read,
            params,
        }
    }

    /// 从 `address` 开始写入 `data`（小端）
    pub fn write(id: u8, address: u16, data: &[u8]) -> Self {
        let mut params = Vec::with_capacity(2 + data.len());
        params.extend_from_slice(&address.to_le_bytes());
        params.extend_from_slice(data);
        InstructionPacket {
            id,
            instruction: Instruction::Write,
            params,
        }
    }

    /// READ/WRITE 指令的起始地址
    pub fn address(&self) -> Option<u16> {
        match self.instruction {
            Instruction::Read | Instruction::Write if self.params.len() >= 2 => {
                Some(u16::from_le_bytes([self.params[0], self.params[1]]))
            },
            _ => None,
        }
    }

    /// WRITE 指令的数据部分 / READ 指令的长度字段
    pub fn payload(&self) -> &[u8] {
        match self.instruction {
            Instruction::Read | Instruction::Write if self.params.len() >= 2 => &self.params[2..],
            _ => &[],
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_frame(self.id, self.instruction.into(), &self.params)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (id, instruction, params) = decode_frame(bytes)?;
        let instruction = Instruction::try_from(instruction)
            .map_err(|_| ProtocolError::UnexpectedInstruction(instruction))?;
        if instruction == Instruction::Status {
            return Err(ProtocolError::UnexpectedInstruction(instruction.into()));
        }
        Ok(InstructionPacket {
            id,
            instruction,
            params,
        })
    }
}

/// 设备 → 主机的状态包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    pub id: u8,
    pub error: StatusError,
    pub params: Vec<u8>,
}

impl StatusPacket {
    pub fn new(id: u8, error: StatusError, params: Vec<u8>) -> Self {
        StatusPacket { id, error, params }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(1 + self.params.len());
        body.push(self.error.0);
        body.extend_from_slice(&self.params);
        encode_frame(self.id, Instruction::Status.into(), &body)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (id, instruction, mut body) = decode_frame(bytes)?;
        if instruction != u8::from(Instruction::Status) {
            return Err(ProtocolError::UnexpectedInstruction(instruction));
        }
        if body.is_empty() {
            return Err(ProtocolError::InvalidLength {
                expected: MIN_PACKET_LEN + 1,
                actual: bytes.len(),
            });
        }
        let error = StatusError(body.remove(0));
        Ok(StatusPacket {
            id,
            error,
            params: body,
        })
    }
}

/// 根据前缀（至少 7 字节）计算整包长度
///
/// 用于串口接收端判断还需要读取多少字节。
pub fn packet_len(prefix: &[u8]) -> Result<usize, ProtocolError> {
    if prefix.len() < PREFIX_LEN {
        return Err(ProtocolError::InvalidLength {
            expected: PREFIX_LEN,
            actual: prefix.len(),
        });
    }
    if prefix[..4] != HEADER {
        return Err(ProtocolError::InvalidHeader);
    }
    let len = u16::from_le_bytes([prefix[5], prefix[6]]) as usize;
    // 至少包含指令字节 + CRC
    if len < 3 {
        return Err(ProtocolError::InvalidLength {
            expected: 3,
            actual: len,
        });
    }
    Ok(PREFIX_LEN + len)
}

fn encode_frame(id: u8, instruction: u8, params: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(1 + params.len());
    body.push(instruction);
    body.extend_from_slice(params);
    let body = stuff(&body);

    let len = (body.len() + 2) as u16;
    let mut packet = Vec::with_capacity(PREFIX_LEN + body.len() + 2);
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.extend_from_slice(&len.to_le_bytes());
    packet.extend_from_slice(&body);
    let crc = crc16(&packet);
    packet.extend_from_slice(&crc.to_le_bytes());
    packet
}

fn decode_frame(bytes: &[u8]) -> Result<(u8, u8, Vec<u8>), ProtocolError> {
    if bytes.len() < MIN_PACKET_LEN {
        return Err(ProtocolError::InvalidLength {
            expected: MIN_PACKET_LEN,
            actual: bytes.len(),
        });
    }
    let expected = packet_len(bytes)?;
    if bytes.len() != expected {
        return Err(ProtocolError::InvalidLength {
            expected,
            actual: bytes.len(),
        });
    }

    let (content, crc_bytes) = bytes.split_at(bytes.len() - 2);
    let received = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let computed = crc16(content);
    if received != computed {
        return Err(ProtocolError::CrcMismatch {
            expected: computed,
            actual: received,
        });
    }

    let id = content[4];
    let body = unstuff(&content[PREFIX_LEN..]);
    let instruction = body[0];
    Ok((id, instruction, body[1..].to_vec()))
}

/// `FF FF FD` 之后插入 `FD`
fn stuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 2);
    for &byte in body {
        out.push(byte);
        let n = out.len();
        if n >= 3 && out[n - 3..] == [0xFF, 0xFF, 0xFD] {
            out.push(0xFD);
        }
    }
    out
}

/// 去掉 `FF FF FD` 之后多出的 `FD`
fn unstuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        out.push(body[i]);
        let n = out.len();
        if n >= 3 && out[n - 3..] == [0xFF, 0xFF, 0xFD] && body.get(i + 1) == Some(&0xFD) {
            i += 1;
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceErrorKind;

    #[test]
    fn test_encode_ping() {
        let packet = InstructionPacket::ping(1).encode();
        assert_eq!(
            packet,
            vec![0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x03, 0x00, 0x01, 0x19, 0x4E]
        );
    }

    #[test]
    fn test_encode_read_present_position() {
        let packet = InstructionPacket::read(1, 132, 4).encode();
        assert_eq!(
            packet,
            vec![
                0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x07, 0x00, 0x02, 0x84, 0x00, 0x04, 0x00, 0x1D, 0x15
            ]
        );
    }

    #[test]
    fn test_encode_write_goal_position() {
        let packet = InstructionPacket::write(1, 116, &512u32.to_le_bytes()).encode();
        assert_eq!(
            packet,
            vec![
                0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x09, 0x00, 0x03, 0x74, 0x00, 0x00, 0x02, 0x00, 0x00,
                0xCA, 0x89
            ]
        );
    }

    #[test]
    fn test_decode_write_status() {
        let bytes = [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x04, 0x00, 0x55, 0x00, 0xA1, 0x0C];
        let status = StatusPacket::decode(&bytes).unwrap();
        assert_eq!(status.id, 1);
        assert!(status.error.is_ok());
        assert!(status.params.is_empty());
    }

    #[test]
    fn test_decode_read_status() {
        let bytes = [
            0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x08, 0x00, 0x55, 0x00, 0xA6, 0x00, 0x00, 0x00, 0x8C,
            0xC0,
        ];
        let status = StatusPacket::decode(&bytes).unwrap();
        assert_eq!(status.params, vec![0xA6, 0x00, 0x00, 0x00]);
        assert_eq!(StatusPacket::new(1, StatusError::NONE, status.params.clone()).encode(), bytes);
    }

    #[test]
    fn test_decode_ping_status() {
        let bytes = [
            0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x07, 0x00, 0x55, 0x00, 0x06, 0x04, 0x26, 0x65, 0x5D,
        ];
        let status = StatusPacket::decode(&bytes).unwrap();
        assert_eq!(u16::from_le_bytes([status.params[0], status.params[1]]), 1030);
        assert_eq!(status.params[2], 0x26);
    }

    #[test]
    fn test_decode_crc_mismatch() {
        let mut bytes = vec![0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x04, 0x00, 0x55, 0x00, 0xA1, 0x0C];
        bytes[8] = 0x04;
        assert!(matches!(
            StatusPacket::decode(&bytes),
            Err(ProtocolError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_bad_header_and_length() {
        let bytes = [0xFF, 0xFE, 0xFD, 0x00, 0x01, 0x04, 0x00, 0x55, 0x00, 0xA1, 0x0C];
        assert_eq!(StatusPacket::decode(&bytes), Err(ProtocolError::InvalidHeader));

        let truncated = [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x08, 0x00, 0x55, 0x00, 0xA6];
        assert!(matches!(
            StatusPacket::decode(&truncated),
            Err(ProtocolError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_status_with_device_error() {
        let status = StatusPacket::new(9, StatusError::from_kind(DeviceErrorKind::DataLimit), vec![]);
        let decoded = StatusPacket::decode(&status.encode()).unwrap();
        assert_eq!(decoded.error.kind(), Some(DeviceErrorKind::DataLimit));
        assert_eq!(decoded.id, 9);
    }

    #[test]
    fn test_byte_stuffing() {
        // 目标位置 0xFDFFFF00：参数区出现 FF FF FD
        let data = [0x00, 0xFF, 0xFF, 0xFD];
        let packet = InstructionPacket::write(3, 116, &data);
        let encoded = packet.encode();
        // LEN = INST(1) + ADDR(2) + DATA(4) + 填充(1) + CRC(2)
        assert_eq!(u16::from_le_bytes([encoded[5], encoded[6]]), 10);
        assert_eq!(&encoded[10..15], &[0x00, 0xFF, 0xFF, 0xFD, 0xFD]);

        let decoded = InstructionPacket::decode(&encoded).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.address(), Some(116));
        assert_eq!(decoded.payload(), &data);
    }

    #[test]
    fn test_packet_len_from_prefix() {
        let prefix = [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x08, 0x00];
        assert_eq!(packet_len(&prefix).unwrap(), 15);
        assert!(packet_len(&prefix[..5]).is_err());
    }

    #[test]
    fn test_instruction_decode_rejects_status() {
        let status = StatusPacket::new(1, StatusError::NONE, vec![]).encode();
        assert_eq!(
            InstructionPacket::decode(&status),
            Err(ProtocolError::UnexpectedInstruction(0x55))
        );
    }
}
