//! CRC-16 校验（多项式 0x8005，初值 0，不反射）

const POLYNOMIAL: u16 = 0x8005;

/// 计算 Protocol 2.0 的 CRC-16
///
/// 覆盖范围：从包头第一个字节到 CRC 之前的最后一个字节。
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}
