//! 串口后端
//!
//! 基于 `serialport` crate，适用于 U2D2 / USB-RS485 等半双工转接器。
//!
//! ## 限制
//!
//! - 转接器需自行处理收发方向切换（U2D2 自动完成）
//! - **权限要求**：Linux 下通常需要 `dialout` 组权限

use crate::{BusAdapter, BusError};
use dxl_protocol::{HEADER, PREFIX_LEN, packet_len};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// 默认应答超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// 串口总线
pub struct SerialBus {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    baud_rate: u32,
    timeout: Duration,
    rx_buffer: Vec<u8>,
}

impl SerialBus {
    /// 打开串口并设置波特率
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, BusError> {
        Self::open_with_timeout(port_name, baud_rate, DEFAULT_TIMEOUT)
    }

    pub fn open_with_timeout(
        port_name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Self, BusError> {
        let port = serialport::new(port_name, baud_rate)
            // 单次 read 的超时，整包超时由 `timeout` 控制
            .timeout(Duration::from_millis(2))
            .open()
            .map_err(|e| BusError::Open {
                port: port_name.to_string(),
                message: e.to_string(),
            })?;

        info!("Serial bus '{}' opened at {} baud", port_name, baud_rate);

        Ok(SerialBus {
            port: Some(port),
            name: port_name.to_string(),
            baud_rate,
            timeout,
            rx_buffer: Vec::with_capacity(64),
        })
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl BusAdapter for SerialBus {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, BusError> {
        let port = self.port.as_mut().ok_or(BusError::Closed)?;

        // 丢弃上一次交换遗留的字节
        port.clear(ClearBuffer::Input)
            .map_err(|e| BusError::Io(e.into()))?;
        self.rx_buffer.clear();

        port.write_all(request)?;
        port.flush()?;
        trace!("TX {:02X?}", request);

        let response = read_packet(port.as_mut(), &mut self.rx_buffer, self.timeout)?;
        trace!("RX {:02X?}", response);
        Ok(response)
    }

    fn close(&mut self) -> Result<(), BusError> {
        if self.port.take().is_some() {
            info!("Serial bus '{}' closed", self.name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SerialBus {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// 读取一个完整的包：先对齐包头，再根据长度字段读完剩余字节
fn read_packet(
    port: &mut dyn SerialPort,
    buffer: &mut Vec<u8>,
    timeout: Duration,
) -> Result<Vec<u8>, BusError> {
    let deadline = Instant::now() + timeout;
    let mut chunk = [0u8; 64];

    loop {
        align_to_header(buffer);
        if buffer.len() >= PREFIX_LEN {
            let total = packet_len(&buffer[..PREFIX_LEN])?;
            if buffer.len() >= total {
                let packet: Vec<u8> = buffer.drain(..total).collect();
                return Ok(packet);
            }
        }

        if Instant::now() >= deadline {
            debug!("Response timeout with {} bytes buffered", buffer.len());
            return Err(BusError::Timeout);
        }

        match port.read(&mut chunk) {
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::TimedOut => {},
            Err(e) => return Err(BusError::Io(e)),
        }
    }
}

/// 丢弃包头之前的字节；找不到包头时保留可能是半个包头的尾部
fn align_to_header(buffer: &mut Vec<u8>) {
    match buffer.windows(HEADER.len()).position(|w| *w == HEADER) {
        Some(0) => {},
        Some(pos) => {
            buffer.drain(..pos);
        },
        None => {
            let keep = buffer.len().min(HEADER.len() - 1);
            let cut = buffer.len() - keep;
            buffer.drain(..cut);
        },
    }
}
