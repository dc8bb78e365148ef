//! # Dynamixel Bus Adapter Layer
//!
//! 半双工串口总线抽象，对上层只提供一次"请求 → 应答"交换原语。
//!
//! - `serial`: 基于 `serialport` 的真实串口后端（默认启用）
//! - `mock`: 内存中的模拟总线（`mock` feature），用于无硬件测试
//!
//! 总线协议本身不支持并发：任意时刻最多只有一次未完成的交换。
//! 多个执行器句柄通过 [`SharedBus`] 共享同一个适配器，
//! 每次交换在锁内完成，保证访问串行化。

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

pub use dxl_protocol::ProtocolError;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialBus;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{LoggedRequest, MockBus, MockBusHandle, MockFault, MockTrigger};

/// 总线适配层统一错误类型
#[derive(Error, Debug)]
pub enum BusError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 打开串口 / 设置波特率失败
    #[error("Failed to open port '{port}': {message}")]
    Open { port: String, message: String },

    /// 在超时时间内没有收到完整应答
    #[error("Read timeout")]
    Timeout,

    /// 应答帧无法解析（包头、长度）
    #[error("Framing error: {0}")]
    Framing(#[from] ProtocolError),

    /// 端口已关闭
    #[error("Port closed")]
    Closed,
}

/// 半双工总线适配器
///
/// `exchange` 发送一个完整的指令包，并阻塞直到收到一个完整的应答包或超时。
pub trait BusAdapter {
    /// 一次请求/应答交换
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, BusError>;

    /// 释放端口；重复调用无副作用
    fn close(&mut self) -> Result<(), BusError>;

    fn is_open(&self) -> bool;

    /// 端口名称（用于日志）
    fn name(&self) -> &str;
}

/// 多个句柄共享的总线
pub type SharedBus = Arc<Mutex<Box<dyn BusAdapter + Send>>>;

/// 把适配器包装为可共享的总线
pub fn share<A>(adapter: A) -> SharedBus
where
    A: BusAdapter + Send + 'static,
{
    Arc::new(Mutex::new(Box::new(adapter)))
}
