//! Mock 总线
//!
//! 在内存中模拟总线上的 X 系列执行器，按 Protocol 2.0 编解码：
//!
//! - 每个设备维护一份控制表内存
//! - 扭矩使能时写 EEPROM 区（地址 < 64）返回 Access 错误，与真实硬件一致
//! - 扭矩使能后，当前位置立即跟随目标位置
//! - 支持按 ID / 寄存器注入故障（超时、损坏应答、设备错误）
//! - 记录所有请求，便于断言命令顺序

use crate::{BusAdapter, BusError};
use dxl_protocol::{
    DeviceErrorKind, Instruction, InstructionPacket, StatusError, StatusPacket, X_SERIES,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

const CONTROL_TABLE_SIZE: usize = 1024;
const EEPROM_END: u16 = 64;
const FIRMWARE_VERSION: u8 = 0x2C;

const ADDR_OPERATING_MODE: u16 = 11;
const ADDR_CURRENT_LIMIT: u16 = 38;
const ADDR_TORQUE_ENABLE: u16 = 64;
const ADDR_GOAL_POSITION: u16 = 116;
const ADDR_PRESENT_POSITION: u16 = 132;

/// 出厂默认电流上限（XM430）
pub const DEFAULT_CURRENT_LIMIT_MAX: u16 = 1193;

/// 多圈模式下的目标位置范围
const MULTI_TURN_LIMIT: i64 = 1_048_575;

/// 故障触发条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockTrigger {
    /// 任意请求
    Any,
    Ping,
    /// 读取起始于该地址的寄存器
    Read(u16),
    /// 写入起始于该地址的寄存器
    Write(u16),
}

impl MockTrigger {
    fn matches(&self, request: &InstructionPacket) -> bool {
        match *self {
            MockTrigger::Any => true,
            MockTrigger::Ping => request.instruction == Instruction::Ping,
            MockTrigger::Read(addr) => {
                request.instruction == Instruction::Read && request.address() == Some(addr)
            },
            MockTrigger::Write(addr) => {
                request.instruction == Instruction::Write && request.address() == Some(addr)
            },
        }
    }
}

/// 注入的故障
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFault {
    /// 设备不应答
    Timeout,
    /// 应答 CRC 损坏
    Corrupt,
    /// 应答携带设备错误字节
    DeviceError(u8),
}

#[derive(Debug, Clone)]
struct FaultRule {
    trigger: MockTrigger,
    fault: MockFault,
    /// 剩余触发次数，`None` 表示永久
    remaining: Option<usize>,
}

/// 请求记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRequest {
    pub id: u8,
    pub instruction: Instruction,
    pub address: Option<u16>,
    /// WRITE 的数据 / READ 的长度字段
    pub data: Vec<u8>,
}

impl LoggedRequest {
    /// WRITE 数据的小端数值
    pub fn value(&self) -> Option<u32> {
        if self.instruction != Instruction::Write || self.data.is_empty() || self.data.len() > 4
        {
            return None;
        }
        let mut raw = [0u8; 4];
        raw[..self.data.len()].copy_from_slice(&self.data);
        Some(u32::from_le_bytes(raw))
    }

    pub fn is_write_to(&self, address: u16) -> bool {
        self.instruction == Instruction::Write && self.address == Some(address)
    }
}

#[derive(Debug)]
struct MockDevice {
    model_number: u16,
    memory: Vec<u8>,
    current_limit_max: u16,
    faults: Vec<FaultRule>,
}

impl MockDevice {
    fn new() -> Self {
        let mut device = MockDevice {
            model_number: X_SERIES.model_number,
            memory: vec![0; CONTROL_TABLE_SIZE],
            current_limit_max: DEFAULT_CURRENT_LIMIT_MAX,
            faults: Vec::new(),
        };
        // 出厂默认：位置模式，电流上限为最大值
        device.memory[ADDR_OPERATING_MODE as usize] = 3;
        device.store(ADDR_CURRENT_LIMIT, &DEFAULT_CURRENT_LIMIT_MAX.to_le_bytes());
        device
    }

    fn load(&self, address: u16, len: usize) -> Option<&[u8]> {
        let start = address as usize;
        self.memory.get(start..start + len)
    }

    fn store(&mut self, address: u16, data: &[u8]) {
        let start = address as usize;
        self.memory[start..start + data.len()].copy_from_slice(data);
    }

    fn load_i32(&self, address: u16) -> i32 {
        let bytes = self.load(address, 4).unwrap_or(&[0, 0, 0, 0]);
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn torque_enabled(&self) -> bool {
        self.memory[ADDR_TORQUE_ENABLE as usize] != 0
    }

    fn take_fault(&mut self, request: &InstructionPacket) -> Option<MockFault> {
        let pos = self.faults.iter().position(|r| r.trigger.matches(request))?;
        let rule = &mut self.faults[pos];
        let fault = rule.fault;
        let exhausted = match rule.remaining.as_mut() {
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            },
            None => false,
        };
        if exhausted {
            self.faults.remove(pos);
        }
        Some(fault)
    }

    fn handle(&mut self, request: &InstructionPacket) -> (StatusError, Vec<u8>) {
        match request.instruction {
            Instruction::Ping => {
                let mut params = self.model_number.to_le_bytes().to_vec();
                params.push(FIRMWARE_VERSION);
                (StatusError::NONE, params)
            },
            Instruction::Read => self.handle_read(request),
            Instruction::Write => self.handle_write(request),
            Instruction::Status => (StatusError::from_kind(DeviceErrorKind::Instruction), vec![]),
        }
    }

    fn handle_read(&self, request: &InstructionPacket) -> (StatusError, Vec<u8>) {
        let (Some(address), [lo, hi]) = (request.address(), request.payload()) else {
            return (StatusError::from_kind(DeviceErrorKind::DataLength), vec![]);
        };
        let len = u16::from_le_bytes([*lo, *hi]) as usize;
        match self.load(address, len) {
            Some(bytes) => (StatusError::NONE, bytes.to_vec()),
            None => (StatusError::from_kind(DeviceErrorKind::Access), vec![]),
        }
    }

    fn handle_write(&mut self, request: &InstructionPacket) -> (StatusError, Vec<u8>) {
        let Some(address) = request.address() else {
            return (StatusError::from_kind(DeviceErrorKind::DataLength), vec![]);
        };
        let data = request.payload();
        match self.validate_write(address, data) {
            Ok(()) => {
                self.store(address, data);
                if address == ADDR_TORQUE_ENABLE && self.torque_enabled() {
                    // 使能瞬间保持当前位置
                    let present = self.load_i32(ADDR_PRESENT_POSITION);
                    self.store(ADDR_GOAL_POSITION, &present.to_le_bytes());
                }
                if address == ADDR_GOAL_POSITION && self.torque_enabled() {
                    self.store(ADDR_PRESENT_POSITION, data);
                }
                (StatusError::NONE, vec![])
            },
            Err(kind) => (StatusError::from_kind(kind), vec![]),
        }
    }

    fn validate_write(&self, address: u16, data: &[u8]) -> Result<(), DeviceErrorKind> {
        if self.load(address, data.len()).is_none() {
            return Err(DeviceErrorKind::Access);
        }
        if address < EEPROM_END && self.torque_enabled() {
            return Err(DeviceErrorKind::Access);
        }
        match address {
            ADDR_OPERATING_MODE => match data {
                [0 | 1 | 3 | 4 | 5 | 16] => Ok(()),
                [_] => Err(DeviceErrorKind::DataRange),
                _ => Err(DeviceErrorKind::DataLength),
            },
            ADDR_TORQUE_ENABLE => match data {
                [0 | 1] => Ok(()),
                [_] => Err(DeviceErrorKind::DataRange),
                _ => Err(DeviceErrorKind::DataLength),
            },
            ADDR_CURRENT_LIMIT => match data {
                [lo, hi] if u16::from_le_bytes([*lo, *hi]) <= self.current_limit_max => Ok(()),
                [_, _] => Err(DeviceErrorKind::DataLimit),
                _ => Err(DeviceErrorKind::DataLength),
            },
            ADDR_GOAL_POSITION => {
                let [a, b, c, d] = data else {
                    return Err(DeviceErrorKind::DataLength);
                };
                let goal = i32::from_le_bytes([*a, *b, *c, *d]) as i64;
                let in_range = match self.memory[ADDR_OPERATING_MODE as usize] {
                    3 => (0..=4095).contains(&goal),
                    _ => (-MULTI_TURN_LIMIT..=MULTI_TURN_LIMIT).contains(&goal),
                };
                if in_range {
                    Ok(())
                } else {
                    Err(DeviceErrorKind::DataLimit)
                }
            },
            ADDR_PRESENT_POSITION => Err(DeviceErrorKind::Access),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: BTreeMap<u8, MockDevice>,
    requests: Vec<LoggedRequest>,
    open: bool,
    close_count: usize,
}

/// 模拟总线（实现 [`BusAdapter`]）
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
}

/// 测试侧持有的观察/控制句柄
///
/// `MockBus` 被移入 [`SharedBus`](crate::SharedBus) 之后，测试通过它检查设备状态与请求记录。
#[derive(Clone)]
pub struct MockBusHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockBus {
    pub fn new() -> Self {
        MockBus {
            state: Arc::new(Mutex::new(MockState {
                open: true,
                ..MockState::default()
            })),
        }
    }

    /// 创建总线并挂载给定 ID 的设备
    pub fn with_actuators(ids: &[u8]) -> Self {
        let bus = MockBus::new();
        let handle = bus.handle();
        for &id in ids {
            handle.add_actuator(id);
        }
        bus
    }

    pub fn handle(&self) -> MockBusHandle {
        MockBusHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusAdapter for MockBus {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, BusError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(BusError::Closed);
        }

        // 损坏的指令包：设备不应答
        let Ok(packet) = InstructionPacket::decode(request) else {
            return Err(BusError::Timeout);
        };
        trace!("mock <- {:?}", packet);

        state.requests.push(LoggedRequest {
            id: packet.id,
            instruction: packet.instruction,
            address: packet.address(),
            data: packet.payload().to_vec(),
        });

        let Some(device) = state.devices.get_mut(&packet.id) else {
            return Err(BusError::Timeout);
        };

        let response = match device.take_fault(&packet) {
            Some(MockFault::Timeout) => return Err(BusError::Timeout),
            Some(MockFault::DeviceError(code)) => {
                StatusPacket::new(packet.id, StatusError(code), vec![]).encode()
            },
            Some(MockFault::Corrupt) => {
                let (error, params) = device.handle(&packet);
                let mut bytes = StatusPacket::new(packet.id, error, params).encode();
                if let Some(last) = bytes.last_mut() {
                    *last ^= 0xFF;
                }
                bytes
            },
            None => {
                let (error, params) = device.handle(&packet);
                StatusPacket::new(packet.id, error, params).encode()
            },
        };
        Ok(response)
    }

    fn close(&mut self) -> Result<(), BusError> {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            state.close_count += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl Drop for MockBus {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl MockBusHandle {
    pub fn add_actuator(&self, id: u8) {
        self.state.lock().devices.insert(id, MockDevice::new());
    }

    /// 移除设备（模拟掉线）
    pub fn remove_actuator(&self, id: u8) {
        self.state.lock().devices.remove(&id);
    }

    pub fn set_position_ticks(&self, id: u8, ticks: i32) {
        self.with_device(id, |d| d.store(ADDR_PRESENT_POSITION, &ticks.to_le_bytes()));
    }

    /// 按 X 系列换算设置当前位置
    pub fn set_position_deg(&self, id: u8, degrees: f64) {
        self.set_position_ticks(id, X_SERIES.angle_to_ticks(degrees) as i32);
    }

    pub fn position_ticks(&self, id: u8) -> Option<i32> {
        self.read_device(id, |d| d.load_i32(ADDR_PRESENT_POSITION))
    }

    pub fn goal_ticks(&self, id: u8) -> Option<i32> {
        self.read_device(id, |d| d.load_i32(ADDR_GOAL_POSITION))
    }

    pub fn torque_enabled(&self, id: u8) -> Option<bool> {
        self.read_device(id, |d| d.torque_enabled())
    }

    pub fn operating_mode(&self, id: u8) -> Option<u8> {
        self.read_device(id, |d| d.memory[ADDR_OPERATING_MODE as usize])
    }

    pub fn current_limit(&self, id: u8) -> Option<u16> {
        self.read_device(id, |d| {
            let bytes = &d.memory[ADDR_CURRENT_LIMIT as usize..ADDR_CURRENT_LIMIT as usize + 2];
            u16::from_le_bytes([bytes[0], bytes[1]])
        })
    }

    pub fn set_current_limit_max(&self, id: u8, max: u16) {
        self.with_device(id, |d| d.current_limit_max = max);
    }

    /// 永久注入故障
    pub fn inject(&self, id: u8, trigger: MockTrigger, fault: MockFault) {
        self.push_fault(id, trigger, fault, None);
    }

    /// 注入只触发 `times` 次的故障
    pub fn inject_times(&self, id: u8, trigger: MockTrigger, fault: MockFault, times: usize) {
        if times > 0 {
            self.push_fault(id, trigger, fault, Some(times));
        }
    }

    pub fn clear_faults(&self, id: u8) {
        self.with_device(id, |d| d.faults.clear());
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    /// 对某个设备某个寄存器的所有写入值（按时间顺序）
    pub fn writes_to(&self, id: u8, address: u16) -> Vec<u32> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.id == id && r.is_write_to(address))
            .filter_map(LoggedRequest::value)
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn push_fault(&self, id: u8, trigger: MockTrigger, fault: MockFault, remaining: Option<usize>) {
        self.with_device(id, |d| {
            d.faults.push(FaultRule {
                trigger,
                fault,
                remaining,
            })
        });
    }

    fn with_device(&self, id: u8, f: impl FnOnce(&mut MockDevice)) {
        if let Some(device) = self.state.lock().devices.get_mut(&id) {
            f(device);
        }
    }

    fn read_device<T>(&self, id: u8, f: impl FnOnce(&MockDevice) -> T) -> Option<T> {
        self.state.lock().devices.get(&id).map(f)
    }
}
