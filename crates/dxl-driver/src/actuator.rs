//! 单个执行器句柄
//!
//! 每个物理 ID 对应一个 [`Actuator`]。句柄持有共享总线的一个引用，
//! 所有操作都通过 [`RegisterCodec`] 完成，不会自动重试，
//! 失败原样交给调用方（通常是控制循环）处理。

use crate::codec::RegisterCodec;
use crate::error::{ActuatorError, CodecError, Operation};
use crate::state::{ActuatorState, TorqueState};
use crate::units::Deg;
use dxl_bus::SharedBus;
use dxl_protocol::{
    ActuatorId, ModelSpec, OperatingMode, ProtocolError, Register, TORQUE_DISABLE,
    TORQUE_ENABLE,
};
use tracing::{debug, info, warn};

/// 执行器句柄
///
/// 本地状态（[`ActuatorState`]）只在设备确认写入后更新。
/// `stop()` 之后句柄释放总线引用，后续操作返回 [`ActuatorError::Released`]。
pub struct Actuator {
    id: ActuatorId,
    model: &'static ModelSpec,
    codec: Option<RegisterCodec>,
    state: ActuatorState,
}

impl Actuator {
    pub fn new(bus: SharedBus, id: ActuatorId, model: &'static ModelSpec) -> Self {
        Actuator {
            id,
            model,
            codec: Some(RegisterCodec::new(bus)),
            state: ActuatorState::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> ActuatorId {
        self.id
    }

    #[inline]
    pub fn model(&self) -> &'static ModelSpec {
        self.model
    }

    #[inline]
    pub fn state(&self) -> &ActuatorState {
        &self.state
    }

    /// 是否已 stop（端口引用已释放）
    #[inline]
    pub fn is_released(&self) -> bool {
        self.codec.is_none()
    }

    /// 角度 → 编码器计数
    #[inline]
    pub fn angle_to_ticks(&self, angle: Deg) -> i64 {
        self.model.angle_to_ticks(angle.0)
    }

    /// 编码器计数 → 角度（不做回绕）
    #[inline]
    pub fn ticks_to_angle(&self, ticks: i64) -> Deg {
        Deg(self.model.ticks_to_angle(ticks))
    }

    /// Ping 设备，返回型号编号
    pub fn ping(&self) -> Result<u16, ActuatorError> {
        let op = Operation::Ping;
        let model_number = self
            .codec(op)?
            .ping(self.id.get())
            .map_err(|e| self.error(op, e))?;
        if model_number != self.model.model_number {
            warn!(
                "Actuator {} reports model {}, expected {} ({})",
                self.id, model_number, self.model.model_number, self.model.name
            );
        }
        Ok(model_number)
    }

    pub fn enable_torque(&mut self) -> Result<(), ActuatorError> {
        self.write_torque(Operation::EnableTorque, TORQUE_ENABLE)?;
        self.state.torque = TorqueState::Enabled;
        debug!("Actuator {} torque enabled", self.id);
        Ok(())
    }

    pub fn disable_torque(&mut self) -> Result<(), ActuatorError> {
        self.write_torque(Operation::DisableTorque, TORQUE_DISABLE)?;
        self.state.torque = TorqueState::Disabled;
        debug!("Actuator {} torque disabled", self.id);
        Ok(())
    }

    /// 设置工作模式
    ///
    /// 先写扭矩关闭，再写模式；返回后扭矩保持关闭，调用方需要自行重新使能。
    pub fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<(), ActuatorError> {
        let op = Operation::SetOperatingMode;
        self.write_torque(op, TORQUE_DISABLE)?;
        self.state.torque = TorqueState::Disabled;

        let register = self.model.operating_mode;
        self.write_eeprom(op, &register, i64::from(u8::from(mode)))?;
        self.state.mode = Some(mode);
        debug!("Actuator {} operating mode set to {:?}", self.id, mode);
        Ok(())
    }

    /// 设置电流上限（mA），小数部分截断
    ///
    /// 超出硬件上限时由设备报错，不在本地钳位。
    pub fn set_current_limit(&mut self, milliamps: f64) -> Result<(), ActuatorError> {
        let op = Operation::SetCurrentLimit;
        let value = self.finite(op, milliamps)?.trunc() as i64;
        let register = self.model.current_limit;
        self.write_eeprom(op, &register, value)?;
        // 写入成功说明值已通过宽度检查
        self.state.current_limit = u16::try_from(value).ok();
        debug!("Actuator {} current limit set to {} mA", self.id, value);
        Ok(())
    }

    /// 设置目标位置
    ///
    /// 不做本地范围检查，超出物理范围时由设备报错。
    pub fn set_goal_position(&mut self, angle: Deg) -> Result<(), ActuatorError> {
        let op = Operation::SetGoalPosition;
        self.finite(op, angle.0)?;
        let ticks = self.angle_to_ticks(angle);
        let register = self.model.goal_position;
        self.codec(op)?
            .write_register(self.id.get(), &register, ticks)
            .map_err(|e| self.error(op, e))?;
        self.state.last_goal = Some(angle);
        Ok(())
    }

    /// 读取当前位置
    pub fn get_position(&self) -> Result<Deg, ActuatorError> {
        let op = Operation::GetPosition;
        let register = self.model.present_position;
        let ticks = self
            .codec(op)?
            .read_register(self.id.get(), &register)
            .map_err(|e| self.error(op, e))?;
        Ok(self.ticks_to_angle(ticks))
    }

    /// 关闭扭矩并释放端口引用
    ///
    /// 幂等：已释放的句柄直接返回 `Ok`。扭矩关闭失败时端口引用同样释放。
    pub fn stop(&mut self) -> Result<(), ActuatorError> {
        let Some(codec) = self.codec.take() else {
            return Ok(());
        };
        let register = self.model.torque_enable;
        let result = codec.write_register(self.id.get(), &register, i64::from(TORQUE_DISABLE));
        drop(codec);

        match result {
            Ok(()) => {
                self.state.torque = TorqueState::Disabled;
                info!("Actuator {} stopped", self.id);
                Ok(())
            },
            Err(e) => Err(self.error(Operation::Stop, e)),
        }
    }

    /// NaN / 无穷大在 `as i64` 换算时会饱和为合法计数，必须在发送前拒绝
    fn finite(&self, op: Operation, value: f64) -> Result<f64, ActuatorError> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ActuatorError::Encode {
                id: self.id,
                op,
                source: ProtocolError::NonFinite,
            })
        }
    }

    fn write_torque(&self, op: Operation, value: u32) -> Result<(), ActuatorError> {
        let register = self.model.torque_enable;
        self.codec(op)?
            .write_register(self.id.get(), &register, i64::from(value))
            .map_err(|e| self.error(op, e))
    }

    /// 写 EEPROM 区寄存器，要求扭矩未使能
    fn write_eeprom(
        &self,
        op: Operation,
        register: &Register,
        value: i64,
    ) -> Result<(), ActuatorError> {
        if self.model.requires_torque_off(register) && self.state.torque_enabled() {
            return Err(ActuatorError::Precondition {
                id: self.id,
                op,
                reason: "torque must be disabled before writing this register",
            });
        }
        self.codec(op)?
            .write_register(self.id.get(), register, value)
            .map_err(|e| self.error(op, e))
    }

    fn codec(&self, op: Operation) -> Result<&RegisterCodec, ActuatorError> {
        self.codec
            .as_ref()
            .ok_or(ActuatorError::Released { id: self.id, op })
    }

    fn error(&self, op: Operation, e: CodecError) -> ActuatorError {
        ActuatorError::from_codec(self.id, op, e)
    }
}

impl std::fmt::Debug for Actuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actuator")
            .field("id", &self.id)
            .field("model", &self.model.name)
            .field("released", &self.is_released())
            .field("state", &self.state)
            .finish()
    }
}
