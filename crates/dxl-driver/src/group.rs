//! 执行器组
//!
//! 成员按 ID 升序排列，所有批量操作都按这一顺序逐个发出命令。
//!
//! 两类失败语义：
//! - 配置类操作（[`ActuatorGroup::configure_all`]、[`ActuatorGroup::positions`]）快速失败，
//!   已完成的成员不回滚
//! - 周期类操作（[`ActuatorGroup::apply_goals`]、[`ActuatorGroup::stop_all`]）尽力而为，
//!   每个成员都会尝试，失败统一收集返回

use crate::actuator::Actuator;
use crate::error::{ActuatorError, GroupError, MemberFailure};
use crate::units::Deg;
use dxl_bus::SharedBus;
use dxl_protocol::{ActuatorId, ModelSpec, OperatingMode};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub struct ActuatorGroup {
    members: Vec<Actuator>,
}

impl ActuatorGroup {
    /// 由一组句柄构造；按 ID 排序，拒绝空集合与重复 ID
    pub fn new(mut members: Vec<Actuator>) -> Result<Self, GroupError> {
        if members.is_empty() {
            return Err(GroupError::Empty);
        }
        members.sort_by_key(|m| m.id());
        let mut seen = BTreeSet::new();
        for member in &members {
            if !seen.insert(member.id()) {
                return Err(GroupError::DuplicateId(member.id()));
            }
        }
        Ok(ActuatorGroup { members })
    }

    /// 在同一条总线上为每个 ID 创建句柄
    pub fn open(
        bus: SharedBus,
        ids: &[ActuatorId],
        model: &'static ModelSpec,
    ) -> Result<Self, GroupError> {
        let members = ids
            .iter()
            .map(|&id| Actuator::new(SharedBus::clone(&bus), id, model))
            .collect();
        Self::new(members)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// 成员 ID（升序）
    pub fn ids(&self) -> Vec<ActuatorId> {
        self.members.iter().map(Actuator::id).collect()
    }

    pub fn members(&self) -> &[Actuator] {
        &self.members
    }

    pub fn get(&self, index: usize) -> Option<&Actuator> {
        self.members.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Actuator> {
        self.members.get_mut(index)
    }

    /// 逐个配置：关扭矩 → 设模式 → 设电流上限 → 开扭矩
    ///
    /// 任一成员失败立即返回，之前已配置的成员保持扭矩使能。
    pub fn configure_all(
        &mut self,
        mode: OperatingMode,
        current_limit_ma: f64,
    ) -> Result<(), GroupError> {
        for (index, member) in self.members.iter_mut().enumerate() {
            let id = member.id();
            if let Err(error) = configure_member(member, mode, current_limit_ma) {
                return Err(GroupError::Member(MemberFailure { index, id, error }));
            }
            debug!("Actuator {} configured ({:?}, {} mA)", id, mode, current_limit_ma);
        }
        info!(
            "Configured {} actuators: mode {:?}, current limit {} mA",
            self.members.len(),
            mode,
            current_limit_ma
        );
        Ok(())
    }

    /// 逐个使能扭矩（快速失败）
    pub fn enable_all(&mut self) -> Result<(), GroupError> {
        for (index, member) in self.members.iter_mut().enumerate() {
            let id = member.id();
            member
                .enable_torque()
                .map_err(|error| GroupError::Member(MemberFailure { index, id, error }))?;
        }
        Ok(())
    }

    /// 逐个关闭扭矩（尽力而为），端口引用保留
    pub fn disable_all(&mut self) -> Result<(), GroupError> {
        let attempted = self.members.len();
        let failures = self
            .members
            .iter_mut()
            .enumerate()
            .filter_map(|(index, member)| {
                let id = member.id();
                member
                    .disable_torque()
                    .err()
                    .map(|error| MemberFailure { index, id, error })
            })
            .collect();
        collect(attempted, failures)
    }

    /// 按顺序给每个成员下发目标位置
    ///
    /// 单个成员失败不影响其余成员；所有失败一并返回。
    pub fn apply_goals(&mut self, goals: &[Deg]) -> Result<(), GroupError> {
        if goals.len() != self.members.len() {
            return Err(GroupError::LengthMismatch {
                expected: self.members.len(),
                actual: goals.len(),
            });
        }
        let attempted = self.members.len();
        let mut failures = Vec::new();
        for (index, (member, &goal)) in self.members.iter_mut().zip(goals).enumerate() {
            if let Err(error) = member.set_goal_position(goal) {
                failures.push(MemberFailure {
                    index,
                    id: member.id(),
                    error,
                });
            }
        }
        collect(attempted, failures)
    }

    /// 读取所有成员的当前位置（快速失败）
    pub fn positions(&self) -> Result<Vec<Deg>, GroupError> {
        self.members
            .iter()
            .enumerate()
            .map(|(index, member)| {
                member.get_position().map_err(|error| {
                    GroupError::Member(MemberFailure {
                        index,
                        id: member.id(),
                        error,
                    })
                })
            })
            .collect()
    }

    /// 对每个成员调用 `stop()`，总是尝试全部成员
    pub fn stop_all(&mut self) -> Result<(), GroupError> {
        let attempted = self.members.len();
        let mut failures = Vec::new();
        for (index, member) in self.members.iter_mut().enumerate() {
            if let Err(error) = member.stop() {
                warn!("Failed to stop actuator {}: {}", member.id(), error);
                failures.push(MemberFailure {
                    index,
                    id: member.id(),
                    error,
                });
            }
        }
        collect(attempted, failures)
    }
}

impl std::fmt::Debug for ActuatorGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorGroup")
            .field("ids", &self.ids())
            .finish()
    }
}

fn configure_member(
    member: &mut Actuator,
    mode: OperatingMode,
    current_limit_ma: f64,
) -> Result<(), ActuatorError> {
    // set_operating_mode 内部先关扭矩
    member.set_operating_mode(mode)?;
    member.set_current_limit(current_limit_ma)?;
    member.enable_torque()
}

fn collect(attempted: usize, failures: Vec<MemberFailure>) -> Result<(), GroupError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(GroupError::Members {
            attempted,
            failures,
        })
    }
}
