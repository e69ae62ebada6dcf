use super::{ConfigError, ConfigResult};
use crate::core::error::ParticleError;
use crate::impl_default;
use crate::particles::{AutoMemoryManagerSettings, Emitter};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// 单个粒子系统的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSystemConfig {
    /// 初始分配的粒子数
    pub initial_capacity: usize,

    /// 粒子池允许增长到的上限
    pub max_capacity: usize,

    /// 自动内存管理
    pub memory: AutoMemoryManagerSettings,

    /// 模拟速度倍率
    pub simulation_speed: f32,

    /// 每秒更新次数（0表示每次调用都更新）
    pub updates_per_second: f32,

    /// 绘制顺序（升序绘制）
    pub draw_order: i32,

    /// 发射器
    pub emitter: EmitterConfig,
}

impl_default!(ParticleSystemConfig {
    initial_capacity: 100,
    max_capacity: 10_000,
    memory: AutoMemoryManagerSettings::default(),
    simulation_speed: 1.0,
    updates_per_second: 0.0,
    draw_order: 0,
    emitter: EmitterConfig::default(),
});

impl ParticleSystemConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.initial_capacity == 0 {
            return Err(ParticleError::ZeroCapacity(self.initial_capacity).into());
        }
        if self.max_capacity == 0 {
            return Err(ParticleError::ZeroCapacity(self.max_capacity).into());
        }
        if self.initial_capacity > self.max_capacity {
            return Err(ParticleError::CapacityOrder {
                initial: self.initial_capacity,
                max: self.max_capacity,
            }
            .into());
        }
        self.memory.validate()?;
        if !(self.simulation_speed >= 0.0) || !self.simulation_speed.is_finite() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid simulation speed: {}",
                self.simulation_speed
            )));
        }
        if !(self.updates_per_second >= 0.0) || !self.updates_per_second.is_finite() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid updates per second: {}",
                self.updates_per_second
            )));
        }
        self.emitter.validate()
    }
}

/// 发射器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// 每秒发射的粒子数
    pub particles_per_second: f32,

    /// 是否自动发射
    pub emit_particles_automatically: bool,

    /// 发射器位置
    pub position: Vec3,

    /// 同一帧内发射的粒子是否在上一帧与本帧的变换之间插值
    pub lerp_position_and_orientation: bool,
}

impl_default!(EmitterConfig {
    particles_per_second: 100.0,
    emit_particles_automatically: true,
    position: Vec3::ZERO,
    lerp_position_and_orientation: true,
});

impl EmitterConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.particles_per_second >= 0.0) || !self.particles_per_second.is_finite() {
            return Err(ParticleError::InvalidEmitter(format!(
                "particles per second must be finite and non-negative, got {}",
                self.particles_per_second
            ))
            .into());
        }
        Ok(())
    }

    /// 按配置构建发射器
    pub fn build(&self) -> Emitter {
        let mut emitter = Emitter::new(self.particles_per_second);
        emitter.emit_particles_automatically = self.emit_particles_automatically;
        emitter.lerp_position_and_orientation = self.lerp_position_and_orientation;
        emitter.teleport(self.position, emitter.orientation);
        emitter
    }
}

/// 粒子系统管理器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// 应用到所有系统的模拟速度
    pub simulation_speed: f32,

    /// 应用到所有系统的每秒更新次数（0表示每次调用都更新）
    pub updates_per_second: f32,

    /// 是否记录 update/draw 耗时
    pub profiling: bool,
}

impl_default!(ManagerConfig {
    simulation_speed: 1.0,
    updates_per_second: 0.0,
    profiling: false,
});

impl ManagerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.simulation_speed >= 0.0) || !self.simulation_speed.is_finite() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid manager simulation speed: {}",
                self.simulation_speed
            )));
        }
        if !(self.updates_per_second >= 0.0) || !self.updates_per_second.is_finite() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid manager updates per second: {}",
                self.updates_per_second
            )));
        }
        Ok(())
    }
}
