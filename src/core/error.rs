//! 统一错误处理模块
//!
//! ## 错误分类
//!
//! - **容量耗尽**：不是错误。发射请求被静默丢弃，只能通过活动粒子数观察到。
//! - **无效配置**：在注册/初始化时以 [`ParticleError`] 立即失败。
//! - **回调故障**：在管线边界被捕获、记录并跳过，见 [`crate::core::fault`]。

use thiserror::Error;

/// 粒子系统错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParticleError {
    #[error("Invalid capacity: {0} (capacity must be at least 1)")]
    ZeroCapacity(usize),

    #[error("Initial capacity {initial} exceeds max capacity {max}")]
    CapacityOrder { initial: usize, max: usize },

    #[error("Normalized time {0} is outside [0, 1]")]
    InvalidNormalizedTime(f32),

    #[error("Timed event threshold {0} must be a finite, non-negative number of seconds")]
    InvalidEventTime(f32),

    #[error("Invalid memory manager settings: {0}")]
    InvalidMemorySettings(String),

    #[error("Invalid emitter settings: {0}")]
    InvalidEmitter(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Particle system '{0}' is not initialized")]
    NotInitialized(String),

    #[error("Particle system '{0}' has been destroyed")]
    Destroyed(String),
}

/// 粒子系统结果类型别名
pub type ParticleResult<T> = Result<T, ParticleError>;
