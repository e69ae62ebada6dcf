//! 粒子发射器
//!
//! 发射器决定新粒子在哪里、以什么速率产生。速率发射使用跨帧累加的
//! 小数累加器，`Update(0.5)` 两次与 `Update(1.0)` 一次发射的粒子数相同。

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// 吸收 f32 时间步长的舍入误差
const ACCUMULATOR_EPSILON: f64 = 1e-4;

/// 粒子发射器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Emitter {
    /// 当前位置
    pub position: Vec3,

    /// 当前朝向
    pub orientation: Quat,

    /// 每秒发射的粒子数
    pub particles_per_second: f32,

    /// 下一次更新时额外发射的粒子数，发射后清零
    pub burst_particles: u32,

    /// 关闭自动发射时仍按速率发射的剩余秒数
    pub burst_time: f32,

    /// 是否按 `particles_per_second` 自动发射
    pub emit_particles_automatically: bool,

    /// 关闭后不发射任何粒子，突发请求也会被丢弃
    pub enabled: bool,

    /// 同一次更新中发射的粒子是否在上次与本次变换之间插值
    pub lerp_position_and_orientation: bool,

    previous_position: Vec3,
    previous_orientation: Quat,

    #[serde(skip)]
    emission_accumulator: f64,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl Emitter {
    /// 创建位于原点、指定发射速率的发射器
    pub fn new(particles_per_second: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            particles_per_second,
            burst_particles: 0,
            burst_time: 0.0,
            emit_particles_automatically: true,
            enabled: true,
            lerp_position_and_orientation: true,
            previous_position: Vec3::ZERO,
            previous_orientation: Quat::IDENTITY,
            emission_accumulator: 0.0,
        }
    }

    /// 计算本次更新应发射的粒子数（速率发射 + 突发请求）
    ///
    /// 突发请求在调用后总是被清零。
    pub fn particles_to_emit(&mut self, delta_time: f32) -> u32 {
        if !self.enabled {
            self.burst_particles = 0;
            return 0;
        }

        let delta_time = if delta_time.is_finite() {
            delta_time.max(0.0)
        } else {
            0.0
        };

        let rate_seconds = if self.emit_particles_automatically {
            delta_time
        } else if self.burst_time > 0.0 {
            let seconds = delta_time.min(self.burst_time);
            self.burst_time -= seconds;
            seconds
        } else {
            0.0
        };

        let mut count = 0u32;
        if rate_seconds > 0.0 && self.particles_per_second > 0.0 {
            self.emission_accumulator += self.particles_per_second as f64 * rate_seconds as f64;
            let whole = (self.emission_accumulator + ACCUMULATOR_EPSILON).floor();
            self.emission_accumulator -= whole;
            count = whole.min(u32::MAX as f64) as u32;
        }

        count = count.saturating_add(self.burst_particles);
        self.burst_particles = 0;
        count
    }

    /// 清除累加的小数粒子
    pub fn reset(&mut self) {
        self.emission_accumulator = 0.0;
        self.burst_particles = 0;
        self.burst_time = 0.0;
    }

    /// 直接移动到新变换，不在新旧变换之间插值
    pub fn teleport(&mut self, position: Vec3, orientation: Quat) {
        self.position = position;
        self.orientation = orientation;
        self.previous_position = position;
        self.previous_orientation = orientation;
    }

    /// 本次更新内 `fraction ∈ [0, 1]` 处的发射变换
    pub fn interpolated_transform(&self, fraction: f32) -> (Vec3, Quat) {
        if !self.lerp_position_and_orientation {
            return (self.position, self.orientation);
        }
        let t = fraction.clamp(0.0, 1.0);
        (
            self.previous_position.lerp(self.position, t),
            self.previous_orientation.slerp(self.orientation, t),
        )
    }

    /// 在一次更新的发射结束后记录当前变换
    pub fn commit_transform(&mut self) {
        self.previous_position = self.position;
        self.previous_orientation = self.orientation;
    }

    pub fn previous_position(&self) -> Vec3 {
        self.previous_position
    }
}
