//! 粒子数据
//!
//! 粒子本身只是可变的数据记录。引擎只通过 [`Particle`] trait 访问其中的
//! [`ParticleLife`]，其余字段完全由效果代码解释。

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// 尚未经过任何一次更新的哨兵值
const NOT_YET_UPDATED: f32 = -1.0;

/// 粒子生命周期数据
///
/// `normalized_elapsed_time` 总是由 `elapsed_time / lifetime` 推导并截断到
/// `[0, 1]`；等于 1.0 表示粒子已死亡，会在同一次更新中被回收。
/// 生命周期小于等于 0 的粒子在第一次更新时即为死亡状态，其事件只会执行一次。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleLife {
    lifetime: f32,
    elapsed_time: f32,
    normalized_elapsed_time: f32,
    last_elapsed_time: f32,
    last_normalized_elapsed_time: f32,
    /// 首次推进之前 `last_*` 保持哨兵值
    advanced: bool,
}

impl Default for ParticleLife {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ParticleLife {
    /// 创建指定寿命（秒）的新生命周期
    pub fn new(lifetime: f32) -> Self {
        let mut life = Self {
            lifetime,
            elapsed_time: 0.0,
            normalized_elapsed_time: 0.0,
            last_elapsed_time: NOT_YET_UPDATED,
            last_normalized_elapsed_time: NOT_YET_UPDATED,
            advanced: false,
        };
        life.recompute();
        life
    }

    /// 重新开始计时
    pub fn reset(&mut self, lifetime: f32) {
        *self = Self::new(lifetime);
    }

    pub fn lifetime(&self) -> f32 {
        self.lifetime
    }

    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    pub fn normalized_elapsed_time(&self) -> f32 {
        self.normalized_elapsed_time
    }

    /// 设置寿命，不重置已流逝时间
    pub fn set_lifetime(&mut self, lifetime: f32) {
        self.lifetime = lifetime;
        self.recompute();
    }

    pub fn set_elapsed_time(&mut self, elapsed_time: f32) {
        self.elapsed_time = elapsed_time.max(0.0);
        self.recompute();
    }

    /// 推进时间，记录上一次的时间以便检测阈值穿越
    pub fn advance(&mut self, elapsed_seconds: f32) {
        if self.advanced {
            self.last_elapsed_time = self.elapsed_time;
            self.last_normalized_elapsed_time = self.normalized_elapsed_time;
        }
        self.advanced = true;
        self.elapsed_time += elapsed_seconds;
        self.recompute();
    }

    /// 立即标记为死亡
    pub fn kill(&mut self) {
        if self.lifetime > 0.0 {
            self.elapsed_time = self.elapsed_time.max(self.lifetime);
        }
        self.normalized_elapsed_time = 1.0;
    }

    pub fn is_dead(&self) -> bool {
        self.normalized_elapsed_time >= 1.0
    }

    /// 本次推进是否首次达到归一化时间阈值
    pub fn crossed_normalized_time(&self, threshold: f32) -> bool {
        self.last_normalized_elapsed_time < threshold && self.normalized_elapsed_time >= threshold
    }

    /// 本次推进是否首次达到以秒计的阈值
    pub fn crossed_elapsed_time(&self, threshold: f32) -> bool {
        self.last_elapsed_time < threshold && self.elapsed_time >= threshold
    }

    fn recompute(&mut self) {
        self.normalized_elapsed_time = if self.lifetime <= 0.0 {
            1.0
        } else {
            (self.elapsed_time / self.lifetime).clamp(0.0, 1.0)
        };
    }
}

/// 粒子数据形状
///
/// 粒子池通过 `Default` 预分配粒子，通过 [`Particle::reset`] 在复用前
/// 清理旧数据。
pub trait Particle: Default + 'static {
    fn life(&self) -> &ParticleLife;

    fn life_mut(&mut self) -> &mut ParticleLife;

    /// 复用前重置为新粒子
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 默认粒子
///
/// 覆盖精灵、四边形和点精灵效果常用的字段，并提供可以直接注册为事件的
/// 行为函数（签名均为 `fn(&mut DefaultParticle, f32)`）：
///
/// ```ignore
/// system.events_mut().add_every_time_event(DefaultParticle::update_velocity_using_acceleration, 0, 0);
/// system.events_mut().add_every_time_event(DefaultParticle::update_position_using_velocity, 100, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefaultParticle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub external_force: Vec3,
    /// 每秒速度衰减量
    pub friction: f32,
    pub color: Vec4,
    pub start_color: Vec4,
    pub end_color: Vec4,
    pub width: f32,
    pub height: f32,
    pub start_size: f32,
    pub end_size: f32,
    /// 弧度
    pub rotation: f32,
    pub rotational_velocity: f32,
    pub rotational_acceleration: f32,
    pub life: ParticleLife,
}

impl Default for DefaultParticle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            external_force: Vec3::ZERO,
            friction: 0.0,
            color: Vec4::ONE,
            start_color: Vec4::ONE,
            end_color: Vec4::ONE,
            width: 1.0,
            height: 1.0,
            start_size: 1.0,
            end_size: 1.0,
            rotation: 0.0,
            rotational_velocity: 0.0,
            rotational_acceleration: 0.0,
            life: ParticleLife::default(),
        }
    }
}

impl Particle for DefaultParticle {
    fn life(&self) -> &ParticleLife {
        &self.life
    }

    fn life_mut(&mut self) -> &mut ParticleLife {
        &mut self.life
    }
}

impl DefaultParticle {
    /// 同时设置宽高
    pub fn set_size(&mut self, size: f32) {
        self.width = size;
        self.height = size;
    }

    pub fn update_velocity_using_acceleration(&mut self, elapsed_seconds: f32) {
        self.velocity += self.acceleration * elapsed_seconds;
    }

    /// 单位质量下的外力
    pub fn update_velocity_using_external_force(&mut self, elapsed_seconds: f32) {
        self.velocity += self.external_force * elapsed_seconds;
    }

    /// 按摩擦力减速，速度不会反向
    pub fn update_velocity_using_friction(&mut self, elapsed_seconds: f32) {
        let speed = self.velocity.length();
        if speed <= f32::EPSILON {
            return;
        }
        let reduced = speed - self.friction * elapsed_seconds;
        if reduced <= 0.0 {
            self.velocity = Vec3::ZERO;
        } else {
            self.velocity *= reduced / speed;
        }
    }

    pub fn update_position_using_velocity(&mut self, elapsed_seconds: f32) {
        self.position += self.velocity * elapsed_seconds;
    }

    pub fn update_rotational_velocity_using_rotational_acceleration(
        &mut self,
        elapsed_seconds: f32,
    ) {
        self.rotational_velocity += self.rotational_acceleration * elapsed_seconds;
    }

    pub fn update_rotation_using_rotational_velocity(&mut self, elapsed_seconds: f32) {
        self.rotation += self.rotational_velocity * elapsed_seconds;
    }

    /// 颜色从起始色插值到结束色
    pub fn lerp_color(&mut self, _elapsed_seconds: f32) {
        let t = self.life.normalized_elapsed_time();
        self.color = self.start_color.lerp(self.end_color, t);
    }

    /// 大小从起始值插值到结束值
    pub fn lerp_size(&mut self, _elapsed_seconds: f32) {
        let t = self.life.normalized_elapsed_time();
        let size = self.start_size + (self.end_size - self.start_size) * t;
        self.set_size(size);
    }

    /// 透明度随生命线性降到 0
    pub fn fade_out_using_lerp(&mut self, _elapsed_seconds: f32) {
        self.color.w = 1.0 - self.life.normalized_elapsed_time();
    }

    /// 透明度随生命线性升到 1
    pub fn fade_in_using_lerp(&mut self, _elapsed_seconds: f32) {
        self.color.w = self.life.normalized_elapsed_time();
    }

    /// 生命前后各 `edge` 比例内淡入淡出，中间保持不透明
    pub fn fade_in_and_out(&mut self, edge: f32) {
        let t = self.life.normalized_elapsed_time();
        let edge = edge.clamp(f32::EPSILON, 0.5);
        self.color.w = if t < edge {
            t / edge
        } else if t > 1.0 - edge {
            (1.0 - t) / edge
        } else {
            1.0
        };
    }
}
