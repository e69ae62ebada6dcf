//! 粒子系统
//!
//! [`ParticleSystem`] 把粒子池、粒子事件、系统事件和发射器组合在一起，
//! 对外只暴露 `update` / `draw` / `destroy` 生命周期。
//!
//! 一次 `update(dt)` 的执行顺序：
//!
//! 1. 应用模拟速度与每秒更新次数限制
//! 2. 推进系统时间并执行系统事件
//! 3. 推进每个活动粒子的时间，执行到期的粒子事件
//! 4. 注销一次性粒子事件，回收死亡粒子
//! 5. 发射新粒子（速率 + 突发），执行初始化回调
//! 6. 粒子池按内存策略调整容量
//! 7. 处理系统寿命（重复或销毁）

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::emitter::Emitter;
use super::events::{ParticleEvents, SystemEventContext, SystemEvents};
use super::particle::Particle;
use super::pool::{AutoMemoryManagerSettings, ParticlePool, PoolStats};
use super::random::ParticleRng;
use super::vertex::CameraMatrices;
use crate::config::{ConfigResult, ParticleSystemConfig};
use crate::core::error::{ParticleError, ParticleResult};
use crate::core::fault::{panic_message, FaultLog, FaultRecord};

/// 尚未经过任何一次更新的哨兵值
const NOT_YET_UPDATED: f32 = -1.0;

/// 粒子系统生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Destroyed,
}

/// 系统寿命结束时的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndOfLife {
    /// 不做任何处理
    #[default]
    Nothing,
    /// 重新开始计时，计时系统事件会再次触发
    Repeat,
    /// 在本次更新结束时销毁系统
    Destroy,
}

/// 传给粒子初始化回调的发射信息
pub struct EmissionContext<'a> {
    /// 发射器在本粒子发射时刻的位置
    pub position: Vec3,
    /// 发射器在本粒子发射时刻的朝向
    pub orientation: Quat,
    /// 本粒子在本批次中的序号
    pub index: u32,
    /// 本批次请求发射的粒子数
    pub batch_size: u32,
    /// 系统已流逝时间（秒）
    pub system_elapsed_time: f32,
    pub rng: &'a mut ParticleRng,
}

/// 粒子初始化回调
pub type ParticleInitializer<P> = dyn for<'a> FnMut(&mut P, &mut EmissionContext<'a>);

/// 顶点更新回调：把一个粒子投影为若干顶点追加到缓冲区
pub type VertexUpdater<P, V> = dyn FnMut(&P, &CameraMatrices, &mut Vec<V>);

/// 绘制提交回调：把本帧的顶点交给渲染后端
pub type DrawSubmitter<V> = dyn FnMut(&[V]);

/// 通用粒子系统
///
/// `P` 是粒子数据形状，`V` 是顶点类型。不需要绘制的系统使用默认的 `V = ()`。
///
/// # 示例
///
/// ```rust
/// use dpsf::particles::{DefaultParticle, ParticleSystem};
///
/// let mut system: ParticleSystem<DefaultParticle> = ParticleSystem::new("sparks");
/// system
///     .auto_initialize(100, 1000, |particle: &mut DefaultParticle, ctx| {
///         particle.life.reset(2.0);
///         particle.position = ctx.position;
///     })
///     .unwrap();
///
/// system.emitter_mut().particles_per_second = 100.0;
/// system.update(1.0);
/// assert_eq!(system.active_particle_count(), 100);
/// ```
pub struct ParticleSystem<P: Particle, V: 'static = ()> {
    name: String,
    lifecycle: Lifecycle,
    pool: Option<ParticlePool<P>>,
    memory_settings: AutoMemoryManagerSettings,
    emitter: Emitter,
    particle_events: ParticleEvents<P>,
    system_events: SystemEvents,
    initializer: Option<Box<ParticleInitializer<P>>>,
    vertex_updater: Option<Box<VertexUpdater<P, V>>>,
    draw_submitter: Option<Box<DrawSubmitter<V>>>,
    vertices: Vec<V>,
    camera: CameraMatrices,
    rng: ParticleRng,
    faults: FaultLog,

    draw_order: i32,
    enabled: bool,
    visible: bool,
    simulation_speed: f32,
    updates_per_second: f32,
    time_since_last_update: f32,

    elapsed_time: f32,
    last_elapsed_time: f32,
    lifetime: Option<f32>,
    end_of_life: EndOfLife,
    tick: u64,
}

impl<P: Particle, V: 'static> ParticleSystem<P, V> {
    /// 创建未初始化的粒子系统
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lifecycle: Lifecycle::Uninitialized,
            pool: None,
            memory_settings: AutoMemoryManagerSettings::default(),
            emitter: Emitter::default(),
            particle_events: ParticleEvents::new(),
            system_events: SystemEvents::new(),
            initializer: None,
            vertex_updater: None,
            draw_submitter: None,
            vertices: Vec::new(),
            camera: CameraMatrices::default(),
            rng: ParticleRng::default(),
            faults: FaultLog::new(),
            draw_order: 0,
            enabled: true,
            visible: true,
            simulation_speed: 1.0,
            updates_per_second: 0.0,
            time_since_last_update: 0.0,
            elapsed_time: 0.0,
            last_elapsed_time: NOT_YET_UPDATED,
            lifetime: None,
            end_of_life: EndOfLife::Nothing,
            tick: 0,
        }
    }

    /// 分配粒子池并设置初始化与顶点更新回调
    ///
    /// 对已初始化的系统再次调用会丢弃现有粒子并重建粒子池；
    /// 已销毁的系统不能再初始化。
    pub fn initialize<I, U>(
        &mut self,
        initial_capacity: usize,
        max_capacity: usize,
        initializer: I,
        vertex_updater: U,
    ) -> ParticleResult<()>
    where
        I: for<'a> FnMut(&mut P, &mut EmissionContext<'a>) + 'static,
        U: FnMut(&P, &CameraMatrices, &mut Vec<V>) + 'static,
    {
        self.initialize_pool(initial_capacity, max_capacity)?;
        self.initializer = Some(Box::new(initializer));
        self.vertex_updater = Some(Box::new(vertex_updater));
        Ok(())
    }

    /// 与 [`ParticleSystem::initialize`] 相同，但不设置顶点更新回调
    pub fn auto_initialize<I>(
        &mut self,
        initial_capacity: usize,
        max_capacity: usize,
        initializer: I,
    ) -> ParticleResult<()>
    where
        I: for<'a> FnMut(&mut P, &mut EmissionContext<'a>) + 'static,
    {
        self.initialize_pool(initial_capacity, max_capacity)?;
        self.initializer = Some(Box::new(initializer));
        Ok(())
    }

    /// 按配置初始化：容量、内存策略、速度、绘制顺序和发射器
    pub fn auto_initialize_with_config<I>(
        &mut self,
        config: &ParticleSystemConfig,
        initializer: I,
    ) -> ConfigResult<()>
    where
        I: for<'a> FnMut(&mut P, &mut EmissionContext<'a>) + 'static,
    {
        config.validate()?;
        self.memory_settings = config.memory;
        self.simulation_speed = config.simulation_speed;
        self.updates_per_second = config.updates_per_second;
        self.draw_order = config.draw_order;
        self.emitter = config.emitter.build();
        self.auto_initialize(config.initial_capacity, config.max_capacity, initializer)?;
        Ok(())
    }

    fn initialize_pool(&mut self, initial_capacity: usize, max_capacity: usize) -> ParticleResult<()> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Err(ParticleError::Destroyed(self.name.clone()));
        }
        let pool = ParticlePool::new(initial_capacity, max_capacity, self.memory_settings)?;
        self.pool = Some(pool);
        self.lifecycle = Lifecycle::Initialized;
        self.elapsed_time = 0.0;
        self.last_elapsed_time = NOT_YET_UPDATED;
        self.time_since_last_update = 0.0;
        tracing::debug!(
            target: "particles",
            "Initialized particle system '{}' (capacity {}..{})",
            self.name,
            initial_capacity,
            max_capacity
        );
        Ok(())
    }

    /// 替换粒子初始化回调
    pub fn set_particle_initialization_function<I>(&mut self, initializer: I)
    where
        I: for<'a> FnMut(&mut P, &mut EmissionContext<'a>) + 'static,
    {
        self.initializer = Some(Box::new(initializer));
    }

    pub fn set_vertex_updater<U>(&mut self, vertex_updater: U)
    where
        U: FnMut(&P, &CameraMatrices, &mut Vec<V>) + 'static,
    {
        self.vertex_updater = Some(Box::new(vertex_updater));
    }

    pub fn set_draw_submitter<S>(&mut self, submitter: S)
    where
        S: FnMut(&[V]) + 'static,
    {
        self.draw_submitter = Some(Box::new(submitter));
    }

    /// 推进模拟 `elapsed_seconds` 秒
    ///
    /// 未初始化、已销毁或被禁用的系统直接返回。
    pub fn update(&mut self, elapsed_seconds: f32) {
        if self.lifecycle != Lifecycle::Initialized || !self.enabled {
            return;
        }

        let elapsed_seconds = if elapsed_seconds.is_finite() {
            elapsed_seconds.max(0.0)
        } else {
            0.0
        };
        let scaled = elapsed_seconds * self.simulation_speed;

        let step = if self.updates_per_second > 0.0 {
            self.time_since_last_update += scaled;
            if self.time_since_last_update < 1.0 / self.updates_per_second {
                return;
            }
            std::mem::take(&mut self.time_since_last_update)
        } else {
            scaled
        };

        self.step(step);
    }

    fn step(&mut self, dt: f32) {
        self.tick += 1;
        self.elapsed_time += dt;

        let Self {
            pool,
            emitter,
            particle_events,
            system_events,
            faults,
            elapsed_time,
            last_elapsed_time,
            tick,
            ..
        } = self;
        let Some(pool) = pool.as_mut() else {
            return;
        };

        let mut context = SystemEventContext {
            emitter,
            elapsed_time: *elapsed_time,
            active_particles: pool.active_count(),
            max_particles: pool.max_capacity(),
        };
        system_events.run(&mut context, dt, *last_elapsed_time, faults, *tick);
        *last_elapsed_time = *elapsed_time;

        for particle in pool.active_mut() {
            particle.life_mut().advance(dt);
            particle_events.run_for_particle(particle, dt, faults, *tick);
        }
        particle_events.finish_pass();

        let released = pool.release_dead();
        if released > 0 {
            tracing::trace!(
                target: "particles",
                "'{}' released {} dead particles",
                self.name,
                released
            );
        }

        let count = self.emitter.particles_to_emit(dt);
        if count > 0 {
            self.emit(count, true);
        }
        self.emitter.commit_transform();

        if let Some(pool) = self.pool.as_mut() {
            pool.resize_if_needed(dt);
        }

        self.apply_end_of_life();
    }

    fn apply_end_of_life(&mut self) {
        let Some(lifetime) = self.lifetime else {
            return;
        };
        if self.elapsed_time < lifetime {
            return;
        }
        match self.end_of_life {
            EndOfLife::Nothing => {}
            EndOfLife::Repeat => {
                self.elapsed_time = if lifetime > 0.0 {
                    self.elapsed_time % lifetime
                } else {
                    0.0
                };
                self.last_elapsed_time = NOT_YET_UPDATED;
                tracing::debug!(target: "particles", "'{}' lifetime repeated", self.name);
            }
            EndOfLife::Destroy => {
                tracing::debug!(target: "particles", "'{}' reached end of life", self.name);
                self.destroy();
            }
        }
    }

    /// 从池中取出最多 `count` 个粒子并执行初始化回调，返回实际发射数
    fn emit(&mut self, count: u32, interpolate: bool) -> u32 {
        let Self {
            name,
            pool,
            emitter,
            initializer,
            rng,
            faults,
            elapsed_time,
            tick,
            ..
        } = self;
        let Some(pool) = pool.as_mut() else {
            return 0;
        };

        let available = pool.reserve(count as usize).min(count as usize) as u32;
        if available < count {
            tracing::trace!(
                target: "particles",
                "'{}' dropped {} of {} emissions at capacity",
                name,
                count - available,
                count
            );
        }

        let mut emitted = 0;
        for index in 0..available {
            let (position, orientation) = if interpolate {
                emitter.interpolated_transform((index + 1) as f32 / available as f32)
            } else {
                (emitter.position, emitter.orientation)
            };
            let Some(particle) = pool.acquire() else {
                break;
            };

            let Some(init) = initializer.as_mut() else {
                emitted += 1;
                continue;
            };
            let mut context = EmissionContext {
                position,
                orientation,
                index,
                batch_size: count,
                system_elapsed_time: *elapsed_time,
                rng: &mut *rng,
            };
            let result = catch_unwind(AssertUnwindSafe(|| init(particle, &mut context)));
            match result {
                Ok(()) => emitted += 1,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(
                        target: "particles",
                        "'{}' particle initializer panicked, particle discarded: {}",
                        name,
                        message
                    );
                    faults.record(FaultRecord::new(
                        format!("{}/initializer", name),
                        message,
                        *tick,
                    ));
                    pool.release_newest();
                }
            }
        }
        emitted
    }

    /// 在发射器当前位置立即发射一个粒子
    pub fn add_particle(&mut self) -> bool {
        self.add_particles(1) == 1
    }

    /// 在发射器当前位置立即发射 `count` 个粒子，返回实际发射数
    ///
    /// 与自动发射相同，池满时多余的请求被静默丢弃。
    pub fn add_particles(&mut self, count: u32) -> u32 {
        if self.lifecycle != Lifecycle::Initialized || count == 0 {
            return 0;
        }
        self.emit(count, false)
    }

    /// 回收所有活动粒子
    pub fn remove_all_particles(&mut self) {
        if let Some(pool) = self.pool.as_mut() {
            pool.release_all();
        }
    }

    /// 把活动粒子投影为顶点并交给绘制提交回调，返回顶点数
    ///
    /// 只读取粒子，不改变模拟状态。
    pub fn draw(&mut self) -> usize {
        if self.lifecycle != Lifecycle::Initialized || !self.visible {
            return 0;
        }
        let Some(pool) = self.pool.as_ref() else {
            return 0;
        };

        self.vertices.clear();
        if let Some(updater) = self.vertex_updater.as_mut() {
            for particle in pool.active() {
                updater(particle, &self.camera, &mut self.vertices);
            }
        }
        if !self.vertices.is_empty() {
            if let Some(submit) = self.draw_submitter.as_mut() {
                submit(&self.vertices);
            }
        }
        self.vertices.len()
    }

    /// 释放粒子池并清空所有回调；可重复调用
    pub fn destroy(&mut self) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.pool = None;
        self.particle_events.remove_all_events();
        self.system_events.remove_all_events();
        self.initializer = None;
        self.vertex_updater = None;
        self.draw_submitter = None;
        self.vertices = Vec::new();
        self.emitter.reset();
        self.lifecycle = Lifecycle::Destroyed;
        tracing::debug!(target: "particles", "Destroyed particle system '{}'", self.name);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle == Lifecycle::Initialized
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle == Lifecycle::Destroyed
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn emitter_mut(&mut self) -> &mut Emitter {
        &mut self.emitter
    }

    /// 粒子级事件
    pub fn events(&self) -> &ParticleEvents<P> {
        &self.particle_events
    }

    pub fn events_mut(&mut self) -> &mut ParticleEvents<P> {
        &mut self.particle_events
    }

    /// 系统级事件
    pub fn system_events(&self) -> &SystemEvents {
        &self.system_events
    }

    pub fn system_events_mut(&mut self) -> &mut SystemEvents {
        &mut self.system_events
    }

    /// 活动粒子，按发射先后排列
    pub fn particles(&self) -> &[P] {
        self.pool.as_ref().map(|pool| pool.active()).unwrap_or(&[])
    }

    pub fn particles_mut(&mut self) -> &mut [P] {
        match self.pool.as_mut() {
            Some(pool) => pool.active_mut(),
            None => &mut [],
        }
    }

    pub fn active_particle_count(&self) -> usize {
        self.pool.as_ref().map_or(0, |pool| pool.active_count())
    }

    pub fn inactive_particle_count(&self) -> usize {
        self.pool.as_ref().map_or(0, |pool| pool.inactive_count())
    }

    /// 已分配的粒子数（活动 + 非活动）
    pub fn allocated_particle_count(&self) -> usize {
        self.pool.as_ref().map_or(0, |pool| pool.capacity())
    }

    pub fn max_particles(&self) -> usize {
        self.pool.as_ref().map_or(0, |pool| pool.max_capacity())
    }

    pub fn set_max_particles(&mut self, max_capacity: usize) -> ParticleResult<()> {
        match self.pool.as_mut() {
            Some(pool) => pool.set_max_capacity(max_capacity),
            None => Err(ParticleError::NotInitialized(self.name.clone())),
        }
    }

    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.as_ref().map(|pool| pool.stats())
    }

    pub fn memory_settings(&self) -> &AutoMemoryManagerSettings {
        &self.memory_settings
    }

    /// 设置内存管理策略；已初始化时立即作用于粒子池
    pub fn set_memory_settings(&mut self, settings: AutoMemoryManagerSettings) -> ParticleResult<()> {
        settings.validate()?;
        if let Some(pool) = self.pool.as_mut() {
            pool.set_settings(settings)?;
        }
        self.memory_settings = settings;
        Ok(())
    }

    pub fn draw_order(&self) -> i32 {
        self.draw_order
    }

    pub fn set_draw_order(&mut self, draw_order: i32) {
        self.draw_order = draw_order;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 禁用后 `update` 不再推进模拟
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// 隐藏后 `draw` 不再产生顶点
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn simulation_speed(&self) -> f32 {
        self.simulation_speed
    }

    pub fn set_simulation_speed(&mut self, speed: f32) -> ParticleResult<()> {
        if !(speed >= 0.0) || !speed.is_finite() {
            return Err(ParticleError::InvalidSetting(format!(
                "simulation speed must be finite and non-negative, got {}",
                speed
            )));
        }
        self.simulation_speed = speed;
        Ok(())
    }

    pub fn updates_per_second(&self) -> f32 {
        self.updates_per_second
    }

    /// 限制每秒更新次数；0 表示每次调用都更新
    pub fn set_updates_per_second(&mut self, updates_per_second: f32) -> ParticleResult<()> {
        if !(updates_per_second >= 0.0) || !updates_per_second.is_finite() {
            return Err(ParticleError::InvalidSetting(format!(
                "updates per second must be finite and non-negative, got {}",
                updates_per_second
            )));
        }
        self.updates_per_second = updates_per_second;
        self.time_since_last_update = 0.0;
        Ok(())
    }

    /// 系统已流逝时间（秒）
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    pub fn lifetime(&self) -> Option<f32> {
        self.lifetime
    }

    /// 设置系统寿命及寿命结束时的行为；`None` 表示永久
    pub fn set_lifetime(&mut self, lifetime: Option<f32>, end_of_life: EndOfLife) -> ParticleResult<()> {
        if let Some(seconds) = lifetime {
            if !(seconds >= 0.0) || !seconds.is_finite() {
                return Err(ParticleError::InvalidSetting(format!(
                    "system lifetime must be finite and non-negative, got {}",
                    seconds
                )));
            }
        }
        self.lifetime = lifetime;
        self.end_of_life = end_of_life;
        Ok(())
    }

    pub fn end_of_life(&self) -> EndOfLife {
        self.end_of_life
    }

    /// 模拟已执行的次数
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn camera(&self) -> &CameraMatrices {
        &self.camera
    }

    pub fn set_camera_matrices(&mut self, camera: CameraMatrices) {
        self.camera = camera;
    }

    pub fn set_camera_position(&mut self, position: Vec3) {
        self.camera.camera_position = position;
    }

    pub fn rng_mut(&mut self) -> &mut ParticleRng {
        &mut self.rng
    }

    /// 使用固定种子，得到可复现的发射
    pub fn set_random_seed(&mut self, seed: u64) {
        self.rng = ParticleRng::from_seed(seed);
    }

    pub fn faults(&self) -> &FaultLog {
        &self.faults
    }
}

/// 可由 [`crate::particles::ParticleSystemManager`] 统一管理的粒子系统
///
/// 对任意 `P`、`V` 的 [`ParticleSystem`] 都已实现，管理器因此可以同时持有
/// 不同粒子形状的系统。
pub trait ManagedParticleSystem: Any {
    fn name(&self) -> &str;
    fn draw_order(&self) -> i32;
    fn update(&mut self, elapsed_seconds: f32);
    fn draw(&mut self) -> usize;
    fn destroy(&mut self);
    fn is_destroyed(&self) -> bool;
    fn active_particle_count(&self) -> usize;
    fn allocated_particle_count(&self) -> usize;
    fn set_camera_matrices(&mut self, camera: CameraMatrices);
    fn set_camera_position(&mut self, position: Vec3);
    fn set_simulation_speed(&mut self, speed: f32) -> ParticleResult<()>;
    fn set_updates_per_second(&mut self, updates_per_second: f32) -> ParticleResult<()>;
    fn fault_count(&self) -> u64;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<P: Particle, V: 'static> ManagedParticleSystem for ParticleSystem<P, V> {
    fn name(&self) -> &str {
        ParticleSystem::name(self)
    }

    fn draw_order(&self) -> i32 {
        ParticleSystem::draw_order(self)
    }

    fn update(&mut self, elapsed_seconds: f32) {
        ParticleSystem::update(self, elapsed_seconds)
    }

    fn draw(&mut self) -> usize {
        ParticleSystem::draw(self)
    }

    fn destroy(&mut self) {
        ParticleSystem::destroy(self)
    }

    fn is_destroyed(&self) -> bool {
        ParticleSystem::is_destroyed(self)
    }

    fn active_particle_count(&self) -> usize {
        ParticleSystem::active_particle_count(self)
    }

    fn allocated_particle_count(&self) -> usize {
        ParticleSystem::allocated_particle_count(self)
    }

    fn set_camera_matrices(&mut self, camera: CameraMatrices) {
        ParticleSystem::set_camera_matrices(self, camera)
    }

    fn set_camera_position(&mut self, position: Vec3) {
        ParticleSystem::set_camera_position(self, position)
    }

    fn set_simulation_speed(&mut self, speed: f32) -> ParticleResult<()> {
        ParticleSystem::set_simulation_speed(self, speed)
    }

    fn set_updates_per_second(&mut self, updates_per_second: f32) -> ParticleResult<()> {
        ParticleSystem::set_updates_per_second(self, updates_per_second)
    }

    fn fault_count(&self) -> u64 {
        self.faults.total_count()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
