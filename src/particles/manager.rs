//! 粒子系统管理器
//!
//! 管理多个粒子系统，提供统一的更新和绘制接口。
//!
//! 管理器通过 [`SystemId`] 句柄引用系统，系统本身不持有管理器。
//! 单个系统在 `update` / `draw` 中 panic 只影响该系统本帧的结果。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use dpsf_profiling::Profiler;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::particle::Particle;
use super::system::{ManagedParticleSystem, ParticleSystem};
use super::vertex::CameraMatrices;
use crate::config::{ConfigResult, ManagerConfig};
use crate::core::error::{ParticleError, ParticleResult};
use crate::core::fault::{panic_message, FaultLog, FaultRecord};
use crate::impl_default_and_new;

/// 粒子系统句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId(u64);

impl SystemId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct ManagedEntry {
    id: SystemId,
    system: Box<dyn ManagedParticleSystem>,
}

/// 管理器统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStats {
    pub particle_system_count: usize,
    pub total_active_particles: usize,
    pub total_allocated_particles: usize,
    pub total_faults: u64,
}

/// 粒子系统管理器
pub struct ParticleSystemManager {
    /// 按注册顺序排列
    systems: Vec<ManagedEntry>,
    next_id: u64,
    simulation_speed: f32,
    updates_per_second: f32,
    camera: CameraMatrices,
    faults: FaultLog,
    profiler: Option<Profiler>,
    frame: u64,
}

impl_default_and_new!(ParticleSystemManager {
    systems: Vec::new(),
    next_id: 0,
    simulation_speed: 1.0,
    updates_per_second: 0.0,
    camera: CameraMatrices::default(),
    faults: FaultLog::new(),
    profiler: None,
    frame: 0,
});

impl ParticleSystemManager {
    /// 按配置创建管理器
    pub fn from_config(config: &ManagerConfig) -> ConfigResult<Self> {
        config.validate()?;
        let mut manager = Self::new();
        manager.simulation_speed = config.simulation_speed;
        manager.updates_per_second = config.updates_per_second;
        if config.profiling {
            manager.enable_profiling();
        }
        Ok(manager)
    }

    /// 注册粒子系统
    ///
    /// # 参数
    ///
    /// * `system` - 任意实现了 [`ManagedParticleSystem`] 的系统
    ///
    /// # 返回
    ///
    /// 返回系统句柄。新系统立即获得管理器当前的相机矩阵。
    pub fn add_particle_system<S>(&mut self, system: S) -> SystemId
    where
        S: ManagedParticleSystem,
    {
        self.add_boxed_particle_system(Box::new(system))
    }

    pub fn add_boxed_particle_system(&mut self, mut system: Box<dyn ManagedParticleSystem>) -> SystemId {
        let id = SystemId(self.next_id);
        self.next_id += 1;
        system.set_camera_matrices(self.camera);
        tracing::debug!(
            target: "particle_manager",
            "Registered particle system '{}' as #{}",
            system.name(),
            id.0
        );
        self.systems.push(ManagedEntry { id, system });
        id
    }

    /// 移除粒子系统但不销毁它，交还给调用者
    pub fn remove_particle_system(&mut self, id: SystemId) -> Option<Box<dyn ManagedParticleSystem>> {
        let index = self.systems.iter().position(|entry| entry.id == id)?;
        let entry = self.systems.remove(index);
        tracing::debug!(
            target: "particle_manager",
            "Removed particle system '{}' (#{})",
            entry.system.name(),
            id.0
        );
        Some(entry.system)
    }

    pub fn contains(&self, id: SystemId) -> bool {
        self.systems.iter().any(|entry| entry.id == id)
    }

    pub fn get(&self, id: SystemId) -> Option<&dyn ManagedParticleSystem> {
        self.systems
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.system.as_ref())
    }

    pub fn get_mut(&mut self, id: SystemId) -> Option<&mut (dyn ManagedParticleSystem + 'static)> {
        self.systems
            .iter_mut()
            .find(|entry| entry.id == id)
            .map(|entry| entry.system.as_mut())
    }

    /// 按具体类型获取系统
    pub fn get_typed<P: Particle, V: 'static>(&self, id: SystemId) -> Option<&ParticleSystem<P, V>> {
        self.get(id)?.as_any().downcast_ref()
    }

    pub fn get_typed_mut<P: Particle, V: 'static>(
        &mut self,
        id: SystemId,
    ) -> Option<&mut ParticleSystem<P, V>> {
        self.get_mut(id)?.as_any_mut().downcast_mut()
    }

    /// 按注册顺序列出句柄
    pub fn ids(&self) -> Vec<SystemId> {
        self.systems.iter().map(|entry| entry.id).collect()
    }

    /// 按绘制顺序列出句柄（`draw_order` 升序，相同时按注册顺序）
    pub fn draw_order_ids(&self) -> Vec<SystemId> {
        self.draw_order_indices()
            .into_iter()
            .map(|index| self.systems[index].id)
            .collect()
    }

    fn draw_order_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.systems.len()).collect();
        indices.sort_by_key(|&index| self.systems[index].system.draw_order());
        indices
    }

    /// 更新所有粒子系统
    ///
    /// 更新结束后，已被销毁的系统会从管理器中分离。
    pub fn update_all_particle_systems(&mut self, elapsed_seconds: f32) {
        let started = Instant::now();
        self.frame += 1;

        for entry in self.systems.iter_mut() {
            let system = &mut entry.system;
            let result = catch_unwind(AssertUnwindSafe(|| system.update(elapsed_seconds)));
            if let Err(payload) = result {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    target: "particle_manager",
                    "Particle system '{}' panicked during update: {}",
                    entry.system.name(),
                    message
                );
                self.faults.record(FaultRecord::new(
                    format!("{}/update", entry.system.name()),
                    message,
                    self.frame,
                ));
            }
        }

        self.systems.retain(|entry| {
            let keep = !entry.system.is_destroyed();
            if !keep {
                tracing::debug!(
                    target: "particle_manager",
                    "Detached destroyed particle system '{}' (#{})",
                    entry.system.name(),
                    entry.id.0
                );
            }
            keep
        });

        if let Some(profiler) = self.profiler.as_mut() {
            profiler.record("update_all", started.elapsed());
        }
    }

    /// 按绘制顺序绘制所有粒子系统，返回顶点总数
    pub fn draw_all_particle_systems(&mut self) -> usize {
        let started = Instant::now();
        let mut vertex_count = 0;

        for index in self.draw_order_indices() {
            let entry = &mut self.systems[index];
            let system = &mut entry.system;
            match catch_unwind(AssertUnwindSafe(|| system.draw())) {
                Ok(count) => vertex_count += count,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(
                        target: "particle_manager",
                        "Particle system '{}' panicked during draw: {}",
                        entry.system.name(),
                        message
                    );
                    self.faults.record(FaultRecord::new(
                        format!("{}/draw", entry.system.name()),
                        message,
                        self.frame,
                    ));
                }
            }
        }

        if let Some(profiler) = self.profiler.as_mut() {
            profiler.record("draw_all", started.elapsed());
        }
        vertex_count
    }

    /// 销毁并移除所有粒子系统
    pub fn destroy_and_remove_all_particle_systems(&mut self) {
        let count = self.systems.len();
        for entry in self.systems.iter_mut() {
            entry.system.destroy();
        }
        self.systems.clear();
        tracing::info!(
            target: "particle_manager",
            "Destroyed and removed {} particle systems",
            count
        );
    }

    /// 设置相机矩阵并分发给所有系统
    pub fn set_camera_matrices(&mut self, camera: CameraMatrices) {
        self.camera = camera;
        for entry in self.systems.iter_mut() {
            entry.system.set_camera_matrices(camera);
        }
    }

    pub fn set_camera_position(&mut self, position: Vec3) {
        self.camera.camera_position = position;
        for entry in self.systems.iter_mut() {
            entry.system.set_camera_position(position);
        }
    }

    pub fn camera(&self) -> &CameraMatrices {
        &self.camera
    }

    /// 为所有已注册系统设置模拟速度
    pub fn set_simulation_speed_for_all_particle_systems(&mut self, speed: f32) -> ParticleResult<()> {
        if !(speed >= 0.0) || !speed.is_finite() {
            return Err(ParticleError::InvalidSetting(format!(
                "simulation speed must be finite and non-negative, got {}",
                speed
            )));
        }
        self.simulation_speed = speed;
        for entry in self.systems.iter_mut() {
            entry.system.set_simulation_speed(speed)?;
        }
        Ok(())
    }

    /// 为所有已注册系统设置每秒更新次数
    pub fn set_updates_per_second_for_all_particle_systems(
        &mut self,
        updates_per_second: f32,
    ) -> ParticleResult<()> {
        if !(updates_per_second >= 0.0) || !updates_per_second.is_finite() {
            return Err(ParticleError::InvalidSetting(format!(
                "updates per second must be finite and non-negative, got {}",
                updates_per_second
            )));
        }
        self.updates_per_second = updates_per_second;
        for entry in self.systems.iter_mut() {
            entry.system.set_updates_per_second(updates_per_second)?;
        }
        Ok(())
    }

    /// 把管理器的速度设置应用到所有系统（通常在注册完成后调用一次）
    pub fn apply_settings_to_all_particle_systems(&mut self) -> ParticleResult<()> {
        self.set_simulation_speed_for_all_particle_systems(self.simulation_speed)?;
        self.set_updates_per_second_for_all_particle_systems(self.updates_per_second)
    }

    pub fn simulation_speed(&self) -> f32 {
        self.simulation_speed
    }

    pub fn updates_per_second(&self) -> f32 {
        self.updates_per_second
    }

    pub fn particle_system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn total_active_particles(&self) -> usize {
        self.systems
            .iter()
            .map(|entry| entry.system.active_particle_count())
            .sum()
    }

    /// 所有系统已分配的粒子总数（活动 + 非活动）
    pub fn total_allocated_particles(&self) -> usize {
        self.systems
            .iter()
            .map(|entry| entry.system.allocated_particle_count())
            .sum()
    }

    /// 管理器与所有系统记录的故障总数
    pub fn total_fault_count(&self) -> u64 {
        self.faults.total_count()
            + self
                .systems
                .iter()
                .map(|entry| entry.system.fault_count())
                .sum::<u64>()
    }

    /// 管理器边界捕获的故障
    pub fn faults(&self) -> &FaultLog {
        &self.faults
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            particle_system_count: self.particle_system_count(),
            total_active_particles: self.total_active_particles(),
            total_allocated_particles: self.total_allocated_particles(),
            total_faults: self.total_fault_count(),
        }
    }

    /// 开始记录 `update_all` / `draw_all` 耗时
    pub fn enable_profiling(&mut self) {
        if self.profiler.is_none() {
            self.profiler = Some(Profiler::new());
        }
    }

    pub fn disable_profiling(&mut self) {
        self.profiler = None;
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::particle::DefaultParticle;
    use crate::particles::system::EmissionContext;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn system_with(name: &str, draw_order: i32, rate: f32) -> ParticleSystem<DefaultParticle, u8> {
        let mut system = ParticleSystem::new(name);
        system
            .auto_initialize(10, 100, |particle: &mut DefaultParticle, _ctx: &mut EmissionContext<'_>| {
                particle.life.reset(100.0)
            })
            .unwrap();
        system.emitter_mut().particles_per_second = rate;
        system.set_draw_order(draw_order);
        system
    }

    fn recording(
        name: &'static str,
        draw_order: i32,
        log: &Rc<RefCell<Vec<&'static str>>>,
    ) -> ParticleSystem<DefaultParticle, u8> {
        let mut system = system_with(name, draw_order, 10.0);
        system.set_vertex_updater(|_: &DefaultParticle, _: &CameraMatrices, out: &mut Vec<u8>| out.push(0));
        let handle = log.clone();
        system.set_draw_submitter(move |_: &[u8]| handle.borrow_mut().push(name));
        system
    }

    #[test]
    fn test_add_remove_contains() {
        let mut manager = ParticleSystemManager::new();
        let a = manager.add_particle_system(system_with("a", 0, 10.0));
        let b = manager.add_particle_system(system_with("b", 0, 10.0));
        assert_ne!(a, b);
        assert_eq!(manager.particle_system_count(), 2);

        let removed = manager.remove_particle_system(a).unwrap();
        assert_eq!(removed.name(), "a");
        assert!(!manager.contains(a));
        assert!(manager.contains(b));
        assert!(manager.remove_particle_system(a).is_none());
    }

    #[test]
    fn test_draw_order_with_ties() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ParticleSystemManager::new();
        manager.add_particle_system(recording("smoke", 10, &log));
        manager.add_particle_system(recording("debris", 0, &log));
        manager.add_particle_system(recording("sparks", 10, &log));
        manager.add_particle_system(recording("decal", -5, &log));

        manager.update_all_particle_systems(1.0);
        assert_eq!(manager.draw_all_particle_systems(), 40);
        assert_eq!(*log.borrow(), vec!["decal", "debris", "smoke", "sparks"]);
    }

    #[test]
    fn test_metrics() {
        let mut manager = ParticleSystemManager::new();
        manager.add_particle_system(system_with("a", 0, 10.0));
        manager.add_particle_system(system_with("b", 0, 20.0));
        manager.update_all_particle_systems(1.0);

        let stats = manager.stats();
        assert_eq!(stats.particle_system_count, 2);
        assert_eq!(stats.total_active_particles, 30);
        assert!(stats.total_allocated_particles >= 30);
        assert_eq!(stats.total_faults, 0);
    }

    #[test]
    fn test_panicking_system_does_not_block_others() {
        let mut manager = ParticleSystemManager::new();
        let mut faulty = system_with("faulty", 0, 0.0);
        faulty
            .system_events_mut()
            .add_every_time_event(|_, _| panic!("system event failure"), 0, 0);
        let mut bad_draw = system_with("bad_draw", 0, 10.0);
        bad_draw.set_vertex_updater(|_: &DefaultParticle, _: &CameraMatrices, _: &mut Vec<u8>| {
            panic!("vertex failure")
        });
        manager.add_particle_system(faulty);
        manager.add_particle_system(bad_draw);
        let healthy = manager.add_particle_system(system_with("healthy", 0, 10.0));

        manager.update_all_particle_systems(1.0);
        manager.draw_all_particle_systems();

        let healthy = manager.get_typed::<DefaultParticle, u8>(healthy).unwrap();
        assert_eq!(healthy.active_particle_count(), 10);
        assert_eq!(manager.faults().total_count(), 1);
        assert_eq!(manager.total_fault_count(), 2);

        manager.update_all_particle_systems(1.0);
        manager.draw_all_particle_systems();
        let last = manager.faults().last().unwrap();
        assert_eq!(last.source, "bad_draw/draw");
        assert_eq!(last.tick, 2);
    }

    #[test]
    fn test_destroyed_systems_are_detached() {
        let mut manager = ParticleSystemManager::new();
        let a = manager.add_particle_system(system_with("a", 0, 10.0));
        let b = manager.add_particle_system(system_with("b", 0, 10.0));

        manager.get_mut(a).unwrap().destroy();
        assert!(manager.contains(a));
        manager.update_all_particle_systems(0.1);
        assert!(!manager.contains(a));
        assert!(manager.contains(b));
    }

    #[test]
    fn test_destroy_and_remove_all() {
        let mut manager = ParticleSystemManager::new();
        manager.add_particle_system(system_with("a", 0, 10.0));
        manager.add_particle_system(system_with("b", 0, 10.0));
        manager.update_all_particle_systems(1.0);

        manager.destroy_and_remove_all_particle_systems();
        assert_eq!(manager.particle_system_count(), 0);
        assert_eq!(manager.total_active_particles(), 0);
    }

    #[test]
    fn test_camera_fan_out() {
        let mut manager = ParticleSystemManager::new();
        let id = manager.add_particle_system(system_with("a", 0, 10.0));
        manager.set_camera_position(Vec3::new(1.0, 2.0, 3.0));

        let system = manager.get_typed::<DefaultParticle, u8>(id).unwrap();
        assert_eq!(system.camera().camera_position, Vec3::new(1.0, 2.0, 3.0));

        let late = manager.add_particle_system(system_with("late", 0, 10.0));
        let system = manager.get_typed::<DefaultParticle, u8>(late).unwrap();
        assert_eq!(system.camera().camera_position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_speed_for_all() {
        let mut manager = ParticleSystemManager::new();
        let id = manager.add_particle_system(system_with("a", 0, 10.0));
        manager.set_simulation_speed_for_all_particle_systems(0.5).unwrap();
        manager.update_all_particle_systems(1.0);
        assert_eq!(manager.total_active_particles(), 5);
        assert!(manager
            .set_simulation_speed_for_all_particle_systems(-2.0)
            .is_err());
        assert!(manager.get_typed::<DefaultParticle, ()>(id).is_none());
    }

    #[test]
    fn test_profiling_records_scopes() {
        let config = ManagerConfig {
            profiling: true,
            ..Default::default()
        };
        let mut manager = ParticleSystemManager::from_config(&config).unwrap();
        manager.add_particle_system(system_with("a", 0, 10.0));
        manager.update_all_particle_systems(0.1);
        manager.draw_all_particle_systems();

        let profiler = manager.profiler().unwrap();
        assert_eq!(profiler.get_stats("update_all").unwrap().call_count, 1);
        assert_eq!(profiler.get_stats("draw_all").unwrap().call_count, 1);
    }
}
