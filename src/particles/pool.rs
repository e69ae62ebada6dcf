//! 粒子池
//!
//! 一块连续的后备存储，前 `active` 个元素为活动粒子（按发射顺序，最旧的在前），
//! 其余为非活动粒子。活动与非活动分区始终覆盖全部容量，每个粒子只属于其中之一。
//! 稳定状态下获取和回收都不分配内存。

use serde::{Deserialize, Serialize};

use super::particle::Particle;
use crate::core::error::{ParticleError, ParticleResult};

/// 内存管理模式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MemoryManagementMode {
    /// 容量固定为初始值，既不增长也不收缩
    None,
    /// 按需增长，从不收缩
    IncreaseOnly,
    /// 按需增长；利用率持续偏低时直接收缩到峰值附近
    ShrinkImmediately,
    /// 按需增长；利用率持续偏低时每次收缩差值的 `rate` 比例
    ShrinkGradually { rate: f32 },
}

impl MemoryManagementMode {
    pub fn allows_growth(&self) -> bool {
        !matches!(self, MemoryManagementMode::None)
    }

    pub fn allows_shrink(&self) -> bool {
        matches!(
            self,
            MemoryManagementMode::ShrinkImmediately | MemoryManagementMode::ShrinkGradually { .. }
        )
    }
}

/// 自动内存管理设置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMemoryManagerSettings {
    pub mode: MemoryManagementMode,
    /// 收缩的下限（实际下限还要不小于活动粒子数和 1）
    pub min_capacity: usize,
    /// 观察窗口长度（秒），窗口结束时才考虑收缩
    pub shrink_delay_seconds: f32,
    /// 收缩目标 = 窗口内峰值 × 该系数
    pub shrink_headroom: f32,
    /// 增长倍率
    pub grow_factor: f32,
    /// 每次增长的最小数量
    pub min_grow_amount: usize,
}

impl Default for AutoMemoryManagerSettings {
    fn default() -> Self {
        Self {
            mode: MemoryManagementMode::ShrinkGradually { rate: 0.5 },
            min_capacity: 0,
            shrink_delay_seconds: 5.0,
            shrink_headroom: 1.25,
            grow_factor: 2.0,
            min_grow_amount: 16,
        }
    }
}

impl AutoMemoryManagerSettings {
    /// 固定容量
    pub fn fixed() -> Self {
        Self {
            mode: MemoryManagementMode::None,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ParticleResult<()> {
        if let MemoryManagementMode::ShrinkGradually { rate } = self.mode {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(ParticleError::InvalidMemorySettings(format!(
                    "shrink rate must be in (0, 1], got {}",
                    rate
                )));
            }
        }
        if !(self.shrink_delay_seconds >= 0.0) || !self.shrink_delay_seconds.is_finite() {
            return Err(ParticleError::InvalidMemorySettings(format!(
                "shrink delay must be finite and non-negative, got {}",
                self.shrink_delay_seconds
            )));
        }
        if !(self.shrink_headroom >= 1.0) || !self.shrink_headroom.is_finite() {
            return Err(ParticleError::InvalidMemorySettings(format!(
                "shrink headroom must be at least 1.0, got {}",
                self.shrink_headroom
            )));
        }
        if !(self.grow_factor >= 1.0) || !self.grow_factor.is_finite() {
            return Err(ParticleError::InvalidMemorySettings(format!(
                "grow factor must be at least 1.0, got {}",
                self.grow_factor
            )));
        }
        Ok(())
    }
}

/// 粒子池统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub active: usize,
    pub inactive: usize,
    pub capacity: usize,
    pub max_capacity: usize,
    pub grow_count: u64,
    pub shrink_count: u64,
    /// 因达到上限而被丢弃的获取请求
    pub dropped_acquisitions: u64,
}

/// 粒子池
pub struct ParticlePool<P: Particle> {
    storage: Vec<P>,
    active: usize,
    max_capacity: usize,
    settings: AutoMemoryManagerSettings,
    peak_active_in_window: usize,
    window_elapsed: f32,
    grow_count: u64,
    shrink_count: u64,
    dropped_acquisitions: u64,
}

impl<P: Particle> ParticlePool<P> {
    /// 创建粒子池并预分配 `initial_capacity` 个粒子
    pub fn new(
        initial_capacity: usize,
        max_capacity: usize,
        settings: AutoMemoryManagerSettings,
    ) -> ParticleResult<Self> {
        if initial_capacity == 0 {
            return Err(ParticleError::ZeroCapacity(initial_capacity));
        }
        if max_capacity == 0 {
            return Err(ParticleError::ZeroCapacity(max_capacity));
        }
        if initial_capacity > max_capacity {
            return Err(ParticleError::CapacityOrder {
                initial: initial_capacity,
                max: max_capacity,
            });
        }
        settings.validate()?;

        let mut storage = Vec::with_capacity(initial_capacity);
        storage.resize_with(initial_capacity, P::default);

        Ok(Self {
            storage,
            active: 0,
            max_capacity,
            settings,
            peak_active_in_window: 0,
            window_elapsed: 0.0,
            grow_count: 0,
            shrink_count: 0,
            dropped_acquisitions: 0,
        })
    }

    /// 取出一个非活动粒子，重置后加入活动分区末尾
    ///
    /// 池已满且不能再增长时返回 `None`，请求被静默丢弃。
    pub fn acquire(&mut self) -> Option<&mut P> {
        if self.active == self.storage.len() && !self.grow_to_fit(self.active + 1) {
            self.dropped_acquisitions += 1;
            tracing::trace!(
                target: "particle_pool",
                "Pool exhausted at {} particles, acquisition dropped",
                self.active
            );
            return None;
        }

        let index = self.active;
        self.active += 1;
        self.peak_active_in_window = self.peak_active_in_window.max(self.active);

        let particle = &mut self.storage[index];
        particle.reset();
        Some(particle)
    }

    /// 确保还能再获取 `additional` 个粒子（受上限约束）
    ///
    /// 返回实际可获取的数量。
    pub fn reserve(&mut self, additional: usize) -> usize {
        let wanted = self.active.saturating_add(additional);
        if wanted > self.storage.len() {
            self.grow_to_fit(wanted);
        }
        (self.storage.len() - self.active).min(additional)
    }

    /// 回收指定位置的活动粒子，保持其余活动粒子的相对顺序
    pub fn release(&mut self, index: usize) -> bool {
        if index >= self.active {
            return false;
        }
        self.storage[index..self.active].rotate_left(1);
        self.active -= 1;
        true
    }

    /// 回收最新获取的粒子
    pub fn release_newest(&mut self) -> bool {
        if self.active == 0 {
            return false;
        }
        self.active -= 1;
        true
    }

    /// 回收所有满足条件的活动粒子，返回回收数量
    pub fn release_where<F>(&mut self, mut should_release: F) -> usize
    where
        F: FnMut(&P) -> bool,
    {
        let mut write = 0;
        for read in 0..self.active {
            if !should_release(&self.storage[read]) {
                if write != read {
                    self.storage.swap(write, read);
                }
                write += 1;
            }
        }
        let released = self.active - write;
        self.active = write;
        released
    }

    /// 回收所有已死亡的粒子
    pub fn release_dead(&mut self) -> usize {
        self.release_where(|p| p.life().is_dead())
    }

    /// 回收全部活动粒子
    pub fn release_all(&mut self) {
        self.active = 0;
    }

    /// 每次更新调用：记录利用率，并在观察窗口结束时按策略收缩
    pub fn resize_if_needed(&mut self, elapsed_seconds: f32) {
        self.peak_active_in_window = self.peak_active_in_window.max(self.active);
        if !self.settings.mode.allows_shrink() {
            return;
        }

        self.window_elapsed += elapsed_seconds.max(0.0);
        if self.window_elapsed < self.settings.shrink_delay_seconds {
            return;
        }

        let capacity = self.storage.len();
        let target = ((self.peak_active_in_window as f32 * self.settings.shrink_headroom).ceil()
            as usize)
            .max(self.settings.min_capacity)
            .max(self.active)
            .max(1);

        if target < capacity {
            let new_capacity = match self.settings.mode {
                MemoryManagementMode::ShrinkGradually { rate } => {
                    let step = ((capacity - target) as f32 * rate).ceil() as usize;
                    (capacity - step.max(1)).max(target)
                }
                _ => target,
            };
            self.storage.truncate(new_capacity);
            self.storage.shrink_to_fit();
            self.shrink_count += 1;
            tracing::debug!(
                target: "particle_pool",
                "Shrunk pool from {} to {} (active {}, window peak {})",
                capacity,
                new_capacity,
                self.active,
                self.peak_active_in_window
            );
        }

        self.window_elapsed = 0.0;
        self.peak_active_in_window = self.active;
    }

    fn grow_to_fit(&mut self, needed: usize) -> bool {
        let capacity = self.storage.len();
        if !self.settings.mode.allows_growth() || capacity >= self.max_capacity {
            return false;
        }

        let grown = ((capacity as f32 * self.settings.grow_factor).ceil() as usize)
            .max(capacity + self.settings.min_grow_amount.max(1));
        let new_capacity = grown.max(needed).min(self.max_capacity);
        if new_capacity <= capacity {
            return false;
        }

        self.storage.resize_with(new_capacity, P::default);
        self.grow_count += 1;
        tracing::debug!(
            target: "particle_pool",
            "Grew pool from {} to {} (max {})",
            capacity,
            new_capacity,
            self.max_capacity
        );
        true
    }

    /// 调整上限；低于当前活动数时丢弃最新的粒子
    pub fn set_max_capacity(&mut self, max_capacity: usize) -> ParticleResult<()> {
        if max_capacity == 0 {
            return Err(ParticleError::ZeroCapacity(max_capacity));
        }
        self.max_capacity = max_capacity;
        if self.active > max_capacity {
            tracing::debug!(
                target: "particle_pool",
                "Max capacity {} below active count {}, releasing newest particles",
                max_capacity,
                self.active
            );
            self.active = max_capacity;
        }
        if self.storage.len() > max_capacity {
            self.storage.truncate(max_capacity);
            self.storage.shrink_to_fit();
        }
        Ok(())
    }

    pub fn set_settings(&mut self, settings: AutoMemoryManagerSettings) -> ParticleResult<()> {
        settings.validate()?;
        self.settings = settings;
        self.window_elapsed = 0.0;
        Ok(())
    }

    pub fn settings(&self) -> &AutoMemoryManagerSettings {
        &self.settings
    }

    pub fn active(&self) -> &[P] {
        &self.storage[..self.active]
    }

    pub fn active_mut(&mut self) -> &mut [P] {
        &mut self.storage[..self.active]
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn inactive_count(&self) -> usize {
        self.storage.len() - self.active
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.active,
            inactive: self.inactive_count(),
            capacity: self.capacity(),
            max_capacity: self.max_capacity,
            grow_count: self.grow_count,
            shrink_count: self.shrink_count,
            dropped_acquisitions: self.dropped_acquisitions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::particle::DefaultParticle;

    fn pool(initial: usize, max: usize, mode: MemoryManagementMode) -> ParticlePool<DefaultParticle> {
        ParticlePool::new(
            initial,
            max,
            AutoMemoryManagerSettings {
                mode,
                shrink_delay_seconds: 1.0,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result =
            ParticlePool::<DefaultParticle>::new(0, 10, AutoMemoryManagerSettings::default());
        assert!(matches!(result, Err(ParticleError::ZeroCapacity(0))));
        let result =
            ParticlePool::<DefaultParticle>::new(20, 10, AutoMemoryManagerSettings::default());
        assert!(matches!(result, Err(ParticleError::CapacityOrder { .. })));
    }

    #[test]
    fn test_invalid_shrink_rate_rejected() {
        let settings = AutoMemoryManagerSettings {
            mode: MemoryManagementMode::ShrinkGradually { rate: 0.0 },
            ..Default::default()
        };
        assert!(ParticlePool::<DefaultParticle>::new(1, 10, settings).is_err());
    }

    #[test]
    fn test_acquire_and_release_partition() {
        let mut pool = pool(4, 4, MemoryManagementMode::None);
        for _ in 0..4 {
            assert!(pool.acquire().is_some());
        }
        assert!(pool.acquire().is_none());
        assert_eq!(pool.stats().dropped_acquisitions, 1);
        assert_eq!(pool.active_count() + pool.inactive_count(), pool.capacity());

        assert!(pool.release(0));
        assert!(!pool.release(10));
        assert_eq!(pool.active_count(), 3);
        assert_eq!(pool.inactive_count(), 1);
    }

    #[test]
    fn test_acquire_resets_particle() {
        let mut pool = pool(1, 1, MemoryManagementMode::None);
        pool.acquire().unwrap().friction = 9.0;
        pool.release_all();
        assert_eq!(pool.acquire().unwrap().friction, 0.0);
    }

    #[test]
    fn test_release_preserves_order() {
        let mut pool = pool(5, 5, MemoryManagementMode::None);
        for i in 0..5 {
            pool.acquire().unwrap().rotation = i as f32;
        }
        let released = pool.release_where(|p| p.rotation == 1.0 || p.rotation == 3.0);
        assert_eq!(released, 2);
        let order: Vec<f32> = pool.active().iter().map(|p| p.rotation).collect();
        assert_eq!(order, vec![0.0, 2.0, 4.0]);

        pool.release(0);
        let order: Vec<f32> = pool.active().iter().map(|p| p.rotation).collect();
        assert_eq!(order, vec![2.0, 4.0]);
    }

    #[test]
    fn test_release_dead() {
        let mut pool = pool(3, 3, MemoryManagementMode::None);
        for _ in 0..3 {
            pool.acquire();
        }
        pool.active_mut()[1].life.kill();
        assert_eq!(pool.release_dead(), 1);
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn test_growth_is_capped() {
        let mut pool = pool(2, 5, MemoryManagementMode::IncreaseOnly);
        for _ in 0..5 {
            assert!(pool.acquire().is_some());
        }
        assert!(pool.acquire().is_none());
        assert_eq!(pool.capacity(), 5);
        assert!(pool.stats().grow_count >= 1);
    }

    #[test]
    fn test_reserve_grows_once_for_batch() {
        let mut pool = pool(1, 1000, MemoryManagementMode::IncreaseOnly);
        assert_eq!(pool.reserve(300), 300);
        assert_eq!(pool.stats().grow_count, 1);
        assert!(pool.capacity() >= 300);
        assert_eq!(pool.reserve(5000), pool.capacity() - pool.active_count());
    }

    #[test]
    fn test_shrink_immediately() {
        let mut pool = pool(100, 100, MemoryManagementMode::ShrinkImmediately);
        for _ in 0..8 {
            pool.acquire();
        }
        pool.resize_if_needed(0.5);
        assert_eq!(pool.capacity(), 100);
        pool.resize_if_needed(0.5);
        // 峰值 8 × 1.25
        assert_eq!(pool.capacity(), 10);
        assert_eq!(pool.active_count(), 8);
    }

    #[test]
    fn test_shrink_gradually() {
        let mut pool = pool(100, 100, MemoryManagementMode::ShrinkGradually { rate: 0.5 });
        pool.resize_if_needed(1.0);
        // 目标为 1，每次收缩一半差值
        assert_eq!(pool.capacity(), 50);
        pool.resize_if_needed(1.0);
        assert_eq!(pool.capacity(), 25);
    }

    #[test]
    fn test_shrink_never_below_active_or_min() {
        let mut pool = ParticlePool::<DefaultParticle>::new(
            50,
            50,
            AutoMemoryManagerSettings {
                mode: MemoryManagementMode::ShrinkImmediately,
                min_capacity: 20,
                shrink_delay_seconds: 0.0,
                ..Default::default()
            },
        )
        .unwrap();
        pool.resize_if_needed(0.1);
        assert_eq!(pool.capacity(), 20);

        for _ in 0..20 {
            pool.acquire();
        }
        pool.resize_if_needed(0.1);
        assert!(pool.capacity() >= pool.active_count());
    }

    #[test]
    fn test_never_mode_keeps_capacity() {
        let mut pool = pool(10, 100, MemoryManagementMode::None);
        pool.resize_if_needed(100.0);
        assert_eq!(pool.capacity(), 10);
        assert_eq!(pool.reserve(50), 10);
    }

    #[test]
    fn test_lowering_max_capacity() {
        let mut pool = pool(10, 10, MemoryManagementMode::IncreaseOnly);
        for _ in 0..10 {
            pool.acquire();
        }
        pool.set_max_capacity(4).unwrap();
        assert_eq!(pool.active_count(), 4);
        assert_eq!(pool.capacity(), 4);
        assert!(pool.set_max_capacity(0).is_err());
    }
}
