//! 事件管线
//!
//! 粒子事件（[`ParticleEvents`]）在每次更新时对每个活动粒子按 `order` 升序执行；
//! 系统事件（[`SystemEvents`]）每次更新对整个系统执行一次。
//! `order` 相同的事件按注册顺序执行。
//!
//! 每一次回调调用都在 `catch_unwind` 边界内执行：某个回调 panic 只会跳过
//! 这一次调用并写入 [`FaultLog`]，其余粒子和事件照常运行。
//! 以 `panic = "abort"` 构建时没有这层隔离。

use std::panic::{catch_unwind, AssertUnwindSafe};

use glam::{Quat, Vec3};

use super::emitter::Emitter;
use super::particle::Particle;
use crate::core::error::{ParticleError, ParticleResult};
use crate::core::fault::{panic_message, FaultLog, FaultRecord};

/// 事件句柄，可用于单独移除事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// 粒子事件触发条件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParticleTrigger {
    /// 每次更新对每个粒子执行
    EveryTime,
    /// 下一次更新时对所有活动粒子执行一次，然后自动注销
    OneTime,
    /// 粒子的归一化时间首次达到阈值时执行一次
    NormalizedTime(f32),
    /// 粒子的已流逝秒数首次达到阈值时执行一次
    ElapsedTime(f32),
}

/// 系统事件触发条件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SystemTrigger {
    EveryTime,
    OneTime,
    /// 系统已流逝时间首次达到阈值（秒）时执行；系统生命周期重复时会再次触发
    ElapsedTime(f32),
}

trait Trigger: Copy {
    fn is_one_time(&self) -> bool;
}

impl Trigger for ParticleTrigger {
    fn is_one_time(&self) -> bool {
        matches!(self, ParticleTrigger::OneTime)
    }
}

impl Trigger for SystemTrigger {
    fn is_one_time(&self) -> bool {
        matches!(self, SystemTrigger::OneTime)
    }
}

struct EventEntry<F: ?Sized, T> {
    id: EventId,
    group: u32,
    order: i32,
    trigger: T,
    faults: u64,
    callback: Box<F>,
}

/// 按 `order` 排序的事件列表
struct EventList<F: ?Sized, T> {
    entries: Vec<EventEntry<F, T>>,
    next_id: u64,
}

impl<F: ?Sized, T: Trigger> EventList<F, T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    fn insert(&mut self, trigger: T, order: i32, group: u32, callback: Box<F>) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        let index = self.entries.partition_point(|e| e.order <= order);
        self.entries.insert(
            index,
            EventEntry {
                id,
                group,
                order,
                trigger,
                faults: 0,
                callback,
            },
        );
        id
    }

    fn remove(&mut self, id: EventId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    fn remove_group(&mut self, group: u32) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.group != group);
        before - self.entries.len()
    }

    fn remove_one_time(&mut self) {
        self.entries.retain(|e| !e.trigger.is_one_time());
    }

    fn contains_group(&self, group: u32) -> bool {
        self.entries.iter().any(|e| e.group == group)
    }

    fn ids(&self) -> Vec<EventId> {
        self.entries.iter().map(|e| e.id).collect()
    }
}

/// 在隔离边界内执行一次回调，失败时记录故障
fn invoke_isolated<R>(
    kind: &str,
    id: EventId,
    faults_for_event: &mut u64,
    fault_log: &mut FaultLog,
    tick: u64,
    call: impl FnOnce() -> R,
) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(value) => Some(value),
        Err(payload) => {
            *faults_for_event += 1;
            let message = panic_message(payload.as_ref());
            if *faults_for_event == 1 {
                tracing::error!(
                    target: "particle_events",
                    "{} event #{} panicked, skipping: {}",
                    kind,
                    id.0,
                    message
                );
            } else {
                tracing::debug!(
                    target: "particle_events",
                    "{} event #{} panicked again ({} faults): {}",
                    kind,
                    id.0,
                    faults_for_event,
                    message
                );
            }
            fault_log.record(FaultRecord::new(format!("{}_event#{}", kind, id.0), message, tick));
            None
        }
    }
}

/// 粒子事件回调：`(粒子, 本次更新的秒数)`
pub type ParticleCallback<P> = dyn FnMut(&mut P, f32);

/// 粒子级事件管线
pub struct ParticleEvents<P: Particle> {
    list: EventList<ParticleCallback<P>, ParticleTrigger>,
}

impl<P: Particle> Default for ParticleEvents<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Particle> ParticleEvents<P> {
    pub fn new() -> Self {
        Self {
            list: EventList::new(),
        }
    }

    /// 每次更新对每个活动粒子执行
    pub fn add_every_time_event<F>(&mut self, callback: F, order: i32, group: u32) -> EventId
    where
        F: FnMut(&mut P, f32) + 'static,
    {
        self.list
            .insert(ParticleTrigger::EveryTime, order, group, Box::new(callback))
    }

    /// 每个粒子的归一化时间首次达到 `normalized_time` 时执行一次
    pub fn add_normalized_timed_event<F>(
        &mut self,
        normalized_time: f32,
        callback: F,
        order: i32,
        group: u32,
    ) -> ParticleResult<EventId>
    where
        F: FnMut(&mut P, f32) + 'static,
    {
        if !(0.0..=1.0).contains(&normalized_time) {
            return Err(ParticleError::InvalidNormalizedTime(normalized_time));
        }
        Ok(self.list.insert(
            ParticleTrigger::NormalizedTime(normalized_time),
            order,
            group,
            Box::new(callback),
        ))
    }

    /// 每个粒子的已流逝秒数首次达到 `seconds` 时执行一次
    pub fn add_timed_event<F>(
        &mut self,
        seconds: f32,
        callback: F,
        order: i32,
        group: u32,
    ) -> ParticleResult<EventId>
    where
        F: FnMut(&mut P, f32) + 'static,
    {
        if !(seconds >= 0.0) || !seconds.is_finite() {
            return Err(ParticleError::InvalidEventTime(seconds));
        }
        Ok(self.list.insert(
            ParticleTrigger::ElapsedTime(seconds),
            order,
            group,
            Box::new(callback),
        ))
    }

    /// 下一次更新时对所有活动粒子执行一次，然后自动注销
    ///
    /// 即使那次更新时没有活动粒子也会注销。
    pub fn add_one_time_event<F>(&mut self, callback: F, order: i32, group: u32) -> EventId
    where
        F: FnMut(&mut P, f32) + 'static,
    {
        self.list
            .insert(ParticleTrigger::OneTime, order, group, Box::new(callback))
    }

    pub fn remove_event(&mut self, id: EventId) -> bool {
        self.list.remove(id)
    }

    pub fn remove_all_events(&mut self) {
        self.list.entries.clear();
    }

    /// 移除组内所有事件，返回移除数量
    pub fn remove_all_events_in_group(&mut self, group: u32) -> usize {
        self.list.remove_group(group)
    }

    pub fn contains_group(&self, group: u32) -> bool {
        self.list.contains_group(group)
    }

    /// 按执行顺序列出事件句柄
    pub fn execution_order(&self) -> Vec<EventId> {
        self.list.ids()
    }

    pub fn len(&self) -> usize {
        self.list.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.entries.is_empty()
    }

    /// 对一个已推进过时间的粒子执行所有到期事件
    pub(crate) fn run_for_particle(
        &mut self,
        particle: &mut P,
        elapsed_seconds: f32,
        fault_log: &mut FaultLog,
        tick: u64,
    ) {
        for entry in self.list.entries.iter_mut() {
            let due = match entry.trigger {
                ParticleTrigger::EveryTime | ParticleTrigger::OneTime => true,
                ParticleTrigger::NormalizedTime(t) => particle.life().crossed_normalized_time(t),
                ParticleTrigger::ElapsedTime(t) => particle.life().crossed_elapsed_time(t),
            };
            if !due {
                continue;
            }
            let callback = &mut entry.callback;
            invoke_isolated(
                "particle",
                entry.id,
                &mut entry.faults,
                fault_log,
                tick,
                || callback(&mut *particle, elapsed_seconds),
            );
        }
    }

    /// 一次管线调用结束：注销一次性事件
    pub(crate) fn finish_pass(&mut self) {
        self.list.remove_one_time();
    }
}

/// 系统事件回调可访问的系统状态
pub struct SystemEventContext<'a> {
    pub emitter: &'a mut Emitter,
    /// 系统已流逝时间（秒）
    pub elapsed_time: f32,
    pub active_particles: usize,
    pub max_particles: usize,
}

impl<'a> SystemEventContext<'a> {
    /// 请求在本次更新中额外发射 `count` 个粒子
    pub fn burst(&mut self, count: u32) {
        self.emitter.burst_particles = self.emitter.burst_particles.saturating_add(count);
    }

    /// 移动发射器
    pub fn move_emitter(&mut self, position: Vec3, orientation: Quat) {
        self.emitter.position = position;
        self.emitter.orientation = orientation;
    }
}

/// 系统事件回调：`(系统状态, 本次更新的秒数)`
pub type SystemCallback = dyn for<'a> FnMut(&mut SystemEventContext<'a>, f32);

/// 系统级事件管线
pub struct SystemEvents {
    list: EventList<SystemCallback, SystemTrigger>,
}

impl Default for SystemEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemEvents {
    pub fn new() -> Self {
        Self {
            list: EventList::new(),
        }
    }

    pub fn add_every_time_event<F>(&mut self, callback: F, order: i32, group: u32) -> EventId
    where
        F: for<'a> FnMut(&mut SystemEventContext<'a>, f32) + 'static,
    {
        self.list
            .insert(SystemTrigger::EveryTime, order, group, Box::new(callback))
    }

    pub fn add_one_time_event<F>(&mut self, callback: F, order: i32, group: u32) -> EventId
    where
        F: for<'a> FnMut(&mut SystemEventContext<'a>, f32) + 'static,
    {
        self.list
            .insert(SystemTrigger::OneTime, order, group, Box::new(callback))
    }

    /// 系统已流逝时间首次达到 `seconds` 时执行
    pub fn add_timed_event<F>(
        &mut self,
        seconds: f32,
        callback: F,
        order: i32,
        group: u32,
    ) -> ParticleResult<EventId>
    where
        F: for<'a> FnMut(&mut SystemEventContext<'a>, f32) + 'static,
    {
        if !(seconds >= 0.0) || !seconds.is_finite() {
            return Err(ParticleError::InvalidEventTime(seconds));
        }
        Ok(self.list.insert(
            SystemTrigger::ElapsedTime(seconds),
            order,
            group,
            Box::new(callback),
        ))
    }

    pub fn remove_event(&mut self, id: EventId) -> bool {
        self.list.remove(id)
    }

    pub fn remove_all_events(&mut self) {
        self.list.entries.clear();
    }

    pub fn remove_all_events_in_group(&mut self, group: u32) -> usize {
        self.list.remove_group(group)
    }

    pub fn contains_group(&self, group: u32) -> bool {
        self.list.contains_group(group)
    }

    pub fn execution_order(&self) -> Vec<EventId> {
        self.list.ids()
    }

    pub fn len(&self) -> usize {
        self.list.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.entries.is_empty()
    }

    /// 执行一次系统事件管线
    ///
    /// `last_elapsed` 与 `elapsed` 为本次推进前后的系统时间。
    pub(crate) fn run(
        &mut self,
        context: &mut SystemEventContext<'_>,
        elapsed_seconds: f32,
        last_elapsed: f32,
        fault_log: &mut FaultLog,
        tick: u64,
    ) {
        let elapsed = context.elapsed_time;
        for entry in self.list.entries.iter_mut() {
            let due = match entry.trigger {
                SystemTrigger::EveryTime | SystemTrigger::OneTime => true,
                SystemTrigger::ElapsedTime(t) => last_elapsed < t && elapsed >= t,
            };
            if !due {
                continue;
            }
            let callback = &mut entry.callback;
            invoke_isolated(
                "system",
                entry.id,
                &mut entry.faults,
                fault_log,
                tick,
                || callback(&mut *context, elapsed_seconds),
            );
        }
        self.list.remove_one_time();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::particle::{DefaultParticle, ParticleLife};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<i32>>>, impl Fn(i32) -> Box<dyn FnMut(&mut DefaultParticle, f32)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let handle = log.clone();
        let make = move |tag: i32| -> Box<dyn FnMut(&mut DefaultParticle, f32)> {
            let handle = handle.clone();
            Box::new(move |_p: &mut DefaultParticle, _dt: f32| handle.borrow_mut().push(tag))
        };
        (log, make)
    }

    fn advanced_particle(lifetime: f32, dt: f32) -> DefaultParticle {
        let mut particle = DefaultParticle {
            life: ParticleLife::new(lifetime),
            ..Default::default()
        };
        particle.life.advance(dt);
        particle
    }

    #[test]
    fn test_events_run_in_ascending_order() {
        let (log, make) = recorder();
        let mut events = ParticleEvents::<DefaultParticle>::new();
        events.add_every_time_event(make(100), 100, 0);
        events.add_every_time_event(make(0), 0, 0);
        events.add_every_time_event(make(500), 500, 0);

        let mut particle = advanced_particle(10.0, 0.1);
        events.run_for_particle(&mut particle, 0.1, &mut FaultLog::new(), 1);
        assert_eq!(*log.borrow(), vec![0, 100, 500]);
    }

    #[test]
    fn test_equal_order_keeps_registration_order() {
        let (log, make) = recorder();
        let mut events = ParticleEvents::<DefaultParticle>::new();
        events.add_every_time_event(make(1), 5, 0);
        events.add_every_time_event(make(2), 5, 0);
        events.add_every_time_event(make(0), -1, 0);
        events.add_every_time_event(make(3), 5, 0);

        let mut particle = advanced_particle(10.0, 0.1);
        events.run_for_particle(&mut particle, 0.1, &mut FaultLog::new(), 1);
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_invalid_normalized_time_rejected() {
        let mut events = ParticleEvents::<DefaultParticle>::new();
        assert_eq!(
            events
                .add_normalized_timed_event(1.5, |_, _| {}, 0, 0)
                .unwrap_err(),
            ParticleError::InvalidNormalizedTime(1.5)
        );
        assert!(events
            .add_normalized_timed_event(f32::NAN, |_, _| {}, 0, 0)
            .is_err());
        assert!(events.add_timed_event(-1.0, |_, _| {}, 0, 0).is_err());
        assert!(events.is_empty());
    }

    #[test]
    fn test_group_removal() {
        let (log, make) = recorder();
        let mut events = ParticleEvents::<DefaultParticle>::new();
        events.add_every_time_event(make(0), 0, 0);
        events.add_every_time_event(make(1), 1, 1);
        events.add_every_time_event(make(2), 2, 1);

        assert_eq!(events.remove_all_events_in_group(1), 2);
        assert!(!events.contains_group(1));
        assert!(events.contains_group(0));

        let mut particle = advanced_particle(10.0, 0.1);
        events.run_for_particle(&mut particle, 0.1, &mut FaultLog::new(), 1);
        assert_eq!(*log.borrow(), vec![0]);
    }

    #[test]
    fn test_remove_single_event() {
        let mut events = ParticleEvents::<DefaultParticle>::new();
        let a = events.add_every_time_event(|_, _| {}, 0, 0);
        let b = events.add_every_time_event(|_, _| {}, 0, 0);
        assert!(events.remove_event(a));
        assert!(!events.remove_event(a));
        assert_eq!(events.execution_order(), vec![b]);
    }

    #[test]
    fn test_one_time_event_is_removed_after_pass() {
        let (log, make) = recorder();
        let mut events = ParticleEvents::<DefaultParticle>::new();
        events.add_every_time_event(make(0), 0, 0);
        events.add_one_time_event(make(9), 1, 0);

        let mut faults = FaultLog::new();
        let mut a = advanced_particle(10.0, 0.1);
        let mut b = advanced_particle(10.0, 0.1);
        events.run_for_particle(&mut a, 0.1, &mut faults, 1);
        events.run_for_particle(&mut b, 0.1, &mut faults, 1);
        events.finish_pass();
        assert_eq!(events.len(), 1);

        events.run_for_particle(&mut a, 0.1, &mut faults, 2);
        assert_eq!(*log.borrow(), vec![0, 9, 0, 9, 0]);
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let (log, make) = recorder();
        let mut events = ParticleEvents::<DefaultParticle>::new();
        events.add_every_time_event(|_, _| panic!("bad effect"), 0, 0);
        events.add_every_time_event(make(1), 1, 0);

        let mut faults = FaultLog::new();
        let mut particle = advanced_particle(10.0, 0.1);
        events.run_for_particle(&mut particle, 0.1, &mut faults, 3);
        events.run_for_particle(&mut particle, 0.1, &mut faults, 4);

        assert_eq!(*log.borrow(), vec![1, 1]);
        assert_eq!(faults.total_count(), 2);
        let last = faults.last().unwrap();
        assert_eq!(last.message, "bad effect");
        assert_eq!(last.tick, 4);
        assert_eq!(last.source, "particle_event#0");
    }

    #[test]
    fn test_system_timed_event() {
        let mut events = SystemEvents::new();
        let fired = Rc::new(RefCell::new(0));
        let handle = fired.clone();
        events
            .add_timed_event(1.0, move |ctx, _| {
                *handle.borrow_mut() += 1;
                ctx.burst(5);
            }, 0, 0)
            .unwrap();

        let mut emitter = Emitter::default();
        let mut faults = FaultLog::new();
        let mut last = -1.0;
        for step in 1..=4 {
            let elapsed = step as f32 * 0.5;
            let mut ctx = SystemEventContext {
                emitter: &mut emitter,
                elapsed_time: elapsed,
                active_particles: 0,
                max_particles: 10,
            };
            events.run(&mut ctx, 0.5, last, &mut faults, step);
            last = elapsed;
        }
        assert_eq!(*fired.borrow(), 1);
        assert_eq!(emitter.burst_particles, 5);
    }
}
