//! 粒子系统模块
//!
//! ## 架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              ParticleSystemManager                    │
//! │   SystemId 句柄 → Box<dyn ManagedParticleSystem>      │
//! ├──────────────────────────────────────────────────────┤
//! │              ParticleSystem<P, V>                     │
//! │  ┌──────────┐ ┌────────────────┐ ┌──────────────┐    │
//! │  │ Emitter  │ │ ParticleEvents │ │ SystemEvents │    │
//! │  └──────────┘ └────────────────┘ └──────────────┘    │
//! │  ┌──────────────────────────────────────────────┐    │
//! │  │ ParticlePool<P>  [ active | inactive ]       │    │
//! │  └──────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## 使用示例
//!
//! ```rust
//! use dpsf::particles::{DefaultParticle, ParticleSystem, ParticleSystemManager};
//!
//! let mut smoke: ParticleSystem<DefaultParticle> = ParticleSystem::new("smoke");
//! smoke
//!     .auto_initialize(64, 1024, |p: &mut DefaultParticle, ctx| {
//!         p.life.reset(3.0);
//!         p.position = ctx.position;
//!         p.velocity = ctx.rng.unit_vector3();
//!     })
//!     .unwrap();
//! smoke
//!     .events_mut()
//!     .add_every_time_event(DefaultParticle::update_position_using_velocity, 100, 0);
//!
//! let mut manager = ParticleSystemManager::new();
//! manager.add_particle_system(smoke);
//! manager.update_all_particle_systems(1.0 / 60.0);
//! manager.draw_all_particle_systems();
//! ```

pub mod emitter;
pub mod events;
pub mod manager;
pub mod particle;
pub mod pool;
pub mod random;
pub mod system;
pub mod vertex;


pub use emitter::Emitter;
pub use events::{EventId, ParticleEvents, ParticleTrigger, SystemEventContext, SystemEvents, SystemTrigger};
pub use manager::{ManagerStats, ParticleSystemManager, SystemId};
pub use particle::{DefaultParticle, Particle, ParticleLife};
pub use pool::{AutoMemoryManagerSettings, MemoryManagementMode, ParticlePool, PoolStats};
pub use random::ParticleRng;
pub use system::{
    EmissionContext, EndOfLife, Lifecycle, ManagedParticleSystem, ParticleSystem,
};
pub use vertex::{
    project_billboard_quad, project_point_sprite, CameraMatrices, PointSpriteVertex, QuadVertex,
};
