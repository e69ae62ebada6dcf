//! # DPSF
//!
//! Dynamic Particle System Framework: pooled, event-driven particle systems
//! for real-time effects.
//!
//! ## Features
//!
//! - **Particle Pool**: active/inactive partitioned storage with configurable
//!   grow and shrink policies, no per-frame allocation in the steady state
//! - **Event Pipeline**: ordered per-particle and per-system callbacks with
//!   every-tick, one-time and timed triggers, grouped for bulk removal
//! - **Emitter**: rate emission with a carry-over accumulator, bursts and
//!   transform interpolation
//! - **Manager**: handle-addressed registry that updates every system and draws
//!   them in draw order
//! - **Fault Isolation**: a panicking callback is logged and skipped instead of
//!   ending the frame
//!
//! ## Architecture Design
//!
//! Rendering is left to the host. A [`particles::ParticleSystem`] is generic
//! over its particle data shape and its vertex type; the host supplies a
//! vertex updater that projects particles into vertices and a draw submitter
//! that uploads them.
//!
//! ### Example
//!
//! ```rust
//! use dpsf::prelude::*;
//!
//! let mut fire: ParticleSystem<DefaultParticle, PointSpriteVertex> = ParticleSystem::new("fire");
//! fire.initialize(
//!     100,
//!     2_000,
//!     |p: &mut DefaultParticle, ctx| {
//!         p.life.reset(ctx.rng.range(1.0, 2.0));
//!         p.position = ctx.position;
//!         p.velocity = Vec3::Y * ctx.rng.range(1.0, 3.0);
//!     },
//!     project_point_sprite,
//! )
//! .unwrap();
//! fire.events_mut()
//!     .add_every_time_event(DefaultParticle::update_position_using_velocity, 100, 0);
//! fire.events_mut()
//!     .add_every_time_event(DefaultParticle::fade_out_using_lerp, 200, 0);
//!
//! let mut manager = ParticleSystemManager::new();
//! let id = manager.add_particle_system(fire);
//! manager.update_all_particle_systems(0.5);
//! assert!(manager.draw_all_particle_systems() > 0);
//! assert!(manager.contains(id));
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Errors, fault records and logging setup
//! - [`config`]: TOML/JSON configuration with environment overrides
//! - [`particles`]: Pool, events, emitter, systems and manager

#[macro_use]
/// Errors, fault records, logging setup and shared macros
pub mod core;
/// Configuration system
pub mod config;
/// Particle pool, event pipeline, emitter, particle systems and manager
pub mod particles;

pub use dpsf_profiling as profiling;

/// Commonly used types
pub mod prelude {
    pub use crate::config::{
        ConfigError, ConfigResult, EmitterConfig, FrameworkConfig, ManagerConfig,
        ParticleSystemConfig,
    };
    pub use crate::core::{init_logging, FaultLog, ParticleError, ParticleResult};
    pub use crate::particles::{
        project_billboard_quad, project_point_sprite, AutoMemoryManagerSettings, CameraMatrices,
        DefaultParticle, EmissionContext, Emitter, EndOfLife, EventId, ManagedParticleSystem,
        MemoryManagementMode, Particle, ParticleLife, ParticleRng, ParticleSystem,
        ParticleSystemManager, PointSpriteVertex, QuadVertex, SystemEventContext, SystemId,
    };
    pub use glam::{Mat4, Quat, Vec3, Vec4};
}
