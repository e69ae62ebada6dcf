//! 无窗口演示：一个持续喷射的火焰系统和一个会自我销毁的爆炸种子系统，
//! 每秒输出一次帧率与粒子统计。

use dpsf::prelude::*;
use dpsf::profiling::FrameRateCounter;

const FRAME_TIME: f32 = 1.0 / 60.0;
const DEMO_SECONDS: u32 = 5;

fn fire_system(config: &ParticleSystemConfig) -> ConfigResult<ParticleSystem<DefaultParticle, PointSpriteVertex>> {
    let mut fire = ParticleSystem::new("fire");
    fire.auto_initialize_with_config(config, |p: &mut DefaultParticle, ctx| {
        p.life.reset(ctx.rng.range(0.8, 1.6));
        p.position = ctx.position + ctx.rng.vec3_between(Vec3::splat(-0.2), Vec3::splat(0.2));
        p.velocity = Vec3::new(0.0, ctx.rng.range(1.5, 3.0), 0.0);
        p.start_color = Vec4::new(1.0, 0.8, 0.2, 1.0);
        p.end_color = Vec4::new(0.6, 0.0, 0.0, 0.0);
        p.color = p.start_color;
        p.start_size = 0.4;
        p.end_size = 0.1;
    })?;
    fire.set_vertex_updater(project_point_sprite);

    let events = fire.events_mut();
    events.add_every_time_event(DefaultParticle::update_velocity_using_acceleration, 0, 0);
    events.add_every_time_event(DefaultParticle::update_position_using_velocity, 100, 0);
    events.add_every_time_event(DefaultParticle::lerp_color, 200, 0);
    events.add_every_time_event(DefaultParticle::lerp_size, 300, 0);

    // 每秒一次的小型爆发
    fire.system_events_mut()
        .add_every_time_event(
            |ctx, _| {
                if ctx.elapsed_time.fract() < FRAME_TIME {
                    ctx.burst(25);
                }
            },
            0,
            0,
        );
    Ok(fire)
}

fn explosion_seed_system() -> ParticleResult<ParticleSystem<DefaultParticle, QuadVertex>> {
    let mut explosion = ParticleSystem::new("explosion");
    explosion.initialize(
        8,
        512,
        |p: &mut DefaultParticle, ctx| {
            p.life.reset(ctx.rng.range(0.5, 1.0));
            p.position = ctx.position;
            p.velocity = ctx.rng.unit_vector3() * ctx.rng.range(2.0, 6.0);
            p.friction = 1.5;
            p.set_size(0.3);
            p.color = ctx.rng.color_between(Vec4::new(1.0, 0.3, 0.0, 1.0), Vec4::new(1.0, 0.9, 0.3, 1.0));
        },
        project_billboard_quad,
    )?;
    explosion.set_draw_order(10);
    explosion.emitter_mut().emit_particles_automatically = false;
    explosion.emitter_mut().teleport(Vec3::new(3.0, 1.0, 0.0), Quat::IDENTITY);
    explosion.set_lifetime(Some(2.0), EndOfLife::Destroy)?;

    let events = explosion.events_mut();
    events.add_every_time_event(DefaultParticle::update_velocity_using_friction, 0, 0);
    events.add_every_time_event(DefaultParticle::update_position_using_velocity, 100, 0);
    events.add_normalized_timed_event(0.5, |p: &mut DefaultParticle, _| p.color.w *= 0.5, 200, 1)?;
    events.add_every_time_event(DefaultParticle::fade_out_using_lerp, 300, 0);

    explosion
        .system_events_mut()
        .add_timed_event(0.5, |ctx, _| ctx.burst(200), 0, 0)?;
    Ok(explosion)
}

fn run() -> Result<(), ConfigError> {
    let mut config = FrameworkConfig::load_or_default();
    config.apply_env_overrides();
    config.validate()?;
    init_logging(&config.logging);

    let mut manager = ParticleSystemManager::from_config(&config.manager)?;
    manager.set_camera_matrices(CameraMatrices::new(
        Mat4::IDENTITY,
        Mat4::look_at_rh(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, Vec3::Y),
        Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 100.0),
    ));
    manager.add_particle_system(fire_system(&config.defaults)?);
    manager.add_particle_system(explosion_seed_system()?);
    manager.apply_settings_to_all_particle_systems()?;

    let mut fps = FrameRateCounter::new();
    for _ in 0..(DEMO_SECONDS * 60) {
        manager.update_all_particle_systems(FRAME_TIME);
        let vertices = manager.draw_all_particle_systems();

        if fps.update(FRAME_TIME) {
            let stats = manager.stats();
            tracing::info!(
                target: "dpsf_demo",
                "fps {:.1} | systems {} | active {} | allocated {} | vertices {}",
                fps.current_fps(),
                stats.particle_system_count,
                stats.total_active_particles,
                stats.total_allocated_particles,
                vertices
            );
        }
    }

    if let Some(profiler) = manager.profiler() {
        profiler.log_report();
    }
    manager.destroy_and_remove_all_particle_systems();
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Particle demo failed: {}", e);
        std::process::exit(1);
    }
}
