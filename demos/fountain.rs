//! Headless fountain: a cone emitter under gravity, printed as live counts.
//!
//! Runs 300 fixed-delta frames on whatever backend the machine offers and
//! prints pool occupancy once per simulated second.
//!
//! ```sh
//! cargo run --example fountain
//! ```

use cinder::prelude::*;

fn main() {
    env_logger::init();

    let config = ParticleConfig {
        max_particles: 20_000,
        emitter_shape: EmitterShape::Cone,
        cone_angle: 0.35,
        height: RangeInput::Range(0.0, 0.2),
        speed: RangeInput::Range(2.0, 4.0),
        lifetime_seconds: RangeInput::Range(1.0, 2.5),
        gravity: [0.0, -9.8, 0.0],
        collision: Some(CollisionConfig { plane_y: 0.0, bounce: 0.4, friction: 0.85, die: false }),
        color_start: vec![[0.6, 0.8, 1.0], [0.9, 0.95, 1.0]],
        ..Default::default()
    };

    let mut pool = match ParticlePool::new(&config) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("failed to build pool: {e}");
            std::process::exit(1);
        }
    };
    println!("backend: {:?}", pool.backend_kind());

    let mut emitter = EmitterController::new().count(150);
    let mut clock = FrameClock::new();
    clock.set_fixed_delta(Some(1.0 / 60.0));

    for frame in 0..300u32 {
        let (elapsed, dt) = clock.tick();
        emitter.update(&mut pool, dt, Vec3::ZERO, Quat::IDENTITY);
        pool.update(dt);

        if frame % 60 == 59 {
            println!("t = {elapsed:.2}s  live = {}", pool.live_count());
        }
    }
}
