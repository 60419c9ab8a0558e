//! CPU/GPU backend parity.
//!
//! Both backends reseeded identically and driven through the same
//! spawn/update sequence must produce buffer contents equal within
//! floating-point tolerance: the integer hash streams are bit-identical,
//! while sin/cos/acos and the noise field may differ by ULPs between a GPU
//! and the CPU. The tests skip cleanly on machines without a compatible
//! adapter, since backend availability is a capability question, not a
//! correctness one.

use cinder::executor::{Backend, BackendKind};
use cinder::prelude::*;

const TOLERANCE: f32 = 2e-3;

fn pool_pair(config: &ParticleConfig) -> Option<(ParticlePool, ParticlePool)> {
    let mut gpu = match ParticlePool::with_backend(config, Backend::Gpu) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("skipping parity test: {e}");
            return None;
        }
    };
    assert_eq!(gpu.backend_kind(), BackendKind::Gpu);
    let mut cpu = ParticlePool::with_backend(config, Backend::Cpu).unwrap();
    gpu.reseed(42);
    cpu.reseed(42);
    Some((gpu, cpu))
}

fn assert_states_match(gpu: &mut ParticlePool, cpu: &mut ParticlePool) {
    assert_eq!(gpu.cursor(), cpu.cursor());
    let capacity = gpu.capacity() as usize;
    let gpu_state = gpu.read_state().clone();
    let cpu_state = cpu.read_state();

    for i in 0..capacity {
        let dp = (gpu_state.position(i) - cpu_state.position(i)).length();
        assert!(
            dp < TOLERANCE,
            "slot {i}: gpu {:?} vs cpu {:?}",
            gpu_state.position(i),
            cpu_state.position(i)
        );
        let dv = (gpu_state.velocity(i) - cpu_state.velocity(i)).length();
        assert!(dv < TOLERANCE, "slot {i} velocity differs by {dv}");
        assert!((gpu_state.lifetime(i) - cpu_state.lifetime(i)).abs() < TOLERANCE);
        assert!((gpu_state.size[i] - cpu_state.size[i]).abs() < TOLERANCE);
        assert!((gpu_state.vel_fade[i][3] - cpu_state.vel_fade[i][3]).abs() < TOLERANCE);
    }
}

#[test]
fn spawn_buffers_match_across_backends() {
    let config = ParticleConfig {
        max_particles: 256,
        emitter_shape: EmitterShape::Sphere,
        radius: RangeInput::Range(0.25, 1.0),
        speed: RangeInput::Range(0.5, 2.0),
        lifetime_seconds: RangeInput::Range(0.5, 2.0),
        ..Default::default()
    };
    let Some((mut gpu, mut cpu)) = pool_pair(&config) else { return };

    // Two batches, the second wrapping the ring buffer.
    gpu.spawn(0.0, 0.0, 0.0, 200, None);
    cpu.spawn(0.0, 0.0, 0.0, 200, None);
    gpu.spawn(1.0, 2.0, 3.0, 100, None);
    cpu.spawn(1.0, 2.0, 3.0, 100, None);

    assert_states_match(&mut gpu, &mut cpu);
}

#[test]
fn full_feature_scripts_match_across_backends() {
    let config = ParticleConfig {
        max_particles: 512,
        emitter_shape: EmitterShape::Cone,
        cone_angle: 0.4,
        height: RangeInput::Range(0.1, 0.5),
        speed: RangeInput::Range(0.5, 2.0),
        lifetime_seconds: RangeInput::Range(0.5, 2.0),
        gravity: [0.0, -3.0, 0.0],
        friction: RangeInput::Range(0.1, 0.4),
        friction_easing: Easing::EaseInOut,
        rotation_speed: AxisInput::Range(-2.0, 2.0),
        color_start: vec![[1.0, 0.5, 0.1], [0.2, 0.4, 1.0], [0.9, 0.9, 0.9]],
        color_end: Some(vec![[0.0, 0.0, 0.0]]),
        turbulence: Some(TurbulenceConfig { intensity: 0.8, frequency: 1.5, speed: 0.5 }),
        attractors: Some(vec![AttractorConfig {
            position: [0.0, 1.0, 0.0],
            strength: 2.0,
            radius: 4.0,
            kind: AttractorKind::Vortex,
            falloff: Falloff::Linear,
            axis: [0.0, 1.0, 0.0],
        }]),
        collision: Some(CollisionConfig { plane_y: -0.5, bounce: 0.5, friction: 0.9, die: false }),
        ..Default::default()
    };
    let Some((mut gpu, mut cpu)) = pool_pair(&config) else { return };

    let dt = 1.0 / 60.0;
    let burst = ParamOverrides {
        size: Some([2.0, 3.0]),
        speed: Some([3.0, 3.0]),
        ..Default::default()
    };
    for pool in [&mut gpu, &mut cpu] {
        for round in 0..4 {
            pool.spawn(0.0, 0.0, 0.0, 64, None);
            if round == 2 {
                pool.spawn(1.0, 0.5, 0.0, 32, Some(&burst));
            }
            for _ in 0..4 {
                pool.update(dt);
            }
        }
    }

    assert_states_match(&mut gpu, &mut cpu);

    // Optional columns agree too.
    let gpu_state = gpu.read_state().clone();
    let cpu_state = cpu.read_state();
    let (gpu_rot, cpu_rot) =
        (gpu_state.rotation.as_ref().unwrap(), cpu_state.rotation.as_ref().unwrap());
    let (gpu_col, cpu_col) =
        (gpu_state.color_start.as_ref().unwrap(), cpu_state.color_start.as_ref().unwrap());
    for i in 0..512 {
        for lane in 0..3 {
            assert!((gpu_rot[i][lane] - cpu_rot[i][lane]).abs() < TOLERANCE, "rotation {i}.{lane}");
            assert!((gpu_col[i][lane] - cpu_col[i][lane]).abs() < TOLERANCE, "color {i}.{lane}");
        }
    }
}
