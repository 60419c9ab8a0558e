//! Emitter controller: timer and loop logic deciding *when* to spawn.
//!
//! The controller wraps a [`ParticlePool`] handle with an emission
//! accumulator and one-shot state. Each host tick calls
//! [`EmitterController::update`] with the frame delta and the emitter's
//! world transform; the controller decides whether to emit this tick and
//! re-targets the spawn position and direction range into world space.
//!
//! Override precedence: caller-supplied per-emit overrides win over
//! controller-configured overrides, and an emit-time direction wins over a
//! controller-configured direction.
//!
//! # Example
//!
//! ```ignore
//! let mut emitter = EmitterController::new()
//!     .count(50)
//!     .delay(0.25)
//!     .looping(true)
//!     .local_direction([[-0.2, 0.2], [1.0, 1.0], [-0.2, 0.2]]);
//!
//! // Per frame:
//! emitter.update(&mut pool, dt, transform_position, transform_rotation);
//! ```

use glam::{Quat, Vec3};

use crate::params::ParamOverrides;
use crate::pool::ParticlePool;

/// Timer/loop controller for a particle pool.
#[derive(Clone, Debug)]
pub struct EmitterController {
    /// Seconds between emissions; `<= 0` emits every update call.
    delay: f32,
    /// Keep emitting, or stop after the first batch.
    looping: bool,
    /// Particles per emission.
    count: u32,
    /// Direction range in emitter-local space, transformed to world space
    /// by the orientation supplied at emit time.
    local_direction: Option<[[f32; 2]; 3]>,
    /// Controller-level overrides merged into every emit.
    overrides: Option<ParamOverrides>,
    accumulator: f32,
    emitted_once: bool,
    emitting: bool,
}

impl EmitterController {
    /// A looping emitter with no delay, emitting one particle per call.
    pub fn new() -> Self {
        Self {
            delay: 0.0,
            looping: true,
            count: 1,
            local_direction: None,
            overrides: None,
            accumulator: 0.0,
            emitted_once: false,
            emitting: true,
        }
    }

    /// Seconds between emissions. Zero or negative emits every call.
    pub fn delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    /// Whether to keep emitting after the first batch.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Particles per emission.
    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Direction range in emitter-local space.
    pub fn local_direction(mut self, range: [[f32; 2]; 3]) -> Self {
        self.local_direction = Some(range);
        self
    }

    /// Controller-level overrides applied to every emission.
    pub fn overrides(mut self, overrides: ParamOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Whether the controller is currently emitting.
    pub fn is_emitting(&self) -> bool {
        self.emitting
    }

    /// Begin emitting from a clean slate.
    pub fn start(&mut self) {
        self.emitting = true;
        self.accumulator = 0.0;
        self.emitted_once = false;
    }

    /// Freeze the controller; the accumulator holds its value.
    pub fn stop(&mut self) {
        self.emitting = false;
    }

    /// Advance the timer and emit when due.
    pub fn update(&mut self, pool: &mut ParticlePool, dt: f32, position: Vec3, orientation: Quat) {
        if !self.emitting {
            return;
        }
        if !self.looping && self.emitted_once {
            return;
        }
        if self.delay <= 0.0 {
            self.emit_at(pool, position, orientation, None);
            return;
        }
        self.accumulator += dt;
        if self.accumulator >= self.delay {
            self.accumulator = 0.0;
            self.emit_at(pool, position, orientation, None);
        }
    }

    /// Emit one configured batch at a world transform, with optional
    /// per-emit overrides (which win over controller overrides).
    pub fn emit_at(
        &mut self,
        pool: &mut ParticlePool,
        position: Vec3,
        orientation: Quat,
        extra: Option<&ParamOverrides>,
    ) {
        self.emit(pool, self.count, position, orientation, extra);
    }

    /// One-shot emission of an explicit count, independent of the timer.
    pub fn burst(
        &mut self,
        pool: &mut ParticlePool,
        count: u32,
        position: Vec3,
        orientation: Quat,
        extra: Option<&ParamOverrides>,
    ) {
        self.emit(pool, count, position, orientation, extra);
    }

    fn emit(
        &mut self,
        pool: &mut ParticlePool,
        count: u32,
        position: Vec3,
        orientation: Quat,
        extra: Option<&ParamOverrides>,
    ) {
        let mut merged = self.overrides.clone().unwrap_or_default();
        if let Some(local) = self.local_direction {
            merged.direction = Some(rotate_axis_range(local, orientation));
        }
        if let Some(extra) = extra {
            merged.merge_from(extra);
        }
        pool.spawn(position.x, position.y, position.z, count, Some(&merged));
        self.emitted_once = true;
    }
}

impl Default for EmitterController {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotate a per-axis direction range into world space.
///
/// The range's corner vectors are rotated and re-boxed per axis, so the
/// world-space range brackets the rotated local range.
fn rotate_axis_range(range: [[f32; 2]; 3], orientation: Quat) -> [[f32; 2]; 3] {
    let lo = orientation * Vec3::new(range[0][0], range[1][0], range[2][0]);
    let hi = orientation * Vec3::new(range[0][1], range[1][1], range[2][1]);
    [
        [lo.x.min(hi.x), lo.x.max(hi.x)],
        [lo.y.min(hi.y), lo.y.max(hi.y)],
        [lo.z.min(hi.z), lo.z.max(hi.z)],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParticleConfig;
    use crate::executor::Backend;
    use crate::pool::ParticlePool;
    use std::f32::consts::FRAC_PI_2;

    fn pool() -> ParticlePool {
        let config = ParticleConfig { max_particles: 1000, ..Default::default() };
        ParticlePool::with_backend(&config, Backend::Cpu).unwrap()
    }

    #[test]
    fn test_no_delay_emits_every_call() {
        let mut pool = pool();
        let mut emitter = EmitterController::new().count(5);
        for _ in 0..3 {
            emitter.update(&mut pool, 1.0 / 60.0, Vec3::ZERO, Quat::IDENTITY);
        }
        assert_eq!(pool.cursor(), 15);
    }

    #[test]
    fn test_delay_accumulates_and_resets() {
        let mut pool = pool();
        let mut emitter = EmitterController::new().count(2).delay(0.1);

        // 5 ticks of 1/60 s: 0.0833 s accumulated, not yet due.
        for _ in 0..5 {
            emitter.update(&mut pool, 1.0 / 60.0, Vec3::ZERO, Quat::IDENTITY);
        }
        assert_eq!(pool.cursor(), 0);

        // Two more ticks cross the threshold once.
        emitter.update(&mut pool, 1.0 / 60.0, Vec3::ZERO, Quat::IDENTITY);
        emitter.update(&mut pool, 1.0 / 60.0, Vec3::ZERO, Quat::IDENTITY);
        assert_eq!(pool.cursor(), 2);
    }

    #[test]
    fn test_one_shot_emits_once() {
        let mut pool = pool();
        let mut emitter = EmitterController::new().count(3).looping(false);
        for _ in 0..4 {
            emitter.update(&mut pool, 1.0 / 60.0, Vec3::ZERO, Quat::IDENTITY);
        }
        assert_eq!(pool.cursor(), 3);

        // start() rearms the one-shot.
        emitter.start();
        emitter.update(&mut pool, 1.0 / 60.0, Vec3::ZERO, Quat::IDENTITY);
        assert_eq!(pool.cursor(), 6);
    }

    #[test]
    fn test_stop_freezes_emission() {
        let mut pool = pool();
        let mut emitter = EmitterController::new().count(1);
        emitter.stop();
        emitter.update(&mut pool, 1.0, Vec3::ZERO, Quat::IDENTITY);
        assert_eq!(pool.cursor(), 0);

        emitter.start();
        emitter.update(&mut pool, 1.0, Vec3::ZERO, Quat::IDENTITY);
        assert_eq!(pool.cursor(), 1);
    }

    #[test]
    fn test_emits_at_world_position() {
        let mut pool = pool();
        let mut emitter = EmitterController::new().count(4);
        emitter.update(&mut pool, 0.0, Vec3::new(7.0, 8.0, 9.0), Quat::IDENTITY);
        let storage = pool.storage();
        for i in 0..4 {
            assert!((storage.position(i) - Vec3::new(7.0, 8.0, 9.0)).length() < 1e-4);
        }
    }

    #[test]
    fn test_local_direction_rotated_to_world() {
        let mut pool = pool();
        // Local +Y emission; a quarter turn about Z maps +Y onto -X.
        let mut emitter = EmitterController::new()
            .count(16)
            .local_direction([[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]]);
        let rot = Quat::from_rotation_z(FRAC_PI_2);
        emitter.update(&mut pool, 0.0, Vec3::ZERO, rot);
        pool.update(0.1);

        let storage = pool.storage();
        for i in 0..16 {
            let p = storage.position(i);
            assert!(p.x < -1e-3, "particle {i} should move toward -X, got {p}");
            assert!(p.y.abs() < 1e-3);
        }
    }

    #[test]
    fn test_caller_override_wins_over_controller() {
        let mut pool = pool();
        let mut emitter = EmitterController::new()
            .count(2)
            .overrides(ParamOverrides { size: Some([2.0, 2.0]), ..Default::default() });

        emitter.emit_at(&mut pool, Vec3::ZERO, Quat::IDENTITY, None);
        let caller = ParamOverrides { size: Some([8.0, 8.0]), ..Default::default() };
        emitter.emit_at(&mut pool, Vec3::ZERO, Quat::IDENTITY, Some(&caller));

        let storage = pool.storage();
        assert!((storage.size[0] - 2.0).abs() < 1e-5);
        assert!((storage.size[2] - 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_emit_time_direction_wins_over_local_direction() {
        let mut pool = pool();
        let mut emitter = EmitterController::new()
            .count(8)
            .local_direction([[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]]);

        let down = ParamOverrides {
            direction: Some([[0.0, 0.0], [-1.0, -1.0], [0.0, 0.0]]),
            ..Default::default()
        };
        emitter.emit_at(&mut pool, Vec3::ZERO, Quat::IDENTITY, Some(&down));
        pool.update(0.1);

        let storage = pool.storage();
        for i in 0..8 {
            assert!(storage.position(i).y < -1e-3, "particle {i} should move down");
        }
    }
}
