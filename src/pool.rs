//! The particle pool: storage, parameters, cursor and executor under one
//! owner.
//!
//! A pool is built once from a declarative configuration, selects its
//! backend at construction, and afterwards only does three things per
//! frame: zero or more [`ParticlePool::spawn`] dispatches, exactly one
//! [`ParticlePool::update`], and (for rendering) a
//! [`ParticlePool::read_state`]. Slot allocation is a ring buffer: the
//! cursor advances modulo capacity and the oldest particles are silently
//! recycled once the pool wraps. A full wrap is policy, not an error.
//!
//! # Example
//!
//! ```ignore
//! let mut pool = ParticlePool::new(&ParticleConfig::default())?;
//! pool.spawn(0.0, 0.0, 0.0, 200, None);
//! pool.update(1.0 / 60.0);
//! let state = pool.read_state();
//! ```

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::{NormalizedConfig, ParticleConfig};
use crate::curve::CurveTable;
use crate::error::BackendError;
use crate::executor::{create_executor, Backend, BackendKind, Executor};
use crate::features::{needs_recreation, resolve_features, ConfigKey, Features};
use crate::params::{ParamOverrides, Params, SpawnBatch};
use crate::storage::ParticleStorage;

/// A fixed-capacity particle pool with one execution backend.
pub struct ParticlePool {
    config: NormalizedConfig,
    features: Features,
    params: Params,
    storage: ParticleStorage,
    executor: Box<dyn Executor>,
    curves: CurveTable,
    /// Next ring-buffer slot a spawn will fill.
    cursor: u32,
    /// Construction preference, reused on rebuilds.
    backend: Backend,
    rng: SmallRng,
}

impl ParticlePool {
    /// Build a pool with automatic backend selection (GPU, else CPU).
    pub fn new(config: &ParticleConfig) -> Result<Self, BackendError> {
        Self::with_backend(config, Backend::Auto)
    }

    /// Build a pool with an explicit backend preference.
    pub fn with_backend(config: &ParticleConfig, backend: Backend) -> Result<Self, BackendError> {
        Self::build(config.normalize(), backend)
    }

    fn build(config: NormalizedConfig, backend: Backend) -> Result<Self, BackendError> {
        let features = resolve_features(&config);
        let mut storage = ParticleStorage::new(config.max_particles, &features);
        let mut executor = create_executor(backend, &features, storage.capacity())?;
        let curves = build_curve_table(&config);
        let mut params = Params::from_config(&config);
        params.curve_mask = curves.mask();

        executor.reset(&mut storage);
        executor.upload_curves(&curves);
        log::debug!(
            "particle pool: {} slots on {:?} backend",
            storage.capacity(),
            executor.kind()
        );

        Ok(Self {
            config,
            features,
            params,
            storage,
            executor,
            curves,
            cursor: 0,
            backend,
            rng: SmallRng::from_entropy(),
        })
    }

    /// Spawn `count` particles at `(x, y, z)`.
    ///
    /// Fills the next `count` ring-buffer slots (wrapping) with randomized
    /// attributes. `overrides` apply to this call only: the store is
    /// snapshotted, overridden, and restored immediately after the dispatch
    /// is issued (the dispatch snapshots its inputs at issue time), so two
    /// spawns in one frame never see each other's overrides.
    pub fn spawn(&mut self, x: f32, y: f32, z: f32, count: u32, overrides: Option<&ParamOverrides>) {
        if count == 0 {
            return;
        }
        let capacity = self.storage.capacity();
        let saved = self.params.snapshot();
        if let Some(overrides) = overrides {
            overrides.apply(&mut self.params);
        }
        self.params.spawn = SpawnBatch {
            origin: Vec3::new(x, y, z),
            start: self.cursor,
            count,
            seed: self.rng.gen(),
        };

        self.executor.spawn(&self.params, &mut self.storage);

        self.cursor = (self.cursor + count) % capacity;
        self.params.restore(saved);
    }

    /// Advance the simulation one frame.
    pub fn update(&mut self, dt: f32) {
        self.params.dt = dt;
        self.params.elapsed += dt;
        self.executor.update(&self.params, &mut self.storage);
    }

    /// Apply a persistent numeric patch (UI-driven) without rebuilding.
    pub fn apply_patch(&mut self, patch: &ParamOverrides) {
        patch.apply(&mut self.params);
    }

    /// Reconfigure the pool.
    ///
    /// `changed` lists the keys the caller touched. Structural changes (or
    /// a feature-flag flip) rebuild storage, kernels and parameters from
    /// scratch; the old executor is drained first so no buffer is freed
    /// with a dispatch in flight. Anything else is a cheap in-place
    /// parameter patch. Returns whether a rebuild happened.
    pub fn reconfigure(
        &mut self,
        config: &ParticleConfig,
        changed: &[ConfigKey],
    ) -> Result<bool, BackendError> {
        let merged = config.normalize();
        if needs_recreation(&self.features, changed, &merged) {
            self.executor.drain();
            let backend = self.backend;
            *self = Self::build(merged, backend)?;
            return Ok(true);
        }

        // In-place patch: new numeric cells, preserved clock and cursor.
        let elapsed = self.params.elapsed;
        self.curves = build_curve_table(&merged);
        self.params = Params::from_config(&merged);
        self.params.curve_mask = self.curves.mask();
        self.params.elapsed = elapsed;
        self.executor.upload_curves(&self.curves);
        self.config = merged;
        Ok(false)
    }

    /// Synchronize the active backend into the storage view and return it.
    pub fn read_state(&mut self) -> &ParticleStorage {
        self.executor.synchronize(&mut self.storage);
        &self.storage
    }

    /// Number of live particles (synchronizes first).
    pub fn live_count(&mut self) -> u32 {
        self.executor.synchronize(&mut self.storage);
        self.storage.live_count()
    }

    /// The storage view as of the last synchronization. On the CPU backend
    /// this is always current.
    pub fn storage(&self) -> &ParticleStorage {
        &self.storage
    }

    /// Which backend the pool runs on.
    pub fn backend_kind(&self) -> BackendKind {
        self.executor.kind()
    }

    /// The resolved feature flags.
    pub fn features(&self) -> &Features {
        &self.features
    }

    /// The normalized configuration the pool was built from.
    pub fn config(&self) -> &NormalizedConfig {
        &self.config
    }

    /// The baked curve table (renderers sample the size/opacity channels).
    pub fn curve_table(&self) -> &CurveTable {
        &self.curves
    }

    /// The next slot a spawn will fill.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Pool capacity in slots.
    pub fn capacity(&self) -> u32 {
        self.storage.capacity()
    }

    /// Reseed the batch-seed generator for reproducible runs.
    ///
    /// Two pools reseeded identically and driven through the same
    /// spawn/update sequence produce the same batch seeds, and therefore
    /// the same per-slot attribute streams, regardless of backend.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }
}

impl Drop for ParticlePool {
    fn drop(&mut self) {
        // Quiesce before buffers are freed; no dispatch may be in flight.
        self.executor.drain();
    }
}

/// Decode the pre-baked blob if present, else bake from curve properties.
fn build_curve_table(config: &NormalizedConfig) -> CurveTable {
    if let Some(blob) = &config.baked_curves {
        match CurveTable::from_bytes(blob) {
            Ok(table) => return table,
            Err(e) => {
                log::warn!("failed to decode baked curve blob ({e}); baking from curve properties");
            }
        }
    }
    CurveTable::build(
        config.size_curve.as_ref().map(|c| c.points.as_slice()),
        config.opacity_curve.as_ref().map(|c| c.points.as_slice()),
        config.velocity_curve.as_ref().map(|c| c.points.as_slice()),
        config.rotation_speed_curve.as_ref().map(|c| c.points.as_slice()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmitterShape, RangeInput};
    use crate::storage::DEAD_Y;

    fn cpu_pool(config: &ParticleConfig) -> ParticlePool {
        ParticlePool::with_backend(config, Backend::Cpu).unwrap()
    }

    #[test]
    fn test_cursor_wraps_through_ten_slot_pool() {
        let config = ParticleConfig { max_particles: 10, ..Default::default() };
        let mut pool = cpu_pool(&config);
        assert_eq!(pool.cursor(), 0);

        pool.spawn(0.0, 0.0, 0.0, 4, None);
        assert_eq!(pool.cursor(), 4);
        pool.spawn(0.0, 0.0, 0.0, 4, None);
        assert_eq!(pool.cursor(), 8);

        // Third call wraps: slots 8, 9, 0, 1 are overwritten.
        pool.spawn(5.0, 0.0, 0.0, 4, None);
        assert_eq!(pool.cursor(), 2);
        let storage = pool.storage();
        for slot in [8, 9, 0, 1] {
            assert!((storage.position(slot).x - 5.0).abs() < 1e-4, "slot {slot}");
        }
        for slot in [2, 3, 4, 5, 6, 7] {
            assert!(storage.position(slot).x.abs() < 1e-4, "slot {slot}");
        }
    }

    #[test]
    fn test_full_pool_coverage_before_any_slot_repeats() {
        let config = ParticleConfig { max_particles: 10, ..Default::default() };
        let mut pool = cpu_pool(&config);
        // 3 + 3 + 4 = 10 spawns touch every slot exactly once.
        pool.spawn(1.0, 0.0, 0.0, 3, None);
        pool.spawn(1.0, 0.0, 0.0, 3, None);
        pool.spawn(1.0, 0.0, 0.0, 4, None);
        assert_eq!(pool.cursor(), 0);
        assert_eq!(pool.storage().live_count(), 10);
    }

    #[test]
    fn test_dead_particle_invariant_after_updates() {
        let config = ParticleConfig {
            max_particles: 64,
            lifetime_seconds: RangeInput::Range(0.2, 1.0),
            ..Default::default()
        };
        let mut pool = cpu_pool(&config);
        pool.spawn(0.0, 2.0, 0.0, 64, None);

        for _ in 0..120 {
            pool.update(1.0 / 60.0);
            let storage = pool.storage();
            for i in 0..64 {
                let alive = storage.lifetime(i) > 0.0;
                let at_sentinel = storage.position(i).y == DEAD_Y;
                assert_eq!(alive, !at_sentinel, "slot {i}");
            }
        }
    }

    #[test]
    fn test_one_second_lifetime_decays_within_120_frames() {
        let config = ParticleConfig { max_particles: 100, ..Default::default() };
        let mut pool = cpu_pool(&config);
        pool.spawn(0.0, 0.0, 0.0, 100, None);
        assert_eq!(pool.live_count(), 100);

        for _ in 0..120 {
            pool.update(1.0 / 60.0);
        }
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_attract_to_center_converges_to_spawn_point() {
        let config = ParticleConfig {
            max_particles: 16,
            emitter_shape: EmitterShape::Sphere,
            radius: RangeInput::Range(1.0, 1.0),
            surface_only: true,
            attract_to_center: true,
            ..Default::default()
        };
        let mut pool = cpu_pool(&config);
        pool.spawn(2.0, 3.0, 4.0, 16, None);
        let spawn_point = Vec3::new(2.0, 3.0, 4.0);

        let mut last_alive = vec![Vec3::ZERO; 16];
        for _ in 0..200 {
            pool.update(1.0 / 60.0);
            let storage = pool.storage();
            for (i, last) in last_alive.iter_mut().enumerate() {
                if storage.lifetime(i) > 0.0 {
                    *last = storage.position(i);
                }
            }
            if pool.storage().live_count() == 0 {
                break;
            }
        }
        assert_eq!(pool.storage().live_count(), 0);
        for (i, last) in last_alive.iter().enumerate() {
            assert!(
                (*last - spawn_point).length() < 0.05,
                "slot {i} ended at {last}, expected ~{spawn_point}"
            );
        }
    }

    #[test]
    fn test_same_frame_spawns_do_not_leak_overrides() {
        let config = ParticleConfig { max_particles: 8, ..Default::default() };
        let mut pool = cpu_pool(&config);

        let big = ParamOverrides { size: Some([5.0, 5.0]), ..Default::default() };
        pool.spawn(0.0, 0.0, 0.0, 4, Some(&big));
        pool.spawn(0.0, 0.0, 0.0, 4, None);

        let storage = pool.storage();
        for i in 0..4 {
            assert!((storage.size[i] - 5.0).abs() < 1e-5, "overridden slot {i}");
        }
        for i in 4..8 {
            assert!((storage.size[i] - 1.0).abs() < 1e-5, "default slot {i}");
        }
    }

    #[test]
    fn test_spawn_count_exceeding_capacity_full_wrap() {
        let config = ParticleConfig { max_particles: 6, ..Default::default() };
        let mut pool = cpu_pool(&config);
        // Not an error: the ring buffer overwrites the oldest slots.
        pool.spawn(0.0, 0.0, 0.0, 9, None);
        assert_eq!(pool.cursor(), 3);
        assert_eq!(pool.storage().live_count(), 6);
    }

    #[test]
    fn test_reconfigure_numeric_change_is_in_place() {
        let mut pool = cpu_pool(&ParticleConfig::default());
        pool.spawn(0.0, 0.0, 0.0, 10, None);

        let faster = ParticleConfig { speed: RangeInput::Scalar(4.0), ..Default::default() };
        let rebuilt = pool.reconfigure(&faster, &[ConfigKey::Speed]).unwrap();
        assert!(!rebuilt);
        // Live particles survive the patch.
        assert_eq!(pool.storage().live_count(), 10);
    }

    #[test]
    fn test_reconfigure_structural_change_rebuilds() {
        let mut pool = cpu_pool(&ParticleConfig::default());
        pool.spawn(0.0, 0.0, 0.0, 10, None);

        let bigger = ParticleConfig { max_particles: 2000, ..Default::default() };
        let rebuilt = pool.reconfigure(&bigger, &[ConfigKey::MaxParticles]).unwrap();
        assert!(rebuilt);
        assert_eq!(pool.capacity(), 2000);
        assert_eq!(pool.cursor(), 0);
        assert_eq!(pool.storage().live_count(), 0);
    }

    #[test]
    fn test_bad_curve_blob_falls_back_to_props() {
        let config = ParticleConfig {
            baked_curves: Some(vec![1, 2, 3]),
            velocity_curve: Some(crate::config::CurveSpec {
                points: vec![
                    crate::curve::CurvePoint::new(0.0, 1.0),
                    crate::curve::CurvePoint::new(1.0, 0.5),
                ],
            }),
            ..Default::default()
        };
        let pool = cpu_pool(&config);
        assert_eq!(pool.curve_table().mask(), crate::curve::CHANNEL_VELOCITY);
    }

    #[test]
    fn test_zero_count_spawn_is_a_no_op() {
        let mut pool = cpu_pool(&ParticleConfig::default());
        pool.spawn(0.0, 0.0, 0.0, 0, None);
        assert_eq!(pool.cursor(), 0);
        assert_eq!(pool.storage().live_count(), 0);
    }
}
