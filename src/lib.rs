//! # Cinder
//!
//! Declarative GPU particle simulation engine with a scalar CPU fallback.
//!
//! Cinder maintains a fixed-capacity pool of particles, spawns batches into
//! ring-buffer slots, integrates their motion each frame, and exposes
//! per-particle state buffers for an external renderer. The same spawn and
//! update semantics run on two backends, data-parallel wgpu compute
//! kernels and a scalar CPU loop, sharing one pseudo-random scheme, so
//! behavior does not depend on which backend a machine ends up with.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cinder::prelude::*;
//!
//! let config = ParticleConfig {
//!     max_particles: 10_000,
//!     emitter_shape: EmitterShape::Cone,
//!     cone_angle: 0.3,
//!     speed: RangeInput::Range(1.0, 3.0),
//!     lifetime_seconds: RangeInput::Range(0.5, 2.0),
//!     gravity: [0.0, -9.8, 0.0],
//!     ..Default::default()
//! };
//!
//! let mut pool = ParticlePool::new(&config)?;
//! let mut emitter = EmitterController::new().count(100).delay(0.05);
//!
//! // Per frame:
//! emitter.update(&mut pool, dt, emitter_position, emitter_rotation);
//! pool.update(dt);
//! let state = pool.read_state(); // feed buffers to your renderer
//! ```
//!
//! ## Core Concepts
//!
//! - **Pool & ring buffer**: spawns fill consecutive slots modulo capacity;
//!   the oldest particles recycle first. A full wrap is policy, not error.
//! - **Feature flags**: optional buffers (rotation, dual colors) and
//!   physics stages (turbulence, attractors, collision) exist only when the
//!   configuration asks for them; a flag flip rebuilds the pool, anything
//!   else patches parameters in place.
//! - **Curve table**: editable splines are baked once into a 256-sample,
//!   four-channel lookup table (size, opacity, velocity, rotation speed),
//!   loadable from a small binary blob.
//! - **Executors**: backend selection happens once at construction
//!   ([`executor::Backend::Auto`] falls back to the CPU with a warning) and
//!   is never branched on afterward.
//!
//! ## Host contract
//!
//! Spawn dispatches are fire-and-forget; the update dispatch waits for
//! completion. The host must submit both to a single queue per pool so a
//! frame's spawns are sequenced before that frame's update; both built-in
//! backends do this already.

pub mod config;
pub mod curve;
pub mod emitter;
pub mod error;
pub mod executor;
pub mod features;
pub mod params;
pub mod pool;
pub mod shaders;
pub mod storage;
pub mod time;

pub use bytemuck;
pub use config::{
    AppearanceKind, AttractorConfig, AttractorKind, AxisInput, CollisionConfig, CurveSpec, Easing,
    EmitterShape, Falloff, MaterialKind, NormalizedConfig, ParticleConfig, RangeInput,
    TurbulenceConfig,
};
pub use curve::{bake_to_array, sample_curve_at, Channel, CurvePoint, CurveTable};
pub use emitter::EmitterController;
pub use error::{BackendError, CurveError};
pub use executor::{Backend, BackendKind};
pub use features::{needs_recreation, resolve_features, ConfigKey, Features};
pub use glam::{Quat, Vec2, Vec3, Vec4};
pub use params::{AttractorSlot, ParamOverrides, Params};
pub use pool::ParticlePool;
pub use storage::{ParticleStorage, DEAD_Y};
pub use time::FrameClock;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use cinder::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{
        AttractorConfig, AttractorKind, AxisInput, CollisionConfig, CurveSpec, Easing,
        EmitterShape, Falloff, ParticleConfig, RangeInput, TurbulenceConfig,
    };
    pub use crate::curve::{CurvePoint, CurveTable};
    pub use crate::emitter::EmitterController;
    pub use crate::executor::{Backend, BackendKind};
    pub use crate::params::ParamOverrides;
    pub use crate::pool::ParticlePool;
    pub use crate::time::FrameClock;
    pub use crate::{Quat, Vec2, Vec3, Vec4};
}
