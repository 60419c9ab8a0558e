//! Execution backends.
//!
//! The same spawn/update semantics are realized twice behind one trait: a
//! data-parallel wgpu kernel path and a scalar CPU loop over the same
//! buffers. Selection happens once at construction and is never branched
//! on afterward; both paths share the hash scheme defined in
//! [`crate::shaders`] bit-for-bit, so behavior is backend-independent from
//! the caller's perspective.

pub mod cpu;
pub mod gpu;

pub use cpu::CpuExecutor;
pub use gpu::GpuExecutor;

use crate::curve::CurveTable;
use crate::error::BackendError;
use crate::features::Features;
use crate::params::Params;
use crate::storage::ParticleStorage;

/// Backend preference at pool construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    /// Try the GPU, fall back to the CPU with a warning.
    #[default]
    Auto,
    /// Scalar loop only.
    Cpu,
    /// GPU kernels only; construction fails if no adapter exists.
    Gpu,
}

/// Which backend a pool ended up on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Cpu,
    Gpu,
}

/// One execution backend. Spawn ranges and the batch seed ride in
/// [`Params::spawn`]; the dispatch snapshots them at issue time.
pub trait Executor {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Park every slot at the dead sentinel (pool initialization).
    fn reset(&mut self, storage: &mut ParticleStorage);

    /// Replace the curve lookup table.
    fn upload_curves(&mut self, table: &CurveTable);

    /// Fill the slots described by `params.spawn`. Fire-and-forget on the
    /// GPU path: the host's single-queue submission order sequences it
    /// before the frame's update.
    fn spawn(&mut self, params: &Params, storage: &mut ParticleStorage);

    /// Advance every live particle by `params.dt`, waiting for completion.
    fn update(&mut self, params: &Params, storage: &mut ParticleStorage);

    /// Make `storage` reflect backend state (GPU readback; CPU no-op).
    fn synchronize(&mut self, storage: &mut ParticleStorage);

    /// Block until all issued dispatches retired. Called before the
    /// executor is dropped on reconstruction so no buffer is freed with
    /// work in flight.
    fn drain(&mut self);
}

/// Construct the executor for a backend preference.
pub fn create_executor(
    backend: Backend,
    features: &Features,
    capacity: u32,
) -> Result<Box<dyn Executor>, BackendError> {
    match backend {
        Backend::Cpu => Ok(Box::new(CpuExecutor::new())),
        Backend::Gpu => Ok(Box::new(GpuExecutor::new(features, capacity)?)),
        Backend::Auto => match GpuExecutor::new(features, capacity) {
            Ok(gpu) => Ok(Box::new(gpu)),
            Err(e) => {
                log::warn!("GPU backend unavailable ({e}); falling back to the CPU backend");
                Ok(Box::new(CpuExecutor::new()))
            }
        },
    }
}
