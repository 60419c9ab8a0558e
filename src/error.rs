//! Error types for the engine.
//!
//! This module provides error types for backend acquisition and curve blob
//! decoding. Malformed configuration never errors; it degrades to defaults
//! in the normalizer.

use std::fmt;

/// Errors that can occur while acquiring a compute backend.
#[derive(Debug)]
pub enum BackendError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NoAdapter => write!(
                f,
                "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support, or construct the pool with Backend::Cpu."
            ),
            BackendError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::RequestDeviceError> for BackendError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        BackendError::DeviceCreation(e)
    }
}

/// Errors that can occur when decoding a pre-baked curve blob.
///
/// These are recoverable: the caller falls back to baking from curve
/// properties (or the default linear fade) and logs a warning.
#[derive(Debug)]
pub enum CurveError {
    /// The blob length matches neither the headered nor the legacy format.
    SizeMismatch {
        /// Number of f32 words in the blob.
        got: usize,
        /// Number of f32 words the headered format expects.
        expected: usize,
    },
    /// The blob has the headered length but the magic word does not match.
    BadMagic(f32),
    /// The blob length is not a multiple of 4 bytes.
    Truncated(usize),
}

impl fmt::Display for CurveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveError::SizeMismatch { got, expected } => write!(
                f,
                "Curve blob size mismatch: got {} f32 words, expected {} (or {} legacy)",
                got,
                expected,
                expected - 4
            ),
            CurveError::BadMagic(m) => write!(f, "Curve blob has unrecognized magic word {}", m),
            CurveError::Truncated(len) => {
                write!(f, "Curve blob length {} is not a whole number of f32 words", len)
            }
        }
    }
}

impl std::error::Error for CurveError {}
