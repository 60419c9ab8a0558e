//! Curve baking: editable splines into a sampled lookup table.
//!
//! Editable curves are sorted 2-D control points with optional incoming and
//! outgoing Bezier handle offsets. Runtime never evaluates the spline;
//! [`bake_to_array`] samples it into a fixed-resolution array once, and
//! [`CurveTable`] packs up to four independent channels (size, opacity,
//! velocity, rotation speed) into one interleaved table shared by both
//! backends.
//!
//! Degenerate input (fewer than two points, unsorted or malformed data)
//! yields the default linear fade `y = 1 - x` rather than an error.
//!
//! # Binary format
//!
//! ```text
//! [magic: f32][channel bitmask: f32][reserved: f32][reserved: f32]
//! [256 × 4 interleaved f32 samples]
//! ```
//!
//! A legacy header-less blob (exactly the 256 × 4 block) is also accepted
//! and treated as all-channels-active. Any other size is a [`CurveError`]
//! so the caller can fall back to baking from curve properties.

use crate::error::CurveError;
use serde::{Deserialize, Serialize};

/// Samples per channel.
pub const CURVE_RESOLUTION: usize = 256;

/// Interleaved channels per sample.
pub const CURVE_CHANNELS: usize = 4;

/// Magic word of the headered blob format.
pub const CURVE_MAGIC: f32 = 31415.9265;

/// Channel bitmask bits.
pub const CHANNEL_SIZE: u32 = 1;
pub const CHANNEL_OPACITY: u32 = 2;
pub const CHANNEL_VELOCITY: u32 = 4;
pub const CHANNEL_ROTATION_SPEED: u32 = 8;

/// Interleaved channel order within one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Channel {
    Size = 0,
    Opacity = 1,
    Velocity = 2,
    RotationSpeed = 3,
}

impl Channel {
    /// The bitmask bit for this channel.
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// One spline control point with optional Bezier handle offsets.
///
/// Handles are offsets relative to the point, matching how curve editors
/// store them. A missing handle degrades the segment toward linear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
    /// Incoming handle offset, used when this point ends a segment.
    pub handle_in: Option<[f32; 2]>,
    /// Outgoing handle offset, used when this point starts a segment.
    pub handle_out: Option<[f32; 2]>,
}

impl CurvePoint {
    /// A plain point with no handles.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, handle_in: None, handle_out: None }
    }
}

/// Cubic Bezier evaluation for one component.
fn bezier(t: f32, p0: f32, p1: f32, p2: f32, p3: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Default fade-out curve: `y = 1 - x`.
fn default_fade(x: f32) -> f32 {
    1.0 - x
}

/// Sample an editable curve at `x` in `[0, 1]`.
///
/// Locates the segment bracketing `x`, bisects (20 iterations, tolerance
/// 1e-4) for the Bezier parameter whose x-coordinate matches, evaluates the
/// cubic at that parameter and clamps the result to `[-0.5, 1.5]` so
/// elastic overshoot stays bounded. Degenerate input yields `1 - x`.
pub fn sample_curve_at(x: f32, points: &[CurvePoint]) -> f32 {
    if points.len() < 2 {
        return default_fade(x);
    }
    for pair in points.windows(2) {
        if pair[1].x < pair[0].x {
            return default_fade(x);
        }
    }

    let first = &points[0];
    let last = &points[points.len() - 1];
    if x <= first.x {
        return first.y.clamp(-0.5, 1.5);
    }
    if x >= last.x {
        return last.y.clamp(-0.5, 1.5);
    }

    // Bracketing segment.
    let mut segment = 0;
    for (i, pair) in points.windows(2).enumerate() {
        if x >= pair[0].x && x <= pair[1].x {
            segment = i;
            break;
        }
    }
    let p0 = &points[segment];
    let p3 = &points[segment + 1];

    let out = p0.handle_out.unwrap_or([0.0, 0.0]);
    let inc = p3.handle_in.unwrap_or([0.0, 0.0]);
    let (c1x, c1y) = (p0.x + out[0], p0.y + out[1]);
    let (c2x, c2y) = (p3.x + inc[0], p3.y + inc[1]);

    // Bisect for the parameter whose x matches. Handle x-offsets are
    // constrained by editors to keep x(t) monotonic within a segment.
    let mut lo = 0.0_f32;
    let mut hi = 1.0_f32;
    let mut t = 0.5_f32;
    for _ in 0..20 {
        t = 0.5 * (lo + hi);
        let bx = bezier(t, p0.x, c1x, c2x, p3.x);
        let err = bx - x;
        if err.abs() < 1e-4 {
            break;
        }
        if err > 0.0 {
            hi = t;
        } else {
            lo = t;
        }
    }

    bezier(t, p0.y, c1y, c2y, p3.y).clamp(-0.5, 1.5)
}

/// Bake a curve into `resolution` samples over `x` in `[0, 1]`.
pub fn bake_to_array(points: &[CurvePoint], resolution: usize) -> Vec<f32> {
    let denom = resolution.saturating_sub(1).max(1) as f32;
    (0..resolution).map(|i| sample_curve_at(i as f32 / denom, points)).collect()
}

/// The combined multi-channel lookup table.
///
/// Stored interleaved (`sample * 4 + channel`) so one storage buffer serves
/// all channels on the GPU path; the CPU path indexes the same layout.
#[derive(Clone, Debug, PartialEq)]
pub struct CurveTable {
    samples: Vec<f32>,
    mask: u32,
}

impl CurveTable {
    /// Build from up to four independent curves.
    ///
    /// A `None` channel gets the default linear fade and its bit stays
    /// clear in the mask, so consumers can fall back to prop-driven values
    /// for unset channels.
    pub fn build(
        size: Option<&[CurvePoint]>,
        opacity: Option<&[CurvePoint]>,
        velocity: Option<&[CurvePoint]>,
        rotation_speed: Option<&[CurvePoint]>,
    ) -> Self {
        let channels = [size, opacity, velocity, rotation_speed];
        let mut mask = 0;
        let baked: Vec<Vec<f32>> = channels
            .iter()
            .enumerate()
            .map(|(i, curve)| match curve {
                Some(points) => {
                    mask |= 1 << i;
                    bake_to_array(points, CURVE_RESOLUTION)
                }
                None => bake_to_array(&[], CURVE_RESOLUTION),
            })
            .collect();

        let mut samples = vec![0.0; CURVE_RESOLUTION * CURVE_CHANNELS];
        for sample in 0..CURVE_RESOLUTION {
            for channel in 0..CURVE_CHANNELS {
                samples[sample * CURVE_CHANNELS + channel] = baked[channel][sample];
            }
        }
        Self { samples, mask }
    }

    /// An all-default table (every channel the linear fade, empty mask).
    pub fn default_table() -> Self {
        Self::build(None, None, None, None)
    }

    /// The channel-active bitmask.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// The raw interleaved samples, `256 × 4` f32.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Whether a channel was baked from a real curve.
    pub fn is_active(&self, channel: Channel) -> bool {
        self.mask & channel.bit() != 0
    }

    /// Nearest-sample lookup of one channel at `progress` in `[0, 1]`.
    ///
    /// Truncating index math, identical to the WGSL kernels.
    pub fn sample(&self, channel: Channel, progress: f32) -> f32 {
        let index = (progress.clamp(0.0, 1.0) * (CURVE_RESOLUTION - 1) as f32) as usize;
        self.samples[index * CURVE_CHANNELS + channel as usize]
    }

    /// Serialize to the headered binary blob.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((4 + self.samples.len()) * 4);
        for word in [CURVE_MAGIC, self.mask as f32, 0.0, 0.0] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    /// Deserialize from a headered or legacy header-less blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CurveError> {
        if bytes.len() % 4 != 0 {
            return Err(CurveError::Truncated(bytes.len()));
        }
        let words: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        const TABLE_WORDS: usize = CURVE_RESOLUTION * CURVE_CHANNELS;
        match words.len() {
            // Legacy blob: bare table, all channels active.
            TABLE_WORDS => Ok(Self { samples: words, mask: 0xF }),
            len if len == TABLE_WORDS + 4 => {
                if words[0] != CURVE_MAGIC {
                    return Err(CurveError::BadMagic(words[0]));
                }
                let mask = words[1] as u32 & 0xF;
                Ok(Self { samples: words[4..].to_vec(), mask })
            }
            len => Err(CurveError::SizeMismatch { got: len, expected: TABLE_WORDS + 4 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Vec<CurvePoint> {
        vec![CurvePoint::new(0.0, 0.2), CurvePoint::new(1.0, 0.8)]
    }

    fn eased() -> Vec<CurvePoint> {
        vec![
            CurvePoint { x: 0.0, y: 1.0, handle_in: None, handle_out: Some([0.3, 0.0]) },
            CurvePoint { x: 1.0, y: 0.0, handle_in: Some([-0.3, 0.0]), handle_out: None },
        ]
    }

    #[test]
    fn test_bake_length_and_endpoints() {
        let baked = bake_to_array(&ramp(), CURVE_RESOLUTION);
        assert_eq!(baked.len(), CURVE_RESOLUTION);
        assert!((baked[0] - 0.2).abs() < 1e-3);
        assert!((baked[CURVE_RESOLUTION - 1] - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_curve_is_linear_fade() {
        for degenerate in [vec![], vec![CurvePoint::new(0.5, 0.5)]] {
            let baked = bake_to_array(&degenerate, CURVE_RESOLUTION);
            for (i, value) in baked.iter().enumerate() {
                let expected = 1.0 - i as f32 / (CURVE_RESOLUTION - 1) as f32;
                assert!((value - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_unsorted_points_degrade() {
        let unsorted = vec![CurvePoint::new(0.8, 0.0), CurvePoint::new(0.2, 1.0)];
        assert!((sample_curve_at(0.5, &unsorted) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_bezier_handles_bend_the_segment() {
        // Flat handles hold the curve near its endpoint values longer than
        // a straight line would.
        let mid = sample_curve_at(0.25, &eased());
        assert!(mid > 0.75, "eased curve should stay high early, got {mid}");
    }

    #[test]
    fn test_overshoot_is_clamped() {
        let wild = vec![
            CurvePoint { x: 0.0, y: 1.0, handle_in: None, handle_out: Some([0.1, 8.0]) },
            CurvePoint { x: 1.0, y: 0.0, handle_in: Some([-0.1, -8.0]), handle_out: None },
        ];
        for i in 0..64 {
            let y = sample_curve_at(i as f32 / 63.0, &wild);
            assert!((-0.5..=1.5).contains(&y));
        }
    }

    #[test]
    fn test_combined_table_mask() {
        let table = CurveTable::build(Some(&ramp()), None, Some(&eased()), None);
        assert!(table.is_active(Channel::Size));
        assert!(!table.is_active(Channel::Opacity));
        assert!(table.is_active(Channel::Velocity));
        assert!(!table.is_active(Channel::RotationSpeed));
        assert_eq!(table.mask(), CHANNEL_SIZE | CHANNEL_VELOCITY);

        // Unset channels carry the default fade.
        assert!((table.sample(Channel::Opacity, 0.0) - 1.0).abs() < 1e-6);
        assert!((table.sample(Channel::Opacity, 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_blob_round_trip() {
        let table = CurveTable::build(Some(&ramp()), Some(&eased()), None, None);
        let decoded = CurveTable::from_bytes(&table.to_bytes()).unwrap();
        assert_eq!(decoded.mask(), table.mask());
        for (a, b) in decoded.samples().iter().zip(table.samples()) {
            assert!((a - b).abs() < 1e-7);
        }
    }

    #[test]
    fn test_legacy_blob_all_channels_active() {
        let table = CurveTable::build(Some(&ramp()), None, None, None);
        // Strip the 16-byte header to fabricate a legacy blob.
        let legacy = &table.to_bytes()[16..];
        let decoded = CurveTable::from_bytes(legacy).unwrap();
        assert_eq!(decoded.mask(), 0xF);
        assert_eq!(decoded.samples(), table.samples());
    }

    #[test]
    fn test_bad_blob_sizes_error() {
        assert!(matches!(CurveTable::from_bytes(&[0; 7]), Err(CurveError::Truncated(7))));
        assert!(matches!(
            CurveTable::from_bytes(&[0; 512]),
            Err(CurveError::SizeMismatch { .. })
        ));
        let mut blob = CurveTable::default_table().to_bytes();
        blob[0] = 0xFF;
        blob[1] = 0xFF;
        assert!(matches!(CurveTable::from_bytes(&blob), Err(CurveError::BadMagic(_))));
    }

    #[test]
    fn test_sample_is_nearest_no_filtering() {
        let table = CurveTable::default_table();
        // Default fade at progress 0.5 reads sample 127 of 255.
        let expected = 1.0 - 127.0 / 255.0;
        assert!((table.sample(Channel::Velocity, 0.5) - expected).abs() < 1e-6);
    }
}
