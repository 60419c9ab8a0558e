//! Declarative configuration and range normalization.
//!
//! User-facing configuration is deliberately loose: most numeric fields
//! accept a bare scalar, a `[min, max]` pair, or (for 3-axis fields) a full
//! per-axis range table. [`ParticleConfig::normalize`] resolves all of that
//! into a canonical [`NormalizedConfig`] where every range is a `[min, max]`
//! pair, every 3-axis field a `[[min, max]; 3]` table, and the color list
//! exactly eight RGB triples plus an active count.
//!
//! Malformed shapes never error; they degrade to the nearest valid
//! interpretation (a 1-element list becomes `[v, v]`, an empty list takes
//! the field default). An empty configuration is valid and produces a
//! visible default emitter: a white omnidirectional point source, speed 1,
//! lifetime one second, size 1.
//!
//! # Example
//!
//! ```ignore
//! let config = ParticleConfig {
//!     max_particles: 5_000,
//!     speed: RangeInput::Range(0.5, 2.0),
//!     lifetime_seconds: RangeInput::Scalar(1.5),
//!     emitter_shape: EmitterShape::Cone,
//!     cone_angle: 0.4,
//!     ..Default::default()
//! };
//! let normalized = config.normalize();
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Maximum number of palette slots carried per color list.
pub const MAX_COLORS: usize = 8;

/// Maximum number of attractor slots.
pub const MAX_ATTRACTORS: usize = 4;

/// A scalar-or-range input.
///
/// Accepts `2.0`, `[0.5, 2.0]`, or a loose list in serialized form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeInput {
    /// A bare scalar `v`, normalized to `[v, v]`.
    Scalar(f32),
    /// An explicit `[min, max]` pair, used as-is.
    Range(f32, f32),
    /// A loose list: 2+ elements use the first two, 1 element collapses to
    /// `[v, v]`, an empty list takes the field default.
    List(Vec<f32>),
}

impl RangeInput {
    /// Resolve to a `[min, max]` pair, falling back to `default` for
    /// degenerate input.
    pub fn resolve(&self, default: [f32; 2]) -> [f32; 2] {
        match self {
            RangeInput::Scalar(v) => [*v, *v],
            RangeInput::Range(a, b) => [*a, *b],
            RangeInput::List(values) => match values.as_slice() {
                [] => default,
                [v] => [*v, *v],
                [a, b, ..] => [*a, *b],
            },
        }
    }
}

impl From<f32> for RangeInput {
    fn from(v: f32) -> Self {
        RangeInput::Scalar(v)
    }
}

impl From<[f32; 2]> for RangeInput {
    fn from(v: [f32; 2]) -> Self {
        RangeInput::Range(v[0], v[1])
    }
}

/// A 3-axis range input.
///
/// Accepts a scalar (broadcast to all axes), a `[min, max]` pair (broadcast
/// to all axes), or an explicit per-axis `3×2` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisInput {
    /// Broadcast `[v, v]` to all three axes.
    Scalar(f32),
    /// Broadcast `[min, max]` to all three axes.
    Range(f32, f32),
    /// Explicit per-axis ranges `[[minX, maxX], [minY, maxY], [minZ, maxZ]]`.
    PerAxis([[f32; 2]; 3]),
}

impl AxisInput {
    /// Resolve to a per-axis `3×2` table.
    pub fn resolve(&self) -> [[f32; 2]; 3] {
        match self {
            AxisInput::Scalar(v) => [[*v, *v]; 3],
            AxisInput::Range(a, b) => [[*a, *b]; 3],
            AxisInput::PerAxis(table) => *table,
        }
    }
}

impl From<f32> for AxisInput {
    fn from(v: f32) -> Self {
        AxisInput::Scalar(v)
    }
}

impl From<[[f32; 2]; 3]> for AxisInput {
    fn from(table: [[f32; 2]; 3]) -> Self {
        AxisInput::PerAxis(table)
    }
}

/// Emission shape of the emitter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmitterShape {
    /// All particles spawn at the emitter origin.
    #[default]
    Point,
    /// Per-axis offset within the start-position range.
    Box,
    /// Uniform in a spherical volume (or on the surface).
    Sphere,
    /// Cone aligned to the emit direction.
    Cone,
    /// Flat circle perpendicular to the emit direction.
    Disk,
    /// Linear interpolation between the start-position corners.
    Edge,
}

/// Easing applied to the friction intensity over particle life.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Evaluate the easing at `t` in `[0, 1]`.
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - 2.0 * (1.0 - t) * (1.0 - t)
                }
            }
        }
    }
}

/// Kind of force an attractor exerts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttractorKind {
    /// Pull straight toward the attractor position.
    #[default]
    Point,
    /// Tangential swirl around the attractor axis.
    Vortex,
}

/// Distance falloff of an attractor force.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Falloff {
    /// Decreases linearly to zero at the attractor radius.
    #[default]
    Linear,
    /// `1 / (1 + d²)` with implicit softening.
    InverseSquare,
}

/// Curl-noise turbulence settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurbulenceConfig {
    /// Force magnitude. Zero disables the stage entirely.
    pub intensity: f32,
    /// Spatial frequency of the noise field.
    pub frequency: f32,
    /// Animation speed of the noise field offset.
    pub speed: f32,
}

impl Default for TurbulenceConfig {
    fn default() -> Self {
        Self { intensity: 1.0, frequency: 1.0, speed: 1.0 }
    }
}

/// One attractor. Up to [`MAX_ATTRACTORS`] are honored; extras are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttractorConfig {
    pub position: [f32; 3],
    pub strength: f32,
    /// Influence radius (linear falloff reaches zero here).
    pub radius: f32,
    pub kind: AttractorKind,
    pub falloff: Falloff,
    /// Swirl axis for [`AttractorKind::Vortex`].
    pub axis: [f32; 3],
}

impl Default for AttractorConfig {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            strength: 1.0,
            radius: 5.0,
            kind: AttractorKind::Point,
            falloff: Falloff::Linear,
            axis: [0.0, 1.0, 0.0],
        }
    }
}

/// Ground-plane collision settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// World-space Y of the collision plane.
    pub plane_y: f32,
    /// Vertical velocity retained on bounce.
    pub bounce: f32,
    /// Horizontal velocity retained on bounce.
    pub friction: f32,
    /// Kill the particle instead of reflecting it.
    pub die: bool,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self { plane_y: 0.0, bounce: 0.5, friction: 0.9, die: false }
    }
}

/// One editable curve: sorted control points with optional Bezier handles.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveSpec {
    pub points: Vec<crate::curve::CurvePoint>,
}

/// Material kind hint for the external renderer.
///
/// The engine only reads this in the recreation gate; a change forces a
/// full rebuild because the render-side pipeline layout changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialKind {
    #[default]
    Unlit,
    Lit,
}

/// Appearance kind hint for the external renderer. Structural, like
/// [`MaterialKind`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppearanceKind {
    #[default]
    Billboard,
    Mesh,
    Trail,
}

/// The full declarative configuration surface.
///
/// Every field has a default; `ParticleConfig::default()` is a valid,
/// visible emitter. See the module docs for the loose-input rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Pool capacity. The ring buffer wraps at this size.
    pub max_particles: u32,

    pub size: RangeInput,
    pub speed: RangeInput,
    pub lifetime_seconds: RangeInput,
    pub friction: RangeInput,
    pub friction_easing: Easing,

    pub gravity: [f32; 3],
    /// Extra gravity proportional to particle size.
    pub size_gravity: f32,

    pub direction: AxisInput,
    pub start_position: AxisInput,
    pub rotation: AxisInput,
    pub rotation_speed: AxisInput,

    /// Birth colors; one is picked per particle. Up to eight are used.
    pub color_start: Vec<[f32; 3]>,
    /// Death colors; `None` reuses the birth color.
    pub color_end: Option<Vec<[f32; 3]>>,

    pub emitter_shape: EmitterShape,
    /// Inner/outer radius for Sphere, Cone and Disk shapes.
    pub radius: RangeInput,
    /// Emit from the shape surface only, instead of the volume.
    pub surface_only: bool,
    /// Cone half-angle in radians.
    pub cone_angle: f32,
    /// Height range for the Cone shape.
    pub height: RangeInput,
    /// Axis the Cone/Disk shapes are rotated onto.
    pub emit_direction: [f32; 3],

    /// Velocity pulls the particle back to the spawn point over its life.
    pub attract_to_center: bool,
    /// Velocity points along the spawn offset instead of the direction range.
    pub position_as_direction: bool,

    pub turbulence: Option<TurbulenceConfig>,
    pub attractors: Option<Vec<AttractorConfig>>,
    pub collision: Option<CollisionConfig>,

    pub soft_particles: bool,
    pub soft_distance: f32,
    /// Velocity-aligned stretch factor (renderer hint).
    pub stretch: f32,
    pub stretch_max: f32,
    pub orient_to_direction: bool,

    pub material: MaterialKind,
    pub appearance: AppearanceKind,
    pub cast_shadow: bool,

    pub size_curve: Option<CurveSpec>,
    pub opacity_curve: Option<CurveSpec>,
    pub velocity_curve: Option<CurveSpec>,
    pub rotation_speed_curve: Option<CurveSpec>,
    /// Pre-baked curve blob; on decode failure the engine re-bakes from the
    /// curve fields above.
    #[serde(skip)]
    pub baked_curves: Option<Vec<u8>>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            max_particles: 1000,
            size: RangeInput::Scalar(1.0),
            speed: RangeInput::Scalar(1.0),
            lifetime_seconds: RangeInput::Scalar(1.0),
            friction: RangeInput::Scalar(0.0),
            friction_easing: Easing::Linear,
            gravity: [0.0; 3],
            size_gravity: 0.0,
            direction: AxisInput::Range(-1.0, 1.0),
            start_position: AxisInput::Scalar(0.0),
            rotation: AxisInput::Scalar(0.0),
            rotation_speed: AxisInput::Scalar(0.0),
            color_start: vec![[1.0, 1.0, 1.0]],
            color_end: None,
            emitter_shape: EmitterShape::Point,
            radius: RangeInput::Range(0.0, 1.0),
            surface_only: false,
            cone_angle: std::f32::consts::FRAC_PI_8,
            height: RangeInput::Range(0.0, 1.0),
            emit_direction: [0.0, 1.0, 0.0],
            attract_to_center: false,
            position_as_direction: false,
            turbulence: None,
            attractors: None,
            collision: None,
            soft_particles: false,
            soft_distance: 0.1,
            stretch: 0.0,
            stretch_max: 2.0,
            orient_to_direction: false,
            material: MaterialKind::Unlit,
            appearance: AppearanceKind::Billboard,
            cast_shadow: false,
            size_curve: None,
            opacity_curve: None,
            velocity_curve: None,
            rotation_speed_curve: None,
            baked_curves: None,
        }
    }
}

impl ParticleConfig {
    /// Resolve every loose field into its canonical form.
    pub fn normalize(&self) -> NormalizedConfig {
        let lifetime = sanitize_lifetime(self.lifetime_seconds.resolve([1.0, 1.0]));

        let (colors_start, color_start_count) = resolve_palette(&self.color_start, [1.0, 1.0, 1.0]);
        let (colors_end, color_end_count, has_color_end) = match &self.color_end {
            Some(list) if !list.is_empty() => {
                let (palette, count) = resolve_palette(list, [1.0, 1.0, 1.0]);
                (palette, count, true)
            }
            _ => (colors_start, color_start_count, false),
        };

        let mut attractors: Vec<AttractorConfig> =
            self.attractors.clone().unwrap_or_default();
        attractors.truncate(MAX_ATTRACTORS);

        let emit_direction = Vec3::from(self.emit_direction).try_normalize().unwrap_or(Vec3::Y);

        NormalizedConfig {
            max_particles: self.max_particles.max(1),
            size: self.size.resolve([1.0, 1.0]),
            speed: self.speed.resolve([1.0, 1.0]),
            lifetime_seconds: lifetime,
            friction: self.friction.resolve([0.0, 0.0]),
            friction_easing: self.friction_easing,
            gravity: Vec3::from(self.gravity),
            size_gravity: self.size_gravity,
            direction: self.direction.resolve(),
            start_position: self.start_position.resolve(),
            rotation: self.rotation.resolve(),
            rotation_speed: self.rotation_speed.resolve(),
            colors_start,
            color_start_count,
            colors_end,
            color_end_count,
            has_color_end,
            shape: self.emitter_shape,
            radius: self.radius.resolve([0.0, 1.0]),
            surface_only: self.surface_only,
            cone_angle: self.cone_angle,
            height: self.height.resolve([0.0, 1.0]),
            emit_direction,
            attract_to_center: self.attract_to_center,
            position_as_direction: self.position_as_direction,
            turbulence: self.turbulence,
            attractors,
            collision: self.collision,
            soft_particles: self.soft_particles,
            soft_distance: self.soft_distance,
            stretch: self.stretch,
            stretch_max: self.stretch_max,
            orient_to_direction: self.orient_to_direction,
            material: self.material,
            appearance: self.appearance,
            cast_shadow: self.cast_shadow,
            size_curve: self.size_curve.clone(),
            opacity_curve: self.opacity_curve.clone(),
            velocity_curve: self.velocity_curve.clone(),
            rotation_speed_curve: self.rotation_speed_curve.clone(),
            baked_curves: self.baked_curves.clone(),
        }
    }
}

/// Canonical configuration: every range resolved, all defaults applied.
///
/// Immutable once produced; rebuilt whenever the owning component is
/// reconfigured.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedConfig {
    pub max_particles: u32,
    pub size: [f32; 2],
    pub speed: [f32; 2],
    pub lifetime_seconds: [f32; 2],
    pub friction: [f32; 2],
    pub friction_easing: Easing,
    pub gravity: Vec3,
    pub size_gravity: f32,
    pub direction: [[f32; 2]; 3],
    pub start_position: [[f32; 2]; 3],
    pub rotation: [[f32; 2]; 3],
    pub rotation_speed: [[f32; 2]; 3],
    /// Exactly eight slots; the last active color pads the tail.
    pub colors_start: [[f32; 3]; MAX_COLORS],
    pub color_start_count: u32,
    pub colors_end: [[f32; 3]; MAX_COLORS],
    pub color_end_count: u32,
    /// Whether a distinct death palette was configured.
    pub has_color_end: bool,
    pub shape: EmitterShape,
    pub radius: [f32; 2],
    pub surface_only: bool,
    pub cone_angle: f32,
    pub height: [f32; 2],
    /// Normalized.
    pub emit_direction: Vec3,
    pub attract_to_center: bool,
    pub position_as_direction: bool,
    pub turbulence: Option<TurbulenceConfig>,
    /// At most [`MAX_ATTRACTORS`] entries.
    pub attractors: Vec<AttractorConfig>,
    pub collision: Option<CollisionConfig>,
    pub soft_particles: bool,
    pub soft_distance: f32,
    pub stretch: f32,
    pub stretch_max: f32,
    pub orient_to_direction: bool,
    pub material: MaterialKind,
    pub appearance: AppearanceKind,
    pub cast_shadow: bool,
    pub size_curve: Option<CurveSpec>,
    pub opacity_curve: Option<CurveSpec>,
    pub velocity_curve: Option<CurveSpec>,
    pub rotation_speed_curve: Option<CurveSpec>,
    pub baked_curves: Option<Vec<u8>>,
}

impl Default for NormalizedConfig {
    fn default() -> Self {
        ParticleConfig::default().normalize()
    }
}

/// Lifetime must stay strictly positive: fade rate is its reciprocal.
fn sanitize_lifetime(range: [f32; 2]) -> [f32; 2] {
    const MIN_LIFETIME: f32 = 1e-3;
    let lo = range[0].max(MIN_LIFETIME);
    let hi = range[1].max(lo);
    [lo, hi]
}

/// Resolve a color list to exactly eight slots plus an active count.
fn resolve_palette(list: &[[f32; 3]], fallback: [f32; 3]) -> ([[f32; 3]; MAX_COLORS], u32) {
    let mut palette = [fallback; MAX_COLORS];
    if list.is_empty() {
        return (palette, 1);
    }
    let count = list.len().min(MAX_COLORS);
    palette[..count].copy_from_slice(&list[..count]);
    // Pad the tail with the last active color.
    for slot in count..MAX_COLORS {
        palette[slot] = palette[count - 1];
    }
    (palette, count as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_becomes_pair() {
        assert_eq!(RangeInput::Scalar(2.5).resolve([0.0, 0.0]), [2.5, 2.5]);
    }

    #[test]
    fn test_loose_list_degrades() {
        assert_eq!(RangeInput::List(vec![]).resolve([3.0, 4.0]), [3.0, 4.0]);
        assert_eq!(RangeInput::List(vec![7.0]).resolve([0.0, 0.0]), [7.0, 7.0]);
        assert_eq!(RangeInput::List(vec![1.0, 2.0, 9.0]).resolve([0.0, 0.0]), [1.0, 2.0]);
    }

    #[test]
    fn test_axis_broadcast() {
        assert_eq!(AxisInput::Scalar(1.0).resolve(), [[1.0, 1.0]; 3]);
        assert_eq!(AxisInput::Range(-1.0, 1.0).resolve(), [[-1.0, 1.0]; 3]);
        let explicit = [[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]];
        assert_eq!(AxisInput::PerAxis(explicit).resolve(), explicit);
    }

    #[test]
    fn test_empty_config_is_valid() {
        let normalized = ParticleConfig::default().normalize();
        assert_eq!(normalized.max_particles, 1000);
        assert_eq!(normalized.size, [1.0, 1.0]);
        assert_eq!(normalized.lifetime_seconds, [1.0, 1.0]);
        assert_eq!(normalized.color_start_count, 1);
        assert_eq!(normalized.colors_start[0], [1.0, 1.0, 1.0]);
        assert_eq!(normalized.shape, EmitterShape::Point);
        assert!(!normalized.has_color_end);
    }

    #[test]
    fn test_palette_pads_with_last_color() {
        let (palette, count) = resolve_palette(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], [0.0; 3]);
        assert_eq!(count, 2);
        assert_eq!(palette[1], [0.0, 1.0, 0.0]);
        for slot in 2..MAX_COLORS {
            assert_eq!(palette[slot], [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn test_palette_truncates_past_eight() {
        let colors: Vec<[f32; 3]> = (0..12).map(|i| [i as f32, 0.0, 0.0]).collect();
        let (palette, count) = resolve_palette(&colors, [0.0; 3]);
        assert_eq!(count, 8);
        assert_eq!(palette[7], [7.0, 0.0, 0.0]);
    }

    #[test]
    fn test_lifetime_sanitized() {
        let config = ParticleConfig {
            lifetime_seconds: RangeInput::Range(0.0, -1.0),
            ..Default::default()
        };
        let normalized = config.normalize();
        assert!(normalized.lifetime_seconds[0] > 0.0);
        assert!(normalized.lifetime_seconds[1] >= normalized.lifetime_seconds[0]);
    }

    #[test]
    fn test_attractors_truncated_to_four() {
        let config = ParticleConfig {
            attractors: Some(vec![AttractorConfig::default(); 7]),
            ..Default::default()
        };
        assert_eq!(config.normalize().attractors.len(), MAX_ATTRACTORS);
    }

    #[test]
    fn test_emit_direction_normalized() {
        let config = ParticleConfig { emit_direction: [0.0, 0.0, 2.0], ..Default::default() };
        let normalized = config.normalize();
        assert!((normalized.emit_direction.length() - 1.0).abs() < 1e-6);

        let degenerate = ParticleConfig { emit_direction: [0.0; 3], ..Default::default() };
        assert_eq!(degenerate.normalize().emit_direction, Vec3::Y);
    }

    #[test]
    fn test_config_deserializes_loose_json() {
        let json = r#"{
            "max_particles": 64,
            "speed": [0.5, 2.0],
            "size": 3.0,
            "direction": [[-1.0, 1.0], [0.0, 1.0], [-1.0, 1.0]],
            "emitter_shape": "Sphere"
        }"#;
        let config: ParticleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_particles, 64);
        assert_eq!(config.speed.resolve([0.0, 0.0]), [0.5, 2.0]);
        assert_eq!(config.size.resolve([0.0, 0.0]), [3.0, 3.0]);
        assert_eq!(config.emitter_shape, EmitterShape::Sphere);
        let dir = config.direction.resolve();
        assert_eq!(dir[1], [0.0, 1.0]);
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [Easing::Linear, Easing::EaseIn, Easing::EaseOut, Easing::EaseInOut] {
            assert!((easing.apply(0.0)).abs() < 1e-6);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6);
        }
        assert!(Easing::EaseIn.apply(0.5) < 0.5);
        assert!(Easing::EaseOut.apply(0.5) > 0.5);
    }
}
