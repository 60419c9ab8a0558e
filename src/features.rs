//! Feature resolution and the recreation gate.
//!
//! Feature flags decide which optional per-particle buffers and physics
//! stages exist. They are derived purely from a [`NormalizedConfig`], and
//! two flag sets are compared field-by-field to decide whether a
//! configuration change needs a full pool rebuild or only an in-place
//! parameter patch.
//!
//! The gate is conservative: a structural key change or any flag flip
//! forces a rebuild. A missed rebuild manifests as stale buffer layouts,
//! so false positives are acceptable and false negatives are not.

use crate::config::NormalizedConfig;

/// Which optional buffers and physics stages are active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Features {
    /// Per-particle rotation buffer exists.
    pub needs_rotation: bool,
    /// Per-particle start/end color buffers exist.
    pub needs_per_particle_color: bool,
    /// Curl-noise turbulence stage runs.
    pub turbulence_active: bool,
    /// Attractor stage runs.
    pub attractors_active: bool,
    /// Plane-collision stage runs.
    pub collision_active: bool,
}

/// Configuration keys a UI layer can report as changed.
///
/// Only the structural subset forces a rebuild by itself; everything else
/// goes through feature comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigKey {
    MaxParticles,
    Material,
    Appearance,
    CastShadow,
    OrientToDirection,
    Size,
    Speed,
    Lifetime,
    Friction,
    Gravity,
    Direction,
    StartPosition,
    Rotation,
    RotationSpeed,
    Colors,
    EmitterShape,
    Turbulence,
    Attractors,
    Collision,
    Curves,
}

/// Keys that always force a rebuild: they change buffer sizing or the
/// render-side pipeline layout.
const STRUCTURAL_KEYS: [ConfigKey; 5] = [
    ConfigKey::MaxParticles,
    ConfigKey::Material,
    ConfigKey::Appearance,
    ConfigKey::CastShadow,
    ConfigKey::OrientToDirection,
];

/// Derive feature flags from a normalized configuration.
pub fn resolve_features(config: &NormalizedConfig) -> Features {
    let axis_nonzero =
        |table: &[[f32; 2]; 3]| table.iter().any(|range| range[0] != 0.0 || range[1] != 0.0);

    Features {
        needs_rotation: axis_nonzero(&config.rotation) || axis_nonzero(&config.rotation_speed),
        needs_per_particle_color: config.color_start_count > 1 || config.has_color_end,
        turbulence_active: config.turbulence.map_or(false, |t| t.intensity > 0.0),
        attractors_active: !config.attractors.is_empty(),
        collision_active: config.collision.is_some(),
    }
}

/// Decide whether a configuration delta requires full reconstruction.
///
/// Returns `true` when any structural key changed or when the merged
/// configuration resolves to a different feature set. Numeric-only changes
/// return `false` and are applied as a cheap parameter patch.
pub fn needs_recreation(
    old: &Features,
    changed: &[ConfigKey],
    merged: &NormalizedConfig,
) -> bool {
    if changed.iter().any(|key| STRUCTURAL_KEYS.contains(key)) {
        return true;
    }
    resolve_features(merged) != *old
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttractorConfig, CollisionConfig, ParticleConfig, TurbulenceConfig};

    #[test]
    fn test_default_config_has_no_features() {
        let features = resolve_features(&ParticleConfig::default().normalize());
        assert_eq!(features, Features::default());
    }

    #[test]
    fn test_rotation_feature_from_either_field() {
        let spin = ParticleConfig { rotation_speed: 2.0.into(), ..Default::default() };
        assert!(resolve_features(&spin.normalize()).needs_rotation);

        let tilt = ParticleConfig { rotation: [[0.0, 1.0], [0.0, 0.0], [0.0, 0.0]].into(), ..Default::default() };
        assert!(resolve_features(&tilt.normalize()).needs_rotation);
    }

    #[test]
    fn test_color_feature() {
        let two_colors = ParticleConfig {
            color_start: vec![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            ..Default::default()
        };
        assert!(resolve_features(&two_colors.normalize()).needs_per_particle_color);

        let fade = ParticleConfig {
            color_end: Some(vec![[0.0, 0.0, 0.0]]),
            ..Default::default()
        };
        assert!(resolve_features(&fade.normalize()).needs_per_particle_color);
    }

    #[test]
    fn test_zero_intensity_turbulence_is_inactive() {
        let config = ParticleConfig {
            turbulence: Some(TurbulenceConfig { intensity: 0.0, ..Default::default() }),
            ..Default::default()
        };
        assert!(!resolve_features(&config.normalize()).turbulence_active);
    }

    #[test]
    fn test_structural_key_forces_rebuild() {
        let merged = ParticleConfig::default().normalize();
        let features = resolve_features(&merged);
        assert!(needs_recreation(&features, &[ConfigKey::MaxParticles], &merged));
        assert!(needs_recreation(&features, &[ConfigKey::Speed, ConfigKey::CastShadow], &merged));
    }

    #[test]
    fn test_numeric_change_patches_in_place() {
        let merged = ParticleConfig { speed: 4.0.into(), ..Default::default() }.normalize();
        let features = resolve_features(&ParticleConfig::default().normalize());
        assert!(!needs_recreation(&features, &[ConfigKey::Speed], &merged));
    }

    #[test]
    fn test_feature_flip_forces_rebuild() {
        let features = resolve_features(&ParticleConfig::default().normalize());

        let with_collision = ParticleConfig {
            collision: Some(CollisionConfig::default()),
            ..Default::default()
        }
        .normalize();
        assert!(needs_recreation(&features, &[ConfigKey::Collision], &with_collision));

        let with_attractor = ParticleConfig {
            attractors: Some(vec![AttractorConfig::default()]),
            ..Default::default()
        }
        .normalize();
        assert!(needs_recreation(&features, &[ConfigKey::Attractors], &with_attractor));
    }
}
