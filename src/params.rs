//! The parameter store: every simulation scalar and vector as a mutable
//! cell, plus the machinery to snapshot, restore, override and upload them.
//!
//! Both backends read the same store. The GPU path serializes it into a
//! [`GpuParams`] uniform block whose layout the WGSL `Params` struct in
//! [`crate::shaders`] mirrors field-for-field; the CPU path reads the cells
//! directly.
//!
//! Spawn-time overrides are applied through an explicit snapshot/restore
//! pair so that two spawn calls issued in the same frame never see each
//! other's overrides: the dispatch snapshots its inputs at issue time, so
//! the store is restored immediately after issuing, not after completion.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::config::{
    AttractorKind, Easing, EmitterShape, Falloff, NormalizedConfig, MAX_ATTRACTORS, MAX_COLORS,
};

/// Runtime flag bits shared with the WGSL kernels.
pub const FLAG_ATTRACT_TO_CENTER: u32 = 1;
pub const FLAG_POSITION_AS_DIRECTION: u32 = 2;
pub const FLAG_SURFACE_ONLY: u32 = 4;
pub const FLAG_COLLISION: u32 = 8;
pub const FLAG_COLLISION_DIE: u32 = 16;
pub const FLAG_TURBULENCE: u32 = 32;

/// One attractor cell. Fixed array of four, indexed numerically; a slot
/// with zero strength is skipped by both backends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttractorSlot {
    pub position: Vec3,
    pub strength: f32,
    pub radius: f32,
    pub kind: AttractorKind,
    pub falloff: Falloff,
    pub axis: Vec3,
}

impl Default for AttractorSlot {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            strength: 0.0,
            radius: 1.0,
            kind: AttractorKind::Point,
            falloff: Falloff::Linear,
            axis: Vec3::Y,
        }
    }
}

/// Plane-collision cells.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CollisionParams {
    pub enabled: bool,
    pub plane_y: f32,
    pub bounce: f32,
    pub friction: f32,
    pub die: bool,
}

/// Descriptor of the spawn batch currently being dispatched.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpawnBatch {
    /// World-space spawn origin.
    pub origin: Vec3,
    /// First pool slot of the batch.
    pub start: u32,
    /// Number of slots to fill (may wrap past capacity).
    pub count: u32,
    /// Fresh per-batch seed mixed into every slot's hash stream.
    pub seed: u32,
}

/// All simulation parameters as mutable cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    pub size_range: [f32; 2],
    pub speed_range: [f32; 2],
    /// Per-second lifetime decay, `[1/lifetime_max, 1/lifetime_min]`.
    pub fade_range: [f32; 2],
    pub gravity: Vec3,
    pub size_gravity: f32,
    pub friction_range: [f32; 2],
    pub friction_easing: Easing,
    pub direction: [[f32; 2]; 3],
    pub start_position: [[f32; 2]; 3],
    pub rotation: [[f32; 2]; 3],
    pub rotation_speed: [[f32; 2]; 3],
    pub colors_start: [[f32; 3]; MAX_COLORS],
    pub color_start_count: u32,
    pub colors_end: [[f32; 3]; MAX_COLORS],
    pub color_end_count: u32,
    pub shape: EmitterShape,
    pub radius_range: [f32; 2],
    pub surface_only: bool,
    pub cone_angle: f32,
    pub height_range: [f32; 2],
    pub emit_direction: Vec3,
    pub attract_to_center: bool,
    pub position_as_direction: bool,
    pub turbulence_intensity: f32,
    pub turbulence_frequency: f32,
    pub turbulence_speed: f32,
    /// Accumulated simulation time animating the turbulence field.
    pub elapsed: f32,
    pub attractors: [AttractorSlot; MAX_ATTRACTORS],
    pub collision: CollisionParams,
    pub soft_particles: bool,
    pub soft_distance: f32,
    pub stretch: f32,
    pub stretch_max: f32,
    pub orient_to_direction: bool,
    /// Enabled curve channels, [`crate::curve`] bitmask bits.
    pub curve_mask: u32,
    pub spawn: SpawnBatch,
    pub dt: f32,
}

/// A saved copy of the store, restored after a spawn dispatch is issued.
#[derive(Clone, Debug)]
pub struct ParamSnapshot(Params);

impl Params {
    /// Full rebuild from a normalized configuration.
    pub fn from_config(config: &NormalizedConfig) -> Self {
        let mut attractors = [AttractorSlot::default(); MAX_ATTRACTORS];
        for (slot, a) in attractors.iter_mut().zip(&config.attractors) {
            *slot = AttractorSlot {
                position: Vec3::from(a.position),
                strength: a.strength,
                radius: a.radius.max(1e-4),
                kind: a.kind,
                falloff: a.falloff,
                axis: Vec3::from(a.axis).try_normalize().unwrap_or(Vec3::Y),
            };
        }

        let collision = match config.collision {
            Some(c) => CollisionParams {
                enabled: true,
                plane_y: c.plane_y,
                bounce: c.bounce,
                friction: c.friction,
                die: c.die,
            },
            None => CollisionParams::default(),
        };

        let (turbulence_intensity, turbulence_frequency, turbulence_speed) =
            match config.turbulence {
                Some(t) => (t.intensity, t.frequency, t.speed),
                None => (0.0, 1.0, 1.0),
            };

        Self {
            size_range: config.size,
            speed_range: config.speed,
            fade_range: fade_range_from_lifetime(config.lifetime_seconds),
            gravity: config.gravity,
            size_gravity: config.size_gravity,
            friction_range: config.friction,
            friction_easing: config.friction_easing,
            direction: config.direction,
            start_position: config.start_position,
            rotation: config.rotation,
            rotation_speed: config.rotation_speed,
            colors_start: config.colors_start,
            color_start_count: config.color_start_count,
            colors_end: config.colors_end,
            color_end_count: config.color_end_count,
            shape: config.shape,
            radius_range: config.radius,
            surface_only: config.surface_only,
            cone_angle: config.cone_angle,
            height_range: config.height,
            emit_direction: config.emit_direction,
            attract_to_center: config.attract_to_center,
            position_as_direction: config.position_as_direction,
            turbulence_intensity,
            turbulence_frequency,
            turbulence_speed,
            elapsed: 0.0,
            attractors,
            collision,
            soft_particles: config.soft_particles,
            soft_distance: config.soft_distance,
            stretch: config.stretch,
            stretch_max: config.stretch_max,
            orient_to_direction: config.orient_to_direction,
            curve_mask: 0,
            spawn: SpawnBatch::default(),
            dt: 0.0,
        }
    }

    /// Save the current cells.
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot(self.clone())
    }

    /// Restore a previously saved state.
    pub fn restore(&mut self, snapshot: ParamSnapshot) {
        *self = snapshot.0;
    }

    /// Serialize into the GPU uniform block.
    pub fn to_gpu(&self, capacity: u32) -> GpuParams {
        let mut flags = 0u32;
        if self.attract_to_center {
            flags |= FLAG_ATTRACT_TO_CENTER;
        }
        if self.position_as_direction {
            flags |= FLAG_POSITION_AS_DIRECTION;
        }
        if self.surface_only {
            flags |= FLAG_SURFACE_ONLY;
        }
        if self.collision.enabled {
            flags |= FLAG_COLLISION;
        }
        if self.collision.die {
            flags |= FLAG_COLLISION_DIE;
        }
        if self.turbulence_intensity > 0.0 {
            flags |= FLAG_TURBULENCE;
        }

        let axis_lane = |table: &[[f32; 2]; 3], side: usize| {
            [table[0][side], table[1][side], table[2][side], 0.0]
        };
        let color_lane = |c: &[f32; 3]| [c[0], c[1], c[2], 0.0];

        let mut attractor_pos = [[0.0; 4]; MAX_ATTRACTORS];
        let mut attractor_axis = [[0.0; 4]; MAX_ATTRACTORS];
        let mut attractor_meta = [[0u32; 4]; MAX_ATTRACTORS];
        for (i, a) in self.attractors.iter().enumerate() {
            attractor_pos[i] = [a.position.x, a.position.y, a.position.z, a.strength];
            attractor_axis[i] = [a.axis.x, a.axis.y, a.axis.z, a.radius];
            attractor_meta[i] = [a.kind as u32, a.falloff as u32, 0, 0];
        }

        let mut colors_start = [[0.0; 4]; MAX_COLORS];
        let mut colors_end = [[0.0; 4]; MAX_COLORS];
        for i in 0..MAX_COLORS {
            colors_start[i] = color_lane(&self.colors_start[i]);
            colors_end[i] = color_lane(&self.colors_end[i]);
        }

        GpuParams {
            gravity_dt: [self.gravity.x, self.gravity.y, self.gravity.z, self.dt],
            size_speed: [
                self.size_range[0],
                self.size_range[1],
                self.speed_range[0],
                self.speed_range[1],
            ],
            fade_friction: [
                self.fade_range[0],
                self.fade_range[1],
                self.friction_range[0],
                self.friction_range[1],
            ],
            dir_min: axis_lane(&self.direction, 0),
            dir_max: axis_lane(&self.direction, 1),
            start_min: axis_lane(&self.start_position, 0),
            start_max: axis_lane(&self.start_position, 1),
            rot_min: axis_lane(&self.rotation, 0),
            rot_max: axis_lane(&self.rotation, 1),
            spin_min: axis_lane(&self.rotation_speed, 0),
            spin_max: axis_lane(&self.rotation_speed, 1),
            emit_dir: [
                self.emit_direction.x,
                self.emit_direction.y,
                self.emit_direction.z,
                self.cone_angle,
            ],
            shape_ranges: [
                self.radius_range[0],
                self.radius_range[1],
                self.height_range[0],
                self.height_range[1],
            ],
            turbulence: [
                self.turbulence_intensity,
                self.turbulence_frequency,
                self.turbulence_speed,
                self.elapsed,
            ],
            collision: [
                self.collision.plane_y,
                self.collision.bounce,
                self.collision.friction,
                self.size_gravity,
            ],
            render: [self.stretch, self.stretch_max, self.soft_distance, 0.0],
            spawn_origin: [self.spawn.origin.x, self.spawn.origin.y, self.spawn.origin.z, 0.0],
            colors_start,
            colors_end,
            attractor_pos,
            attractor_axis,
            attractor_meta,
            flags_shape: [flags, self.shape as u32, self.friction_easing as u32, self.curve_mask],
            spawn_info: [self.spawn.start, self.spawn.count, self.spawn.seed, capacity],
            color_counts: [self.color_start_count, self.color_end_count, 0, 0],
        }
    }
}

/// Lifetime range to fade-rate range: higher fade rate, shorter life.
pub fn fade_range_from_lifetime(lifetime: [f32; 2]) -> [f32; 2] {
    [1.0 / lifetime[1].max(1e-3), 1.0 / lifetime[0].max(1e-3)]
}

/// The uniform block both kernels read.
///
/// Every field is a 16-byte lane so the layout matches the WGSL struct in
/// [`crate::shaders`] with no implicit padding.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GpuParams {
    /// gravity.xyz, dt
    pub gravity_dt: [f32; 4],
    /// size min/max, speed min/max
    pub size_speed: [f32; 4],
    /// fade min/max, friction min/max
    pub fade_friction: [f32; 4],
    pub dir_min: [f32; 4],
    pub dir_max: [f32; 4],
    pub start_min: [f32; 4],
    pub start_max: [f32; 4],
    pub rot_min: [f32; 4],
    pub rot_max: [f32; 4],
    pub spin_min: [f32; 4],
    pub spin_max: [f32; 4],
    /// emit direction.xyz, cone angle
    pub emit_dir: [f32; 4],
    /// radius min/max, height min/max
    pub shape_ranges: [f32; 4],
    /// intensity, frequency, speed, elapsed
    pub turbulence: [f32; 4],
    /// plane_y, bounce, friction, size_gravity
    pub collision: [f32; 4],
    /// stretch, stretch_max, soft_distance, unused
    pub render: [f32; 4],
    /// spawn origin.xyz, unused
    pub spawn_origin: [f32; 4],
    pub colors_start: [[f32; 4]; MAX_COLORS],
    pub colors_end: [[f32; 4]; MAX_COLORS],
    /// position.xyz, strength
    pub attractor_pos: [[f32; 4]; MAX_ATTRACTORS],
    /// axis.xyz, radius
    pub attractor_axis: [[f32; 4]; MAX_ATTRACTORS],
    /// kind, falloff, unused, unused
    pub attractor_meta: [[u32; 4]; MAX_ATTRACTORS],
    /// flag bits, shape, friction easing, curve mask
    pub flags_shape: [u32; 4],
    /// start index, count, batch seed, capacity
    pub spawn_info: [u32; 4],
    /// start count, end count, unused, unused
    pub color_counts: [u32; 4],
}

/// The emit-override schema: an all-optional subset of the configuration,
/// merged over the persistent parameters for a single spawn call (or
/// applied persistently by [`crate::pool::ParticlePool::apply_patch`]).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamOverrides {
    pub size: Option<[f32; 2]>,
    pub speed: Option<[f32; 2]>,
    pub lifetime_seconds: Option<[f32; 2]>,
    pub gravity: Option<Vec3>,
    pub direction: Option<[[f32; 2]; 3]>,
    pub start_position: Option<[[f32; 2]; 3]>,
    pub rotation: Option<[[f32; 2]; 3]>,
    pub rotation_speed: Option<[[f32; 2]; 3]>,
    pub color_start: Option<Vec<[f32; 3]>>,
    pub color_end: Option<Vec<[f32; 3]>>,
    pub emitter_shape: Option<EmitterShape>,
    pub radius: Option<[f32; 2]>,
    pub surface_only: Option<bool>,
    pub cone_angle: Option<f32>,
    pub height: Option<[f32; 2]>,
    pub emit_direction: Option<Vec3>,
    pub attract_to_center: Option<bool>,
}

impl ParamOverrides {
    /// Apply every set field to the store.
    pub fn apply(&self, params: &mut Params) {
        if let Some(v) = self.size {
            params.size_range = v;
        }
        if let Some(v) = self.speed {
            params.speed_range = v;
        }
        if let Some(v) = self.lifetime_seconds {
            params.fade_range = fade_range_from_lifetime(v);
        }
        if let Some(v) = self.gravity {
            params.gravity = v;
        }
        if let Some(v) = self.direction {
            params.direction = v;
        }
        if let Some(v) = self.start_position {
            params.start_position = v;
        }
        if let Some(v) = self.rotation {
            params.rotation = v;
        }
        if let Some(v) = self.rotation_speed {
            params.rotation_speed = v;
        }
        if let Some(list) = &self.color_start {
            apply_palette(list, &mut params.colors_start, &mut params.color_start_count);
        }
        if let Some(list) = &self.color_end {
            apply_palette(list, &mut params.colors_end, &mut params.color_end_count);
        }
        if let Some(v) = self.emitter_shape {
            params.shape = v;
        }
        if let Some(v) = self.radius {
            params.radius_range = v;
        }
        if let Some(v) = self.surface_only {
            params.surface_only = v;
        }
        if let Some(v) = self.cone_angle {
            params.cone_angle = v;
        }
        if let Some(v) = self.height {
            params.height_range = v;
        }
        if let Some(v) = self.emit_direction {
            params.emit_direction = v.try_normalize().unwrap_or(Vec3::Y);
        }
        if let Some(v) = self.attract_to_center {
            params.attract_to_center = v;
        }
    }

    /// Overlay `other` on top of `self`: fields set in `other` win.
    pub fn merge_from(&mut self, other: &ParamOverrides) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field.clone();
                }
            };
        }
        take!(size);
        take!(speed);
        take!(lifetime_seconds);
        take!(gravity);
        take!(direction);
        take!(start_position);
        take!(rotation);
        take!(rotation_speed);
        take!(color_start);
        take!(color_end);
        take!(emitter_shape);
        take!(radius);
        take!(surface_only);
        take!(cone_angle);
        take!(height);
        take!(emit_direction);
        take!(attract_to_center);
    }
}

fn apply_palette(list: &[[f32; 3]], palette: &mut [[f32; 3]; MAX_COLORS], count: &mut u32) {
    if list.is_empty() {
        return;
    }
    let n = list.len().min(MAX_COLORS);
    palette[..n].copy_from_slice(&list[..n]);
    for slot in n..MAX_COLORS {
        palette[slot] = palette[n - 1];
    }
    *count = n as u32;
}
