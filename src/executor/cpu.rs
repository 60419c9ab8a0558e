//! Scalar CPU backend.
//!
//! A literal re-implementation of the kernel arithmetic in
//! [`crate::shaders`]: the spawn fill iterates only the (possibly
//! wrapping) batch range, the update loop walks every slot and no-ops dead
//! ones. The integer hash is shared bit-for-bit with the WGSL path; float
//! math follows the same operation order so the backends agree within
//! floating-point tolerance.
//!
//! After any mutation the storage dirty flag is set so a renderer knows to
//! re-upload; the GPU path never needs that.

use glam::{Vec3, Vec4};

use crate::config::EmitterShape;
use crate::curve::{Channel, CurveTable, CHANNEL_ROTATION_SPEED, CHANNEL_VELOCITY};
use crate::params::Params;
use crate::shaders::{
    GOLDEN, SALT_COLOR_END, SALT_COLOR_START, SALT_DIR_X, SALT_DIR_Y, SALT_DIR_Z, SALT_FADE,
    SALT_ROT_X, SALT_ROT_Y, SALT_ROT_Z, SALT_SHAPE_R, SALT_SHAPE_T, SALT_SHAPE_U, SALT_SHAPE_V,
    SALT_SIZE, SALT_SPEED, SALT_SPIN_X, SALT_SPIN_Y, SALT_SPIN_Z,
};
use crate::storage::{ParticleStorage, DEAD_Y};

use super::{BackendKind, Executor};

const TAU: f32 = std::f32::consts::TAU;

// ---------------------------------------------------------------------------
// Shared random scheme (WGSL mirror)
// ---------------------------------------------------------------------------

/// The avalanche hash both backends share. u32 arithmetic wraps in WGSL by
/// definition; `wrapping_*` keeps the Rust side identical.
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5a_d4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c_1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x3184_8bab);
    x ^= x >> 14;
    x
}

/// Random float in [0, 1].
pub fn rand01(seed: u32) -> f32 {
    hash(seed) as f32 / 4294967295.0
}

/// One attribute stream of a slot's hash sequence.
pub fn slot_rand(seed: u32, salt: u32) -> f32 {
    rand01(seed.wrapping_add(salt.wrapping_mul(GOLDEN)))
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// ---------------------------------------------------------------------------
// Simplex noise (WGSL mirror)
// ---------------------------------------------------------------------------

fn step3(edge: Vec3, x: Vec3) -> Vec3 {
    Vec3::new(
        if x.x >= edge.x { 1.0 } else { 0.0 },
        if x.y >= edge.y { 1.0 } else { 0.0 },
        if x.z >= edge.z { 1.0 } else { 0.0 },
    )
}

fn step4(edge: Vec4, x: Vec4) -> Vec4 {
    Vec4::new(
        if x.x >= edge.x { 1.0 } else { 0.0 },
        if x.y >= edge.y { 1.0 } else { 0.0 },
        if x.z >= edge.z { 1.0 } else { 0.0 },
        if x.w >= edge.w { 1.0 } else { 0.0 },
    )
}

fn mod289_3(x: Vec3) -> Vec3 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn mod289_4(x: Vec4) -> Vec4 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn permute4(x: Vec4) -> Vec4 {
    mod289_4(((x * 34.0) + Vec4::ONE) * x)
}

#[allow(clippy::excessive_precision)]
fn taylor_inv_sqrt4(r: Vec4) -> Vec4 {
    Vec4::splat(1.79284291400159) - 0.85373472095314 * r
}

/// 3D simplex noise, ported operation-for-operation from the WGSL.
pub fn noise3(v: Vec3) -> f32 {
    let cx = 1.0 / 6.0;
    let cy = 1.0 / 3.0;
    let d = Vec4::new(0.0, 0.5, 1.0, 2.0);

    let mut i = (v + Vec3::splat(v.dot(Vec3::splat(cy)))).floor();
    let x0 = v - i + Vec3::splat(i.dot(Vec3::splat(cx)));

    let g = step3(Vec3::new(x0.y, x0.z, x0.x), x0);
    let l = Vec3::ONE - g;
    let l_zxy = Vec3::new(l.z, l.x, l.y);
    let i1 = g.min(l_zxy);
    let i2 = g.max(l_zxy);

    let x1 = x0 - i1 + Vec3::splat(cx);
    let x2 = x0 - i2 + Vec3::splat(cy);
    let x3 = x0 - Vec3::splat(d.y);

    i = mod289_3(i);
    let p = permute4(
        permute4(
            permute4(Vec4::splat(i.z) + Vec4::new(0.0, i1.z, i2.z, 1.0))
                + Vec4::splat(i.y)
                + Vec4::new(0.0, i1.y, i2.y, 1.0),
        ) + Vec4::splat(i.x)
            + Vec4::new(0.0, i1.x, i2.x, 1.0),
    );

    let n_ = 0.142857142857_f32;
    let ns = Vec3::new(n_ * d.w - d.x, n_ * d.y - d.z, n_ * d.z - d.x);

    let j = p - 49.0 * (p * ns.z * ns.z).floor();

    let x_ = (j * ns.z).floor();
    let y_ = (j - 7.0 * x_).floor();

    let x = x_ * ns.x + Vec4::splat(ns.y);
    let y = y_ * ns.x + Vec4::splat(ns.y);
    let h = Vec4::ONE - x.abs() - y.abs();

    let b0 = Vec4::new(x.x, x.y, y.x, y.y);
    let b1 = Vec4::new(x.z, x.w, y.z, y.w);

    let s0 = b0.floor() * 2.0 + Vec4::ONE;
    let s1 = b1.floor() * 2.0 + Vec4::ONE;
    let sh = -step4(h, Vec4::ZERO);

    let a0 = Vec4::new(b0.x, b0.z, b0.y, b0.w)
        + Vec4::new(s0.x, s0.z, s0.y, s0.w) * Vec4::new(sh.x, sh.x, sh.y, sh.y);
    let a1 = Vec4::new(b1.x, b1.z, b1.y, b1.w)
        + Vec4::new(s1.x, s1.z, s1.y, s1.w) * Vec4::new(sh.z, sh.z, sh.w, sh.w);

    let mut p0 = Vec3::new(a0.x, a0.y, h.x);
    let mut p1 = Vec3::new(a0.z, a0.w, h.y);
    let mut p2 = Vec3::new(a1.x, a1.y, h.z);
    let mut p3 = Vec3::new(a1.z, a1.w, h.w);

    let norm = taylor_inv_sqrt4(Vec4::new(p0.dot(p0), p1.dot(p1), p2.dot(p2), p3.dot(p3)));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    let mut m = (Vec4::splat(0.6) - Vec4::new(x0.dot(x0), x1.dot(x1), x2.dot(x2), x3.dot(x3)))
        .max(Vec4::ZERO);
    m *= m;
    42.0 * (m * m).dot(Vec4::new(p0.dot(x0), p1.dot(x1), p2.dot(x2), p3.dot(x3)))
}

/// Six-sample finite-difference curl of the noise field.
pub fn curl_noise(p: Vec3) -> Vec3 {
    let eps = 0.01;
    let dx = Vec3::new(eps, 0.0, 0.0);
    let dy = Vec3::new(0.0, eps, 0.0);
    let dz = Vec3::new(0.0, 0.0, eps);
    let n_py = noise3(p + dy + Vec3::new(0.0, 0.0, 100.0));
    let n_my = noise3(p - dy + Vec3::new(0.0, 0.0, 100.0));
    let n_pz = noise3(p + dz + Vec3::new(0.0, 100.0, 0.0));
    let n_mz = noise3(p - dz + Vec3::new(0.0, 100.0, 0.0));
    let n_px = noise3(p + dx + Vec3::new(100.0, 0.0, 0.0));
    let n_mx = noise3(p - dx + Vec3::new(100.0, 0.0, 0.0));
    Vec3::new(
        (n_py - n_my) - (n_pz - n_mz),
        (n_pz - n_mz) - (n_px - n_mx),
        (n_px - n_mx) - (n_py - n_my),
    ) / (2.0 * eps)
}

/// Rodrigues rotation of `v` so that +Y aligns with `dir` (normalized).
fn rotate_to_axis(dir: Vec3, v: Vec3) -> Vec3 {
    let axis = Vec3::Y.cross(dir);
    let s = axis.length();
    let c = dir.y;
    if s < 1e-5 {
        if c > 0.0 {
            return v;
        }
        return Vec3::new(v.x, -v.y, -v.z);
    }
    let k = axis / s;
    v * c + k.cross(v) * s + k * k.dot(v) * (1.0 - c)
}

fn axis_lerp(table: &[[f32; 2]; 3], t: [f32; 3]) -> Vec3 {
    Vec3::new(
        lerp(table[0][0], table[0][1], t[0]),
        lerp(table[1][0], table[1][1], t[1]),
        lerp(table[2][0], table[2][1], t[2]),
    )
}

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

/// Fill one slot with randomized attributes (WGSL `spawn` mirror).
pub(crate) fn fill_slot(params: &Params, storage: &mut ParticleStorage, idx: u32) {
    let seed = idx.wrapping_add(params.spawn.seed);
    let sr = |salt: u32| slot_rand(seed, salt);

    let offset = match params.shape {
        EmitterShape::Point => Vec3::ZERO,
        EmitterShape::Box => axis_lerp(
            &params.start_position,
            [sr(SALT_SHAPE_T), sr(SALT_SHAPE_U), sr(SALT_SHAPE_V)],
        ),
        EmitterShape::Sphere => {
            let theta = sr(SALT_SHAPE_U) * TAU;
            let phi = (1.0 - 2.0 * sr(SALT_SHAPE_V)).acos();
            let r = if params.surface_only {
                params.radius_range[1]
            } else {
                let r0 = params.radius_range[0];
                let r1 = params.radius_range[1];
                lerp(r0 * r0 * r0, r1 * r1 * r1, sr(SALT_SHAPE_R)).powf(1.0 / 3.0)
            };
            Vec3::new(
                phi.sin() * theta.cos(),
                phi.sin() * theta.sin(),
                phi.cos(),
            ) * r
        }
        EmitterShape::Cone => {
            let h = lerp(params.height_range[0], params.height_range[1], sr(SALT_SHAPE_T));
            let mut r = h * params.cone_angle.sin();
            if !params.surface_only {
                r *= sr(SALT_SHAPE_R).sqrt();
            }
            let theta = sr(SALT_SHAPE_U) * TAU;
            let local = Vec3::new(r * theta.cos(), h, r * theta.sin());
            rotate_to_axis(params.emit_direction, local)
        }
        EmitterShape::Disk => {
            let theta = sr(SALT_SHAPE_U) * TAU;
            let r = if params.surface_only {
                params.radius_range[1]
            } else {
                let r0 = params.radius_range[0];
                let r1 = params.radius_range[1];
                lerp(r0 * r0, r1 * r1, sr(SALT_SHAPE_R)).sqrt()
            };
            let local = Vec3::new(r * theta.cos(), 0.0, r * theta.sin());
            rotate_to_axis(params.emit_direction, local)
        }
        EmitterShape::Edge => {
            let t = sr(SALT_SHAPE_T);
            axis_lerp(&params.start_position, [t, t, t])
        }
    };

    let fade = lerp(params.fade_range[0], params.fade_range[1], sr(SALT_FADE));
    let speed = lerp(params.speed_range[0], params.speed_range[1], sr(SALT_SPEED));

    let velocity = if params.attract_to_center {
        // Converges to the spawn point exactly as lifetime runs out.
        -offset * fade
    } else if params.position_as_direction && offset.length() > 1e-5 {
        offset / offset.length() * speed
    } else {
        let dir = axis_lerp(&params.direction, [sr(SALT_DIR_X), sr(SALT_DIR_Y), sr(SALT_DIR_Z)]);
        let len = dir.length();
        if len < 1e-5 {
            Vec3::Y * speed
        } else {
            dir / len * speed
        }
    };

    let i = idx as usize;
    let position = params.spawn.origin + offset;
    storage.pos_life[i] = [position.x, position.y, position.z, 1.0];
    storage.vel_fade[i] = [velocity.x, velocity.y, velocity.z, fade];
    storage.size[i] = lerp(params.size_range[0], params.size_range[1], sr(SALT_SIZE));

    if let Some(rotation) = &mut storage.rotation {
        let rot = axis_lerp(&params.rotation, [sr(SALT_ROT_X), sr(SALT_ROT_Y), sr(SALT_ROT_Z)]);
        rotation[i] = [rot.x, rot.y, rot.z, 0.0];
    }

    if storage.color_start.is_some() {
        let pick = |salt: u32, count: u32| -> usize {
            ((sr(salt) * count as f32) as u32).min(count.saturating_sub(1)) as usize
        };
        let start = params.colors_start[pick(SALT_COLOR_START, params.color_start_count)];
        let end = params.colors_end[pick(SALT_COLOR_END, params.color_end_count)];
        if let Some(colors) = &mut storage.color_start {
            colors[i] = [start[0], start[1], start[2], 0.0];
        }
        if let Some(colors) = &mut storage.color_end {
            colors[i] = [end[0], end[1], end[2], 0.0];
        }
    }
}

/// Advance one slot by `params.dt` (WGSL `update` mirror). The stage order
/// is load-bearing: collision sees the post-integration position and
/// lifetime decay runs last.
pub(crate) fn integrate_slot(
    params: &Params,
    curves: &CurveTable,
    storage: &mut ParticleStorage,
    idx: usize,
) {
    let lane = storage.pos_life[idx];
    let mut life = lane[3];
    if life <= 0.0 {
        return;
    }
    let mut pos = Vec3::new(lane[0], lane[1], lane[2]);
    let vf = storage.vel_fade[idx];
    let mut vel = Vec3::new(vf[0], vf[1], vf[2]);
    let fade = vf[3];
    let dt = params.dt;

    // 1. Gravity, scaled by particle size.
    vel += params.gravity * dt * (1.0 + storage.size[idx] * params.size_gravity);

    // 2. Speed scale: velocity curve if enabled, friction easing otherwise.
    let progress = 1.0 - life;
    let speed_scale = if params.curve_mask & CHANNEL_VELOCITY != 0 {
        curves.sample(Channel::Velocity, progress)
    } else {
        let intensity = lerp(
            params.friction_range[0],
            params.friction_range[1],
            params.friction_easing.apply(progress),
        );
        1.0 - intensity * 0.9
    };

    // 3. Turbulence.
    if params.turbulence_intensity > 0.0 {
        let t_off = params.elapsed * params.turbulence_speed;
        let curl = curl_noise(pos * params.turbulence_frequency + Vec3::splat(t_off));
        vel += curl * params.turbulence_intensity * dt;
    }

    // 4. Attractors.
    for slot in &params.attractors {
        if slot.strength == 0.0 {
            continue;
        }
        let to = slot.position - pos;
        let dist = to.length();
        if dist < 1e-4 {
            continue;
        }
        let fall = match slot.falloff {
            crate::config::Falloff::Linear => (1.0 - dist / slot.radius).max(0.0),
            crate::config::Falloff::InverseSquare => 1.0 / (1.0 + dist * dist),
        };
        let force = match slot.kind {
            crate::config::AttractorKind::Point => (to / dist) * fall,
            crate::config::AttractorKind::Vortex => {
                let tangent = slot.axis.cross(to / dist);
                let tl = tangent.length();
                if tl > 1e-5 {
                    (tangent / tl) * fall
                } else {
                    Vec3::ZERO
                }
            }
        };
        vel += force * slot.strength * dt;
    }

    // 5. Integrate position.
    pos += vel * dt * speed_scale;

    // 6. Plane collision, against the post-integration position.
    if params.collision.enabled && pos.y < params.collision.plane_y {
        if params.collision.die {
            life = 0.0;
            pos.y = DEAD_Y;
        } else {
            pos.y = params.collision.plane_y;
            vel.y = vel.y.abs() * params.collision.bounce;
            vel.x *= params.collision.friction;
            vel.z *= params.collision.friction;
        }
    }

    // 7. Rotation, hashed from the bare slot index.
    if let Some(rotation) = &mut storage.rotation {
        let spin_scale = if params.curve_mask & CHANNEL_ROTATION_SPEED != 0 {
            curves.sample(Channel::RotationSpeed, progress)
        } else {
            1.0
        };
        let idx_u = idx as u32;
        let spin = axis_lerp(
            &params.rotation_speed,
            [
                slot_rand(idx_u, SALT_SPIN_X),
                slot_rand(idx_u, SALT_SPIN_Y),
                slot_rand(idx_u, SALT_SPIN_Z),
            ],
        );
        let rot = rotation[idx];
        let next = Vec3::new(rot[0], rot[1], rot[2]) + spin * spin_scale * dt;
        rotation[idx] = [next.x, next.y, next.z, 0.0];
    }

    // 8. Lifetime decay last.
    life -= fade * dt;
    if life <= 0.0 {
        life = 0.0;
        pos.y = DEAD_Y;
    }

    storage.pos_life[idx] = [pos.x, pos.y, pos.z, life];
    storage.vel_fade[idx] = [vel.x, vel.y, vel.z, fade];
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// The scalar backend: same buffers, one slot at a time.
pub struct CpuExecutor {
    curves: CurveTable,
}

impl CpuExecutor {
    pub fn new() -> Self {
        Self { curves: CurveTable::default_table() }
    }
}

impl Default for CpuExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for CpuExecutor {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn reset(&mut self, storage: &mut ParticleStorage) {
        storage.reset();
    }

    fn upload_curves(&mut self, table: &CurveTable) {
        self.curves = table.clone();
    }

    fn spawn(&mut self, params: &Params, storage: &mut ParticleStorage) {
        let capacity = storage.capacity();
        for i in 0..params.spawn.count {
            let idx = (params.spawn.start + i) % capacity;
            fill_slot(params, storage, idx);
        }
        storage.mark_dirty();
    }

    fn update(&mut self, params: &Params, storage: &mut ParticleStorage) {
        for idx in 0..storage.capacity() as usize {
            integrate_slot(params, &self.curves, storage, idx);
        }
        storage.mark_dirty();
    }

    fn synchronize(&mut self, _storage: &mut ParticleStorage) {}

    fn drain(&mut self) {}
}
