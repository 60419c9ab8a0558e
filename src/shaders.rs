//! WGSL kernel generation.
//!
//! Both compute kernels (spawn and update) are assembled as one shader
//! module per feature set. The pseudo-random scheme (avalanche hash,
//! `rand01`, salted per-slot streams) is defined here and mirrored
//! bit-for-bit by the scalar backend in [`crate::executor::cpu`], which is
//! what makes the two backends interchangeable from the caller's
//! perspective.
//!
//! Binding layout (group 0), optional bindings appended in order:
//!
//! | Binding | Buffer |
//! |---------|--------|
//! | 0 | `Params` uniform |
//! | 1 | `pos_life` storage |
//! | 2 | `vel_fade` storage |
//! | 3 | `size` storage |
//! | 4 | curve table storage (read) |
//! | 5.. | `rotation`, `color_start`, `color_end` when feature-gated in |

use crate::features::Features;

/// Compute workgroup size for both kernels.
pub const WORKGROUP_SIZE: u32 = 256;

/// Golden-ratio constant spacing the attribute salt streams so neighboring
/// slots never alias each other's attributes.
pub const GOLDEN: u32 = 0x9E37_79B9;

// Per-attribute salts of the spawn hash stream. The integrator's rotation
// salts are deliberately disjoint and keyed by bare slot index, not the
// batch seed.
pub const SALT_DIR_X: u32 = 0;
pub const SALT_DIR_Y: u32 = 1;
pub const SALT_DIR_Z: u32 = 2;
pub const SALT_SPEED: u32 = 3;
pub const SALT_FADE: u32 = 4;
pub const SALT_SIZE: u32 = 5;
pub const SALT_COLOR_START: u32 = 6;
pub const SALT_COLOR_END: u32 = 7;
pub const SALT_ROT_X: u32 = 8;
pub const SALT_ROT_Y: u32 = 9;
pub const SALT_ROT_Z: u32 = 10;
pub const SALT_SHAPE_T: u32 = 11;
pub const SALT_SHAPE_U: u32 = 12;
pub const SALT_SHAPE_V: u32 = 13;
pub const SALT_SHAPE_R: u32 = 14;
pub const SALT_SPIN_X: u32 = 24;
pub const SALT_SPIN_Y: u32 = 25;
pub const SALT_SPIN_Z: u32 = 26;

/// Storage binding index of the rotation buffer, if the feature is active.
pub fn rotation_binding(features: &Features) -> Option<u32> {
    features.needs_rotation.then_some(5)
}

/// Storage binding indices of the color buffers, if the feature is active.
pub fn color_bindings(features: &Features) -> Option<(u32, u32)> {
    if !features.needs_per_particle_color {
        return None;
    }
    let base = if features.needs_rotation { 6 } else { 5 };
    Some((base, base + 1))
}

/// Hash and salted random streams. The Rust mirror lives in
/// `executor::cpu`; u32 arithmetic wraps identically on both sides.
const RANDOM_WGSL: &str = r#"
fn hash(n: u32) -> u32 {
    var x = n;
    x = x ^ (x >> 17u);
    x = x * 0xed5ad4bbu;
    x = x ^ (x >> 11u);
    x = x * 0xac4c1b51u;
    x = x ^ (x >> 15u);
    x = x * 0x31848babu;
    x = x ^ (x >> 14u);
    return x;
}

fn rand01(seed: u32) -> f32 {
    return f32(hash(seed)) / 4294967295.0;
}

fn slot_rand(seed: u32, salt: u32) -> f32 {
    return rand01(seed + salt * GOLDEN);
}

fn flerp(a: f32, b: f32, t: f32) -> f32 {
    return a + (b - a) * t;
}
"#;

/// 3D simplex noise and the six-sample finite-difference curl.
const NOISE_WGSL: &str = r#"
fn mod289_3(x: vec3<f32>) -> vec3<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn mod289_4(x: vec4<f32>) -> vec4<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn permute4(x: vec4<f32>) -> vec4<f32> {
    return mod289_4(((x * 34.0) + 1.0) * x);
}

fn taylor_inv_sqrt4(r: vec4<f32>) -> vec4<f32> {
    return 1.79284291400159 - 0.85373472095314 * r;
}

fn noise3(v: vec3<f32>) -> f32 {
    let C = vec2<f32>(1.0/6.0, 1.0/3.0);
    let D = vec4<f32>(0.0, 0.5, 1.0, 2.0);

    var i = floor(v + dot(v, vec3(C.y)));
    let x0 = v - i + dot(i, vec3(C.x));

    let g = step(x0.yzx, x0.xyz);
    let l = 1.0 - g;
    let i1 = min(g.xyz, l.zxy);
    let i2 = max(g.xyz, l.zxy);

    let x1 = x0 - i1 + C.x;
    let x2 = x0 - i2 + C.y;
    let x3 = x0 - D.yyy;

    i = mod289_3(i);
    let p = permute4(permute4(permute4(
        i.z + vec4<f32>(0.0, i1.z, i2.z, 1.0))
      + i.y + vec4<f32>(0.0, i1.y, i2.y, 1.0))
      + i.x + vec4<f32>(0.0, i1.x, i2.x, 1.0));

    let n_ = 0.142857142857;
    let ns = n_ * D.wyz - D.xzx;

    let j = p - 49.0 * floor(p * ns.z * ns.z);

    let x_ = floor(j * ns.z);
    let y_ = floor(j - 7.0 * x_);

    let x = x_ * ns.x + ns.yyyy;
    let y = y_ * ns.x + ns.yyyy;
    let h = 1.0 - abs(x) - abs(y);

    let b0 = vec4<f32>(x.xy, y.xy);
    let b1 = vec4<f32>(x.zw, y.zw);

    let s0 = floor(b0) * 2.0 + 1.0;
    let s1 = floor(b1) * 2.0 + 1.0;
    let sh = -step(h, vec4<f32>(0.0));

    let a0 = b0.xzyw + s0.xzyw * sh.xxyy;
    let a1 = b1.xzyw + s1.xzyw * sh.zzww;

    var p0 = vec3<f32>(a0.xy, h.x);
    var p1 = vec3<f32>(a0.zw, h.y);
    var p2 = vec3<f32>(a1.xy, h.z);
    var p3 = vec3<f32>(a1.zw, h.w);

    let norm = taylor_inv_sqrt4(vec4<f32>(dot(p0,p0), dot(p1,p1), dot(p2,p2), dot(p3,p3)));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    var m = max(0.6 - vec4<f32>(dot(x0,x0), dot(x1,x1), dot(x2,x2), dot(x3,x3)), vec4<f32>(0.0));
    m = m * m;
    return 42.0 * dot(m*m, vec4<f32>(dot(p0,x0), dot(p1,x1), dot(p2,x2), dot(p3,x3)));
}

fn curl_noise(p: vec3<f32>) -> vec3<f32> {
    let eps = 0.01;
    let dx = vec3<f32>(eps, 0.0, 0.0);
    let dy = vec3<f32>(0.0, eps, 0.0);
    let dz = vec3<f32>(0.0, 0.0, eps);
    let n_py = noise3(p + dy + vec3<f32>(0.0, 0.0, 100.0));
    let n_my = noise3(p - dy + vec3<f32>(0.0, 0.0, 100.0));
    let n_pz = noise3(p + dz + vec3<f32>(0.0, 100.0, 0.0));
    let n_mz = noise3(p - dz + vec3<f32>(0.0, 100.0, 0.0));
    let n_px = noise3(p + dx + vec3<f32>(100.0, 0.0, 0.0));
    let n_mx = noise3(p - dx + vec3<f32>(100.0, 0.0, 0.0));
    return vec3<f32>(
        (n_py - n_my) - (n_pz - n_mz),
        (n_pz - n_mz) - (n_px - n_mx),
        (n_px - n_mx) - (n_py - n_my)
    ) / (2.0 * eps);
}
"#;

/// Shared geometry and easing helpers.
const HELPERS_WGSL: &str = r#"
// Rodrigues rotation of v so that +Y aligns with dir (dir normalized).
fn rotate_to_axis(dir: vec3<f32>, v: vec3<f32>) -> vec3<f32> {
    let axis = cross(vec3<f32>(0.0, 1.0, 0.0), dir);
    let s = length(axis);
    let c = dir.y;
    if s < 1e-5 {
        if c > 0.0 {
            return v;
        }
        return vec3<f32>(v.x, -v.y, -v.z);
    }
    let k = axis / s;
    return v * c + cross(k, v) * s + k * dot(k, v) * (1.0 - c);
}

fn ease(mode: u32, t: f32) -> f32 {
    if mode == 1u {
        return t * t;
    }
    if mode == 2u {
        return 1.0 - (1.0 - t) * (1.0 - t);
    }
    if mode == 3u {
        if t < 0.5 {
            return 2.0 * t * t;
        }
        return 1.0 - 2.0 * (1.0 - t) * (1.0 - t);
    }
    return t;
}

fn curve_index(progress: f32) -> u32 {
    return u32(clamp(progress, 0.0, 1.0) * 255.0);
}
"#;

/// The uniform block; must match [`crate::params::GpuParams`] lane for lane.
const PARAMS_WGSL: &str = r#"
struct Params {
    gravity_dt: vec4<f32>,
    size_speed: vec4<f32>,
    fade_friction: vec4<f32>,
    dir_min: vec4<f32>,
    dir_max: vec4<f32>,
    start_min: vec4<f32>,
    start_max: vec4<f32>,
    rot_min: vec4<f32>,
    rot_max: vec4<f32>,
    spin_min: vec4<f32>,
    spin_max: vec4<f32>,
    emit_dir: vec4<f32>,
    shape_ranges: vec4<f32>,
    turbulence: vec4<f32>,
    collision: vec4<f32>,
    render: vec4<f32>,
    spawn_origin: vec4<f32>,
    colors_start: array<vec4<f32>, 8>,
    colors_end: array<vec4<f32>, 8>,
    attractor_pos: array<vec4<f32>, 4>,
    attractor_axis: array<vec4<f32>, 4>,
    attractor_meta: array<vec4<u32>, 4>,
    flags_shape: vec4<u32>,
    spawn_info: vec4<u32>,
    color_counts: vec4<u32>,
}
"#;

/// Shared constants injected from the Rust definitions so the two backends
/// cannot drift apart.
fn constants_wgsl() -> String {
    use crate::curve::{CHANNEL_ROTATION_SPEED, CHANNEL_VELOCITY};
    use crate::params::{
        FLAG_ATTRACT_TO_CENTER, FLAG_COLLISION_DIE, FLAG_POSITION_AS_DIRECTION, FLAG_SURFACE_ONLY,
    };
    format!(
        r#"
const GOLDEN: u32 = {GOLDEN}u;
const TAU: f32 = 6.28318530717958647;
const DEAD_Y: f32 = {dead_y:.1};
const FLAG_ATTRACT_TO_CENTER: u32 = {FLAG_ATTRACT_TO_CENTER}u;
const FLAG_POSITION_AS_DIRECTION: u32 = {FLAG_POSITION_AS_DIRECTION}u;
const FLAG_SURFACE_ONLY: u32 = {FLAG_SURFACE_ONLY}u;
const FLAG_COLLISION_DIE: u32 = {FLAG_COLLISION_DIE}u;
const CHANNEL_VELOCITY: u32 = {CHANNEL_VELOCITY}u;
const CHANNEL_ROTATION_SPEED: u32 = {CHANNEL_ROTATION_SPEED}u;
const SALT_DIR_X: u32 = {SALT_DIR_X}u;
const SALT_DIR_Y: u32 = {SALT_DIR_Y}u;
const SALT_DIR_Z: u32 = {SALT_DIR_Z}u;
const SALT_SPEED: u32 = {SALT_SPEED}u;
const SALT_FADE: u32 = {SALT_FADE}u;
const SALT_SIZE: u32 = {SALT_SIZE}u;
const SALT_COLOR_START: u32 = {SALT_COLOR_START}u;
const SALT_COLOR_END: u32 = {SALT_COLOR_END}u;
const SALT_ROT_X: u32 = {SALT_ROT_X}u;
const SALT_ROT_Y: u32 = {SALT_ROT_Y}u;
const SALT_ROT_Z: u32 = {SALT_ROT_Z}u;
const SALT_SHAPE_T: u32 = {SALT_SHAPE_T}u;
const SALT_SHAPE_U: u32 = {SALT_SHAPE_U}u;
const SALT_SHAPE_V: u32 = {SALT_SHAPE_V}u;
const SALT_SHAPE_R: u32 = {SALT_SHAPE_R}u;
const SALT_SPIN_X: u32 = {SALT_SPIN_X}u;
const SALT_SPIN_Y: u32 = {SALT_SPIN_Y}u;
const SALT_SPIN_Z: u32 = {SALT_SPIN_Z}u;
"#,
        dead_y = crate::storage::DEAD_Y,
    )
}

fn bindings_wgsl(features: &Features) -> String {
    let mut out = String::from(
        r#"
@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read_write> pos_life: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read_write> vel_fade: array<vec4<f32>>;
@group(0) @binding(3) var<storage, read_write> size_buf: array<f32>;
@group(0) @binding(4) var<storage, read> curves: array<vec4<f32>>;
"#,
    );
    if let Some(binding) = rotation_binding(features) {
        out.push_str(&format!(
            "@group(0) @binding({binding}) var<storage, read_write> rotation: array<vec4<f32>>;\n"
        ));
    }
    if let Some((start, end)) = color_bindings(features) {
        out.push_str(&format!(
            "@group(0) @binding({start}) var<storage, read_write> color_start: array<vec4<f32>>;\n"
        ));
        out.push_str(&format!(
            "@group(0) @binding({end}) var<storage, read_write> color_end: array<vec4<f32>>;\n"
        ));
    }
    out
}

fn spawn_entry_wgsl(features: &Features) -> String {
    let rotation_code = if features.needs_rotation {
        r#"
    rotation[idx] = vec4<f32>(
        flerp(params.rot_min.x, params.rot_max.x, slot_rand(seed, SALT_ROT_X)),
        flerp(params.rot_min.y, params.rot_max.y, slot_rand(seed, SALT_ROT_Y)),
        flerp(params.rot_min.z, params.rot_max.z, slot_rand(seed, SALT_ROT_Z)),
        0.0
    );
"#
    } else {
        ""
    };

    let color_code = if features.needs_per_particle_color {
        r#"
    let start_count = params.color_counts.x;
    let pick_start = min(u32(slot_rand(seed, SALT_COLOR_START) * f32(start_count)), start_count - 1u);
    color_start[idx] = params.colors_start[pick_start];
    let end_count = params.color_counts.y;
    let pick_end = min(u32(slot_rand(seed, SALT_COLOR_END) * f32(end_count)), end_count - 1u);
    color_end[idx] = params.colors_end[pick_end];
"#
    } else {
        ""
    };

    format!(
        r#"
@compute @workgroup_size({WORKGROUP_SIZE})
fn spawn(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let idx = gid.x;
    let capacity = params.spawn_info.w;
    if idx >= capacity {{
        return;
    }}
    // Wrapping range test: only slots in [start, start + count) are ours.
    let rel = (idx + capacity - params.spawn_info.x) % capacity;
    if rel >= params.spawn_info.y {{
        return;
    }}

    let seed = idx + params.spawn_info.z;
    let flags = params.flags_shape.x;

    var offset = vec3<f32>(0.0);
    switch params.flags_shape.y {{
        case 1u: {{
            // Box: per-axis lerp in the start-position range.
            offset = vec3<f32>(
                flerp(params.start_min.x, params.start_max.x, slot_rand(seed, SALT_SHAPE_T)),
                flerp(params.start_min.y, params.start_max.y, slot_rand(seed, SALT_SHAPE_U)),
                flerp(params.start_min.z, params.start_max.z, slot_rand(seed, SALT_SHAPE_V))
            );
        }}
        case 2u: {{
            // Sphere: uniform on the sphere, cube-root radius for uniform volume.
            let theta = slot_rand(seed, SALT_SHAPE_U) * TAU;
            let phi = acos(1.0 - 2.0 * slot_rand(seed, SALT_SHAPE_V));
            var r = params.shape_ranges.y;
            if (flags & FLAG_SURFACE_ONLY) == 0u {{
                let r0 = params.shape_ranges.x;
                let r1 = params.shape_ranges.y;
                r = pow(flerp(r0 * r0 * r0, r1 * r1 * r1, slot_rand(seed, SALT_SHAPE_R)), 1.0 / 3.0);
            }}
            offset = vec3<f32>(
                sin(phi) * cos(theta),
                sin(phi) * sin(theta),
                cos(phi)
            ) * r;
        }}
        case 3u: {{
            // Cone: height lerp, disk radius from height, rotated onto the axis.
            let h = flerp(params.shape_ranges.z, params.shape_ranges.w, slot_rand(seed, SALT_SHAPE_T));
            var r = h * sin(params.emit_dir.w);
            if (flags & FLAG_SURFACE_ONLY) == 0u {{
                r = r * sqrt(slot_rand(seed, SALT_SHAPE_R));
            }}
            let theta = slot_rand(seed, SALT_SHAPE_U) * TAU;
            let local = vec3<f32>(r * cos(theta), h, r * sin(theta));
            offset = rotate_to_axis(params.emit_dir.xyz, local);
        }}
        case 4u: {{
            // Disk: uniform in area, rotated onto the axis.
            let theta = slot_rand(seed, SALT_SHAPE_U) * TAU;
            var r = params.shape_ranges.y;
            if (flags & FLAG_SURFACE_ONLY) == 0u {{
                let r0 = params.shape_ranges.x;
                let r1 = params.shape_ranges.y;
                r = sqrt(flerp(r0 * r0, r1 * r1, slot_rand(seed, SALT_SHAPE_R)));
            }}
            let local = vec3<f32>(r * cos(theta), 0.0, r * sin(theta));
            offset = rotate_to_axis(params.emit_dir.xyz, local);
        }}
        case 5u: {{
            // Edge: one t between the start-position corners.
            let t = slot_rand(seed, SALT_SHAPE_T);
            offset = vec3<f32>(
                flerp(params.start_min.x, params.start_max.x, t),
                flerp(params.start_min.y, params.start_max.y, t),
                flerp(params.start_min.z, params.start_max.z, t)
            );
        }}
        default: {{}}
    }}

    let fade = flerp(params.fade_friction.x, params.fade_friction.y, slot_rand(seed, SALT_FADE));
    let speed = flerp(params.size_speed.z, params.size_speed.w, slot_rand(seed, SALT_SPEED));

    var velocity = vec3<f32>(0.0);
    if (flags & FLAG_ATTRACT_TO_CENTER) != 0u {{
        // Position integrates back to the spawn point exactly as life runs out.
        velocity = -offset * fade;
    }} else if (flags & FLAG_POSITION_AS_DIRECTION) != 0u && length(offset) > 1e-5 {{
        velocity = normalize(offset) * speed;
    }} else {{
        var dir = vec3<f32>(
            flerp(params.dir_min.x, params.dir_max.x, slot_rand(seed, SALT_DIR_X)),
            flerp(params.dir_min.y, params.dir_max.y, slot_rand(seed, SALT_DIR_Y)),
            flerp(params.dir_min.z, params.dir_max.z, slot_rand(seed, SALT_DIR_Z))
        );
        if length(dir) < 1e-5 {{
            dir = vec3<f32>(0.0, 1.0, 0.0);
        }}
        velocity = normalize(dir) * speed;
    }}

    pos_life[idx] = vec4<f32>(params.spawn_origin.xyz + offset, 1.0);
    vel_fade[idx] = vec4<f32>(velocity, fade);
    size_buf[idx] = flerp(params.size_speed.x, params.size_speed.y, slot_rand(seed, SALT_SIZE));
{rotation_code}{color_code}}}
"#
    )
}

fn update_entry_wgsl(features: &Features) -> String {
    let turbulence_code = if features.turbulence_active {
        r#"
    // Divergence-free swirl from the curl of the noise field.
    let t_off = params.turbulence.w * params.turbulence.z;
    let curl = curl_noise(pos * params.turbulence.y + vec3<f32>(t_off, t_off, t_off));
    vel += curl * params.turbulence.x * dt;
"#
    } else {
        ""
    };

    let attractor_code = if features.attractors_active {
        r#"
    for (var a = 0u; a < 4u; a++) {
        let ap = params.attractor_pos[a];
        if ap.w == 0.0 {
            continue;
        }
        let to = ap.xyz - pos;
        let dist = length(to);
        if dist < 1e-4 {
            continue;
        }
        let ax = params.attractor_axis[a];
        var fall = 1.0 / (1.0 + dist * dist);
        if params.attractor_meta[a].y == 0u {
            fall = max(0.0, 1.0 - dist / ax.w);
        }
        var force = (to / dist) * fall;
        if params.attractor_meta[a].x == 1u {
            // Vortex: tangential to the axis.
            let tangent = cross(ax.xyz, to / dist);
            let tl = length(tangent);
            force = vec3<f32>(0.0);
            if tl > 1e-5 {
                force = (tangent / tl) * fall;
            }
        }
        vel += force * ap.w * dt;
    }
"#
    } else {
        ""
    };

    let collision_code = if features.collision_active {
        r#"
    if pos.y < params.collision.x {
        if (params.flags_shape.x & FLAG_COLLISION_DIE) != 0u {
            life = 0.0;
            pos.y = DEAD_Y;
        } else {
            pos.y = params.collision.x;
            vel.y = abs(vel.y) * params.collision.y;
            vel.x *= params.collision.z;
            vel.z *= params.collision.z;
        }
    }
"#
    } else {
        ""
    };

    let rotation_code = if features.needs_rotation {
        r#"
    var spin_scale = 1.0;
    if (params.flags_shape.w & CHANNEL_ROTATION_SPEED) != 0u {
        spin_scale = curves[curve_index(progress)].w;
    }
    let spin = vec3<f32>(
        flerp(params.spin_min.x, params.spin_max.x, slot_rand(idx, SALT_SPIN_X)),
        flerp(params.spin_min.y, params.spin_max.y, slot_rand(idx, SALT_SPIN_Y)),
        flerp(params.spin_min.z, params.spin_max.z, slot_rand(idx, SALT_SPIN_Z))
    );
    let rot = rotation[idx];
    rotation[idx] = vec4<f32>(rot.xyz + spin * spin_scale * dt, 0.0);
"#
    } else {
        ""
    };

    format!(
        r#"
@compute @workgroup_size({WORKGROUP_SIZE})
fn update(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let idx = gid.x;
    if idx >= params.spawn_info.w {{
        return;
    }}

    let lane = pos_life[idx];
    var life = lane.w;
    if life <= 0.0 {{
        return;
    }}
    var pos = lane.xyz;
    let vf = vel_fade[idx];
    var vel = vf.xyz;
    let fade = vf.w;
    let dt = params.gravity_dt.w;

    // 1. Gravity, scaled by particle size.
    vel += params.gravity_dt.xyz * dt * (1.0 + size_buf[idx] * params.collision.w);

    // 2. Speed scale: velocity curve if enabled, friction easing otherwise.
    let progress = 1.0 - life;
    var speed_scale = 1.0;
    if (params.flags_shape.w & CHANNEL_VELOCITY) != 0u {{
        speed_scale = curves[curve_index(progress)].z;
    }} else {{
        let intensity = flerp(
            params.fade_friction.z,
            params.fade_friction.w,
            ease(params.flags_shape.z, progress)
        );
        speed_scale = 1.0 - intensity * 0.9;
    }}

    // 3. Turbulence.
{turbulence_code}
    // 4. Attractors.
{attractor_code}
    // 5. Integrate position.
    pos += vel * dt * speed_scale;

    // 6. Plane collision, against the post-integration position.
{collision_code}
    // 7. Rotation.
{rotation_code}
    // 8. Lifetime decay last: a particle dying this frame keeps this
    //    frame's integrated state until the sentinel move.
    life -= fade * dt;
    if life <= 0.0 {{
        life = 0.0;
        pos.y = DEAD_Y;
    }}

    pos_life[idx] = vec4<f32>(pos, life);
    vel_fade[idx] = vec4<f32>(vel, fade);
}}
"#
    )
}

/// Assemble the shader module holding both kernels for one feature set.
pub fn generate_kernels(features: &Features) -> String {
    format!(
        "// Generated particle kernels\n{constants}{params}{bindings}{random}{noise}{helpers}{spawn}{update}",
        constants = constants_wgsl(),
        params = PARAMS_WGSL,
        bindings = bindings_wgsl(features),
        random = RANDOM_WGSL,
        noise = NOISE_WGSL,
        helpers = HELPERS_WGSL,
        spawn = spawn_entry_wgsl(features),
        update = update_entry_wgsl(features),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates WGSL code using naga.
    fn validate_wgsl(code: &str) -> Result<(), String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {:?}", e))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(())
    }

    fn all_features() -> Features {
        Features {
            needs_rotation: true,
            needs_per_particle_color: true,
            turbulence_active: true,
            attractors_active: true,
            collision_active: true,
        }
    }

    #[test]
    fn test_minimal_kernels_validate() {
        let shader = generate_kernels(&Features::default());
        assert!(shader.contains("fn spawn"));
        assert!(shader.contains("fn update"));
        validate_wgsl(&shader).expect("minimal kernels should be valid");
    }

    #[test]
    fn test_full_feature_kernels_validate() {
        let shader = generate_kernels(&all_features());
        assert!(shader.contains("curl_noise"));
        assert!(shader.contains("attractor_pos"));
        assert!(shader.contains("rotation[idx]"));
        assert!(shader.contains("color_start[idx]"));
        validate_wgsl(&shader).expect("full-feature kernels should be valid");
    }

    #[test]
    fn test_each_single_feature_validates() {
        for i in 0..5 {
            let features = Features {
                needs_rotation: i == 0,
                needs_per_particle_color: i == 1,
                turbulence_active: i == 2,
                attractors_active: i == 3,
                collision_active: i == 4,
            };
            let shader = generate_kernels(&features);
            validate_wgsl(&shader)
                .unwrap_or_else(|e| panic!("feature combo {i} should be valid: {e}"));
        }
    }

    #[test]
    fn test_binding_numbering_is_contiguous() {
        let rot_only = Features { needs_rotation: true, ..Default::default() };
        assert_eq!(rotation_binding(&rot_only), Some(5));
        assert_eq!(color_bindings(&rot_only), None);

        let color_only = Features { needs_per_particle_color: true, ..Default::default() };
        assert_eq!(rotation_binding(&color_only), None);
        assert_eq!(color_bindings(&color_only), Some((5, 6)));

        let both = Features {
            needs_rotation: true,
            needs_per_particle_color: true,
            ..Default::default()
        };
        assert_eq!(color_bindings(&both), Some((6, 7)));
    }

    #[test]
    fn test_dead_particles_skip_update() {
        let shader = generate_kernels(&Features::default());
        assert!(shader.contains("if life <= 0.0"));
    }
}
