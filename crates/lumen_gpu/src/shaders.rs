//! WGSL shaders
//!
//! One shape shader covers the whole closed shape union: a shared vertex
//! stage expands each instance into a clip-scissored quad, and one fragment
//! entry point per shape kind evaluates its SDF or texture sample. The
//! instance layout must stay in sync with `lumen_paint::ShapeInstance`.

/// Instanced quad shader for all shape kinds.
pub const SHAPE_SHADER: &str = r#"
struct Uniforms {
    viewport: vec2<f32>,
    hdr_range: f32,
    time: f32,
};

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var source_texture: texture_2d<f32>;
@group(0) @binding(2) var source_sampler: sampler;

struct Instance {
    @location(0) dst: vec4<f32>,
    @location(1) clip: vec4<f32>,
    @location(2) colors: vec4<u32>,
    @location(3) hdr: vec4<f32>,
    @location(4) params: vec4<f32>,
    @location(5) uv: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    // Position inside the quad in [0,1].
    @location(0) local: vec2<f32>,
    // Pixel position in layer space.
    @location(1) pixel: vec2<f32>,
    @location(2) @interpolate(flat) dst: vec4<f32>,
    @location(3) @interpolate(flat) clip: vec4<f32>,
    @location(4) @interpolate(flat) colors: vec4<u32>,
    @location(5) @interpolate(flat) hdr: vec4<f32>,
    @location(6) @interpolate(flat) params: vec4<f32>,
    @location(7) @interpolate(flat) uv: vec4<f32>,
};

fn unpack_argb(packed: u32) -> vec4<f32> {
    let a = f32((packed >> 24u) & 0xffu) / 255.0;
    let r = f32((packed >> 16u) & 0xffu) / 255.0;
    let g = f32((packed >> 8u) & 0xffu) / 255.0;
    let b = f32(packed & 0xffu) / 255.0;
    return vec4<f32>(r, g, b, a);
}

// Bilinear blend of the four corner colors with per-corner HDR scale.
fn corner_color(in: VertexOutput) -> vec4<f32> {
    let tl = unpack_argb(in.colors.x) * vec4<f32>(vec3<f32>(in.hdr.x), 1.0);
    let tr = unpack_argb(in.colors.y) * vec4<f32>(vec3<f32>(in.hdr.y), 1.0);
    let bl = unpack_argb(in.colors.z) * vec4<f32>(vec3<f32>(in.hdr.z), 1.0);
    let br = unpack_argb(in.colors.w) * vec4<f32>(vec3<f32>(in.hdr.w), 1.0);
    let top = mix(tl, tr, in.local.x);
    let bottom = mix(bl, br, in.local.x);
    return mix(top, bottom, in.local.y);
}

fn clip_mask(in: VertexOutput) -> f32 {
    let lo = in.clip.xy;
    let hi = in.clip.xy + in.clip.zw;
    let inside = step(lo, in.pixel) * step(in.pixel, hi);
    return inside.x * inside.y;
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32, instance: Instance) -> VertexOutput {
    // Two triangles over the unit quad.
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0), vec2<f32>(1.0, 0.0), vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0), vec2<f32>(1.0, 1.0), vec2<f32>(0.0, 1.0),
    );
    let local = corners[index];
    let pixel = instance.dst.xy + local * instance.dst.zw;
    let ndc = vec2<f32>(
        pixel.x / uniforms.viewport.x * 2.0 - 1.0,
        1.0 - pixel.y / uniforms.viewport.y * 2.0,
    );
    var out: VertexOutput;
    out.position = vec4<f32>(ndc, 0.0, 1.0);
    out.local = local;
    out.pixel = pixel;
    out.dst = instance.dst;
    out.clip = instance.clip;
    out.colors = instance.colors;
    out.hdr = instance.hdr;
    out.params = instance.params;
    out.uv = instance.uv;
    return out;
}

@fragment
fn fs_fill(in: VertexOutput) -> @location(0) vec4<f32> {
    return corner_color(in) * clip_mask(in);
}

// params: (rounding, border thickness, _, _)
@fragment
fn fs_rect(in: VertexOutput) -> @location(0) vec4<f32> {
    let half = in.dst.zw * 0.5;
    let p = (in.local - vec2<f32>(0.5)) * in.dst.zw;
    let rounding = min(in.params.x, min(half.x, half.y));
    let q = abs(p) - half + vec2<f32>(rounding);
    var d = length(max(q, vec2<f32>(0.0))) + min(max(q.x, q.y), 0.0) - rounding;
    let thickness = in.params.y;
    if (thickness > 0.0) {
        d = abs(d + thickness * 0.5) - thickness * 0.5;
    }
    let coverage = clamp(0.5 - d, 0.0, 1.0);
    return corner_color(in) * coverage * clip_mask(in);
}

// params: (border thickness, _, _, _)
@fragment
fn fs_circle(in: VertexOutput) -> @location(0) vec4<f32> {
    let radius = min(in.dst.z, in.dst.w) * 0.5;
    let p = (in.local - vec2<f32>(0.5)) * in.dst.zw;
    var d = length(p) - radius;
    let thickness = in.params.x;
    if (thickness > 0.0) {
        d = abs(d + thickness * 0.5) - thickness * 0.5;
    }
    let coverage = clamp(0.5 - d, 0.0, 1.0);
    return corner_color(in) * coverage * clip_mask(in);
}

// params: (start angle, sweep, thickness, _)
@fragment
fn fs_arc(in: VertexOutput) -> @location(0) vec4<f32> {
    let radius = min(in.dst.z, in.dst.w) * 0.5;
    let p = (in.local - vec2<f32>(0.5)) * in.dst.zw;
    let thickness = max(in.params.z, 1.0);
    let mid = radius - thickness * 0.5;
    var d = abs(length(p) - mid) - thickness * 0.5;
    var angle = atan2(-p.y, p.x);
    let start = in.params.x;
    var sweep = in.params.y;
    var rel = angle - start;
    let tau = 6.28318530718;
    rel = rel - floor(rel / tau) * tau;
    if (rel > sweep) {
        d = 1.0e6;
    }
    let coverage = clamp(0.5 - d, 0.0, 1.0);
    return corner_color(in) * coverage * clip_mask(in);
}

@fragment
fn fs_text(in: VertexOutput) -> @location(0) vec4<f32> {
    let uv = mix(in.uv.xy, in.uv.zw, in.local);
    let alpha = textureSample(source_texture, source_sampler, uv).r;
    return corner_color(in) * alpha * clip_mask(in);
}

@fragment
fn fs_image(in: VertexOutput) -> @location(0) vec4<f32> {
    let uv = mix(in.uv.xy, in.uv.zw, in.local);
    let texel = textureSample(source_texture, source_sampler, uv);
    return texel * corner_color(in) * clip_mask(in);
}

// Layer sampling quad. uv carries the source rect in pixels; params is
// (passthrough scale, additive flag, mode, _). The blurred pyramid arrives
// pre-composited into the source texture by the preprocess passes, so plain
// and blur/bloom composite reduce to the same weighted sample here.
@fragment
fn fs_sample(in: VertexOutput) -> @location(0) vec4<f32> {
    let size = vec2<f32>(textureDimensions(source_texture));
    let src = mix(in.uv.xy, in.uv.zw, in.local) / size;
    var texel = textureSample(source_texture, source_sampler, src);
    texel = vec4<f32>(texel.rgb * uniforms.hdr_range, texel.a);
    return texel * corner_color(in) * clip_mask(in);
}
"#;

/// Kawase-style downsample with an optional brightness threshold on the
/// first stage. `region` is the normalized source sub-rectangle (whole
/// texture for stage-to-stage passes). params: (threshold, intensity,
/// first stage flag, _).
pub const BLUR_DOWN_SHADER: &str = r#"
struct BlurUniforms {
    texel: vec2<f32>,
    _pad: vec2<f32>,
    region: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> blur: BlurUniforms;
@group(0) @binding(1) var source_texture: texture_2d<f32>;
@group(0) @binding(2) var source_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0), vec2<f32>(1.0, 0.0), vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0), vec2<f32>(1.0, 1.0), vec2<f32>(0.0, 1.0),
    );
    let uv = corners[index];
    var out: VertexOutput;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}

fn threshold(color: vec3<f32>) -> vec3<f32> {
    let brightness = max(color.r, max(color.g, color.b));
    let cut = blur.params.x;
    let keep = max(brightness - cut, 0.0) / max(brightness, 1.0e-4);
    return color * keep * blur.params.y;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let uv = blur.region.xy + in.uv * blur.region.zw;
    let t = blur.texel;
    var sum = textureSample(source_texture, source_sampler, uv) * 4.0;
    sum = sum + textureSample(source_texture, source_sampler, uv + vec2<f32>(-t.x, -t.y));
    sum = sum + textureSample(source_texture, source_sampler, uv + vec2<f32>(t.x, -t.y));
    sum = sum + textureSample(source_texture, source_sampler, uv + vec2<f32>(-t.x, t.y));
    sum = sum + textureSample(source_texture, source_sampler, uv + vec2<f32>(t.x, t.y));
    var color = sum / 8.0;
    if (blur.params.z > 0.5) {
        color = vec4<f32>(threshold(color.rgb), color.a);
    }
    return color;
}
"#;

/// Final effect pass: the pyramid's stage weights are folded on the CPU into
/// one weight per stage, and this pass sums the weighted stages over the
/// passthrough-scaled original in a single draw.
/// weights0 = (w0, w1, w2, w3), weights1 = (w4, w5, passthrough scale, _).
pub const BLUR_COMPOSITE_SHADER: &str = r#"
struct CompositeUniforms {
    weights0: vec4<f32>,
    weights1: vec4<f32>,
    // Normalized sub-rectangle of `original` the effect covers.
    region: vec4<f32>,
};

@group(0) @binding(0) var<uniform> composite: CompositeUniforms;
@group(0) @binding(1) var original: texture_2d<f32>;
@group(0) @binding(2) var stage0: texture_2d<f32>;
@group(0) @binding(3) var stage1: texture_2d<f32>;
@group(0) @binding(4) var stage2: texture_2d<f32>;
@group(0) @binding(5) var stage3: texture_2d<f32>;
@group(0) @binding(6) var stage4: texture_2d<f32>;
@group(0) @binding(7) var stage5: texture_2d<f32>;
@group(0) @binding(8) var effect_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0), vec2<f32>(1.0, 0.0), vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0), vec2<f32>(1.0, 1.0), vec2<f32>(0.0, 1.0),
    );
    let uv = corners[index];
    var out: VertexOutput;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let src = composite.region.xy + in.uv * composite.region.zw;
    var sum = textureSample(original, effect_sampler, src) * composite.weights1.z;
    sum = sum + textureSample(stage0, effect_sampler, in.uv) * composite.weights0.x;
    sum = sum + textureSample(stage1, effect_sampler, in.uv) * composite.weights0.y;
    sum = sum + textureSample(stage2, effect_sampler, in.uv) * composite.weights0.z;
    sum = sum + textureSample(stage3, effect_sampler, in.uv) * composite.weights0.w;
    sum = sum + textureSample(stage4, effect_sampler, in.uv) * composite.weights1.x;
    sum = sum + textureSample(stage5, effect_sampler, in.uv) * composite.weights1.y;
    return sum;
}
"#;
