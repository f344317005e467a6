//! Post effects
//!
//! A post effect consumes the rendered image of a region (a sampled slot in
//! an offscreen layer) and transforms it on the way into its destination
//! layer. The model here is backend-agnostic: it owns the tunable parameters
//! and the pass arithmetic; the GPU backend owns the textures and pipelines.

use rustc_hash::FxHashMap;

use crate::shape::SampleMode;
use lumen_core::Bounds;

/// Number of progressively halved blur/bloom buffers an effect may use.
pub const MAX_DOWNSAMPLES: usize = 6;

/// Reference to a rendered region's backing image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleSource {
    /// Layer whose texture holds the rendered content.
    pub layer: u16,
    /// Slot rectangle inside that layer, in pixels.
    pub rect: Bounds,
    /// Whether the source layer stores floating-point HDR color.
    pub hdr: bool,
}

impl SampleSource {
    pub fn center(&self) -> (f32, f32) {
        (
            self.rect.x as f32 + self.rect.width as f32 / 2.0,
            self.rect.y as f32 + self.rect.height as f32 / 2.0,
        )
    }
}

/// How a stage is composited on the upsample walk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StageBlend {
    /// Fully inside the blur regime: the stage replaces what is below it.
    Opaque,
    /// Bloom regime or the fractional boundary stage: added with this weight.
    Additive(f32),
}

/// Combined gaussian-ish blur and bloom over a downsample pyramid.
///
/// `blur_size` and `bloom_size` are in source pixels; `blend` interpolates
/// between the pure-blur regime (0) and the pure-bloom regime (1). The stage
/// and cutoff arithmetic below is a locked numeric contract: the visual blend
/// at the blur/bloom boundary depends on its exact values.
#[derive(Clone, Debug, PartialEq)]
pub struct BlurBloomPostEffect {
    pub blur_size: f32,
    pub bloom_size: f32,
    /// Blur/bloom interpolation factor in [0, 1].
    pub blend: f32,
    /// Brightness threshold applied at the first downsample stage.
    pub bloom_threshold: f32,
    pub bloom_intensity: f32,
}

impl Default for BlurBloomPostEffect {
    fn default() -> Self {
        Self {
            blur_size: 8.0,
            bloom_size: 16.0,
            blend: 0.5,
            bloom_threshold: 0.7,
            bloom_intensity: 1.0,
        }
    }
}

impl BlurBloomPostEffect {
    fn blur_stages(&self) -> f32 {
        self.blur_size.clamp(1.0, 64.0).log2()
    }

    fn bloom_stages(&self) -> f32 {
        self.bloom_size.clamp(1.0, 64.0).log2()
    }

    /// Fractional stage index separating the blur regime from the bloom
    /// regime. Stages wholly below it composite opaquely, stages above it
    /// additively; the stage it falls inside blends by its fraction.
    pub fn cutoff(&self) -> f32 {
        let blur = self.blur_stages();
        blur + (self.bloom_stages() - blur) * self.blend.clamp(0.0, 1.0)
    }

    /// Number of downsample stages the preprocess runs.
    pub fn stage_count(&self) -> usize {
        let stages = self.blur_stages().max(self.bloom_stages()).ceil() as usize;
        stages.clamp(1, MAX_DOWNSAMPLES)
    }

    /// Blend applied when compositing stage `i` back up (stage 0 is the
    /// first, largest downsample).
    pub fn stage_blend(&self, i: usize) -> StageBlend {
        let weight = (self.cutoff() - i as f32).clamp(0.0, 1.0);
        if weight >= 1.0 {
            StageBlend::Opaque
        } else {
            StageBlend::Additive(weight)
        }
    }

    /// Scale on the passthrough quad of the unprocessed source.
    pub fn passthrough(&self) -> f32 {
        1.0 - self.blend.clamp(0.0, 1.0)
    }

    /// False once fully cut over to blur: the final quad then replaces the
    /// destination instead of adding to it.
    pub fn composite_additive(&self) -> bool {
        self.blend.clamp(0.0, 1.0) > 0.0
    }

    /// Passes the preprocess consumes: one horizontal+vertical blur pass per
    /// downsample stage, plus one upsample pass walking back to stage 0.
    pub fn preprocess_pass_count(&self) -> u32 {
        self.stage_count() as u32 + 1
    }
}

/// One user-supplied fragment program over the sampled region.
#[derive(Clone, Debug, Default)]
pub struct ShaderPostEffect {
    pub program: u64,
    uniforms: FxHashMap<String, [f32; 4]>,
}

impl ShaderPostEffect {
    pub fn new(program: u64) -> Self {
        Self {
            program,
            uniforms: FxHashMap::default(),
        }
    }

    pub fn set_uniform(&mut self, name: impl Into<String>, value: [f32; 4]) {
        self.uniforms.insert(name.into(), value);
    }

    pub fn uniform(&self, name: &str) -> Option<[f32; 4]> {
        self.uniforms.get(name).copied()
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, [f32; 4])> {
        self.uniforms.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// The closed set of post-effect kinds a region may attach.
#[derive(Clone, Debug)]
pub enum PostEffect {
    BlurBloom(BlurBloomPostEffect),
    Shader(ShaderPostEffect),
}

impl PostEffect {
    /// Whether a dirty rect anywhere inside the region invalidates the whole
    /// region one level up. Blur smears influence across the surface, so it
    /// does; a custom shader is assumed to as well since the core cannot see
    /// inside it.
    pub fn affects_whole_region(&self) -> bool {
        match self {
            PostEffect::BlurBloom(_) => true,
            PostEffect::Shader(_) => true,
        }
    }

    /// Passes consumed by the preprocess stage, before the composite quad.
    pub fn preprocess_pass_count(&self) -> u32 {
        match self {
            PostEffect::BlurBloom(effect) => effect.preprocess_pass_count(),
            // Shader effects sample the source directly during composite.
            PostEffect::Shader(_) => 0,
        }
    }

    /// The composite mode the region's intermediate quad should carry.
    pub fn sample_mode(&self) -> SampleMode {
        match self {
            PostEffect::BlurBloom(effect) => SampleMode::BlurBloom {
                passthrough: effect.passthrough(),
                additive: effect.composite_additive(),
            },
            PostEffect::Shader(effect) => SampleMode::Shader {
                program: effect.program,
            },
        }
    }
}
