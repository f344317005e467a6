//! GPU resource caches
//!
//! Shader modules are cached by the address of their static source text, so
//! embedding a program twice under the same bytes still compiles once per
//! distinct constant. Pipelines are cached by (entry point, blend, format).
//! Glyph atlas textures go through an LRU so a font-heavy session cannot
//! accumulate atlases without bound.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use rustc_hash::FxHashMap;
use tracing::debug;

use lumen_paint::{BatchKey, BlendMode};

/// Identity of an embedded shader source: the address of the static string.
/// Two distinct `&'static str` constants never share an address, and a
/// constant's address never changes, so this is a stable cheap key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderId(usize);

impl ShaderId {
    pub fn of(source: &'static str) -> Self {
        Self(source.as_ptr() as usize)
    }
}

/// Compiles and memoizes shader modules.
#[derive(Default)]
pub struct ShaderCache {
    modules: FxHashMap<ShaderId, Arc<wgpu::ShaderModule>>,
}

impl ShaderCache {
    pub fn get_or_compile(
        &mut self,
        device: &wgpu::Device,
        source: &'static str,
    ) -> Arc<wgpu::ShaderModule> {
        let id = ShaderId::of(source);
        self.modules
            .entry(id)
            .or_insert_with(|| {
                debug!(?id, "compiling shader module");
                Arc::new(device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: None,
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                }))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// The fragment entry point a batch key selects. Resource ids (font, texture,
/// layer, program) affect bindings, not the pipeline, except for custom
/// shader programs which get their own pipeline per program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Fill,
    Rect,
    Circle,
    Arc,
    Text,
    Image,
    Sample,
    Shader(u64),
}

impl PipelineKind {
    pub fn from_key(key: BatchKey) -> Self {
        match key {
            BatchKey::Fill => Self::Fill,
            BatchKey::Rect => Self::Rect,
            BatchKey::Circle => Self::Circle,
            BatchKey::Arc => Self::Arc,
            BatchKey::Text { .. } => Self::Text,
            BatchKey::Image { .. } => Self::Image,
            BatchKey::SampleLayer { .. } => Self::Sample,
            BatchKey::Shader { program } => Self::Shader(program),
        }
    }

    /// Entry point in the shape shader; custom programs supply their own.
    pub fn entry_point(&self) -> &'static str {
        match self {
            Self::Fill => "fs_fill",
            Self::Rect => "fs_rect",
            Self::Circle => "fs_circle",
            Self::Arc => "fs_arc",
            Self::Text => "fs_text",
            Self::Image => "fs_image",
            Self::Sample => "fs_sample",
            Self::Shader(_) => "fs_main",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub kind: PipelineKind,
    pub blend: BlendMode,
    pub format: wgpu::TextureFormat,
}

/// Memoizes render pipelines per (kind, blend, target format).
#[derive(Default)]
pub struct PipelineCache {
    pipelines: FxHashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,
}

impl PipelineCache {
    pub fn get_or_create(
        &mut self,
        key: PipelineKey,
        create: impl FnOnce() -> wgpu::RenderPipeline,
    ) -> Arc<wgpu::RenderPipeline> {
        self.pipelines
            .entry(key)
            .or_insert_with(|| {
                debug!(?key, "building render pipeline");
                Arc::new(create())
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }
}

/// Blend state per [`BlendMode`], premultiplied-friendly straight-alpha as
/// the default path.
pub fn blend_state(blend: BlendMode) -> Option<wgpu::BlendState> {
    match blend {
        BlendMode::Opaque => Some(wgpu::BlendState::REPLACE),
        BlendMode::Alpha => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        }),
        BlendMode::Add => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        }),
        BlendMode::Mult => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Dst,
                dst_factor: wgpu::BlendFactor::Zero,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Dst,
                dst_factor: wgpu::BlendFactor::Zero,
                operation: wgpu::BlendOperation::Add,
            },
        }),
    }
}

/// LRU cache of glyph atlas texture views keyed by the provider's atlas
/// texture id.
pub struct FontAtlasCache {
    views: LruCache<u64, Arc<wgpu::TextureView>>,
}

impl FontAtlasCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            views: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, texture: u64) -> Option<Arc<wgpu::TextureView>> {
        self.views.get(&texture).cloned()
    }

    pub fn insert(&mut self, texture: u64, view: Arc<wgpu::TextureView>) {
        self.views.put(texture, view);
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }
}
