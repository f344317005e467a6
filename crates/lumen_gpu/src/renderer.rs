//! wgpu renderer
//!
//! Implements [`SubmitSink`] by recording the frame's passes as lightweight
//! commands and encoding all GPU work in one command buffer at `end_frame`.
//! Recording first keeps the sink calls cheap and sidesteps holding render
//! passes open across trait boundaries.

use std::ops::Range;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{blend_state, FontAtlasCache, PipelineCache, PipelineKey, PipelineKind, ShaderCache};
use crate::effects::EffectResources;
use crate::shaders::SHAPE_SHADER;
use crate::target::{LayerTargets, SDR_FORMAT};
use lumen_core::{Bounds, HDR_COLOR_RANGE};
use lumen_paint::{
    BatchDraw, BatchKey, BlendMode, LayerInfo, PostEffect, SampleSource, ShapeInstance, SubmitSink,
};

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("no compatible GPU adapter found")]
    AdapterNotFound,
    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface creation failed: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
}

/// Renderer settings, overridable from the environment.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    /// Glyph atlas views kept resident before the least recent is dropped.
    pub font_atlas_capacity: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            font_atlas_capacity: 8,
        }
    }
}

impl RendererConfig {
    /// Default config with `LUMEN_GPU_BACKEND` (vulkan, metal, dx12, gl)
    /// restricting the backend set when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var("LUMEN_GPU_BACKEND") {
            config.backends = match name.to_ascii_lowercase().as_str() {
                "vulkan" => wgpu::Backends::VULKAN,
                "metal" => wgpu::Backends::METAL,
                "dx12" => wgpu::Backends::DX12,
                "gl" => wgpu::Backends::GL,
                other => {
                    warn!(backend = other, "unknown LUMEN_GPU_BACKEND, using all");
                    wgpu::Backends::all()
                }
            };
        }
        config
    }
}

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
    0 => Float32x4,
    1 => Float32x4,
    2 => Uint32x4,
    3 => Float32x4,
    4 => Float32x4,
    5 => Float32x4,
];

const INSTANCE_LAYOUT: wgpu::VertexBufferLayout = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<ShapeInstance>() as u64,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &INSTANCE_ATTRIBUTES,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct PassUniforms {
    viewport: [f32; 2],
    hdr_range: f32,
    time: f32,
}

/// One region position's contribution to a batch: a contiguous instance
/// range drawn once per scissor rect.
struct Span {
    instances: Range<u32>,
    scissors: SmallVec<[Bounds; 8]>,
}

enum Command {
    BeginLayer {
        info: LayerInfo,
    },
    Batch {
        key: BatchKey,
        blend: BlendMode,
        spans: Vec<Span>,
    },
    Preprocess {
        effect: PostEffect,
        source: SampleSource,
    },
}

struct EffectOutput {
    texture: wgpu::Texture,
    view: Arc<wgpu::TextureView>,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

struct SurfaceState {
    surface: wgpu::Surface<'static>,
    width: u32,
    height: u32,
}

/// Clamp a scissor rect to the target and drop it when nothing remains.
fn clamp_scissor(bounds: Bounds, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let clamped = bounds.intersection(Bounds::new(0, 0, width as i32, height as i32));
    if !clamped.has_area() {
        return None;
    }
    Some((
        clamped.x as u32,
        clamped.y as u32,
        clamped.width as u32,
        clamped.height as u32,
    ))
}

pub struct GpuRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    format: wgpu::TextureFormat,

    shaders: ShaderCache,
    pipelines: PipelineCache,
    shape_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Bound in place of a texture for untextured pipelines, so every batch
    /// shares one bind group layout.
    white: Arc<wgpu::TextureView>,

    targets: LayerTargets,
    effects: EffectResources,
    effect_outputs: FxHashMap<u16, EffectOutput>,

    textures: FxHashMap<u64, Arc<wgpu::TextureView>>,
    font_atlases: FontAtlasCache,
    programs: FxHashMap<u64, &'static str>,

    surface: Option<SurfaceState>,

    commands: Vec<Command>,
    instances: Vec<ShapeInstance>,
    time: f32,
}

impl GpuRenderer {
    pub async fn new(config: RendererConfig) -> Result<Self, RendererError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: config.backends,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererError::AdapterNotFound)?;
        info!(adapter = ?adapter.get_info().name, "adapter selected");
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lumen device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await?;
        Ok(Self::with_device(
            instance,
            adapter,
            Arc::new(device),
            Arc::new(queue),
            &config,
        ))
    }

    /// Blocking constructor for callers without an executor.
    pub fn new_blocking(config: RendererConfig) -> Result<Self, RendererError> {
        pollster::block_on(Self::new(config))
    }

    fn with_device(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        config: &RendererConfig,
    ) -> Self {
        let shape_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shape bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shape sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let white_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("white placeholder"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &white_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[0xff; 4],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let white = Arc::new(white_texture.create_view(&wgpu::TextureViewDescriptor::default()));

        let effects = EffectResources::new(&device);
        Self {
            device,
            queue,
            instance,
            adapter,
            format: SDR_FORMAT,
            shaders: ShaderCache::default(),
            pipelines: PipelineCache::default(),
            shape_layout,
            sampler,
            white,
            targets: LayerTargets::new(SDR_FORMAT),
            effects,
            effect_outputs: FxHashMap::default(),
            textures: FxHashMap::default(),
            font_atlases: FontAtlasCache::new(config.font_atlas_capacity),
            programs: FxHashMap::default(),
            surface: None,
            commands: Vec::new(),
            instances: Vec::new(),
            time: 0.0,
        }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Animation clock forwarded to shaders.
    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    /// Make an image atlas texture available to `Image` batches under `id`.
    pub fn register_texture(&mut self, id: u64, view: Arc<wgpu::TextureView>) {
        self.textures.insert(id, view);
    }

    /// Make a glyph atlas texture available to `Text` batches under `id`.
    /// Atlases rotate through an LRU; re-register after long idle periods.
    pub fn register_font_atlas(&mut self, id: u64, view: Arc<wgpu::TextureView>) {
        self.font_atlases.insert(id, view);
    }

    /// Register a custom fragment program for `Shader` batches. The source
    /// must define `vs_main`/`fs_main` over the shape instance layout.
    pub fn register_program(&mut self, id: u64, source: &'static str) {
        self.programs.insert(id, source);
    }

    /// Attach a window surface; layer 0 is copied to it on [`present`].
    ///
    /// [`present`]: GpuRenderer::present
    pub fn attach_surface(
        &mut self,
        target: wgpu::SurfaceTarget<'static>,
        width: u32,
        height: u32,
    ) -> Result<(), RendererError> {
        let surface = self.instance.create_surface(target)?;
        let mut surface_config = surface
            .get_default_config(&self.adapter, width.max(1), height.max(1))
            .ok_or(RendererError::AdapterNotFound)?;
        surface_config.format = self.format;
        surface_config.usage |= wgpu::TextureUsages::COPY_DST;
        surface.configure(&self.device, &surface_config);
        self.surface = Some(SurfaceState {
            surface,
            width: width.max(1),
            height: height.max(1),
        });
        Ok(())
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if let Some(state) = &mut self.surface {
            state.width = width.max(1);
            state.height = height.max(1);
            let mut surface_config = match state
                .surface
                .get_default_config(&self.adapter, state.width, state.height)
            {
                Some(config) => config,
                None => return,
            };
            surface_config.format = self.format;
            surface_config.usage |= wgpu::TextureUsages::COPY_DST;
            state.surface.configure(&self.device, &surface_config);
        }
    }

    /// Copy the window layer to the attached surface and present it.
    pub fn present(&mut self) {
        let Some(state) = &self.surface else {
            return;
        };
        let Some(window) = self.targets.get(0) else {
            return;
        };
        let frame = match state.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(error) => {
                warn!(?error, "surface frame unavailable, skipping present");
                return;
            }
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present encoder"),
            });
        let width = window.width.min(state.width);
        let height = window.height.min(state.height);
        encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: &window.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyTexture {
                texture: &frame.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));
        frame.present();
    }

    fn pipeline_for(
        &mut self,
        key: BatchKey,
        blend: BlendMode,
        format: wgpu::TextureFormat,
    ) -> Option<Arc<wgpu::RenderPipeline>> {
        let kind = PipelineKind::from_key(key);
        let source = match kind {
            PipelineKind::Shader(program) => match self.programs.get(&program) {
                Some(source) => *source,
                None => {
                    warn!(program, "no shader registered for program, batch skipped");
                    return None;
                }
            },
            _ => SHAPE_SHADER,
        };
        let module = self.shaders.get_or_compile(&self.device, source);
        let device = &self.device;
        let layout = &self.shape_layout;
        let pipeline_key = PipelineKey {
            kind,
            blend,
            format,
        };
        Some(self.pipelines.get_or_create(pipeline_key, || {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("shape pipeline layout"),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("shape pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    buffers: &[INSTANCE_LAYOUT],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(kind.entry_point()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: blend_state(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        }))
    }

    /// Texture bound for a batch, and the HDR range restore factor sampling
    /// quads multiply by.
    fn batch_texture(&mut self, key: BatchKey) -> (Arc<wgpu::TextureView>, f32) {
        match key {
            BatchKey::Text { font } => match self.font_atlases.get(font) {
                Some(view) => (view, 1.0),
                None => {
                    warn!(font, "glyph atlas not registered, glyphs drop out");
                    (self.white.clone(), 1.0)
                }
            },
            BatchKey::Image { texture } => match self.textures.get(&texture) {
                Some(view) => (view.clone(), 1.0),
                None => {
                    warn!(texture, "image texture not registered");
                    (self.white.clone(), 1.0)
                }
            },
            BatchKey::SampleLayer { layer } => {
                let hdr = self
                    .targets
                    .get(layer)
                    .map_or(false, |t| t.format != SDR_FORMAT);
                let range = if hdr { HDR_COLOR_RANGE } else { 1.0 };
                if let Some(output) = self.effect_outputs.get(&layer) {
                    (output.view.clone(), range)
                } else if let Some(target) = self.targets.get(layer) {
                    (target.view.clone(), range)
                } else {
                    warn!(layer, "sampled layer has no target yet");
                    (self.white.clone(), 1.0)
                }
            }
            _ => (self.white.clone(), 1.0),
        }
    }

    fn ensure_effect_output(&mut self, layer: u16, width: u32, height: u32, format: wgpu::TextureFormat) {
        let fits = self
            .effect_outputs
            .get(&layer)
            .map_or(false, |o| o.width == width && o.height == height && o.format == format);
        if fits {
            return;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("effect output"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.effect_outputs.insert(
            layer,
            EffectOutput {
                texture,
                view,
                width,
                height,
                format,
            },
        );
    }

    fn encode_frame(&mut self, frame: u64) {
        let commands = std::mem::take(&mut self.commands);
        let instances = std::mem::take(&mut self.instances);
        if commands.is_empty() {
            self.targets.collect_retired(frame);
            return;
        }
        let instance_buffer = if instances.is_empty() {
            None
        } else {
            Some(
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("shape instances"),
                        contents: bytemuck::cast_slice(&instances),
                        usage: wgpu::BufferUsages::VERTEX,
                    }),
            )
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        let mut index = 0;
        while index < commands.len() {
            match &commands[index] {
                Command::BeginLayer { info } => {
                    let recreated = self.targets.ensure(&self.device, info, frame);
                    if recreated {
                        // The old effect output referenced the retired target.
                        self.effect_outputs.remove(&info.index);
                    }

                    // Prepare every batch's pipeline and bind group before the
                    // render pass opens; passes cannot outlive cache lookups.
                    let mut prepared = Vec::new();
                    let mut next = index + 1;
                    while let Some(Command::Batch { key, blend, spans }) = commands.get(next) {
                        let Some(target) = self.targets.get(info.index) else {
                            break;
                        };
                        let format = target.format;
                        let viewport = [target.width as f32, target.height as f32];
                        if let Some(pipeline) = self.pipeline_for(*key, *blend, format) {
                            let (view, hdr_range) = self.batch_texture(*key);
                            let uniforms = PassUniforms {
                                viewport,
                                hdr_range,
                                time: self.time,
                            };
                            let uniform_buffer = self.device.create_buffer_init(
                                &wgpu::util::BufferInitDescriptor {
                                    label: Some("pass uniforms"),
                                    contents: bytemuck::bytes_of(&uniforms),
                                    usage: wgpu::BufferUsages::UNIFORM,
                                },
                            );
                            let bind_group =
                                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                                    label: Some("shape bind group"),
                                    layout: &self.shape_layout,
                                    entries: &[
                                        wgpu::BindGroupEntry {
                                            binding: 0,
                                            resource: uniform_buffer.as_entire_binding(),
                                        },
                                        wgpu::BindGroupEntry {
                                            binding: 1,
                                            resource: wgpu::BindingResource::TextureView(&view),
                                        },
                                        wgpu::BindGroupEntry {
                                            binding: 2,
                                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                                        },
                                    ],
                                });
                            prepared.push((pipeline, bind_group, spans));
                        }
                        next += 1;
                    }

                    if let Some(target) = self.targets.get(info.index) {
                        let load = if recreated {
                            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
                        } else {
                            wgpu::LoadOp::Load
                        };
                        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("layer pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view: &target.view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load,
                                    store: wgpu::StoreOp::Store,
                                },
                            })],
                            depth_stencil_attachment: None,
                            timestamp_writes: None,
                            occlusion_query_set: None,
                        });
                        if let Some(buffer) = &instance_buffer {
                            for (pipeline, bind_group, spans) in &prepared {
                                pass.set_pipeline(pipeline);
                                pass.set_bind_group(0, bind_group, &[]);
                                for span in spans.iter() {
                                    let start = span.instances.start as u64
                                        * std::mem::size_of::<ShapeInstance>() as u64;
                                    let end = span.instances.end as u64
                                        * std::mem::size_of::<ShapeInstance>() as u64;
                                    pass.set_vertex_buffer(0, buffer.slice(start..end));
                                    let count = span.instances.end - span.instances.start;
                                    for scissor in &span.scissors {
                                        let Some((x, y, w, h)) =
                                            clamp_scissor(*scissor, target.width, target.height)
                                        else {
                                            continue;
                                        };
                                        pass.set_scissor_rect(x, y, w, h);
                                        pass.draw(0..6, 0..count);
                                    }
                                }
                            }
                        }
                    }
                    index = next;
                }
                Command::Batch { key, .. } => {
                    // A batch outside any layer means recording got out of
                    // step with the compositor; drop it.
                    warn!(?key, "batch submitted outside a layer pass");
                    index += 1;
                }
                Command::Preprocess { effect, source } => {
                    self.encode_preprocess(&mut encoder, effect, source);
                    index += 1;
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        self.targets.collect_retired(frame);
        debug!(frame, commands = commands.len(), "frame encoded");
    }

    fn encode_preprocess(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        effect: &PostEffect,
        source: &SampleSource,
    ) {
        let PostEffect::BlurBloom(blur) = effect else {
            // Shader effects sample the layer directly during composite.
            return;
        };
        let Some(target_dims) = self
            .targets
            .get(source.layer)
            .map(|t| (t.width, t.height, t.format))
        else {
            warn!(layer = source.layer, "preprocess before layer was rendered");
            return;
        };
        let (width, height, format) = target_dims;
        self.ensure_effect_output(source.layer, width, height, format);
        let Some(target) = self.targets.get(source.layer) else {
            return;
        };
        let Some(output) = self.effect_outputs.get(&source.layer) else {
            return;
        };
        // Non-effect areas of the layer show through the sampled copy
        // unchanged, so plain-mode slots on the same layer stay correct.
        encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyTexture {
                texture: &output.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.effects.run_blur_bloom(
            &self.device,
            encoder,
            blur,
            source,
            &target.view,
            (width, height),
            &output.view,
            format,
        );
    }
}

impl SubmitSink for GpuRenderer {
    fn begin_layer(&mut self, _pass: u32, layer: &LayerInfo, _dirty: &[Bounds]) {
        self.commands.push(Command::BeginLayer { info: *layer });
    }

    fn submit_batch(&mut self, _pass: u32, key: BatchKey, blend: BlendMode, draws: &[BatchDraw]) {
        let mut spans = Vec::with_capacity(draws.len());
        for draw in draws {
            let start = self.instances.len() as u32;
            self.instances.extend_from_slice(&draw.instances);
            spans.push(Span {
                instances: start..self.instances.len() as u32,
                scissors: draw.scissors.clone(),
            });
        }
        self.commands.push(Command::Batch { key, blend, spans });
    }

    fn preprocess_effect(&mut self, _first_pass: u32, effect: &PostEffect, source: &SampleSource) -> u32 {
        self.commands.push(Command::Preprocess {
            effect: effect.clone(),
            source: *source,
        });
        effect.preprocess_pass_count()
    }

    fn end_frame(&mut self, frame: u64, _passes: u32) {
        self.encode_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_layout_matches_struct_size() {
        assert_eq!(
            INSTANCE_LAYOUT.array_stride,
            std::mem::size_of::<ShapeInstance>() as u64
        );
        assert_eq!(INSTANCE_ATTRIBUTES.len(), 6);
    }

    #[test]
    fn scissors_clamp_to_the_target() {
        assert_eq!(
            clamp_scissor(Bounds::new(-10, -10, 30, 30), 100, 100),
            Some((0, 0, 20, 20))
        );
        assert_eq!(
            clamp_scissor(Bounds::new(90, 90, 30, 30), 100, 100),
            Some((90, 90, 10, 10))
        );
        assert_eq!(clamp_scissor(Bounds::new(200, 0, 10, 10), 100, 100), None);
    }

    #[test]
    fn pass_uniforms_are_shader_sized() {
        assert_eq!(std::mem::size_of::<PassUniforms>(), 16);
    }
}
