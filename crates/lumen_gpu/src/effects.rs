//! Post-effect GPU passes
//!
//! The blur/bloom preprocess runs `stage_count` downsample passes over a
//! halving pyramid and one composite pass that folds the pyramid's upsample
//! walk into per-stage weights computed on the CPU. The pass count consumed
//! here must equal the model's `preprocess_pass_count()` exactly.

use wgpu::util::DeviceExt;

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::shaders::{BLUR_COMPOSITE_SHADER, BLUR_DOWN_SHADER};
use lumen_paint::effects::MAX_DOWNSAMPLES;
use lumen_paint::{BlurBloomPostEffect, SampleSource, StageBlend};

/// Pyramid stages render in floating point regardless of the layer format so
/// thresholded bloom keeps highlights above 1.0.
const STAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct BlurUniforms {
    texel: [f32; 2],
    _pad: [f32; 2],
    region: [f32; 4],
    params: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct CompositeUniforms {
    weights0: [f32; 4],
    weights1: [f32; 4],
    region: [f32; 4],
}

struct Stage {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// Fold the upsample walk into one additive weight per stage plus the
/// passthrough scale on the original. Walking from the deepest stage toward
/// stage 0: an opaque stage drops its own content and carries the deeper
/// result through; an additive stage keeps its content and adds the deeper
/// result scaled by the stage weight.
fn folded_weights(effect: &BlurBloomPostEffect) -> ([f32; 6], f32) {
    let count = effect.stage_count();
    let mut weights = [0.0f32; 6];
    weights[count - 1] = 1.0;
    for i in (0..count - 1).rev() {
        match effect.stage_blend(i) {
            StageBlend::Opaque => {}
            StageBlend::Additive(w) => {
                for deeper in weights.iter_mut().skip(i + 1) {
                    *deeper *= w;
                }
                weights[i] = 1.0;
            }
        }
    }
    let passthrough = if effect.composite_additive() {
        effect.passthrough()
    } else {
        0.0
    };
    (weights, passthrough)
}

/// Pipelines and transient textures for blur/bloom preprocessing.
pub struct EffectResources {
    downsample: wgpu::RenderPipeline,
    down_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    composite_module: wgpu::ShaderModule,
    composite_pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    sampler: wgpu::Sampler,
    stages: Vec<Stage>,
}

impl EffectResources {
    pub fn new(device: &wgpu::Device) -> Self {
        let down_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blur downsample shader"),
            source: wgpu::ShaderSource::Wgsl(BLUR_DOWN_SHADER.into()),
        });
        let composite_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("effect composite shader"),
            source: wgpu::ShaderSource::Wgsl(BLUR_COMPOSITE_SHADER.into()),
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let uniform_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let down_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blur downsample layout"),
            entries: &[uniform_entry, texture_entry(1), sampler_entry(2)],
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("effect composite layout"),
            entries: &[
                uniform_entry,
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                texture_entry(5),
                texture_entry(6),
                texture_entry(7),
                sampler_entry(8),
            ],
        });

        let down_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("blur downsample pipeline layout"),
                bind_group_layouts: &[&down_layout],
                push_constant_ranges: &[],
            });
        let downsample = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blur downsample pipeline"),
            layout: Some(&down_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &down_module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &down_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: STAGE_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("effect sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            downsample,
            down_layout,
            composite_layout,
            composite_module,
            composite_pipelines: FxHashMap::default(),
            sampler,
            stages: Vec::new(),
        }
    }

    fn ensure_composite_pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) {
        if !self.composite_pipelines.contains_key(&format) {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("effect composite pipeline layout"),
                bind_group_layouts: &[&self.composite_layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("effect composite pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &self.composite_module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.composite_module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
            self.composite_pipelines.insert(format, pipeline);
        }
    }

    /// Rebuild the stage pyramid for a source rectangle unless the current
    /// one already fits.
    fn ensure_stages(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let fits = self.stages.first().map_or(false, |s| {
            s.width == (width / 2).max(1) && s.height == (height / 2).max(1)
        });
        if fits {
            return;
        }
        self.stages.clear();
        let mut w = width;
        let mut h = height;
        for _ in 0..MAX_DOWNSAMPLES {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("blur stage"),
                size: wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: STAGE_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            self.stages.push(Stage {
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                width: w,
                height: h,
            });
        }
    }

    /// Run the blur/bloom preprocess. `layer_view` is the source layer's
    /// texture, `output` an effect texture with the layer's dimensions and
    /// `output_format`. Returns the number of passes encoded, always equal
    /// to the effect's `preprocess_pass_count()`.
    #[allow(clippy::too_many_arguments)]
    pub fn run_blur_bloom(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        effect: &BlurBloomPostEffect,
        source: &SampleSource,
        layer_view: &wgpu::TextureView,
        layer_size: (u32, u32),
        output: &wgpu::TextureView,
        output_format: wgpu::TextureFormat,
    ) -> u32 {
        let rect = source.rect;
        let count = effect.stage_count();
        if !rect.has_area() {
            return effect.preprocess_pass_count();
        }
        self.ensure_stages(device, rect.width as u32, rect.height as u32);
        self.ensure_composite_pipeline(device, output_format);

        let source_region = [
            rect.x as f32 / layer_size.0 as f32,
            rect.y as f32 / layer_size.1 as f32,
            rect.width as f32 / layer_size.0 as f32,
            rect.height as f32 / layer_size.1 as f32,
        ];

        // Downsample chain: layer slot -> stage 0 -> ... -> stage count-1.
        for i in 0..count {
            let (source_view, region, texel) = if i == 0 {
                let texel = [1.0 / layer_size.0 as f32, 1.0 / layer_size.1 as f32];
                (layer_view, source_region, texel)
            } else {
                let prev = &self.stages[i - 1];
                let texel = [1.0 / prev.width as f32, 1.0 / prev.height as f32];
                (&prev.view, [0.0, 0.0, 1.0, 1.0], texel)
            };
            let uniforms = BlurUniforms {
                texel,
                _pad: [0.0; 2],
                region,
                params: [
                    effect.bloom_threshold,
                    effect.bloom_intensity,
                    if i == 0 { 1.0 } else { 0.0 },
                    0.0,
                ],
            };
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("blur uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("blur downsample bind group"),
                layout: &self.down_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(source_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blur downsample pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.stages[i].view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.downsample);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..6, 0..1);
        }

        // One composite pass folds the upsample walk.
        let (weights, passthrough) = folded_weights(effect);
        let uniforms = CompositeUniforms {
            weights0: [weights[0], weights[1], weights[2], weights[3]],
            weights1: [weights[4], weights[5], passthrough, 0.0],
            region: source_region,
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("effect composite uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(layer_view),
            },
        ];
        for (slot, stage) in self.stages.iter().enumerate() {
            // Slots past stage_count stay bound but carry zero weight.
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + slot as u32,
                resource: wgpu::BindingResource::TextureView(&stage.view),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: 8,
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("effect composite bind group"),
            layout: &self.composite_layout,
            entries: &entries,
        });
        let pipeline = &self.composite_pipelines[&output_format];
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("effect composite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_viewport(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..6, 0..1);
        drop(pass);

        trace!(
            stages = count,
            rect = ?rect,
            "blur/bloom preprocess encoded"
        );
        effect.preprocess_pass_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folded_weights_keep_only_the_deepest_under_pure_blur() {
        let effect = BlurBloomPostEffect {
            blur_size: 16.0,
            bloom_size: 16.0,
            blend: 0.0,
            ..Default::default()
        };
        // All stages opaque: the deepest alone survives, original dropped.
        let (weights, passthrough) = folded_weights(&effect);
        let count = effect.stage_count();
        assert_eq!(weights[count - 1], 1.0);
        assert!(weights[..count - 1].iter().all(|&w| w == 0.0));
        assert_eq!(passthrough, 0.0);
    }

    #[test]
    fn folded_weights_scale_deeper_stages_past_the_cutoff() {
        let effect = BlurBloomPostEffect {
            blur_size: 2.0,  // log2 = 1
            bloom_size: 8.0, // log2 = 3
            blend: 0.5,      // cutoff = 2
            ..Default::default()
        };
        // 3 stages, cutoff 2: stages 0 and 1 are opaque and pass the deeper
        // result through untouched, so only stage 2 carries weight.
        let (weights, passthrough) = folded_weights(&effect);
        assert_eq!(weights[2], 1.0);
        assert_eq!(weights[0], 0.0);
        assert_eq!(weights[1], 0.0);
        assert!(passthrough > 0.0);
    }
}
