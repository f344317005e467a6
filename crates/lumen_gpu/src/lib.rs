//! Lumen GPU backend
//!
//! Renders the compositor's frame submissions through wgpu. One instanced
//! quad pipeline family covers the shape union, layers render into retained
//! textures, and post effects run as downsample/composite pass chains over
//! the rendered slots.
//!
//! ```no_run
//! use lumen_gpu::{GpuRenderer, RendererConfig};
//! use lumen_paint::Compositor;
//!
//! let mut renderer = GpuRenderer::new_blocking(RendererConfig::from_env())?;
//! let mut compositor = Compositor::new(800, 600);
//! // ... record a frame through a Canvas ...
//! compositor.submit_frame(&mut renderer);
//! renderer.present();
//! # Ok::<(), lumen_gpu::RendererError>(())
//! ```

pub mod cache;
pub mod effects;
pub mod renderer;
pub mod shaders;
pub mod target;

pub use cache::{FontAtlasCache, PipelineCache, PipelineKind, ShaderCache, ShaderId};
pub use effects::EffectResources;
pub use renderer::{GpuRenderer, RendererConfig, RendererError};
pub use target::{LayerTarget, LayerTargets, HDR_FORMAT, SDR_FORMAT};
