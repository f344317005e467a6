//! Layer render targets
//!
//! One texture per compositor layer, recreated on resize or format change.
//! Old textures are not destroyed immediately: queued GPU work from the
//! previous frames may still reference them, so they pass through a
//! [`RetireQueue`] and drop two frame boundaries later.

use std::sync::Arc;

use tracing::debug;

use lumen_core::RetireQueue;
use lumen_paint::LayerInfo;

pub const SDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8UnormSrgb;
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// A layer's backing texture and view. The view is shared with sampling
/// batches through the `Arc`.
pub struct LayerTarget {
    pub texture: wgpu::Texture,
    pub view: Arc<wgpu::TextureView>,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl LayerTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("layer target"),
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
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    fn matches(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> bool {
        self.width == width && self.height == height && self.format == format
    }
}

/// Targets indexed by layer, plus the retire queue for replaced textures.
pub struct LayerTargets {
    targets: Vec<Option<LayerTarget>>,
    retired: RetireQueue<wgpu::Texture>,
    sdr_format: wgpu::TextureFormat,
}

impl LayerTargets {
    pub fn new(sdr_format: wgpu::TextureFormat) -> Self {
        Self {
            targets: Vec::new(),
            retired: RetireQueue::new(),
            sdr_format,
        }
    }

    fn format_for(&self, info: &LayerInfo) -> wgpu::TextureFormat {
        if info.hdr {
            HDR_FORMAT
        } else {
            self.sdr_format
        }
    }

    /// Target for `info`, recreating it when dimensions or format changed.
    /// The replaced texture is retired against `frame`. Returns true when the
    /// target was (re)created, meaning its contents are undefined.
    pub fn ensure(&mut self, device: &wgpu::Device, info: &LayerInfo, frame: u64) -> bool {
        let index = info.index as usize;
        if self.targets.len() <= index {
            self.targets.resize_with(index + 1, || None);
        }
        let width = info.width.max(1) as u32;
        let height = info.height.max(1) as u32;
        let format = self.format_for(info);
        let stale = self.targets[index]
            .as_ref()
            .map_or(true, |t| !t.matches(width, height, format));
        if stale {
            if let Some(old) = self.targets[index].take() {
                debug!(
                    layer = info.index,
                    old_width = old.width,
                    old_height = old.height,
                    width,
                    height,
                    "layer target recreated, old texture retired"
                );
                self.retired.retire(frame, old.texture);
            }
            self.targets[index] = Some(LayerTarget::new(device, width, height, format));
        }
        stale
    }

    pub fn get(&self, index: u16) -> Option<&LayerTarget> {
        self.targets.get(index as usize)?.as_ref()
    }

    /// Destroy textures whose two-frame hold has elapsed.
    pub fn collect_retired(&mut self, frame: u64) {
        for texture in self.retired.drain_expired(frame) {
            texture.destroy();
        }
    }

    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }
}
