//! CPU submission sink
//!
//! A software implementation of [`SubmitSink`] that rasterizes fills and
//! layer-sampling quads into per-layer RGBA8 buffers. It exists for
//! pixel-exact tests and screenshots on machines without a GPU; SDF shapes,
//! glyphs, images and post effects stay backend work and are skipped here
//! (sampled regions draw their plain passthrough quad).

use tracing::trace;

use crate::framebuffer::CapturedFrame;
use lumen_core::{Bounds, Color};
use lumen_paint::{BatchDraw, BatchKey, BlendMode, LayerInfo, ShapeInstance, SubmitSink};

struct LayerBuffer {
    pixels: Vec<[u8; 4]>,
    width: i32,
    height: i32,
}

impl LayerBuffer {
    fn new(width: i32, height: i32) -> Self {
        Self {
            pixels: vec![[0; 4]; (width.max(0) * height.max(0)) as usize],
            width,
            height,
        }
    }

    fn get(&self, x: i32, y: i32) -> [u8; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    fn put(&mut self, x: i32, y: i32, rgba: [u8; 4]) {
        self.pixels[(y * self.width + x) as usize] = rgba;
    }

    fn bounds(&self) -> Bounds {
        Bounds::new(0, 0, self.width, self.height)
    }

    fn clear_rect(&mut self, rect: Bounds) {
        let rect = rect.intersection(self.bounds());
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                self.put(x, y, [0; 4]);
            }
        }
    }
}

fn blend_pixel(dst: [u8; 4], src: [u8; 4], mode: BlendMode) -> [u8; 4] {
    match mode {
        BlendMode::Opaque => src,
        BlendMode::Alpha => {
            let a = src[3] as u32;
            if a == 255 {
                return src;
            }
            if a == 0 {
                return dst;
            }
            let over = |s: u8, d: u8| -> u8 {
                ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8
            };
            [
                over(src[0], dst[0]),
                over(src[1], dst[1]),
                over(src[2], dst[2]),
                (a + dst[3] as u32 * (255 - a) / 255).min(255) as u8,
            ]
        }
        BlendMode::Add => [
            dst[0].saturating_add(src[0]),
            dst[1].saturating_add(src[1]),
            dst[2].saturating_add(src[2]),
            dst[3].saturating_add(src[3]),
        ],
        BlendMode::Mult => [
            ((dst[0] as u32 * src[0] as u32 + 127) / 255) as u8,
            ((dst[1] as u32 * src[1] as u32 + 127) / 255) as u8,
            ((dst[2] as u32 * src[2] as u32 + 127) / 255) as u8,
            ((dst[3] as u32 * src[3] as u32 + 127) / 255) as u8,
        ],
    }
}

/// Color at a pixel of the instance's quad: per-channel lerp of the four
/// corner colors over the inclusive pixel grid, so a 5-row gradient hits the
/// exact endpoints at rows 0 and 4.
fn gradient_color(instance: &ShapeInstance, px: i32, py: i32) -> Color {
    let x0 = instance.dst[0].floor() as i32;
    let y0 = instance.dst[1].floor() as i32;
    let w = instance.dst[2].round() as i32;
    let h = instance.dst[3].round() as i32;
    let fx = if w > 1 {
        (px - x0) as f32 / (w - 1) as f32
    } else {
        0.0
    };
    let fy = if h > 1 {
        (py - y0) as f32 / (h - 1) as f32
    } else {
        0.0
    };
    let tl = Color::from_argb(instance.colors[0]);
    let tr = Color::from_argb(instance.colors[1]);
    let bl = Color::from_argb(instance.colors[2]);
    let br = Color::from_argb(instance.colors[3]);
    let top = Color::lerp(tl, tr, fx);
    let bottom = Color::lerp(bl, br, fx);
    Color::lerp(top, bottom, fy)
}

fn instance_rect(instance: &ShapeInstance) -> Bounds {
    Bounds::new(
        instance.dst[0].floor() as i32,
        instance.dst[1].floor() as i32,
        instance.dst[2].round() as i32,
        instance.dst[3].round() as i32,
    )
}

fn clip_rect(instance: &ShapeInstance) -> Bounds {
    Bounds::new(
        instance.clip[0].floor() as i32,
        instance.clip[1].floor() as i32,
        instance.clip[2].round() as i32,
        instance.clip[3].round() as i32,
    )
}

/// Software rasterizing [`SubmitSink`].
#[derive(Default)]
pub struct CpuSink {
    layers: Vec<Option<LayerBuffer>>,
    current: Option<u16>,
    frame: u64,
}

impl CpuSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the window layer as it stands after the last frame.
    pub fn capture(&self) -> Option<CapturedFrame> {
        self.capture_layer(0)
    }

    pub fn capture_layer(&self, index: u16) -> Option<CapturedFrame> {
        let buffer = self.layers.get(index as usize)?.as_ref()?;
        let mut data = Vec::with_capacity(buffer.pixels.len() * 4);
        for pixel in &buffer.pixels {
            data.extend_from_slice(pixel);
        }
        Some(
            CapturedFrame::new(data, buffer.width as u32, buffer.height as u32)
                .with_frame(self.frame),
        )
    }

    fn fill_span(&mut self, layer: u16, instance: &ShapeInstance, blend: BlendMode, area: Bounds) {
        let Some(buffer) = self
            .layers
            .get_mut(layer as usize)
            .and_then(Option::as_mut)
        else {
            return;
        };
        let area = area
            .intersection(instance_rect(instance))
            .intersection(clip_rect(instance))
            .intersection(buffer.bounds());
        for py in area.y..area.bottom() {
            for px in area.x..area.right() {
                let color = gradient_color(instance, px, py);
                let src = blend_pixel(buffer.get(px, py), color.rgba_bytes(), blend);
                buffer.put(px, py, src);
            }
        }
    }

    /// Copy the source rect of another layer through the quad, modulated by
    /// the instance's corner colors. Nearest-neighbor when sizes differ.
    fn sample_span(
        &mut self,
        dst_layer: u16,
        src_layer: u16,
        instance: &ShapeInstance,
        blend: BlendMode,
        area: Bounds,
    ) {
        if dst_layer == src_layer {
            return;
        }
        let Some(source) = self.layers.get(src_layer as usize).and_then(Option::as_ref) else {
            trace!(layer = src_layer, "sampled layer has no buffer");
            return;
        };
        let src_bounds = source.bounds();
        let dst = instance_rect(instance);
        let area = area
            .intersection(dst)
            .intersection(clip_rect(instance))
            .intersection(
                self.layers
                    .get(dst_layer as usize)
                    .and_then(Option::as_ref)
                    .map_or(Bounds::ZERO, LayerBuffer::bounds),
            );
        if !area.has_area() || !dst.has_area() {
            return;
        }
        let uv = instance.uv;
        let src_w = uv[2] - uv[0];
        let src_h = uv[3] - uv[1];
        let mut copied: Vec<(i32, i32, [u8; 4])> = Vec::with_capacity(area.area() as usize);
        for py in area.y..area.bottom() {
            for px in area.x..area.right() {
                let u = (px - dst.x) as f32 / dst.width as f32;
                let v = (py - dst.y) as f32 / dst.height as f32;
                let sx = (uv[0] + u * src_w).floor() as i32;
                let sy = (uv[1] + v * src_h).floor() as i32;
                if !src_bounds.contains_point(sx, sy) {
                    continue;
                }
                let texel = source.get(sx, sy);
                let tint = gradient_color(instance, px, py).rgba_bytes();
                let modulated = [
                    ((texel[0] as u32 * tint[0] as u32 + 127) / 255) as u8,
                    ((texel[1] as u32 * tint[1] as u32 + 127) / 255) as u8,
                    ((texel[2] as u32 * tint[2] as u32 + 127) / 255) as u8,
                    ((texel[3] as u32 * tint[3] as u32 + 127) / 255) as u8,
                ];
                copied.push((px, py, modulated));
            }
        }
        if let Some(buffer) = self
            .layers
            .get_mut(dst_layer as usize)
            .and_then(Option::as_mut)
        {
            for (px, py, src) in copied {
                let blended = blend_pixel(buffer.get(px, py), src, blend);
                buffer.put(px, py, blended);
            }
        }
    }
}

impl SubmitSink for CpuSink {
    fn begin_layer(&mut self, _pass: u32, layer: &LayerInfo, dirty: &[Bounds]) {
        let index = layer.index as usize;
        if self.layers.len() <= index {
            self.layers.resize_with(index + 1, || None);
        }
        let resized = self.layers[index]
            .as_ref()
            .map_or(true, |b| b.width != layer.width || b.height != layer.height);
        if resized {
            self.layers[index] = Some(LayerBuffer::new(layer.width, layer.height));
        } else if let Some(buffer) = self.layers[index].as_mut() {
            // Dirty areas are fully redrawn this pass; stale content there
            // must not show through alpha-blended redraws.
            for rect in dirty {
                buffer.clear_rect(*rect);
            }
        }
        self.current = Some(layer.index);
    }

    fn submit_batch(&mut self, _pass: u32, key: BatchKey, blend: BlendMode, draws: &[BatchDraw]) {
        let Some(layer) = self.current else {
            return;
        };
        for draw in draws {
            for scissor in &draw.scissors {
                for instance in &draw.instances {
                    match key {
                        BatchKey::Fill => self.fill_span(layer, instance, blend, *scissor),
                        // Unrounded borderless rects degenerate to fills.
                        BatchKey::Rect
                            if instance.params[0] == 0.0 && instance.params[1] == 0.0 =>
                        {
                            self.fill_span(layer, instance, blend, *scissor)
                        }
                        BatchKey::SampleLayer { layer: source } => {
                            self.sample_span(layer, source, instance, blend, *scissor)
                        }
                        _ => {
                            trace!(?key, "shape kind not rasterized by the cpu sink");
                        }
                    }
                }
            }
        }
    }

    fn end_frame(&mut self, frame: u64, _passes: u32) {
        self.frame = frame;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_blend_is_exact_at_the_extremes() {
        let dst = [10, 20, 30, 255];
        assert_eq!(blend_pixel(dst, [1, 2, 3, 255], BlendMode::Alpha), [1, 2, 3, 255]);
        assert_eq!(blend_pixel(dst, [1, 2, 3, 0], BlendMode::Alpha), dst);
    }

    #[test]
    fn additive_blend_saturates() {
        let out = blend_pixel([200, 0, 0, 255], [100, 0, 0, 255], BlendMode::Add);
        assert_eq!(out[0], 255);
    }

    #[test]
    fn gradient_hits_corner_colors_exactly() {
        let instance = ShapeInstance {
            dst: [0.0, 0.0, 10.0, 5.0],
            clip: [0.0, 0.0, 10.0, 5.0],
            colors: [0xff345678, 0xff345678, 0xff88aacc, 0xff88aacc],
            hdr: [1.0; 4],
            params: [0.0; 4],
            uv: [0.0, 0.0, 1.0, 1.0],
        };
        assert_eq!(gradient_color(&instance, 0, 0).argb(), 0xff345678);
        assert_eq!(gradient_color(&instance, 9, 4).argb(), 0xff88aacc);
        // Row 2 of 5 sits at t = 0.5.
        let mid = gradient_color(&instance, 3, 2);
        assert_eq!(
            mid,
            Color::lerp(
                Color::from_argb(0xff345678),
                Color::from_argb(0xff88aacc),
                0.5
            )
        );
    }

    #[test]
    fn single_pixel_quads_use_the_top_left_corner() {
        let instance = ShapeInstance {
            dst: [3.0, 3.0, 1.0, 1.0],
            clip: [0.0, 0.0, 10.0, 10.0],
            colors: [0xff111111, 0xff222222, 0xff333333, 0xff444444],
            hdr: [1.0; 4],
            params: [0.0; 4],
            uv: [0.0, 0.0, 1.0, 1.0],
        };
        assert_eq!(gradient_color(&instance, 3, 3).argb(), 0xff111111);
    }
}
