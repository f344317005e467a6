//! Typed draw commands
//!
//! Shapes are immutable values built per draw call, held in a batch for one
//! frame, and discarded on batch clear. The shape set is a closed union: every
//! kind maps to exactly one GPU pipeline, identified by its [`BatchKey`].

use bytemuck::{Pod, Zeroable};
use lumen_core::{Bounds, Color};

/// Blend state applied to a whole batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlendMode {
    Opaque,
    #[default]
    Alpha,
    Add,
    Mult,
}

/// How a layer-sampling quad composites its source.
///
/// Plain copies pixels through; the effect variants carry the composite
/// parameters computed by the post-effect preprocess so the backend can bind
/// the right intermediate textures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleMode {
    Plain,
    BlurBloom {
        /// Scale on the passthrough quad of the original image.
        passthrough: f32,
        /// False once the effect is fully cut over to blur, which composites
        /// opaquely instead of additively.
        additive: bool,
    },
    Shader {
        program: u64,
    },
}

/// Identity of the GPU pipeline a shape requires. The derived order is the
/// primary submission order across batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BatchKey {
    Fill,
    Rect,
    Circle,
    Arc,
    Text { font: u64 },
    Image { texture: u64 },
    SampleLayer { layer: u16 },
    Shader { program: u64 },
}

/// Colors at the four corners of a shape's quad, clockwise from top-left is
/// not assumed: order is top-left, top-right, bottom-left, bottom-right.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadColors {
    pub corners: [Color; 4],
}

impl QuadColors {
    pub const fn solid(color: Color) -> Self {
        Self {
            corners: [color; 4],
        }
    }

    pub const fn vertical(top: Color, bottom: Color) -> Self {
        Self {
            corners: [top, top, bottom, bottom],
        }
    }

    pub const fn horizontal(left: Color, right: Color) -> Self {
        Self {
            corners: [left, right, left, right],
        }
    }

    pub fn top_left(&self) -> Color {
        self.corners[0]
    }

    pub fn bottom_left(&self) -> Color {
        self.corners[2]
    }
}

impl From<Color> for QuadColors {
    fn from(color: Color) -> Self {
        QuadColors::solid(color)
    }
}

impl Default for QuadColors {
    fn default() -> Self {
        QuadColors::solid(Color::TRANSPARENT)
    }
}

/// Kind-specific geometry parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeKind {
    /// Flat quad fill.
    Fill,
    /// Rounded rectangle; `thickness` 0 draws filled, otherwise a border.
    Rect { rounding: f32, thickness: f32 },
    /// Circle inscribed in the quad; `thickness` 0 draws filled.
    Circle { thickness: f32 },
    /// Ring segment: angles in radians, `sweep` positive counter-clockwise.
    Arc {
        start: f32,
        sweep: f32,
        thickness: f32,
    },
    /// One glyph quad sampling a packed font atlas.
    Text {
        font: u64,
        /// Normalized atlas coordinates (u0, v0, u1, v1).
        uv: [f32; 4],
    },
    /// Quad sampling an image atlas texture.
    Image { texture: u64, uv: [f32; 4] },
    /// Quad sampling another layer's packed slot (intermediate regions).
    SampleLayer {
        layer: u16,
        /// Source rectangle inside the sampled layer, in pixels.
        source: Bounds,
        mode: SampleMode,
    },
    /// Quad run through a caller-supplied fragment program.
    Shader { program: u64 },
}

/// An immutable draw command.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub clip: Bounds,
    pub blend: BlendMode,
    pub colors: QuadColors,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Shape {
    pub fn batch_key(&self) -> BatchKey {
        match self.kind {
            ShapeKind::Fill => BatchKey::Fill,
            ShapeKind::Rect { .. } => BatchKey::Rect,
            ShapeKind::Circle { .. } => BatchKey::Circle,
            ShapeKind::Arc { .. } => BatchKey::Arc,
            ShapeKind::Text { font, .. } => BatchKey::Text { font },
            ShapeKind::Image { texture, .. } => BatchKey::Image { texture },
            ShapeKind::SampleLayer { layer, .. } => BatchKey::SampleLayer { layer },
            ShapeKind::Shader { program } => BatchKey::Shader { program },
        }
    }

    /// Pixel cover of the visible part of the shape: geometry clamped to the
    /// clip rect. Zero-clip shapes report zero area and overlap nothing.
    pub fn bounds(&self) -> Bounds {
        let geometry = Bounds::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            (self.x + self.width).ceil() as i32 - self.x.floor() as i32,
            (self.y + self.height).ceil() as i32 - self.y.floor() as i32,
        );
        geometry.intersection(self.clip)
    }

    /// GPU instance for this shape, translated into layer coordinates.
    pub fn instance(&self, offset_x: f32, offset_y: f32) -> ShapeInstance {
        let params = match self.kind {
            ShapeKind::Fill => [0.0; 4],
            ShapeKind::Rect {
                rounding,
                thickness,
            } => [rounding, thickness, 0.0, 0.0],
            ShapeKind::Circle { thickness } => [thickness, 0.0, 0.0, 0.0],
            ShapeKind::Arc {
                start,
                sweep,
                thickness,
            } => [start, sweep, thickness, 0.0],
            ShapeKind::Text { .. } => [0.0; 4],
            ShapeKind::Image { .. } => [0.0; 4],
            ShapeKind::SampleLayer { mode, .. } => match mode {
                SampleMode::Plain => [1.0, 0.0, 0.0, 0.0],
                SampleMode::BlurBloom {
                    passthrough,
                    additive,
                } => [passthrough, if additive { 1.0 } else { 0.0 }, 1.0, 0.0],
                SampleMode::Shader { .. } => [1.0, 0.0, 2.0, 0.0],
            },
            // Custom programs read their inputs from uniforms, not params.
            ShapeKind::Shader { .. } => [0.0; 4],
        };
        let uv = match self.kind {
            ShapeKind::Text { uv, .. } | ShapeKind::Image { uv, .. } => uv,
            ShapeKind::SampleLayer { source, .. } => [
                source.x as f32,
                source.y as f32,
                source.right() as f32,
                source.bottom() as f32,
            ],
            _ => [0.0, 0.0, 1.0, 1.0],
        };
        ShapeInstance {
            dst: [
                self.x + offset_x,
                self.y + offset_y,
                self.width,
                self.height,
            ],
            clip: [
                (self.clip.x as f32) + offset_x,
                (self.clip.y as f32) + offset_y,
                self.clip.width as f32,
                self.clip.height as f32,
            ],
            colors: [
                self.colors.corners[0].argb(),
                self.colors.corners[1].argb(),
                self.colors.corners[2].argb(),
                self.colors.corners[3].argb(),
            ],
            hdr: [
                self.colors.corners[0].hdr(),
                self.colors.corners[1].hdr(),
                self.colors.corners[2].hdr(),
                self.colors.corners[3].hdr(),
            ],
            params,
            uv,
        }
    }
}

/// Per-shape instance data uploaded to the GPU.
///
/// Memory layout (matches the shader's Instance struct):
/// - `dst`: `vec4<f32>` destination rectangle (x, y, width, height)
/// - `clip`: `vec4<f32>` clip rectangle in layer pixels
/// - `colors`: `vec4<u32>` packed ARGB corner colors (tl, tr, bl, br)
/// - `hdr`: `vec4<f32>` per-corner HDR multipliers
/// - `params`: `vec4<f32>` kind-specific parameters
/// - `uv`: `vec4<f32>` source coordinates
/// Total: 96 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShapeInstance {
    pub dst: [f32; 4],
    pub clip: [f32; 4],
    pub colors: [u32; 4],
    pub hdr: [f32; 4],
    pub params: [f32; 4],
    pub uv: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(x: f32, y: f32, w: f32, h: f32, clip: Bounds) -> Shape {
        Shape {
            kind: ShapeKind::Fill,
            clip,
            blend: BlendMode::Alpha,
            colors: QuadColors::solid(Color::from_argb(0xff000000)),
            x,
            y,
            width: w,
            height: h,
        }
    }

    #[test]
    fn bounds_cover_fractional_geometry() {
        let shape = fill(0.5, 0.5, 10.0, 10.0, Bounds::new(0, 0, 100, 100));
        assert_eq!(shape.bounds(), Bounds::new(0, 0, 11, 11));
    }

    #[test]
    fn bounds_clamp_to_clip() {
        let shape = fill(0.0, 0.0, 10.0, 10.0, Bounds::new(4, 4, 2, 2));
        assert_eq!(shape.bounds(), Bounds::new(4, 4, 2, 2));
    }

    #[test]
    fn zero_clip_shape_has_no_bounds() {
        let shape = fill(0.0, 0.0, 10.0, 10.0, Bounds::ZERO);
        assert!(!shape.bounds().has_area());
    }

    #[test]
    fn key_identifies_pipeline_and_resource() {
        let mut a = fill(0.0, 0.0, 1.0, 1.0, Bounds::new(0, 0, 1, 1));
        assert_eq!(a.batch_key(), BatchKey::Fill);
        a.kind = ShapeKind::Image {
            texture: 7,
            uv: [0.0, 0.0, 1.0, 1.0],
        };
        assert_eq!(a.batch_key(), BatchKey::Image { texture: 7 });
        assert_ne!(a.batch_key(), BatchKey::Image { texture: 8 });
    }

    #[test]
    fn shader_quads_build_instances() {
        let mut shape = fill(0.0, 0.0, 8.0, 8.0, Bounds::new(0, 0, 8, 8));
        shape.kind = ShapeKind::Shader { program: 3 };
        assert_eq!(shape.batch_key(), BatchKey::Shader { program: 3 });
        let instance = shape.instance(0.0, 0.0);
        assert_eq!(instance.params, [0.0; 4]);
        assert_eq!(instance.uv, [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn instance_applies_offset() {
        let shape = fill(2.0, 3.0, 4.0, 5.0, Bounds::new(0, 0, 10, 10));
        let instance = shape.instance(100.0, 200.0);
        assert_eq!(instance.dst, [102.0, 203.0, 4.0, 5.0]);
        assert_eq!(instance.clip, [100.0, 200.0, 10.0, 10.0]);
    }
}
