//! External collaborators
//!
//! Font shaping and image decoding live outside this core. The traits here
//! are the whole contract: the core consumes packed-font atlas quads and raw
//! RGBA buffers and never looks inside either implementation.

use std::sync::Arc;

/// Position and atlas coordinates for one glyph quad.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphQuad {
    /// Pen-relative position of the quad's top-left corner.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Normalized atlas coordinates (u0, v0, u1, v1).
    pub uv: [f32; 4],
    /// Horizontal advance to the next pen position.
    pub advance: f32,
}

/// A rasterized, atlas-packed font at one size.
pub trait PackedFont: Send + Sync {
    /// Texture id of the glyph atlas this font's quads sample.
    fn atlas_texture(&self) -> u64;

    /// Width of the atlas texture in pixels.
    fn atlas_width(&self) -> i32;

    /// Quad for a glyph id, or `None` when the font has no such glyph.
    fn glyph(&self, glyph_id: u32) -> Option<GlyphQuad>;
}

/// Supplies reference-counted packed fonts for (size, font-bytes) requests.
///
/// Implementations memoize internally; the core treats the returned handle
/// as opaque and cheap to clone.
pub trait GlyphProvider {
    fn packed_font(&mut self, size: f32, data: &'static [u8]) -> Arc<dyn PackedFont>;
}

/// A decoded RGBA8 pixel buffer. A zero-sized result is the collaborator's
/// "nothing to draw" signal, not an error.
#[derive(Clone, Debug, Default)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RasterImage {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Decodes image or SVG bytes at a target size, synchronously.
pub trait ImageRasterizer {
    fn rasterize(&mut self, bytes: &[u8], width: u32, height: u32) -> RasterImage;
}
