//! Canvas - the per-frame drawing API
//!
//! Widgets draw through a [`Canvas`] inside their region's draw callback.
//! The canvas owns the current draw state (position offset, clip, brush,
//! blend mode, active region, palette override) on a save/restore stack and
//! turns drawing calls into typed shapes pushed at the active region's
//! batcher. The stack must balance within a frame.

use std::sync::Arc;

use crate::provider::PackedFont;
use crate::region::{Compositor, RegionId};
use crate::shape::{BlendMode, QuadColors, Shape, ShapeKind};
use lumen_core::Bounds;

#[derive(Clone, Debug)]
struct State {
    x: f32,
    y: f32,
    clip: Bounds,
    brush: QuadColors,
    blend: BlendMode,
    region: Option<RegionId>,
    palette: u32,
}

impl Default for State {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            clip: Bounds::ZERO,
            brush: QuadColors::default(),
            blend: BlendMode::Alpha,
            region: None,
            palette: 0,
        }
    }
}

/// Drawing facade over a [`Compositor`] for one frame.
pub struct Canvas<'a> {
    compositor: &'a mut Compositor,
    state: State,
    stack: Vec<State>,
    time: f64,
    delta_time: f64,
    dpi_scale: f32,
    width_scale: f32,
    height_scale: f32,
}

impl<'a> Canvas<'a> {
    pub fn new(compositor: &'a mut Compositor) -> Self {
        Self {
            compositor,
            state: State::default(),
            stack: Vec::new(),
            time: 0.0,
            delta_time: 0.0,
            dpi_scale: 1.0,
            width_scale: 1.0,
            height_scale: 1.0,
        }
    }

    // === Frame timing & scale ===

    /// Advance the frame clock; shader effects read both values.
    pub fn update_time(&mut self, time: f64) {
        self.delta_time = (time - self.time).max(0.0);
        self.time = time;
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    pub fn set_scale(&mut self, dpi: f32, width: f32, height: f32) {
        self.dpi_scale = dpi;
        self.width_scale = width;
        self.height_scale = height;
    }

    pub fn dpi_scale(&self) -> f32 {
        self.dpi_scale
    }

    // === State stack ===

    pub fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    pub fn restore(&mut self) {
        debug_assert!(!self.stack.is_empty(), "restore without matching save");
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    /// Enter a region's draw callback: state is saved, coordinates become
    /// region-local, the clip resets to the region rect, and the region's
    /// retained batches from the previous draw are discarded. Redrawing
    /// marks the region's whole area stale so the new content reaches the
    /// layer even after the frame history has drained.
    pub fn begin_region(&mut self, id: RegionId) {
        self.save();
        let bounds = self.compositor.region(id).bounds();
        self.state.region = Some(id);
        self.state.x = 0.0;
        self.state.y = 0.0;
        self.state.clip = Bounds::new(0, 0, bounds.width, bounds.height);
        self.compositor.clear_batches(id);
        self.compositor.invalidate(id);
    }

    pub fn end_region(&mut self) {
        debug_assert!(
            self.state.region.is_some(),
            "end_region without matching begin_region"
        );
        self.restore();
    }

    // === Draw state ===

    pub fn set_color(&mut self, brush: impl Into<QuadColors>) {
        self.state.brush = brush.into();
    }

    pub fn set_blend_mode(&mut self, blend: BlendMode) {
        self.state.blend = blend;
    }

    /// Offset applied to subsequent draw calls, region-local.
    pub fn set_position(&mut self, x: f32, y: f32) {
        self.state.x = x;
        self.state.y = y;
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.state.x += dx;
        self.state.y += dy;
    }

    pub fn set_clip(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.state.clip = Bounds::new(x, y, width, height);
    }

    pub fn intersect_clip(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.state.clip = self.state.clip.intersection(Bounds::new(x, y, width, height));
    }

    pub fn clip(&self) -> Bounds {
        self.state.clip
    }

    /// Redirect themed color lookups; opaque to the renderer, carried on the
    /// state stack like everything else.
    pub fn set_palette_override(&mut self, palette: u32) {
        self.state.palette = palette;
    }

    pub fn palette_override(&self) -> u32 {
        self.state.palette
    }

    // === Shapes ===

    pub fn fill(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.push(ShapeKind::Fill, x, y, width, height);
    }

    pub fn rounded_rectangle(&mut self, x: f32, y: f32, width: f32, height: f32, rounding: f32) {
        self.push(
            ShapeKind::Rect {
                rounding,
                thickness: 0.0,
            },
            x,
            y,
            width,
            height,
        );
    }

    pub fn rectangle_border(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rounding: f32,
        thickness: f32,
    ) {
        self.push(
            ShapeKind::Rect {
                rounding,
                thickness,
            },
            x,
            y,
            width,
            height,
        );
    }

    pub fn circle(&mut self, x: f32, y: f32, diameter: f32) {
        self.push(ShapeKind::Circle { thickness: 0.0 }, x, y, diameter, diameter);
    }

    pub fn ring(&mut self, x: f32, y: f32, diameter: f32, thickness: f32) {
        self.push(ShapeKind::Circle { thickness }, x, y, diameter, diameter);
    }

    pub fn arc(
        &mut self,
        x: f32,
        y: f32,
        diameter: f32,
        start: f32,
        sweep: f32,
        thickness: f32,
    ) {
        self.push(
            ShapeKind::Arc {
                start,
                sweep,
                thickness,
            },
            x,
            y,
            diameter,
            diameter,
        );
    }

    /// One glyph quad at the pen position; returns the advance.
    pub fn glyph(&mut self, font: &Arc<dyn PackedFont>, glyph_id: u32, x: f32, y: f32) -> f32 {
        let Some(quad) = font.glyph(glyph_id) else {
            debug_assert!(false, "glyph {glyph_id} missing from packed font");
            return 0.0;
        };
        self.push(
            ShapeKind::Text {
                font: font.atlas_texture(),
                uv: quad.uv,
            },
            x + quad.x,
            y + quad.y,
            quad.width,
            quad.height,
        );
        quad.advance
    }

    pub fn image(&mut self, texture: u64, uv: [f32; 4], x: f32, y: f32, width: f32, height: f32) {
        self.push(ShapeKind::Image { texture, uv }, x, y, width, height);
    }

    pub fn shader_quad(&mut self, program: u64, x: f32, y: f32, width: f32, height: f32) {
        self.push(ShapeKind::Shader { program }, x, y, width, height);
    }

    fn push(&mut self, kind: ShapeKind, x: f32, y: f32, width: f32, height: f32) {
        let Some(region) = self.state.region else {
            debug_assert!(false, "draw call outside begin_region/end_region");
            return;
        };
        let shape = Shape {
            kind,
            clip: self.state.clip,
            blend: self.state.blend,
            colors: self.state.brush,
            x: self.state.x + x,
            y: self.state.y + y,
            width,
            height,
        };
        self.compositor.push_shape(region, shape);
    }
}

impl Drop for Canvas<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.stack.is_empty(),
                "canvas state stack unbalanced at end of frame"
            );
        }
    }
}
