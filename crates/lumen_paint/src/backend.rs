//! GPU backend seam
//!
//! The compositing core hands frames to a [`SubmitSink`] as a sequence of
//! numbered passes. The contract mirrors what real command encoders need:
//! every batch arrives with its full pipeline identity (key), blend state,
//! instance data, and scissor rectangles before the submit call, so a
//! backend never has to reach back into the scene graph.

use smallvec::SmallVec;

use crate::effects::{PostEffect, SampleSource};
use crate::shape::{BatchKey, BlendMode, ShapeInstance};
use lumen_core::Bounds;

/// Description of the render target a pass draws into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerInfo {
    /// Layer nesting depth; 0 is the window-backed target.
    pub index: u16,
    pub width: i32,
    pub height: i32,
    pub hdr: bool,
    pub offscreen: bool,
}

/// Instances contributed by one region position, drawn once per scissor
/// rect. Scissors are the position's dirty rectangles in layer pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchDraw {
    pub instances: Vec<ShapeInstance>,
    pub scissors: SmallVec<[Bounds; 8]>,
}

/// Consumer of a frame's draw submissions.
pub trait SubmitSink {
    /// A layer's content pass begins. Only called when the layer has dirty
    /// rectangles.
    fn begin_layer(&mut self, pass: u32, layer: &LayerInfo, dirty: &[Bounds]);

    /// Draw one batch: all draws share the pipeline selected by `key` and
    /// the blend state. Draws from different regions arrive together here
    /// when their batches matched — one GPU call covers them all.
    fn submit_batch(
        &mut self,
        pass: u32,
        key: BatchKey,
        blend: BlendMode,
        draws: &[BatchDraw],
    );

    /// Run a post effect's preprocess (downsample/blur chains) over a
    /// rendered slot. Returns the number of passes consumed, which must
    /// equal `effect.preprocess_pass_count()`.
    fn preprocess_effect(
        &mut self,
        first_pass: u32,
        effect: &PostEffect,
        source: &SampleSource,
    ) -> u32 {
        let _ = (first_pass, source);
        effect.preprocess_pass_count()
    }

    /// The frame is fully submitted; `passes` is the total pass count.
    fn end_frame(&mut self, frame: u64, passes: u32) {
        let _ = (frame, passes);
    }
}

/// Discards every submission. Used by tests that only care about the
/// invalidation bookkeeping a frame performs.
#[derive(Debug, Default)]
pub struct NullSink;

impl SubmitSink for NullSink {
    fn begin_layer(&mut self, _pass: u32, _layer: &LayerInfo, _dirty: &[Bounds]) {}

    fn submit_batch(
        &mut self,
        _pass: u32,
        _key: BatchKey,
        _blend: BlendMode,
        _draws: &[BatchDraw],
    ) {
    }
}
