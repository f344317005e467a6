//! Lumen compositing core
//!
//! Retained-mode scene graph and dirty-rect compositor. Widgets draw typed
//! shapes through a [`Canvas`] into a tree of [`Region`]s; each frame the
//! [`Compositor`] turns the stale parts of every layer into an ordered
//! sequence of batched draw passes for a [`SubmitSink`] backend.
//!
//! # Features
//!
//! - Region tree with per-region shape batchers and stable ids
//! - Dirty-rectangle invalidation with multi-buffer frame history
//! - Draw-order-preserving shape batching (one pipeline per batch)
//! - Isolated offscreen composition with slot packing per layer
//! - Blur/bloom and custom-shader post effects
//! - Backend-agnostic frame submission as numbered passes

pub mod backend;
pub mod batcher;
pub mod canvas;
pub mod effects;
pub mod image;
pub mod layer;
pub mod provider;
pub mod region;
pub mod shape;

pub use backend::{BatchDraw, LayerInfo, NullSink, SubmitSink};
pub use batcher::{Batch, ShapeBatcher};
pub use canvas::Canvas;
pub use effects::{BlurBloomPostEffect, PostEffect, SampleSource, ShaderPostEffect, StageBlend};
pub use image::{ImageAtlas, ImageHandle};
pub use layer::Layer;
pub use provider::{GlyphProvider, GlyphQuad, ImageRasterizer, PackedFont, RasterImage};
pub use region::{Compositor, Region, RegionId};
pub use shape::{BatchKey, BlendMode, QuadColors, SampleMode, Shape, ShapeInstance, ShapeKind};
