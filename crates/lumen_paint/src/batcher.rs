//! Shape batching
//!
//! Groups shapes that share a GPU pipeline into ordered batches while
//! preserving draw order wherever two shapes' pixel covers overlap. Shapes
//! that do not overlap may be reordered past each other freely, which is what
//! lets one batch absorb same-typed shapes issued far apart.

use rustc_hash::FxHashMap;

use crate::shape::{BatchKey, BlendMode, Shape, ShapeInstance};
use lumen_core::Bounds;

/// One GPU draw call's worth of same-pipeline, same-blend shapes.
#[derive(Debug)]
pub struct Batch {
    key: BatchKey,
    blend: BlendMode,
    shapes: Vec<Shape>,
    // Pixel cover per shape, parallel to `shapes`; zero-area entries come
    // from fully clipped shapes and never participate in overlap tests.
    covers: Vec<Bounds>,
}

impl Batch {
    fn new(key: BatchKey, blend: BlendMode) -> Self {
        Self {
            key,
            blend,
            shapes: Vec::new(),
            covers: Vec::new(),
        }
    }

    pub fn key(&self) -> BatchKey {
        self.key
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn push(&mut self, shape: Shape, cover: Bounds) {
        debug_assert_eq!(shape.batch_key(), self.key, "shape added to wrong batch");
        self.shapes.push(shape);
        self.covers.push(cover);
    }

    fn overlaps(&self, cover: Bounds) -> bool {
        if !cover.has_area() {
            return false;
        }
        self.covers.iter().any(|c| c.overlaps(cover))
    }

    /// GPU instances for this batch at a region offset. Fully clipped shapes
    /// keep their batch slot but emit nothing here.
    pub fn instances(&self, offset_x: f32, offset_y: f32) -> Vec<ShapeInstance> {
        self.shapes
            .iter()
            .zip(&self.covers)
            .filter(|(_, cover)| cover.has_area())
            .map(|(shape, _)| shape.instance(offset_x, offset_y))
            .collect()
    }
}

/// Accepts shapes in call order and produces ordered draw batches.
///
/// Two insertion modes:
/// - auto (default): scans existing batches newest to oldest and reuses a
///   same-key batch when no overlapping batch sits in between, otherwise
///   opens a new batch right after the most recent overlapping one;
/// - manual: used when replaying an already-ordered submission, appends to
///   the last batch and only opens a new one when the key or blend changes.
#[derive(Debug, Default)]
pub struct ShapeBatcher {
    batches: Vec<Batch>,
    // Recycled batches partitioned by key so a reuse can never hand back a
    // batch built for a different pipeline.
    unused: FxHashMap<BatchKey, Vec<Batch>>,
    manual: bool,
}

impl ShapeBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch between auto and manual batching.
    pub fn set_manual_batching(&mut self, manual: bool) {
        self.manual = manual;
    }

    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(Batch::is_empty)
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn add_shape(&mut self, shape: Shape) {
        let key = shape.batch_key();
        let blend = shape.blend;
        let cover = shape.bounds();
        let index = if self.manual {
            self.manual_index(key, blend)
        } else {
            self.auto_index(key, blend, cover)
        };
        self.batches[index].push(shape, cover);
    }

    fn manual_index(&mut self, key: BatchKey, blend: BlendMode) -> usize {
        if let Some(last) = self.batches.last() {
            if last.key == key && last.blend == blend {
                return self.batches.len() - 1;
            }
        }
        self.open_batch(self.batches.len(), key, blend)
    }

    fn auto_index(&mut self, key: BatchKey, blend: BlendMode, cover: Bounds) -> usize {
        for i in (0..self.batches.len()).rev() {
            let batch = &self.batches[i];
            if batch.key == key && batch.blend == blend {
                return i;
            }
            if batch.overlaps(cover) {
                // Reordering past this batch would change what ends up on
                // screen; open a new batch right after it.
                return self.open_batch(i + 1, key, blend);
            }
        }
        // Nothing overlaps and no batch matches: the new batch may order
        // before everything, where later same-key shapes can still reach it.
        self.open_batch(0, key, blend)
    }

    fn open_batch(&mut self, index: usize, key: BatchKey, blend: BlendMode) -> usize {
        let batch = match self.unused.get_mut(&key).and_then(Vec::pop) {
            Some(mut recycled) => {
                debug_assert_eq!(recycled.key, key, "recycle pool is key-partitioned");
                recycled.blend = blend;
                recycled
            }
            None => Batch::new(key, blend),
        };
        self.batches.insert(index, batch);
        index
    }

    /// Drop this frame's shapes, recycling batch allocations per key.
    pub fn clear(&mut self) {
        for mut batch in self.batches.drain(..) {
            batch.shapes.clear();
            batch.covers.clear();
            self.unused.entry(batch.key).or_default().push(batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{QuadColors, ShapeKind};
    use lumen_core::Color;

    fn shape(kind: ShapeKind, x: f32, y: f32, w: f32, h: f32) -> Shape {
        Shape {
            kind,
            clip: Bounds::new(-1000, -1000, 2000, 2000),
            blend: BlendMode::Alpha,
            colors: QuadColors::solid(Color::from_argb(0xffffffff)),
            x,
            y,
            width: w,
            height: h,
        }
    }

    fn fill(x: f32, y: f32, w: f32, h: f32) -> Shape {
        shape(ShapeKind::Fill, x, y, w, h)
    }

    fn circle(x: f32, y: f32, d: f32) -> Shape {
        shape(ShapeKind::Circle { thickness: 0.0 }, x, y, d, d)
    }

    #[test]
    fn same_key_non_overlapping_shapes_share_a_batch() {
        let mut batcher = ShapeBatcher::new();
        batcher.add_shape(fill(0.0, 0.0, 10.0, 10.0));
        batcher.add_shape(circle(20.0, 0.0, 10.0));
        batcher.add_shape(fill(40.0, 0.0, 10.0, 10.0));
        // The second fill reorders past the non-overlapping circle batch.
        assert_eq!(batcher.batches().len(), 2);
        let fills = batcher
            .batches()
            .iter()
            .find(|b| b.key() == BatchKey::Fill)
            .unwrap();
        assert_eq!(fills.len(), 2);
    }

    #[test]
    fn overlap_forces_a_new_batch_after_the_overlapping_one() {
        let mut batcher = ShapeBatcher::new();
        batcher.add_shape(fill(0.0, 0.0, 10.0, 10.0));
        batcher.add_shape(circle(5.0, 5.0, 10.0));
        batcher.add_shape(fill(8.0, 8.0, 10.0, 10.0));
        // Third shape overlaps the circle, so it cannot rejoin the first
        // fill batch: order must be fill, circle, fill.
        let keys: Vec<BatchKey> = batcher.batches().iter().map(Batch::key).collect();
        assert_eq!(
            keys,
            vec![BatchKey::Fill, BatchKey::Circle, BatchKey::Fill]
        );
    }

    #[test]
    fn overlapping_same_key_batch_is_reused() {
        let mut batcher = ShapeBatcher::new();
        batcher.add_shape(fill(0.0, 0.0, 10.0, 10.0));
        batcher.add_shape(fill(5.0, 5.0, 10.0, 10.0));
        assert_eq!(batcher.batches().len(), 1);
        assert_eq!(batcher.batches()[0].len(), 2);
    }

    #[test]
    fn draw_order_preserved_for_overlapping_shapes() {
        // Property: for overlapping A drawn before B, A's batch index never
        // exceeds B's, across interleavings with other kinds.
        let mut batcher = ShapeBatcher::new();
        batcher.add_shape(fill(0.0, 0.0, 20.0, 20.0)); // A
        batcher.add_shape(circle(100.0, 0.0, 10.0));
        batcher.add_shape(circle(5.0, 5.0, 10.0)); // overlaps A
        batcher.add_shape(fill(6.0, 6.0, 4.0, 4.0)); // B, overlaps the circle
        let batch_of = |x: f32| {
            batcher
                .batches()
                .iter()
                .position(|b| b.shapes().iter().any(|s| s.x == x))
                .unwrap()
        };
        let a_index = batch_of(0.0);
        let circle_index = batch_of(5.0);
        let b_index = batch_of(6.0);
        assert!(a_index < circle_index);
        assert!(circle_index < b_index);
    }

    #[test]
    fn different_blend_modes_never_share_a_batch() {
        let mut batcher = ShapeBatcher::new();
        batcher.add_shape(fill(0.0, 0.0, 10.0, 10.0));
        let mut additive = fill(20.0, 0.0, 10.0, 10.0);
        additive.blend = BlendMode::Add;
        batcher.add_shape(additive);
        assert_eq!(batcher.batches().len(), 2);
    }

    #[test]
    fn manual_mode_appends_and_splits_on_key_change() {
        let mut batcher = ShapeBatcher::new();
        batcher.set_manual_batching(true);
        batcher.add_shape(fill(0.0, 0.0, 10.0, 10.0));
        batcher.add_shape(fill(100.0, 0.0, 10.0, 10.0));
        batcher.add_shape(circle(0.0, 0.0, 10.0));
        batcher.add_shape(fill(200.0, 0.0, 10.0, 10.0));
        let keys: Vec<BatchKey> = batcher.batches().iter().map(Batch::key).collect();
        assert_eq!(
            keys,
            vec![BatchKey::Fill, BatchKey::Circle, BatchKey::Fill]
        );
        assert_eq!(batcher.batches()[0].len(), 2);
    }

    #[test]
    fn fully_clipped_shape_occupies_a_slot_but_emits_nothing() {
        let mut batcher = ShapeBatcher::new();
        let mut clipped = fill(0.0, 0.0, 10.0, 10.0);
        clipped.clip = Bounds::ZERO;
        batcher.add_shape(clipped);
        assert_eq!(batcher.batches().len(), 1);
        assert_eq!(batcher.batches()[0].len(), 1);
        assert!(batcher.batches()[0].instances(0.0, 0.0).is_empty());
    }

    #[test]
    fn clear_recycles_batches_per_key() {
        let mut batcher = ShapeBatcher::new();
        batcher.add_shape(fill(0.0, 0.0, 10.0, 10.0));
        batcher.add_shape(circle(5.0, 5.0, 10.0));
        batcher.clear();
        assert!(batcher.batches().is_empty());
        batcher.add_shape(fill(0.0, 0.0, 10.0, 10.0));
        assert_eq!(batcher.batches().len(), 1);
        assert_eq!(batcher.batches()[0].key(), BatchKey::Fill);
    }
}
