//! Layers and frame submission
//!
//! A layer is an addressable render target: the window itself at index 0,
//! and one offscreen target per level of region isolation below it. Each
//! layer tracks its own dirty rectangles (with a two-frame history ring for
//! double/triple buffered backends) and packs isolated regions' slots into a
//! shared atlas texture.
//!
//! Frame submission walks layers deepest-first so offscreen content exists
//! before anything samples it, then drains each layer's region tree through
//! a worklist that batches same-pipeline draws across regions while keeping
//! overlapping siblings in back-to-front declaration order.

use smallvec::SmallVec;
use tracing::trace;

use crate::backend::{BatchDraw, LayerInfo, SubmitSink};
use crate::effects::SampleSource;
use crate::region::{Compositor, RegionId};
use crate::shape::{BatchKey, BlendMode};
use lumen_core::{Atlas, AtlasId, Bounds, DirtyRegion, Packed};

/// Initial square size for offscreen layer atlases; they grow on demand.
const OFFSCREEN_ATLAS_SIZE: i32 = 512;

/// An addressable render target composing one or more regions.
#[derive(Debug)]
pub struct Layer {
    index: u16,
    width: i32,
    height: i32,
    hdr: bool,
    /// Regions rendered into this layer: top-level regions for the window
    /// layer, isolated regions (slot owners) for offscreen layers.
    regions: Vec<RegionId>,
    /// Slot packing for offscreen layers; the window layer has none.
    atlas: Option<Atlas>,
    current: DirtyRegion,
    /// The previous two frames' dirty sets. A backend flipping between two
    /// or three buffers may still show content those frames drew over.
    history: [DirtyRegion; 2],
}

impl Layer {
    pub(crate) fn window(width: i32, height: i32) -> Self {
        let mut layer = Self {
            index: 0,
            width,
            height,
            hdr: false,
            regions: Vec::new(),
            atlas: None,
            current: DirtyRegion::new(),
            history: [DirtyRegion::new(), DirtyRegion::new()],
        };
        layer.invalidate_all();
        layer
    }

    pub(crate) fn offscreen(index: u16) -> Self {
        let atlas = Atlas::new(OFFSCREEN_ATLAS_SIZE, OFFSCREEN_ATLAS_SIZE).with_padding(1);
        let mut layer = Self {
            index,
            width: atlas.width(),
            height: atlas.height(),
            hdr: false,
            regions: Vec::new(),
            atlas: Some(atlas),
            current: DirtyRegion::new(),
            history: [DirtyRegion::new(), DirtyRegion::new()],
        };
        layer.invalidate_all();
        layer
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_offscreen(&self) -> bool {
        self.atlas.is_some()
    }

    pub fn hdr(&self) -> bool {
        self.hdr
    }

    /// Switch the layer to floating-point color. The backing texture
    /// changes format, so everything is stale.
    pub fn set_hdr(&mut self, hdr: bool) {
        if self.hdr != hdr {
            self.hdr = hdr;
            self.invalidate_all();
        }
    }

    /// This frame's pending dirty rectangles (non-overlapping).
    pub fn dirty_rects(&self) -> &[Bounds] {
        self.current.rects()
    }

    pub fn invalidate(&mut self, rect: Bounds) {
        let clamped = rect.intersection(Bounds::new(0, 0, self.width, self.height));
        self.current.invalidate(clamped);
    }

    pub fn invalidate_all(&mut self) {
        self.current.clear();
        self.current
            .invalidate(Bounds::new(0, 0, self.width, self.height));
    }

    /// Resize the target. The old backing must be recreated by the backend;
    /// in-flight GPU frames may still reference it, so destruction is
    /// deferred through the backend's retire queue.
    pub fn set_dimensions(&mut self, width: i32, height: i32) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        self.history = [DirtyRegion::new(), DirtyRegion::new()];
        self.invalidate_all();
    }

    pub(crate) fn add_region(&mut self, id: RegionId) {
        self.regions.push(id);
    }

    pub(crate) fn remove_region(&mut self, id: RegionId) {
        self.regions.retain(|&r| r != id);
    }

    pub(crate) fn region_list(&self) -> Vec<RegionId> {
        self.regions.clone()
    }

    pub(crate) fn atlas_add(&mut self, width: i32, height: i32) -> Packed {
        debug_assert!(self.atlas.is_some(), "window layer has no atlas");
        let Some(atlas) = self.atlas.as_mut() else {
            return Packed::default();
        };
        let packed = atlas.add(width, height);
        if packed.repacked {
            self.width = atlas.width();
            self.height = atlas.height();
            self.history = [DirtyRegion::new(), DirtyRegion::new()];
            self.invalidate_all();
        }
        packed
    }

    pub(crate) fn atlas_remove(&mut self, id: AtlasId) {
        if let Some(atlas) = self.atlas.as_mut() {
            atlas.remove(id);
        }
    }

    pub fn atlas_rect(&self, id: AtlasId) -> Option<Bounds> {
        self.atlas.as_ref()?.rect(id)
    }

    /// Dirty set this frame must cover: the fresh rects merged with the two
    /// prior frames', rotating the ring.
    fn take_frame_dirty(&mut self) -> DirtyRegion {
        let fresh = std::mem::take(&mut self.current);
        let mut merged = fresh.clone();
        merged.merge_from(&self.history[0]);
        merged.merge_from(&self.history[1]);
        self.history[1] = std::mem::replace(&mut self.history[0], fresh);
        merged
    }
}

/// Submission order over (key, blend) pairs.
///
/// Primary order is the key comparator, but a candidate matching the
/// pipeline state already bound wins outright, and otherwise candidates
/// whose key orders strictly after the current key are preferred; a blend
/// change on the current key does not count as "after". This groups
/// same-state submissions to minimize pipeline switches. The exact
/// tie-break is legacy behavior that overlapping-shape draw order depends
/// on; keep it.
pub(crate) fn precedes(
    a: (BatchKey, BlendMode),
    b: (BatchKey, BlendMode),
    current: Option<(BatchKey, BlendMode)>,
) -> bool {
    if a == b {
        return false;
    }
    if let Some(current) = current {
        if a == current {
            return true;
        }
        if b == current {
            return false;
        }
        let a_after = a.0 > current.0;
        let b_after = b.0 > current.0;
        if a_after != b_after {
            return a_after;
        }
    }
    a < b
}

/// A region pending submission: the subset of dirty rectangles that touch
/// it, its absolute placement in the layer, and a cursor over its batches.
#[derive(Debug)]
struct RegionPosition {
    region: RegionId,
    /// Absolute pixel offset of the region's origin within the layer.
    offset: (i32, i32),
    /// Absolute cover of the region in the layer, for overlap tests.
    bounds: Bounds,
    /// Dirty rectangles clipped to this region, absolute.
    dirty: SmallVec<[Bounds; 8]>,
    cursor: usize,
}

impl Compositor {
    /// Submit one frame: every layer with dirty rectangles, deepest first,
    /// plus post-effect preprocess passes. Returns the total pass count.
    pub fn submit_frame(&mut self, sink: &mut dyn SubmitSink) -> u32 {
        self.frame += 1;
        let mut pass = 0u32;
        for layer_index in (0..self.layers.len()).rev() {
            let before = pass;
            pass = self.submit_layer(layer_index, sink, pass);
            // Preprocessed effect textures persist; rebuild them only when
            // the source content actually redrew.
            if pass != before {
                pass = self.preprocess_layer_effects(layer_index, sink, pass);
            }
        }
        sink.end_frame(self.frame, pass);
        pass
    }

    /// Preprocess passes for post effects whose source content lives in
    /// `layer_index`. They follow the layer's content pass and precede the
    /// shallower layer that composites their output.
    fn preprocess_layer_effects(
        &mut self,
        layer_index: usize,
        sink: &mut dyn SubmitSink,
        mut pass: u32,
    ) -> u32 {
        for id in self.layers[layer_index].region_list() {
            let region = &self.regions[id];
            let Some(effect) = region.post_effect() else {
                continue;
            };
            let Some(slot) = region.slot() else {
                continue;
            };
            let Some(rect) = self.layers[layer_index].atlas_rect(slot) else {
                continue;
            };
            let source = SampleSource {
                layer: layer_index as u16,
                rect,
                hdr: self.layers[layer_index].hdr(),
            };
            let effect = effect.clone();
            let consumed = sink.preprocess_effect(pass, &effect, &source);
            debug_assert_eq!(
                consumed,
                effect.preprocess_pass_count(),
                "backend consumed an unexpected number of preprocess passes"
            );
            pass += consumed;
        }
        pass
    }

    fn submit_layer(&mut self, layer_index: usize, sink: &mut dyn SubmitSink, pass: u32) -> u32 {
        let dirty = self.layers[layer_index].take_frame_dirty();
        if dirty.is_empty() {
            // Nothing stale: no GPU work, same pass counter.
            return pass;
        }
        let layer = &self.layers[layer_index];
        let info = LayerInfo {
            index: layer.index(),
            width: layer.width(),
            height: layer.height(),
            hdr: layer.hdr(),
            offscreen: layer.is_offscreen(),
        };
        sink.begin_layer(pass, &info, dirty.rects());

        let mut worklist: Vec<RegionPosition> = Vec::new();
        let mut deferred: Vec<RegionPosition> = Vec::new();
        for id in self.layers[layer_index].region_list() {
            let region = &self.regions[id];
            if !region.visible() {
                continue;
            }
            let (offset, as_content) = if let Some(slot) = region.slot() {
                // Offscreen layer: the region's own content renders at its
                // packed slot, never its sampling quad.
                match self.layers[layer_index].atlas_rect(slot) {
                    Some(rect) => ((rect.x, rect.y), true),
                    None => continue,
                }
            } else {
                ((region.bounds().x, region.bounds().y), false)
            };
            self.queue_position(id, offset, as_content, &dirty, &mut worklist, &mut deferred);
        }

        let mut current: Option<(BatchKey, BlendMode)> = None;
        let mut submitted = 0usize;
        loop {
            self.settle_positions(&mut worklist, &mut deferred);
            if worklist.is_empty() {
                break;
            }
            let mut best: Option<(BatchKey, BlendMode)> = None;
            for position in &worklist {
                if let Some(head) = self.position_head(position) {
                    best = match best {
                        None => Some(head),
                        Some(other) if precedes(head, other, current) => Some(head),
                        Some(other) => Some(other),
                    };
                }
            }
            let Some(pair) = best else {
                break;
            };
            // Cross-region batching: every position sitting on the same
            // (key, blend) joins this submission.
            let mut draws: Vec<BatchDraw> = Vec::new();
            for position in worklist.iter_mut() {
                let head = {
                    let batches = self.regions[position.region].batcher.batches();
                    batches
                        .get(position.cursor)
                        .map(|b| (b.key(), b.blend()))
                };
                if head != Some(pair) {
                    continue;
                }
                let batch = &self.regions[position.region].batcher.batches()[position.cursor];
                position.cursor += 1;
                let instances =
                    batch.instances(position.offset.0 as f32, position.offset.1 as f32);
                if !instances.is_empty() {
                    draws.push(BatchDraw {
                        instances,
                        scissors: position.dirty.clone(),
                    });
                }
            }
            if !draws.is_empty() {
                sink.submit_batch(pass, pair.0, pair.1, &draws);
                submitted += 1;
            }
            current = Some(pair);
        }
        trace!(
            layer = layer_index,
            pass,
            batches = submitted,
            dirty_rects = dirty.rects().len(),
            "layer submitted"
        );
        pass + 1
    }

    /// Queue a region into the worklist, deferring it while it overlaps
    /// anything already placed. Isolated regions contribute their sampling
    /// quad here unless `as_content` says this layer holds their content.
    fn queue_position(
        &self,
        id: RegionId,
        offset: (i32, i32),
        as_content: bool,
        layer_dirty: &DirtyRegion,
        worklist: &mut Vec<RegionPosition>,
        deferred: &mut Vec<RegionPosition>,
    ) {
        let region = &self.regions[id];
        let size = region.bounds();
        let bounds = Bounds::new(offset.0, offset.1, size.width, size.height);
        let dirty = layer_dirty.clipped_to(bounds);
        if dirty.is_empty() {
            // Zero dirty intersection: skipped entirely.
            return;
        }
        let target = if as_content {
            id
        } else {
            region.intermediate().unwrap_or(id)
        };
        let position = RegionPosition {
            region: target,
            offset,
            bounds,
            dirty,
            cursor: 0,
        };
        let overlapping = worklist
            .iter()
            .chain(deferred.iter())
            .any(|p| p.bounds.overlaps(position.bounds));
        if overlapping {
            deferred.push(position);
        } else {
            worklist.push(position);
        }
    }

    /// Expand exhausted positions into their children and release deferred
    /// positions that no longer overlap the worklist, until stable.
    fn settle_positions(
        &self,
        worklist: &mut Vec<RegionPosition>,
        deferred: &mut Vec<RegionPosition>,
    ) {
        let mut progressed = true;
        while progressed {
            progressed = false;
            let mut i = 0;
            while i < worklist.len() {
                if self.position_head(&worklist[i]).is_none() {
                    let position = worklist.remove(i);
                    self.add_sub_regions(&position, worklist, deferred);
                    progressed = true;
                } else {
                    i += 1;
                }
            }
            let mut j = 0;
            while j < deferred.len() {
                let blocked = worklist
                    .iter()
                    .map(|p| p.bounds)
                    .chain(deferred[..j].iter().map(|p| p.bounds))
                    .any(|b| b.overlaps(deferred[j].bounds));
                if blocked {
                    j += 1;
                } else {
                    let position = deferred.remove(j);
                    worklist.push(position);
                    progressed = true;
                }
            }
        }
    }

    /// Queue the children of a drained position. Visible children that
    /// overlap an already-placed position wait in `deferred` so overlapping
    /// siblings keep their back-to-front declaration order; disjoint ones
    /// interleave freely.
    fn add_sub_regions(
        &self,
        position: &RegionPosition,
        worklist: &mut Vec<RegionPosition>,
        deferred: &mut Vec<RegionPosition>,
    ) {
        let mut parent_dirty = DirtyRegion::new();
        for &rect in &position.dirty {
            parent_dirty.invalidate(rect);
        }
        for &child in self.regions[position.region].children() {
            let region = &self.regions[child];
            if !region.visible() {
                continue;
            }
            let bounds = region.bounds();
            let offset = (position.offset.0 + bounds.x, position.offset.1 + bounds.y);
            self.queue_position(child, offset, false, &parent_dirty, worklist, deferred);
        }
    }

    fn position_head(&self, position: &RegionPosition) -> Option<(BatchKey, BlendMode)> {
        self.regions[position.region]
            .batcher
            .batches()
            .get(position.cursor)
            .map(|b| (b.key(), b.blend()))
    }
}
