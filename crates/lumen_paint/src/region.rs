//! Region tree
//!
//! Regions are rectangular nodes in a scene graph. Each owns a shape batcher
//! and its child regions; children are drawn back-to-front in declaration
//! order wherever they overlap. The tree lives in an arena ([`Compositor`])
//! and is addressed by stable ids, with the parent relation stored as an id
//! rather than a back-pointer.
//!
//! A region that needs isolated composition (it has a post effect, or a
//! caller asked for it) gets an *intermediate* region: a synthetic sibling-
//! level node holding a single layer-sampling quad, while the region's real
//! content renders into a packed slot of a deeper offscreen layer.

use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use crate::batcher::ShapeBatcher;
use crate::effects::PostEffect;
use crate::layer::Layer;
use crate::shape::{BlendMode, QuadColors, SampleMode, Shape, ShapeKind};
use lumen_core::{AtlasId, Bounds, Color};

new_key_type! {
    /// Stable handle to a region in the compositor arena.
    pub struct RegionId;
}

/// A rectangular node of the scene graph.
#[derive(Debug, Default)]
pub struct Region {
    bounds: Bounds,
    visible: bool,
    pub(crate) batcher: ShapeBatcher,
    children: Vec<RegionId>,
    parent: Option<RegionId>,
    post_effect: Option<PostEffect>,
    /// Set when isolation was requested explicitly rather than forced by a
    /// post effect.
    explicit_layer: bool,
    intermediate: Option<RegionId>,
    is_intermediate: bool,
    /// Atlas slot in the content layer, present iff `needs_layer()`.
    slot: Option<AtlasId>,
    layer_index: u16,
}

impl Region {
    fn new() -> Self {
        Self {
            visible: true,
            ..Default::default()
        }
    }

    /// Bounds in parent-local coordinates.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn children(&self) -> &[RegionId] {
        &self.children
    }

    pub fn parent(&self) -> Option<RegionId> {
        self.parent
    }

    pub fn post_effect(&self) -> Option<&PostEffect> {
        self.post_effect.as_ref()
    }

    /// Depth of layer nesting this region renders at.
    pub fn layer_index(&self) -> u16 {
        self.layer_index
    }

    /// True iff the region owns an intermediate region and renders to an
    /// offscreen slot.
    pub fn needs_layer(&self) -> bool {
        self.intermediate.is_some()
    }

    pub(crate) fn intermediate(&self) -> Option<RegionId> {
        self.intermediate
    }

    pub(crate) fn slot(&self) -> Option<AtlasId> {
        self.slot
    }

    fn local(&self) -> Bounds {
        Bounds::new(0, 0, self.bounds.width, self.bounds.height)
    }

    fn wants_layer(&self) -> bool {
        self.explicit_layer || self.post_effect.is_some()
    }
}

/// Arena of regions plus the stack of layers they render into.
///
/// `layers[0]` is the window-backed target; deeper indices are offscreen
/// layers packing the slots of isolated regions whose `layer_index` is one
/// less than the layer's own index.
pub struct Compositor {
    pub(crate) regions: SlotMap<RegionId, Region>,
    pub(crate) layers: Vec<Layer>,
    root: RegionId,
    pub(crate) frame: u64,
}

impl Compositor {
    pub fn new(width: i32, height: i32) -> Self {
        let mut regions: SlotMap<RegionId, Region> = SlotMap::with_key();
        let mut root_region = Region::new();
        root_region.bounds = Bounds::new(0, 0, width, height);
        let root = regions.insert(root_region);
        let mut window = Layer::window(width, height);
        window.add_region(root);
        Self {
            regions,
            layers: vec![window],
            root,
            frame: 0,
        }
    }

    /// The window-sized root region.
    pub fn root(&self) -> RegionId {
        self.root
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id]
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.regions.contains_key(id)
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Resize the window layer. The whole frame becomes dirty; the backend
    /// recreates its target (with deferred destruction of the old one).
    pub fn resize(&mut self, width: i32, height: i32) {
        self.regions[self.root].bounds = Bounds::new(0, 0, width, height);
        self.layers[0].set_dimensions(width, height);
        debug!(width, height, "window layer resized");
    }

    /// Create a detached region; attach it with [`Compositor::add_child`].
    pub fn create_region(&mut self) -> RegionId {
        self.regions.insert(Region::new())
    }

    /// Attach `child` as the top-most (last-drawn) child of `parent`.
    pub fn add_child(&mut self, parent: RegionId, child: RegionId) {
        debug_assert!(self.regions[child].parent.is_none(), "region already attached");
        self.regions[child].parent = Some(parent);
        self.regions[parent].children.push(child);
        let base = {
            let p = &self.regions[parent];
            p.layer_index + p.needs_layer() as u16
        };
        self.propagate_layer_index(child, base);
        self.invalidate(child);
    }

    /// Detach and destroy a region and everything it owns. The area it
    /// covered is invalidated first, while the parent chain still exists.
    pub fn remove_region(&mut self, id: RegionId) {
        debug_assert_ne!(id, self.root, "cannot remove the root region");
        self.invalidate(id);
        if let Some(parent) = self.regions[id].parent {
            self.regions[parent].children.retain(|&c| c != id);
            self.regions[id].parent = None;
        }
        self.remove_subtree(id);
    }

    fn remove_subtree(&mut self, id: RegionId) {
        self.release_isolation(id);
        let children = std::mem::take(&mut self.regions[id].children);
        for child in children {
            self.remove_subtree(child);
        }
        self.regions.remove(id);
    }

    pub fn set_visible(&mut self, id: RegionId, visible: bool) {
        if self.regions[id].visible != visible {
            self.regions[id].visible = visible;
            self.invalidate(id);
        }
    }

    /// Move/resize a region: invalidates the old area, re-anchors the
    /// intermediate slot when the size changed, then invalidates the new
    /// area.
    pub fn set_bounds(&mut self, id: RegionId, bounds: Bounds) {
        let old = self.regions[id].bounds;
        if old == bounds {
            return;
        }
        self.invalidate(id);
        self.regions[id].bounds = bounds;
        if self.regions[id].needs_layer()
            && (old.width != bounds.width || old.height != bounds.height)
        {
            self.reslot(id);
        }
        self.invalidate(id);
    }

    /// Request or release isolated offscreen composition.
    pub fn set_needs_layer(&mut self, id: RegionId, needs: bool) {
        self.regions[id].explicit_layer = needs;
        self.apply_isolation(id);
    }

    /// Attach or remove a post effect. Attachment forces the region onto an
    /// offscreen layer and marks it dirty.
    pub fn set_post_effect(&mut self, id: RegionId, effect: Option<PostEffect>) {
        self.regions[id].post_effect = effect;
        self.apply_isolation(id);
        if self.regions[id].needs_layer() {
            self.refresh_intermediate(id);
        }
        self.invalidate(id);
    }

    fn apply_isolation(&mut self, id: RegionId) {
        let wants = self.regions[id].wants_layer();
        let has = self.regions[id].needs_layer();
        if wants && !has {
            self.acquire_isolation(id);
        } else if !wants && has {
            self.invalidate(id);
            self.release_isolation(id);
            let index = self.regions[id].layer_index;
            self.propagate_layer_index(id, index);
            self.invalidate(id);
        }
    }

    fn acquire_isolation(&mut self, id: RegionId) {
        let (bounds, layer_index) = {
            let r = &self.regions[id];
            (r.bounds, r.layer_index)
        };
        let content_layer = layer_index as usize + 1;
        self.ensure_layer(content_layer);

        let packed = self.layers[content_layer]
            .atlas_add(bounds.width.max(1), bounds.height.max(1));
        self.regions[id].slot = Some(packed.id);
        self.layers[content_layer].add_region(id);

        let mut intermediate = Region::new();
        intermediate.bounds = Bounds::new(0, 0, bounds.width, bounds.height);
        intermediate.is_intermediate = true;
        intermediate.parent = Some(id);
        intermediate.layer_index = layer_index;
        let inter_id = self.regions.insert(intermediate);
        self.regions[id].intermediate = Some(inter_id);

        if packed.repacked {
            self.handle_repack(content_layer);
        } else {
            self.refresh_intermediate(id);
        }
        self.propagate_layer_index(id, layer_index);
        self.invalidate(id);
    }

    fn release_isolation(&mut self, id: RegionId) {
        let Some(inter) = self.regions[id].intermediate.take() else {
            return;
        };
        self.regions.remove(inter);
        let content_layer = self.regions[id].layer_index as usize + 1;
        if let Some(slot) = self.regions[id].slot.take() {
            self.layers[content_layer].atlas_remove(slot);
        }
        self.layers[content_layer].remove_region(id);
    }

    /// Re-pack a resized region's slot and refresh its sampling quad.
    fn reslot(&mut self, id: RegionId) {
        let bounds = self.regions[id].bounds;
        let content_layer = self.regions[id].layer_index as usize + 1;
        if let Some(slot) = self.regions[id].slot.take() {
            self.layers[content_layer].atlas_remove(slot);
        }
        let packed = self.layers[content_layer]
            .atlas_add(bounds.width.max(1), bounds.height.max(1));
        self.regions[id].slot = Some(packed.id);
        if let Some(inter) = self.regions[id].intermediate {
            self.regions[inter].bounds = Bounds::new(0, 0, bounds.width, bounds.height);
        }
        if packed.repacked {
            self.handle_repack(content_layer);
        } else {
            self.refresh_intermediate(id);
        }
    }

    /// A full repack moved every slot: the whole layer is stale exactly once
    /// and every composited region's sampling quad needs new coordinates.
    fn handle_repack(&mut self, layer_index: usize) {
        self.layers[layer_index].invalidate_all();
        for id in self.layers[layer_index].region_list() {
            self.refresh_intermediate(id);
        }
        debug!(layer = layer_index, "layer atlas repacked");
    }

    /// Rebuild the intermediate region's single layer-sampling shape from
    /// the current slot coordinates and post-effect state.
    fn refresh_intermediate(&mut self, id: RegionId) {
        let Some(inter) = self.regions[id].intermediate else {
            return;
        };
        let content_layer = self.regions[id].layer_index as usize + 1;
        let Some(slot) = self.regions[id].slot else {
            return;
        };
        let Some(source) = self.layers[content_layer].atlas_rect(slot) else {
            return;
        };
        let bounds = self.regions[id].bounds;
        let mode = self.regions[id]
            .post_effect
            .as_ref()
            .map_or(SampleMode::Plain, PostEffect::sample_mode);
        let shape = Shape {
            kind: ShapeKind::SampleLayer {
                layer: content_layer as u16,
                source,
                mode,
            },
            clip: Bounds::new(0, 0, bounds.width, bounds.height),
            blend: BlendMode::Alpha,
            colors: QuadColors::solid(Color::WHITE),
            x: 0.0,
            y: 0.0,
            width: bounds.width as f32,
            height: bounds.height as f32,
        };
        let batcher = &mut self.regions[inter].batcher;
        batcher.clear();
        batcher.add_shape(shape);
    }

    fn ensure_layer(&mut self, index: usize) {
        while self.layers.len() <= index {
            let layer = Layer::offscreen(self.layers.len() as u16);
            self.layers.push(layer);
        }
    }

    /// Recompute `layer_index` for a subtree: a child's index is its
    /// parent's plus one iff the parent needs a layer. An isolated region
    /// whose depth changed takes its content slot with it, so nested
    /// offscreen regions keep composing into the right layer.
    fn propagate_layer_index(&mut self, id: RegionId, index: u16) {
        let old = self.regions[id].layer_index;
        self.regions[id].layer_index = index;
        if let Some(inter) = self.regions[id].intermediate {
            // The sampling quad composes in the region's own layer.
            self.regions[inter].layer_index = index;
        }
        if old != index && self.regions[id].needs_layer() {
            self.migrate_slot(id, old as usize + 1);
        }
        let child_index = index + self.regions[id].needs_layer() as u16;
        let children = self.regions[id].children.clone();
        for child in children {
            self.propagate_layer_index(child, child_index);
        }
    }

    /// Move an isolated region's slot and layer registration from the `from`
    /// content layer to the one its updated `layer_index` selects, then
    /// refresh its sampling quad and mark it for redraw.
    fn migrate_slot(&mut self, id: RegionId, from: usize) {
        let to = self.regions[id].layer_index as usize + 1;
        if let Some(slot) = self.regions[id].slot.take() {
            self.layers[from].atlas_remove(slot);
        }
        self.layers[from].remove_region(id);
        self.ensure_layer(to);
        let bounds = self.regions[id].bounds;
        let packed = self.layers[to].atlas_add(bounds.width.max(1), bounds.height.max(1));
        self.regions[id].slot = Some(packed.id);
        self.layers[to].add_region(id);
        if packed.repacked {
            self.handle_repack(to);
        } else {
            self.refresh_intermediate(id);
        }
        self.invalidate(id);
    }

    /// Mark a region's whole area stale.
    pub fn invalidate(&mut self, id: RegionId) {
        let local = self.regions[id].local();
        self.invalidate_rect(id, local);
    }

    /// Mark `rect` (region-local) stale, walking it up the parent chain and
    /// recording it against every enclosing layer it affects.
    pub fn invalidate_rect(&mut self, id: RegionId, rect: Bounds) {
        let mut rect = rect;
        let mut current = id;
        loop {
            let region = &self.regions[current];
            rect = rect.intersection(region.local());
            if !rect.has_area() {
                return;
            }
            if region.needs_layer() {
                // A post effect can smear a local change across the whole
                // surface, so the dirty area becomes the entire region.
                if region
                    .post_effect
                    .as_ref()
                    .is_some_and(PostEffect::affects_whole_region)
                {
                    rect = region.local();
                }
                let content_layer = region.layer_index as usize + 1;
                if let Some(slot) = region.slot {
                    if let Some(slot_rect) = self.layers[content_layer].atlas_rect(slot) {
                        self.layers[content_layer]
                            .invalidate(rect.offset(slot_rect.x, slot_rect.y));
                    }
                }
            }
            let region = &self.regions[current];
            let in_parent = rect.offset(region.bounds.x, region.bounds.y);
            match region.parent {
                Some(parent) => {
                    rect = in_parent;
                    current = parent;
                }
                None => {
                    self.layers[0].invalidate(in_parent);
                    return;
                }
            }
        }
    }

    pub(crate) fn push_shape(&mut self, id: RegionId, shape: Shape) {
        self.regions[id].batcher.add_shape(shape);
    }

    pub(crate) fn clear_batches(&mut self, id: RegionId) {
        self.regions[id].batcher.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::BlurBloomPostEffect;

    fn tree() -> (Compositor, RegionId, RegionId, RegionId) {
        // root (window) -> mid -> leaf, all layered at 0 initially
        let mut comp = Compositor::new(400, 300);
        let mid = comp.create_region();
        comp.add_child(comp.root(), mid);
        comp.set_bounds(mid, Bounds::new(10, 10, 200, 150));
        let leaf = comp.create_region();
        comp.add_child(mid, leaf);
        comp.set_bounds(leaf, Bounds::new(5, 5, 50, 40));
        let root = comp.root();
        (comp, root, mid, leaf)
    }

    #[test]
    fn layer_index_propagates_through_needs_layer() {
        let (mut comp, root, mid, leaf) = tree();
        assert_eq!(comp.region(leaf).layer_index(), 0);

        comp.set_needs_layer(mid, true);
        assert!(comp.region(mid).needs_layer());
        assert_eq!(comp.region(root).layer_index(), 0);
        assert_eq!(comp.region(mid).layer_index(), 0);
        assert_eq!(comp.region(leaf).layer_index(), 1);

        comp.set_needs_layer(mid, false);
        assert!(!comp.region(mid).needs_layer());
        assert_eq!(comp.region(leaf).layer_index(), 0);
    }

    #[test]
    fn nested_isolation_rehomes_inner_slots() {
        let (mut comp, _, mid, leaf) = tree();
        comp.set_needs_layer(leaf, true);
        assert_eq!(comp.region(leaf).layer_index(), 0);
        let slot = comp.region(leaf).slot().unwrap();
        assert!(comp.layer(1).unwrap().atlas_rect(slot).is_some());

        // Isolating the ancestor pushes the leaf one layer deeper; its
        // content slot must follow it into layer 2.
        comp.set_needs_layer(mid, true);
        assert_eq!(comp.region(leaf).layer_index(), 1);
        let slot = comp.region(leaf).slot().unwrap();
        let slot_rect = comp.layer(2).unwrap().atlas_rect(slot).unwrap();

        let mut sink = crate::backend::NullSink::default();
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);

        comp.invalidate_rect(leaf, Bounds::new(0, 0, 5, 5));
        let rects = comp.layer(2).unwrap().dirty_rects().to_vec();
        assert_eq!(rects, vec![Bounds::new(slot_rect.x, slot_rect.y, 5, 5)]);

        // Releasing the ancestor moves the slot back up.
        comp.set_needs_layer(mid, false);
        assert_eq!(comp.region(leaf).layer_index(), 0);
        let slot = comp.region(leaf).slot().unwrap();
        assert!(comp.layer(1).unwrap().atlas_rect(slot).is_some());
    }

    #[test]
    fn needs_layer_iff_intermediate_exists() {
        let (mut comp, _, mid, _) = tree();
        assert!(comp.region(mid).intermediate().is_none());
        comp.set_needs_layer(mid, true);
        assert!(comp.region(mid).intermediate().is_some());
        assert!(comp.region(mid).slot().is_some());
        comp.set_needs_layer(mid, false);
        assert!(comp.region(mid).intermediate().is_none());
        assert!(comp.region(mid).slot().is_none());
    }

    #[test]
    fn post_effect_forces_isolation() {
        let (mut comp, _, mid, _) = tree();
        comp.set_post_effect(
            mid,
            Some(PostEffect::BlurBloom(BlurBloomPostEffect::default())),
        );
        assert!(comp.region(mid).needs_layer());
        comp.set_post_effect(mid, None);
        assert!(!comp.region(mid).needs_layer());
    }

    #[test]
    fn invalidation_reaches_the_window_layer() {
        let (mut comp, _, _, leaf) = tree();
        // Drain anything left by construction.
        let mut sink = crate::backend::NullSink::default();
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);

        comp.invalidate_rect(leaf, Bounds::new(0, 0, 10, 10));
        // leaf(5,5) inside mid(10,10): expect window coords (15,15).
        let rects = comp.layer(0).unwrap().dirty_rects().to_vec();
        assert_eq!(rects, vec![Bounds::new(15, 15, 10, 10)]);
    }

    #[test]
    fn invalidation_clamps_to_region_bounds() {
        let (mut comp, _, _, leaf) = tree();
        let mut sink = crate::backend::NullSink::default();
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);

        comp.invalidate_rect(leaf, Bounds::new(40, 30, 100, 100));
        // leaf is 50x40: the rect clamps to (40..50, 30..40) locally.
        let rects = comp.layer(0).unwrap().dirty_rects().to_vec();
        assert_eq!(rects, vec![Bounds::new(55, 45, 10, 10)]);
    }

    #[test]
    fn post_effect_widens_descendant_invalidation() {
        let (mut comp, _, mid, leaf) = tree();
        comp.set_post_effect(
            mid,
            Some(PostEffect::BlurBloom(BlurBloomPostEffect::default())),
        );
        let mut sink = crate::backend::NullSink::default();
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);

        comp.invalidate_rect(leaf, Bounds::new(0, 0, 1, 1));
        // The blur smears the change: mid's entire area goes stale one
        // level up.
        let rects = comp.layer(0).unwrap().dirty_rects().to_vec();
        assert_eq!(rects, vec![Bounds::new(10, 10, 200, 150)]);
    }

    #[test]
    fn descendant_invalidation_lands_in_the_content_layer_slot() {
        let (mut comp, _, mid, leaf) = tree();
        comp.set_needs_layer(mid, true);
        let mut sink = crate::backend::NullSink::default();
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);

        comp.invalidate_rect(leaf, Bounds::new(0, 0, 10, 10));
        let slot = comp
            .layer(1)
            .unwrap()
            .atlas_rect(comp.region(mid).slot().unwrap())
            .unwrap();
        let rects = comp.layer(1).unwrap().dirty_rects().to_vec();
        assert_eq!(rects, vec![Bounds::new(slot.x + 5, slot.y + 5, 10, 10)]);
    }

    #[test]
    fn remove_region_detaches_and_invalidates() {
        let (mut comp, root, mid, leaf) = tree();
        let mut sink = crate::backend::NullSink::default();
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);

        comp.remove_region(mid);
        assert!(!comp.contains(mid));
        assert!(!comp.contains(leaf));
        assert!(comp.region(root).children().is_empty());
        let rects = comp.layer(0).unwrap().dirty_rects().to_vec();
        assert_eq!(rects, vec![Bounds::new(10, 10, 200, 150)]);
    }

    #[test]
    fn set_bounds_invalidates_old_and_new_areas() {
        let (mut comp, _, mid, _) = tree();
        let mut sink = crate::backend::NullSink::default();
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);
        comp.submit_frame(&mut sink);

        comp.set_bounds(mid, Bounds::new(250, 200, 100, 80));
        let mut dirty = lumen_core::DirtyRegion::new();
        for &r in comp.layer(0).unwrap().dirty_rects() {
            dirty.invalidate(r);
        }
        // Both the vacated and the newly covered areas are stale.
        let old_area = Bounds::new(10, 10, 200, 150);
        let new_area = Bounds::new(250, 200, 100, 80);
        let covered = |b: Bounds| {
            let mut check = dirty.clone();
            let before = check.area();
            check.invalidate(b);
            check.area() == before
        };
        assert!(covered(old_area));
        assert!(covered(new_area));
    }
}
