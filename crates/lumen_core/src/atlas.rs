//! Rectangle atlas packing
//!
//! Assigns sub-rectangles of a shared texture to logical images or regions.
//! Placement uses a shelf packer; when an insert no longer fits, the atlas
//! grows (doubling its smaller dimension) and every live entry is repacked.
//! Growth always succeeds eventually, so callers only need to know *whether*
//! a repack happened — existing coordinates are invalid after one.
//!
//! Removal releases the entry id immediately but reclaims its pixels at the
//! next repack boundary, so in-flight frames never see an atlas coordinate
//! change mid-frame.

use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use crate::geometry::Bounds;

new_key_type! {
    /// Stable handle to a packed rectangle.
    pub struct AtlasId;
}

/// Result of [`Atlas::add`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Packed {
    pub id: AtlasId,
    /// True when the insert forced a resize-and-repack; every previously
    /// returned coordinate is stale and the consumer must redraw everything.
    pub repacked: bool,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    width: i32,
    height: i32,
    rect: Bounds,
}

#[derive(Clone, Copy, Debug)]
struct Shelf {
    y: i32,
    height: i32,
    used: i32,
}

/// A growable shelf-packed rectangle atlas.
#[derive(Debug)]
pub struct Atlas {
    width: i32,
    height: i32,
    padding: i32,
    entries: SlotMap<AtlasId, Entry>,
    shelves: Vec<Shelf>,
    next_shelf_y: i32,
}

impl Atlas {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            padding: 0,
            entries: SlotMap::with_key(),
            shelves: Vec::new(),
            next_shelf_y: 0,
        }
    }

    /// Reserve `padding` pixels around every entry (guards against sampler
    /// bleed between neighboring slots).
    pub fn with_padding(mut self, padding: i32) -> Self {
        self.padding = padding.max(0);
        self
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Packed coordinates for a live entry. The rectangle is the requested
    /// size; padding lives outside it.
    pub fn rect(&self, id: AtlasId) -> Option<Bounds> {
        self.entries.get(id).map(|e| e.rect)
    }

    /// Pack a `width` x `height` rectangle, growing the atlas if needed.
    pub fn add(&mut self, width: i32, height: i32) -> Packed {
        let width = width.max(1);
        let height = height.max(1);
        let id = self.entries.insert(Entry {
            width,
            height,
            rect: Bounds::ZERO,
        });
        if let Some(rect) = self.place(width, height) {
            self.entries[id].rect = rect;
            return Packed {
                id,
                repacked: false,
            };
        }
        // An in-place repack reclaims removed entries' pixels; grow only
        // when even that is not enough.
        if self.repack() {
            return Packed { id, repacked: true };
        }
        loop {
            self.grow();
            if self.repack() {
                return Packed { id, repacked: true };
            }
        }
    }

    /// Drop an entry. Its pixels are reclaimed at the next repack.
    pub fn remove(&mut self, id: AtlasId) {
        self.entries.remove(id);
    }

    fn place(&mut self, width: i32, height: i32) -> Option<Bounds> {
        let w = width + self.padding * 2;
        let h = height + self.padding * 2;
        if w > self.width {
            return None;
        }
        // First shelf tall enough with room left; open a new shelf otherwise.
        for shelf in &mut self.shelves {
            if h <= shelf.height && shelf.used + w <= self.width {
                let rect = Bounds::new(shelf.used + self.padding, shelf.y + self.padding, width, height);
                shelf.used += w;
                return Some(rect);
            }
        }
        if self.next_shelf_y + h <= self.height {
            let shelf = Shelf {
                y: self.next_shelf_y,
                height: h,
                used: w,
            };
            self.next_shelf_y += h;
            self.shelves.push(shelf);
            return Some(Bounds::new(self.padding, shelf.y + self.padding, width, height));
        }
        None
    }

    fn grow(&mut self) {
        if self.width <= self.height {
            self.width *= 2;
        } else {
            self.height *= 2;
        }
        debug!(width = self.width, height = self.height, "atlas grown");
    }

    /// Re-place every live entry from scratch, tallest first.
    fn repack(&mut self) -> bool {
        self.shelves.clear();
        self.next_shelf_y = 0;
        let mut ids: Vec<AtlasId> = self.entries.keys().collect();
        ids.sort_by_key(|&id| {
            let e = &self.entries[id];
            (std::cmp::Reverse(e.height), std::cmp::Reverse(e.width))
        });
        for id in ids {
            let (w, h) = {
                let e = &self.entries[id];
                (e.width, e.height)
            };
            match self.place(w, h) {
                Some(rect) => self.entries[id].rect = rect,
                None => return false,
            }
        }
        debug!(entries = self.entries.len(), "atlas repacked");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(atlas: &Atlas) {
        let rects: Vec<Bounds> = atlas.entries.values().map(|e| e.rect).collect();
        let atlas_bounds = Bounds::new(0, 0, atlas.width(), atlas.height());
        for (i, a) in rects.iter().enumerate() {
            assert!(atlas_bounds.contains(*a), "{a:?} outside atlas");
            for b in &rects[i + 1..] {
                assert!(!a.overlaps(*b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn packs_when_area_fits() {
        let mut atlas = Atlas::new(64, 64);
        for _ in 0..16 {
            let packed = atlas.add(16, 16);
            assert!(!packed.repacked);
        }
        assert_valid(&atlas);
        assert_eq!(atlas.width(), 64);
        assert_eq!(atlas.height(), 64);
    }

    #[test]
    fn overflow_triggers_exactly_one_repack() {
        let mut atlas = Atlas::new(64, 64);
        let mut ids = Vec::new();
        for _ in 0..16 {
            ids.push(atlas.add(16, 16).id);
        }
        let overflow = atlas.add(16, 16);
        assert!(overflow.repacked);
        ids.push(overflow.id);
        // One doubling is enough for one extra entry.
        assert_eq!(atlas.width() * atlas.height(), 64 * 128);
        for id in ids {
            assert!(atlas.rect(id).unwrap().has_area());
        }
        assert_valid(&atlas);
    }

    #[test]
    fn mixed_sizes_stay_disjoint() {
        let mut atlas = Atlas::new(32, 32);
        for i in 0..24 {
            atlas.add(3 + (i % 11), 2 + (i % 7));
            assert_valid(&atlas);
        }
    }

    #[test]
    fn removal_reclaims_space_at_repack() {
        let mut atlas = Atlas::new(32, 32);
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(atlas.add(16, 16).id);
        }
        // Full. Freeing one entry leaves room only after the next repack,
        // which the following insert forces.
        atlas.remove(ids[0]);
        assert_eq!(atlas.len(), 3);
        let packed = atlas.add(16, 16);
        assert!(packed.repacked);
        assert!(atlas.rect(packed.id).unwrap().has_area());
        // The freed slot made room; no growth was needed.
        assert_eq!(atlas.width(), 32);
        assert_eq!(atlas.height(), 32);
        assert_valid(&atlas);
    }

    #[test]
    fn padding_separates_entries() {
        let mut atlas = Atlas::new(64, 64).with_padding(1);
        let a = atlas.add(10, 10);
        let b = atlas.add(10, 10);
        let ra = atlas.rect(a.id).unwrap();
        let rb = atlas.rect(b.id).unwrap();
        // At least two padding pixels between slot contents.
        assert!((rb.x - ra.right()).abs() >= 2 || ra.y != rb.y);
    }
}
