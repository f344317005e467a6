//! Dirty-rectangle accumulation
//!
//! A [`DirtyRegion`] collects the screen areas whose pixels are stale. The
//! list is kept free of overlaps: inserting a rectangle that intersects an
//! existing one breaks the newcomer into the uncovered pieces and inserts
//! those instead. Marking the same area dirty twice is therefore a no-op,
//! which is what lets redraw requests stay leveled rather than queued.

use smallvec::SmallVec;

use crate::geometry::Bounds;

/// A set of non-overlapping rectangles pending redraw.
#[derive(Clone, Debug, Default)]
pub struct DirtyRegion {
    rects: SmallVec<[Bounds; 8]>,
}

impl DirtyRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Bounds] {
        &self.rects
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Mark `rect` dirty, preserving the non-overlap invariant.
    pub fn invalidate(&mut self, rect: Bounds) {
        if !rect.has_area() {
            return;
        }
        let mut i = 0;
        while i < self.rects.len() {
            let existing = self.rects[i];
            if existing.contains(rect) {
                return;
            }
            if rect.contains(existing) {
                self.rects.swap_remove(i);
                continue;
            }
            if existing.overlaps(rect) {
                // Keep only the parts of the newcomer the existing rect does
                // not already cover, then re-insert each piece.
                for piece in split_around(rect, existing) {
                    self.invalidate(piece);
                }
                return;
            }
            i += 1;
        }
        self.rects.push(rect);
    }

    /// Fold another region's rectangles into this one.
    pub fn merge_from(&mut self, other: &DirtyRegion) {
        for &rect in other.rects() {
            self.invalidate(rect);
        }
    }

    /// Total dirty area in pixels.
    pub fn area(&self) -> i64 {
        self.rects.iter().map(Bounds::area).sum()
    }

    /// Sub-rectangles of the dirty set that intersect `bounds`, clipped to it.
    pub fn clipped_to(&self, bounds: Bounds) -> SmallVec<[Bounds; 8]> {
        self.rects
            .iter()
            .map(|r| r.intersection(bounds))
            .filter(Bounds::has_area)
            .collect()
    }
}

/// The up-to-four pieces of `rect` not covered by `hole`.
fn split_around(rect: Bounds, hole: Bounds) -> SmallVec<[Bounds; 4]> {
    let mut pieces = SmallVec::new();
    let cut = rect.intersection(hole);
    if !cut.has_area() {
        pieces.push(rect);
        return pieces;
    }
    if cut.y > rect.y {
        pieces.push(Bounds::new(rect.x, rect.y, rect.width, cut.y - rect.y));
    }
    if cut.bottom() < rect.bottom() {
        pieces.push(Bounds::new(
            rect.x,
            cut.bottom(),
            rect.width,
            rect.bottom() - cut.bottom(),
        ));
    }
    if cut.x > rect.x {
        pieces.push(Bounds::new(rect.x, cut.y, cut.x - rect.x, cut.height));
    }
    if cut.right() < rect.right() {
        pieces.push(Bounds::new(
            cut.right(),
            cut.y,
            rect.right() - cut.right(),
            cut.height,
        ));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_no_overlaps(region: &DirtyRegion) {
        let rects = region.rects();
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.overlaps(*b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn invalidate_is_idempotent() {
        let mut once = DirtyRegion::new();
        once.invalidate(Bounds::new(5, 5, 20, 20));
        let mut twice = once.clone();
        twice.invalidate(Bounds::new(5, 5, 20, 20));
        assert_eq!(once.rects(), twice.rects());
    }

    #[test]
    fn contained_rect_is_absorbed() {
        let mut region = DirtyRegion::new();
        region.invalidate(Bounds::new(0, 0, 100, 100));
        region.invalidate(Bounds::new(10, 10, 5, 5));
        assert_eq!(region.rects().len(), 1);
    }

    #[test]
    fn covering_rect_replaces_contained_ones() {
        let mut region = DirtyRegion::new();
        region.invalidate(Bounds::new(0, 0, 10, 10));
        region.invalidate(Bounds::new(20, 0, 10, 10));
        region.invalidate(Bounds::new(-5, -5, 50, 50));
        assert_eq!(region.rects().len(), 1);
        assert_eq!(region.rects()[0], Bounds::new(-5, -5, 50, 50));
    }

    #[test]
    fn overlapping_inserts_stay_disjoint() {
        let inputs = [
            Bounds::new(0, 0, 10, 10),
            Bounds::new(5, 5, 10, 10),
            Bounds::new(-3, 2, 6, 6),
            Bounds::new(8, -4, 4, 20),
        ];
        let mut region = DirtyRegion::new();
        for &rect in &inputs {
            region.invalidate(rect);
        }
        assert_no_overlaps(&region);
        // The dirty set covers exactly the union of the inputs: every pixel
        // of the enclosing box is dirty iff some input contains it.
        for y in -10..30 {
            for x in -10..30 {
                let cell = Bounds::new(x, y, 1, 1);
                let in_inputs = inputs.iter().any(|r| r.overlaps(cell));
                let in_region = region.rects().iter().any(|r| r.overlaps(cell));
                assert_eq!(in_inputs, in_region, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn random_sequences_keep_invariant() {
        // Deterministic LCG so the sequence is reproducible.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) % 64) as i32
        };
        let mut region = DirtyRegion::new();
        for _ in 0..200 {
            region.invalidate(Bounds::new(next(), next(), next() + 1, next() + 1));
            assert_no_overlaps(&region);
        }
    }

    #[test]
    fn zero_area_is_ignored() {
        let mut region = DirtyRegion::new();
        region.invalidate(Bounds::new(5, 5, 0, 10));
        region.invalidate(Bounds::new(5, 5, 10, 0));
        assert!(region.is_empty());
    }

    #[test]
    fn clipped_to_restricts_rects() {
        let mut region = DirtyRegion::new();
        region.invalidate(Bounds::new(0, 0, 10, 10));
        region.invalidate(Bounds::new(30, 30, 10, 10));
        let clipped = region.clipped_to(Bounds::new(5, 5, 10, 10));
        assert_eq!(clipped.len(), 1);
        assert_eq!(clipped[0], Bounds::new(5, 5, 5, 5));
    }
}
