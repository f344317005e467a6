//! Geometric primitives

/// A 2D point in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// An integer rectangle
///
/// Dirty-rect tracking and atlas packing work in whole pixels, so bounds are
/// integral. Width and height are clamped to zero on subtraction, never
/// negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub const ZERO: Bounds = Bounds {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub const fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub const fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Translate by a delta, keeping the size
    pub const fn offset(&self, dx: i32, dy: i32) -> Self {
        Bounds::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// True when `other` lies entirely inside this rectangle
    pub fn contains(&self, other: Bounds) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True when the two rectangles share any positive area
    pub fn overlaps(&self, other: Bounds) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn intersection(&self, other: Bounds) -> Bounds {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Bounds::new(x, y, (right - x).max(0), (bottom - y).max(0))
    }

    pub fn union(&self, other: Bounds) -> Bounds {
        if !self.has_area() {
            return other;
        }
        if !other.has_area() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Bounds::new(x, y, right - x, bottom - y)
    }

    /// Remove `other` from this rectangle when the remainder is itself a
    /// rectangle.
    ///
    /// Returns `None` when the cut would leave more than one piece (an L or a
    /// split), which callers treat as "keep the whole rect dirty". Subtracting
    /// a covering rectangle yields a zero-area result.
    pub fn subtract(&self, other: Bounds) -> Option<Bounds> {
        let cut = self.intersection(other);
        if !cut.has_area() {
            return Some(*self);
        }
        if cut == *self {
            return Some(Bounds::new(self.x, self.y, 0, 0));
        }
        let full_width = cut.x == self.x && cut.right() == self.right();
        let full_height = cut.y == self.y && cut.bottom() == self.bottom();
        if full_width {
            if cut.y == self.y {
                return Some(Bounds::new(
                    self.x,
                    cut.bottom(),
                    self.width,
                    self.bottom() - cut.bottom(),
                ));
            }
            if cut.bottom() == self.bottom() {
                return Some(Bounds::new(self.x, self.y, self.width, cut.y - self.y));
            }
            return None;
        }
        if full_height {
            if cut.x == self.x {
                return Some(Bounds::new(
                    cut.right(),
                    self.y,
                    self.right() - cut.right(),
                    self.height,
                ));
            }
            if cut.right() == self.right() {
                return Some(Bounds::new(self.x, self.y, cut.x - self.x, self.height));
            }
            return None;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_clips_to_overlap() {
        let a = Bounds::new(-1, -2, 10, 10);
        let b = Bounds::new(7, 5, 15, 15);
        assert_eq!(a.intersection(b), Bounds::new(7, 5, 2, 3));
    }

    #[test]
    fn intersection_of_disjoint_has_no_area() {
        let a = Bounds::new(0, 0, 5, 5);
        let b = Bounds::new(10, 10, 5, 5);
        assert!(!a.intersection(b).has_area());
    }

    #[test]
    fn subtract_self_is_zero_area() {
        let a = Bounds::new(3, 4, 10, 10);
        let result = a.subtract(a).unwrap();
        assert!(!result.has_area());
    }

    #[test]
    fn subtract_covering_rect_is_zero_area() {
        let a = Bounds::new(3, 4, 10, 10);
        let cover = Bounds::new(0, 0, 100, 100);
        assert!(!a.subtract(cover).unwrap().has_area());
    }

    #[test]
    fn subtract_edge_strip_leaves_one_rect() {
        let a = Bounds::new(0, 0, 10, 10);
        let top = Bounds::new(0, 0, 10, 4);
        assert_eq!(a.subtract(top), Some(Bounds::new(0, 4, 10, 6)));
        let left = Bounds::new(-5, 0, 8, 10);
        assert_eq!(a.subtract(left), Some(Bounds::new(3, 0, 7, 10)));
    }

    #[test]
    fn subtract_two_edge_crossing_is_ambiguous() {
        let a = Bounds::new(0, 0, 10, 10);
        // Corner overlap leaves an L shape.
        assert_eq!(a.subtract(Bounds::new(5, 5, 10, 10)), None);
        // Middle horizontal band splits into two rects.
        assert_eq!(a.subtract(Bounds::new(0, 3, 10, 3)), None);
    }

    #[test]
    fn subtract_disjoint_is_identity() {
        let a = Bounds::new(0, 0, 10, 10);
        assert_eq!(a.subtract(Bounds::new(20, 20, 5, 5)), Some(a));
    }

    #[test]
    fn union_covers_both() {
        let a = Bounds::new(0, 0, 4, 4);
        let b = Bounds::new(6, 6, 2, 2);
        let u = a.union(b);
        assert!(u.contains(a) && u.contains(b));
        assert_eq!(u, Bounds::new(0, 0, 8, 8));
    }
}
