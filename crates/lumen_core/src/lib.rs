//! Lumen core primitives
//!
//! Leaf crate shared by the compositing core and its backends: integer
//! geometry, ARGB color, dirty-rectangle accumulation, atlas packing, and the
//! deferred-free queue for GPU resources.

pub mod atlas;
pub mod color;
pub mod dirty;
pub mod geometry;
pub mod retire;
pub mod shared;

pub use atlas::{Atlas, AtlasId, Packed};
pub use color::{Color, HDR_COLOR_RANGE};
pub use dirty::DirtyRegion;
pub use geometry::{Bounds, Point};
pub use retire::{RetireQueue, RETIRE_DELAY_FRAMES};
pub use shared::{RedrawFlag, SharedF32};
