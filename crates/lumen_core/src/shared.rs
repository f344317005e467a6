//! Cross-thread scalar values
//!
//! The render thread owns all region and layer state; the only values other
//! threads touch are live-updating scalars (a meter level, a playhead). Those
//! need eventual visibility, not ordering against anything else, so relaxed
//! atomics are enough.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// An `f32` writable from any thread and readable on the render thread.
#[derive(Debug, Default)]
pub struct SharedF32(AtomicU32);

impl SharedF32 {
    pub const fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// A leveled redraw request: setting it twice before a frame is the same as
/// setting it once.
#[derive(Debug, Default)]
pub struct RedrawFlag(AtomicBool);

impl RedrawFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Consume the request, returning whether one was pending.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_f32_round_trips() {
        let value = SharedF32::new(0.25);
        assert_eq!(value.get(), 0.25);
        value.set(-3.5);
        assert_eq!(value.get(), -3.5);
    }

    #[test]
    fn redraw_requests_are_leveled() {
        let flag = RedrawFlag::new();
        assert!(!flag.take());
        flag.request();
        flag.request();
        assert!(flag.take());
        assert!(!flag.take());
    }
}
