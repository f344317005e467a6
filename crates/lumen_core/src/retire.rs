//! Deferred resource destruction
//!
//! GPU drivers may still hold queued work against a buffer or render target
//! after the CPU side is done with it. Instead of freeing immediately,
//! resources are pushed into a [`RetireQueue`] stamped with the frame they
//! were retired on, and handed back for destruction only once two full frame
//! boundaries have passed.

/// Frames a retired resource is held before it is released.
pub const RETIRE_DELAY_FRAMES: u64 = 2;

/// A generation-counter deferred-free queue.
#[derive(Debug)]
pub struct RetireQueue<T> {
    pending: Vec<(u64, T)>,
    delay: u64,
}

impl<T> Default for RetireQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RetireQueue<T> {
    pub fn new() -> Self {
        Self::with_delay(RETIRE_DELAY_FRAMES)
    }

    pub fn with_delay(delay: u64) -> Self {
        Self {
            pending: Vec::new(),
            delay,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue `item` for destruction, stamped with the current frame.
    pub fn retire(&mut self, frame: u64, item: T) {
        self.pending.push((frame, item));
    }

    /// Remove and return every item whose delay has elapsed by `frame`.
    /// Dropping the returned values performs the actual free.
    pub fn drain_expired(&mut self, frame: u64) -> Vec<T> {
        let delay = self.delay;
        let pending = std::mem::take(&mut self.pending);
        let mut expired = Vec::new();
        for (retired, item) in pending {
            if frame >= retired.saturating_add(delay) {
                expired.push(item);
            } else {
                self.pending.push((retired, item));
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_items_for_two_frames() {
        let mut queue = RetireQueue::new();
        queue.retire(10, "framebuffer");
        assert!(queue.drain_expired(10).is_empty());
        assert!(queue.drain_expired(11).is_empty());
        assert_eq!(queue.drain_expired(12), vec!["framebuffer"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drains_only_elapsed_generations() {
        let mut queue = RetireQueue::new();
        queue.retire(1, 'a');
        queue.retire(2, 'b');
        queue.retire(3, 'c');
        assert_eq!(queue.drain_expired(4), vec!['a', 'b']);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_expired(5), vec!['c']);
    }

    #[test]
    fn custom_delay() {
        let mut queue = RetireQueue::with_delay(0);
        queue.retire(7, 1u32);
        assert_eq!(queue.drain_expired(7), vec![1]);
    }
}
