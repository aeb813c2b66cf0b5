use super::replacer::{FrameId, Replacer};
use std::collections::{HashSet, VecDeque};

/// Least-recently-unpinned eviction order.
#[derive(Debug)]
pub struct LruReplacer {
    /// Evictable frames, least recently unpinned at the front.
    queue: VecDeque<FrameId>,
    /// Membership set for O(1) duplicate checks.
    members: HashSet<FrameId>,
    max_size: usize,
}

impl LruReplacer {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_size),
            members: HashSet::with_capacity(max_size),
            max_size,
        }
    }
}

impl Replacer for LruReplacer {
    fn evict(&mut self) -> Option<FrameId> {
        let frame_id = self.queue.pop_front()?;
        self.members.remove(&frame_id);
        Some(frame_id)
    }

    fn pin(&mut self, frame_id: FrameId) {
        if self.members.remove(&frame_id) {
            self.queue.retain(|&f| f != frame_id);
        }
    }

    fn unpin(&mut self, frame_id: FrameId) {
        if !self.members.contains(&frame_id) && self.queue.len() < self.max_size {
            self.queue.push_back(frame_id);
            self.members.insert(frame_id);
        }
    }

    fn size(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_lru_operations() {
        let mut replacer = LruReplacer::new(3);

        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        assert_eq!(replacer.size(), 3);

        // First unpinned is first evicted
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.evict(), Some(2));
        assert_eq!(replacer.evict(), Some(3));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_pin_removes_from_eviction_order() {
        let mut replacer = LruReplacer::new(3);

        replacer.unpin(1);
        replacer.unpin(2);
        assert_eq!(replacer.size(), 2);

        replacer.pin(1);
        assert_eq!(replacer.size(), 1);

        assert_eq!(replacer.evict(), Some(2));
        assert_eq!(replacer.evict(), None);

        replacer.unpin(1);
        assert_eq!(replacer.evict(), Some(1));
    }

    #[test]
    fn test_duplicate_unpin_ignored() {
        let mut replacer = LruReplacer::new(2);

        replacer.unpin(1);
        replacer.unpin(1);
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_pin_unknown_frame_is_noop() {
        let mut replacer = LruReplacer::new(2);

        replacer.pin(42);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }
}
