// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Lock-free wrapping tag allocator.

use std::sync::atomic::{AtomicU32, Ordering};

/// Atomic monotonic counter producing tags in `[0, max_tag]`, wrapping to 0
/// once `max_tag` is exceeded.
pub struct TagAllocator {
    max_tag: u32,
    current: AtomicU32,
}

impl TagAllocator {
    pub fn new(max_tag: u32) -> Self {
        Self {
            max_tag,
            // Starts at `max_tag` so the very first `next_tag` call wraps to
            // 0.
            current: AtomicU32::new(max_tag),
        }
    }

    pub fn max_tag(&self) -> u32 {
        self.max_tag
    }

    /// Atomically allocate the next tag in the wrapping sequence.
    pub fn next_tag(&self) -> u32 {
        match self
            .current
            .compare_exchange(self.max_tag, 0, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => 0,
            Err(_) => self.current.fetch_add(1, Ordering::AcqRel) + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_after_max_plus_one_calls() {
        let alloc = TagAllocator::new(3);
        let seq: Vec<u32> = (0..5).map(|_| alloc.next_tag()).collect();
        assert_eq!(seq, vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn single_max_tag_wraps_every_call() {
        let alloc = TagAllocator::new(0);
        assert_eq!(alloc.next_tag(), 0);
        assert_eq!(alloc.next_tag(), 0);
        assert_eq!(alloc.next_tag(), 0);
    }

    #[test]
    fn concurrent_allocation_is_exhaustive_and_unique() {
        use std::sync::Arc;
        use std::thread;

        let alloc = Arc::new(TagAllocator::new(999));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let alloc = alloc.clone();
            handles.push(thread::spawn(move || {
                (0..100).map(|_| alloc.next_tag()).collect::<Vec<_>>()
            }));
        }

        let mut all_tags: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all_tags.sort_unstable();
        assert_eq!(all_tags.len(), 1000);
        for t in &all_tags {
            assert!(*t <= 999);
        }
    }
}
