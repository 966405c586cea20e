// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Shared plumbing for NA backends: a FIFO of ready completion thunks with
//! the same mutex+condvar shape as this crate's own completion queue (see
//! `crate::queue`), so `Na::trigger`/`Na::progress` have something to drain.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::NaError;

type Thunk = Box<dyn FnOnce() + Send>;

pub(crate) struct NaCompletionQueue {
    queue: Mutex<VecDeque<Thunk>>,
    cv: Condvar,
}

impl NaCompletionQueue {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
        }
    }

    pub(crate) fn push(&self, thunk: Thunk) {
        let mut q = self.queue.lock().unwrap();
        q.push_back(thunk);
        self.cv.notify_one();
    }

    pub(crate) fn trigger(&self, max_count: usize) -> usize {
        let ready: Vec<Thunk> = {
            let mut q = self.queue.lock().unwrap();
            let n = max_count.min(q.len());
            q.drain(..n).collect()
        };
        let n = ready.len();
        for thunk in ready {
            thunk();
        }
        n
    }

    pub(crate) fn progress(&self, timeout_ms: u32) -> Result<(), NaError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        let mut q = self.queue.lock().unwrap();
        loop {
            if !q.is_empty() {
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(NaError::Timeout);
            }
            let (guard, result) = self.cv.wait_timeout(q, remaining).unwrap();
            q = guard;
            if q.is_empty() && result.timed_out() {
                return Err(NaError::Timeout);
            }
        }
    }
}
