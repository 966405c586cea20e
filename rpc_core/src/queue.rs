// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Completion queue: a per-context FIFO of handles whose state machine
//! reached `Completed`, guarded by a mutex + condvar, the same shape as
//! this crate's [`crate::na::completion::NaCompletionQueue`].

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::handle::{Handle, HandleState};
use crate::na::Na;

pub(crate) struct CompletionQueue<N: Na> {
    queue: Mutex<VecDeque<Handle<N>>>,
    cv: Condvar,
}

impl<N: Na> CompletionQueue<N> {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
        }
    }

    /// Push `handle` to the back of the queue and wake one waiter.
    pub(crate) fn push(&self, handle: Handle<N>) {
        let mut q = self.queue.lock().unwrap();
        q.push_back(handle);
        self.cv.notify_one();
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Pop up to `max_count` handles in FIFO order. If the queue is empty,
    /// wait on the condvar up to `timeout_ms`; returns `Error::Timeout` if
    /// still empty once the deadline passes.
    pub(crate) fn trigger(
        &self,
        timeout_ms: u32,
        max_count: usize,
    ) -> Result<Vec<Handle<N>>, Error> {
        let mut q = self.queue.lock().unwrap();
        if q.is_empty() {
            let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
            loop {
                if !q.is_empty() {
                    break;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(Error::Timeout);
                }
                let (guard, result) = self.cv.wait_timeout(q, remaining).unwrap();
                q = guard;
                if result.timed_out() && q.is_empty() {
                    return Err(Error::Timeout);
                }
            }
        }

        let mut popped = Vec::with_capacity(max_count.min(q.len()));
        for _ in 0..max_count {
            match q.pop_front() {
                Some(h) => popped.push(h),
                None => break,
            }
        }
        Ok(popped)
    }
}

/// Mark `handle` completed and push it onto its context's completion
/// queue with `result` as the callback-info return.
pub(crate) fn complete<N: Na>(handle: Handle<N>, result: Result<(), Error>) {
    handle.set_ret(result);
    handle.set_state(HandleState::Completed);
    let context = handle.context().clone();
    context.completions.push(handle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::na::channel::ChannelNetwork;
    use crate::{Class, Context};
    use std::sync::Arc;

    fn test_context() -> Arc<Context<crate::na::channel::ChannelNa>> {
        let net = ChannelNetwork::new();
        let na = net.endpoint("q-test", 128, 255, false);
        let class = Class::init(na).unwrap();
        class.context_create().unwrap()
    }

    #[test]
    fn empty_queue_times_out() {
        let ctx = test_context();
        match ctx.completions.trigger(20, 4) {
            Err(Error::Timeout) => {}
            other => panic!("expected timeout, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn push_then_trigger_returns_fifo_order() {
        let ctx = test_context();
        let h1 = Handle::create(ctx.clone(), None, 1).unwrap();
        let h2 = Handle::create(ctx.clone(), None, 2).unwrap();
        ctx.completions.push(h1.clone());
        ctx.completions.push(h2.clone());

        let popped = ctx.completions.trigger(20, 8).unwrap();
        assert_eq!(popped.len(), 2);
        assert_eq!(popped[0], h1);
        assert_eq!(popped[1], h2);
    }
}
