// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Best-effort cancellation.
//!
//! Cancelling a handle marks it and lets any already-posted NA operation
//! still flow through the normal completion path, but report failure
//! instead of success. The [`Na`] trait has no cancel primitive of its own
//! (real fabrics vary widely in what they can interrupt), so `cancel`
//! cannot reach into an in-flight `post_send_*`/`post_recv_*` call; it only
//! sets the flag that `recv_output_cb` (see [`crate::forward`]) checks
//! before treating a receive as a successful completion.

use crate::error::Error;
use crate::handle::Handle;
use crate::na::Na;

/// Mark `handle` as cancelled.
pub fn cancel<N: Na>(handle: &Handle<N>) -> Result<(), Error> {
    handle.cancel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::na::channel::ChannelNetwork;
    use crate::Class;

    #[test]
    fn cancel_marks_handle_and_is_idempotent() {
        let net = ChannelNetwork::new();
        let na = net.endpoint("cancel-test", 128, 255, false);
        let class = Class::init(na).unwrap();
        let ctx = class.context_create().unwrap();
        let handle = ctx.create_handle(Some(class.na().self_addr()), 0).unwrap();

        assert!(!handle_is_cancelled(&handle));
        cancel(&handle).unwrap();
        assert!(handle_is_cancelled(&handle));
        cancel(&handle).unwrap();
        assert!(handle_is_cancelled(&handle));
    }

    fn handle_is_cancelled<N: Na>(handle: &Handle<N>) -> bool {
        handle.is_cancelled()
    }
}
