// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Progress/trigger engine: the main loop users drive from one or more
//! threads per context.

use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::handle::CallbackInfo;
use crate::na::Na;

/// Refill the listen backlog, drain whatever NA completions are ready, and
/// block on NA's own progress call if nothing completed locally yet.
pub fn progress<N: Na>(context: &Arc<Context<N>>, timeout_ms: u32) -> Result<(), Error> {
    if context.class().na().is_listening() {
        crate::listen::listen(context);
    }

    // Drain NA's own trigger queue until a call runs nothing; some of those
    // callbacks call `complete`, filling our completion queue.
    while context.class().na().trigger(1) > 0 {}

    if context.completions.len() > 0 {
        return Ok(());
    }

    context.class().na().progress(timeout_ms).map_err(Error::from)
}

/// Pop up to `max_count` completed handles and run their callbacks. Returns
/// the number of handles actually popped.
///
/// A handle may carry a forward callback, a respond callback, or (in the
/// loopback case, where one handle plays both roles at once) both — each
/// populated slot fires exactly once.
pub fn trigger<N: Na>(
    context: &Arc<Context<N>>,
    timeout_ms: u32,
    max_count: usize,
) -> Result<usize, Error> {
    let popped = context.completions.trigger(timeout_ms, max_count)?;
    let actual = popped.len();

    for handle in popped {
        let ret = handle.take_ret();
        let forward_cb = handle.take_forward_callback();
        let respond_cb = handle.take_respond_callback();

        if let Some(cb) = forward_cb {
            cb(CallbackInfo {
                ret: ret.clone(),
                handle: handle.clone(),
            });
        }
        if let Some(cb) = respond_cb {
            cb(CallbackInfo {
                ret,
                handle: handle.clone(),
            });
        }
        // `handle` (and the clones above) drop here, decrementing the Arc
        // strong count that balances the extra clone taken when the call
        // was created/dispatched.
    }

    Ok(actual)
}
