// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Listen-side backlog and request dispatch.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::context::Context;
use crate::handle::{Handle, HandleState};
use crate::header::RequestHeader;
use crate::na::{Na, NaCompletion};

/// Maximum number of unexpected receives kept posted at once per context.
pub const BACKLOG_CAP: usize = 1;

pub(crate) struct ProcessingList<N: Na> {
    list: Mutex<VecDeque<Handle<N>>>,
}

impl<N: Na> ProcessingList<N> {
    pub(crate) fn new() -> Self {
        Self {
            list: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.list.lock().unwrap().len()
    }

    fn push(&self, handle: Handle<N>) {
        self.list.lock().unwrap().push_back(handle);
    }

    /// Remove `handle` from the backlog. Returns true if it was present.
    fn remove(&self, handle: &Handle<N>) -> bool {
        let mut list = self.list.lock().unwrap();
        if let Some(pos) = list.iter().position(|h| h == handle) {
            list.remove(pos);
            true
        } else {
            false
        }
    }
}

/// Refill the processing list up to [`BACKLOG_CAP`] by creating fresh
/// handles and posting unexpected receives for them.
pub(crate) fn listen<N: Na>(context: &Arc<Context<N>>) {
    while context.processing.len() < BACKLOG_CAP {
        let handle = match Handle::create(context.clone(), None, 0) {
            Ok(h) => h,
            Err(e) => {
                warn!("listen: failed to allocate a backlog handle: {e}");
                break;
            }
        };
        handle.set_state(HandleState::Posted);
        context.processing.push(handle.clone());

        let buf = std::mem::take(&mut *handle.input_full());
        let cb_context = context.clone();
        let cb_handle = handle.clone();
        context
            .class()
            .na()
            .post_recv_unexpected(buf, Box::new(move |completion| {
                recv_input_cb(cb_context, cb_handle, completion);
            }));
    }
}

fn recv_input_cb<N: Na>(
    context: Arc<Context<N>>,
    handle: Handle<N>,
    completion: NaCompletion<N::Addr>,
) {
    *handle.input_full() = completion.buf;

    if let Err(e) = completion.status {
        warn!("recv_input_cb: NA receive failed: {e}");
        context.processing.remove(&handle);
        return;
    }

    let expected = context.class().na().max_expected_size();
    if completion.actual_len != expected {
        warn!(
            "recv_input_cb: size mismatch, expected {expected} got {}",
            completion.actual_len
        );
        context.processing.remove(&handle);
        return;
    }

    if let Some(addr) = completion.source {
        handle.set_peer(addr, true);
    }
    handle.set_tag(completion.tag);
    context.processing.remove(&handle);

    process(context, handle);
}

/// Decode the request header, look up its handler, and invoke it. When no
/// handler matches, the call is rejected with a `NO_MATCH` response instead
/// of being silently dropped, so the originator always gets a reply rather
/// than waiting forever.
pub(crate) fn process<N: Na>(context: Arc<Context<N>>, handle: Handle<N>) {
    handle.set_state(HandleState::Decoded);

    let header = {
        let buf = handle.input_full();
        RequestHeader::decode(&buf)
    };
    let header = match header {
        Ok(h) => h,
        Err(e) => {
            warn!("process: request header decode failed: {e}");
            return;
        }
    };

    handle.set_op_id(header.id);
    handle.set_cookie(header.cookie);
    handle.set_state(HandleState::Handled);

    match context.class().dispatch(header.id, handle.clone()) {
        Ok(()) => {
            debug!("process: dispatched id {:#x}", header.id);
        }
        Err(err) => {
            crate::respond::respond_error(&handle, &err);
        }
    }
}
