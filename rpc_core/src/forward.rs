// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Originator (client-side) state machine.

use log::warn;

use crate::error::{self, Error};
use crate::handle::{CallbackInfo, Handle, HandleState};
use crate::header::{RequestHeader, ResponseHeader};
use crate::na::{Na, NaCompletion};
use crate::queue;

/// Forward `handle`'s request buffer to its peer. `cb` fires once the call
/// completes, whether that's a decoded reply, an NA failure, or a
/// cancellation.
pub fn forward_buf<N: Na>(
    handle: &Handle<N>,
    cb: impl FnOnce(CallbackInfo<N>) + Send + 'static,
    extra_bulk: u32,
) -> Result<(), Error> {
    handle.set_forward_callback(Box::new(cb));

    {
        let mut buf = handle.input_full();
        RequestHeader::new(handle.op_id(), handle.cookie(), extra_bulk).encode(&mut buf);
    }
    handle.set_state(HandleState::Posted);

    let peer = handle
        .get_addr()
        .ok_or(Error::InvalidParam("handle has no destination address"))?;
    let na = handle.context().class().na();

    if na.addr_is_self(&peer) {
        // Loopback short-circuit: run the server side synchronously against
        // this same handle, no NA traffic at all. `process`/`respond_buf`
        // install their own completion on `respond_callback`, which is a
        // separate slot from the `forward_callback` set above, so both
        // still fire once the handle completes.
        let context = handle.context().clone();
        crate::listen::process(context, handle.clone());
        return Ok(());
    }

    let tag = handle.context().class().next_tag();
    handle.set_tag(tag);

    let output_buf = std::mem::take(&mut *handle.output_full());
    let recv_handle = handle.clone();
    na.post_recv_expected(
        output_buf,
        peer.clone(),
        tag,
        Box::new(move |completion| recv_output_cb(recv_handle, completion)),
    );

    let input_buf = std::mem::take(&mut *handle.input_full());
    let send_handle = handle.clone();
    na.post_send_unexpected(
        input_buf,
        peer,
        tag,
        Box::new(move |completion| send_input_cb(send_handle, completion)),
    );

    Ok(())
}

/// A no-op on success. A send failure, left unreported, would leave the
/// already-posted expected receive waiting forever, so this completes the
/// handle with the NA error instead.
fn send_input_cb<N: Na>(handle: Handle<N>, completion: NaCompletion<N::Addr>) {
    *handle.input_full() = completion.buf;
    if let Err(e) = completion.status {
        warn!("send_input_cb: NA send failed: {e}");
        queue::complete(handle, Err(e.into()));
    }
}

/// Runs once the expected response for this call arrives (or fails).
fn recv_output_cb<N: Na>(handle: Handle<N>, completion: NaCompletion<N::Addr>) {
    *handle.output_full() = completion.buf;

    if handle.is_cancelled() {
        queue::complete(handle, Err(Error::Cancelled));
        return;
    }

    if let Err(e) = completion.status {
        warn!("recv_output_cb: NA receive failed: {e}");
        queue::complete(handle, Err(e.into()));
        return;
    }

    let decoded = {
        let buf = handle.output_full();
        ResponseHeader::decode(&buf)
    };
    match decoded {
        Ok(resp) => {
            let result = match error::wire::to_error(resp.ret) {
                None => Ok(()),
                Some(e) => Err(e),
            };
            queue::complete(handle, result);
        }
        Err(e) => {
            warn!("recv_output_cb: response header decode failed: {e}");
            queue::complete(handle, Err(e));
        }
    }
}
