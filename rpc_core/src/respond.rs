// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Responder (server-side) state machine.

use log::warn;

use crate::error::{self, Error};
use crate::handle::{CallbackInfo, Handle, HandleState};
use crate::header::ResponseHeader;
use crate::na::{Na, NaCompletion};
use crate::queue;

/// Send `handle`'s output buffer back to its peer as a successful reply.
/// `cb` fires once the reply has gone out (or failed to).
pub fn respond_buf<N: Na>(
    handle: &Handle<N>,
    cb: impl FnOnce(CallbackInfo<N>) + Send + 'static,
) -> Result<(), Error> {
    handle.set_respond_callback(Box::new(cb));
    send_response(handle, error::wire::SUCCESS);
    Ok(())
}

/// Auto-generated error reply for a request [`crate::listen::process`]
/// could not dispatch. No user handler ran, so there is no caller-supplied
/// callback to install — the handle simply completes with a no-op callback
/// once its reply is sent.
pub(crate) fn respond_error<N: Na>(handle: &Handle<N>, err: &Error) {
    handle.set_respond_callback(Box::new(|_| {}));
    send_response(handle, error::wire::from_error(err));
}

fn send_response<N: Na>(handle: &Handle<N>, ret_code: u32) {
    {
        let mut buf = handle.output_full();
        ResponseHeader::new(handle.cookie(), ret_code).encode(&mut buf);
    }
    handle.set_state(HandleState::Responded);

    let peer = match handle.get_addr() {
        Some(p) => p,
        None => {
            warn!("respond: handle has no peer address, dropping reply");
            queue::complete(handle.clone(), Err(Error::InvalidParam("no peer address")));
            return;
        }
    };
    let na = handle.context().class().na();

    if na.addr_is_self(&peer) {
        // Loopback: the forward call that created this handle ran
        // synchronously already, so completing here is all that's left.
        queue::complete(handle.clone(), Ok(()));
        return;
    }

    let tag = handle.tag();
    let output_buf = std::mem::take(&mut *handle.output_full());
    let send_handle = handle.clone();
    na.post_send_expected(
        output_buf,
        peer,
        tag,
        Box::new(move |completion| send_output_cb(send_handle, completion)),
    );
}

/// Runs once a reply send to an explicit peer completes (or fails).
fn send_output_cb<N: Na>(handle: Handle<N>, completion: NaCompletion<N::Addr>) {
    *handle.output_full() = completion.buf;
    if let Err(e) = completion.status {
        warn!("send_output_cb: NA send failed: {e}");
        queue::complete(handle, Err(e.into()));
        return;
    }
    queue::complete(handle, Ok(()));
}
