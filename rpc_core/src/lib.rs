// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! An RPC runtime core layered on top of a lower-level Network Abstraction
//! (NA): named function registration, header framing, tag allocation, the
//! request/response state machine, and the progress/trigger loop that
//! drives it all. The NA collaborator itself — real messaging, addresses,
//! bulk transfer, payload serialization — is out of scope; [`na::Na`] pins
//! down the contract this core drives, and [`na::channel`]/[`na::socket`]
//! ship two software-only implementations used by this crate's own tests.
//!
//! A typical server: register handlers on a [`Class`], create one or more
//! [`Context`]s, run [`progress`] on a loop thread and [`trigger`] on one
//! or more worker threads. A typical client: create a [`Handle`] against a
//! peer address, fill its input buffer, call [`forward_buf`], and drive
//! `progress`/`trigger` until its callback fires.

pub mod cancel;
pub mod class;
pub mod context;
pub mod error;
pub mod forward;
pub mod handle;
pub mod header;
pub(crate) mod listen;
pub mod na;
pub mod progress;
pub(crate) mod queue;
pub mod registry;
pub mod respond;
pub mod tag;

pub use cancel::cancel;
pub use class::Class;
pub use context::Context;
pub use error::{Error, ProtocolError};
pub use forward::forward_buf;
pub use handle::{BufGuard, CallbackInfo, Handle};
pub use header::{RequestHeader, ResponseHeader, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};
pub use listen::BACKLOG_CAP;
pub use na::{Na, NaCallback, NaCompletion, NaError};
pub use progress::{progress, trigger};
pub use registry::{hash_name, DataDeleter, RpcHandler};
pub use respond::respond_buf;

/// Crate version as `(major, minor, patch)`.
pub fn version_get() -> (u32, u32, u32) {
    (0, 1, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::na::channel::ChannelNetwork;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn version_is_reported() {
        assert_eq!(version_get(), (0, 1, 0));
    }

    #[test]
    fn register_and_look_up_rpc() {
        let net = ChannelNetwork::new();
        let na = net.endpoint("lib-test-1", 256, 255, false);
        let class = Class::init(na).unwrap();

        let id = class.register_rpc("add", Box::new(|_h| {})).unwrap();
        assert_ne!(id, 0, "a registered name should not hash to the sentinel id");

        let (present, looked_up) = class.registered_rpc("add");
        assert!(present);
        assert_eq!(looked_up, id);

        let (present, id) = class.registered_rpc("sub");
        assert!(!present);
        assert_eq!(id, 0);
    }

    #[test]
    fn loopback_forward_and_respond() {
        let net = ChannelNetwork::new();
        let na = net.endpoint("lib-test-loopback", 256, 255, false);
        let self_addr = na.self_addr();
        let class = Class::init(na).unwrap();

        let id = class
            .register_rpc(
                "echo_reverse",
                Box::new(|handle: Handle<crate::na::channel::ChannelNa>| {
                    let input = handle.get_input_buf().to_vec();
                    {
                        let mut out = handle.get_output_buf();
                        for (i, b) in input.iter().rev().enumerate() {
                            out[i] = *b;
                        }
                    }
                    respond_buf(&handle, |_info| {}).unwrap();
                }),
            )
            .unwrap();

        let ctx = class.context_create().unwrap();
        let handle = ctx.create_handle(Some(self_addr), id).unwrap();
        handle.get_input_buf()[..3].copy_from_slice(&[1, 2, 3]);

        let dispatched = Arc::new(AtomicBool::new(false));
        let dispatched_clone = dispatched.clone();
        forward_buf(&handle, move |info| {
            assert!(info.ret.is_ok());
            assert_eq!(&info.handle.get_output_buf()[..3], &[3, 2, 1]);
            dispatched_clone.store(true, Ordering::SeqCst);
        }, 0)
        .unwrap();

        let n = trigger(&ctx, 1000, 1).unwrap();
        assert_eq!(n, 1);
        assert!(dispatched.load(Ordering::SeqCst));
    }

    #[test]
    fn remote_forward_across_two_endpoints() {
        let net = ChannelNetwork::new();
        let server_na = net.endpoint("lib-test-server", 256, 255, true);
        let server_addr = server_na.self_addr();
        let client_na = net.endpoint("lib-test-client", 256, 255, false);

        let server_class = Class::init(server_na).unwrap();
        server_class
            .register_rpc("noop", Box::new(|handle| { respond_buf(&handle, |_| {}).unwrap(); }))
            .unwrap();
        let server_ctx = server_class.context_create().unwrap();

        let client_class = Class::init(client_na).unwrap();
        let (_, id) = ("noop", crate::hash_name("noop"));
        let client_ctx = client_class.context_create().unwrap();
        let handle = client_ctx.create_handle(Some(server_addr), id).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let done_clone = done.clone();
        forward_buf(&handle, move |info| {
            assert!(info.ret.is_ok());
            done_clone.store(true, Ordering::SeqCst);
        }, 0)
        .unwrap();

        // Drive both sides until the client's callback has fired.
        for _ in 0..20 {
            if done.load(Ordering::SeqCst) {
                break;
            }
            let _ = progress(&server_ctx, 20);
            let _ = trigger(&server_ctx, 0, 4);
            let _ = progress(&client_ctx, 20);
            let _ = trigger(&client_ctx, 0, 4);
        }

        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn unknown_id_gets_no_match_reply() {
        let net = ChannelNetwork::new();
        let server_na = net.endpoint("lib-test-server-nomatch", 256, 255, true);
        let server_addr = server_na.self_addr();
        let client_na = net.endpoint("lib-test-client-nomatch", 256, 255, false);

        let server_class = Class::init(server_na).unwrap();
        let server_ctx = server_class.context_create().unwrap();

        let client_class = Class::init(client_na).unwrap();
        let client_ctx = client_class.context_create().unwrap();
        let handle = client_ctx.create_handle(Some(server_addr), 0xdead_beef).unwrap();

        let ret = Arc::new(std::sync::Mutex::new(None));
        let ret_clone = ret.clone();
        forward_buf(&handle, move |info| {
            *ret_clone.lock().unwrap() = Some(info.ret);
        }, 0)
        .unwrap();

        for _ in 0..20 {
            if ret.lock().unwrap().is_some() {
                break;
            }
            let _ = progress(&server_ctx, 20);
            let _ = trigger(&server_ctx, 0, 4);
            let _ = progress(&client_ctx, 20);
            let _ = trigger(&client_ctx, 0, 4);
        }

        match ret.lock().unwrap().take() {
            Some(Err(Error::NoMatch)) => {}
            other => panic!("expected Err(NoMatch), got {other:?}"),
        }
    }

    #[test]
    fn trigger_times_out_with_nothing_queued() {
        let net = ChannelNetwork::new();
        let na = net.endpoint("lib-test-timeout", 256, 255, false);
        let class = Class::init(na).unwrap();
        let ctx = class.context_create().unwrap();

        match trigger(&ctx, 30, 4) {
            Err(Error::Timeout) => {}
            other => panic!("expected Timeout, got {:?}", other),
        }
    }
}
