// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Integration tests exercising the public API end to end, against both
//! the in-process `ChannelNa` backend and the real-file-descriptor
//! `SocketNa` backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use rpc_core::na::channel::ChannelNetwork;
use rpc_core::na::socket::{SocketAddr, SocketNa};
use rpc_core::na::Na;
use rpc_core::{forward_buf, progress, respond_buf, trigger, Class, Error};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn tag_sequence_wraps_at_max_plus_one() {
    // Exercised at the class level: every `create`d handle on a fresh
    // context gets the next wrapping tag once `forward_buf` allocates one.
    use rpc_core::tag::TagAllocator;

    let alloc = TagAllocator::new(3);
    let seq: Vec<u32> = (0..5).map(|_| alloc.next_tag()).collect();
    assert_eq!(seq, vec![0, 1, 2, 3, 0]);
}

#[test]
fn register_and_look_up() {
    init_logging();
    let net = ChannelNetwork::new();
    let na = net.endpoint("it-register", 256, 255, false);
    let class = Class::init(na).unwrap();

    let id = class.register_rpc("add", Box::new(|_h| {})).unwrap();
    let (present, looked_up) = class.registered_rpc("add");
    assert!(present);
    assert_eq!(looked_up, id);

    let (present, id) = class.registered_rpc("sub");
    assert!(!present);
    assert_eq!(id, 0);
}

#[test]
fn loopback_forward_runs_handler_synchronously() {
    init_logging();
    let net = ChannelNetwork::new();
    let na = net.endpoint("it-loopback", 256, 255, false);
    let self_addr = na.self_addr();
    let class = Class::init(na).unwrap();

    let id = class
        .register_rpc(
            "echo",
            Box::new(|handle| {
                let input = handle.get_input_buf().to_vec();
                handle.get_output_buf()[..input.len()].copy_from_slice(&input);
                respond_buf(&handle, |_info| {}).unwrap();
            }),
        )
        .unwrap();

    let ctx = class.context_create().unwrap();
    let handle = ctx.create_handle(Some(self_addr), id).unwrap();
    handle.get_input_buf()[..3].copy_from_slice(&[1, 2, 3]);

    let result = Arc::new(Mutex::new(None));
    let result_clone = result.clone();
    forward_buf(
        &handle,
        move |info| {
            *result_clone.lock().unwrap() = Some(info.ret);
        },
        0,
    )
    .unwrap();

    // Loopback completes synchronously inside forward_buf, so the handle
    // is already sitting in the completion queue.
    let n = trigger(&ctx, 1000, 1).unwrap();
    assert_eq!(n, 1);
    assert!(matches!(*result.lock().unwrap(), Some(Ok(()))));
    assert_eq!(&handle.get_output_buf()[..3], &[1, 2, 3]);
}

#[test]
fn remote_forward_completes_after_driving_both_sides() {
    init_logging();
    let net = ChannelNetwork::new();
    let server_na = net.endpoint("it-remote-server", 256, 255, true);
    let server_addr = server_na.self_addr();
    let client_na = net.endpoint("it-remote-client", 256, 255, false);

    let server_class = Class::init(server_na).unwrap();
    let handled = Arc::new(AtomicU32::new(0));
    let handled_clone = handled.clone();
    server_class
        .register_rpc(
            "noop",
            Box::new(move |handle| {
                handled_clone.fetch_add(1, Ordering::SeqCst);
                respond_buf(&handle, |_info| {}).unwrap();
            }),
        )
        .unwrap();
    let server_ctx = server_class.context_create().unwrap();

    let client_class = Class::init(client_na).unwrap();
    let client_ctx = client_class.context_create().unwrap();
    let id = rpc_core::hash_name("noop");
    let handle = client_ctx.create_handle(Some(server_addr), id).unwrap();

    let done = Arc::new(Mutex::new(None));
    let done_clone = done.clone();
    forward_buf(
        &handle,
        move |info| {
            *done_clone.lock().unwrap() = Some(info.ret);
        },
        0,
    )
    .unwrap();

    for _ in 0..50 {
        if done.lock().unwrap().is_some() {
            break;
        }
        let _ = progress(&server_ctx, 10);
        let _ = trigger(&server_ctx, 0, 4);
        let _ = progress(&client_ctx, 10);
        let _ = trigger(&client_ctx, 0, 4);
    }

    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert!(matches!(*done.lock().unwrap(), Some(Ok(()))));
}

#[test]
fn unknown_operation_id_is_reported_as_no_match() {
    init_logging();
    let net = ChannelNetwork::new();
    let server_na = net.endpoint("it-nomatch-server", 256, 255, true);
    let server_addr = server_na.self_addr();
    let client_na = net.endpoint("it-nomatch-client", 256, 255, false);

    let server_class = Class::init(server_na).unwrap();
    let server_ctx = server_class.context_create().unwrap();

    let client_class = Class::init(client_na).unwrap();
    let client_ctx = client_class.context_create().unwrap();
    let handle = client_ctx
        .create_handle(Some(server_addr), 0x1234_5678)
        .unwrap();

    let result = Arc::new(Mutex::new(None));
    let result_clone = result.clone();
    forward_buf(
        &handle,
        move |info| {
            *result_clone.lock().unwrap() = Some(info.ret);
        },
        0,
    )
    .unwrap();

    for _ in 0..50 {
        if result.lock().unwrap().is_some() {
            break;
        }
        let _ = progress(&server_ctx, 10);
        let _ = trigger(&server_ctx, 0, 4);
        let _ = progress(&client_ctx, 10);
        let _ = trigger(&client_ctx, 0, 4);
    }

    match result.lock().unwrap().take() {
        Some(Err(Error::NoMatch)) => {}
        other => panic!("expected Err(NoMatch), got {other:?}"),
    }
}

#[test]
fn trigger_reports_timeout_with_nothing_queued() {
    init_logging();
    let net = ChannelNetwork::new();
    let na = net.endpoint("it-timeout", 256, 255, false);
    let class = Class::init(na).unwrap();
    let ctx = class.context_create().unwrap();

    match trigger(&ctx, 30, 4) {
        Err(Error::Timeout) => {}
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[test]
fn cancel_is_idempotent_and_marks_the_handle() {
    init_logging();
    let net = ChannelNetwork::new();
    let na = net.endpoint("it-cancel", 256, 255, false);
    let self_addr = na.self_addr();
    let class = Class::init(na).unwrap();
    let ctx = class.context_create().unwrap();
    let handle = ctx.create_handle(Some(self_addr), 0).unwrap();

    rpc_core::cancel(&handle).unwrap();
    rpc_core::cancel(&handle).unwrap();
}

#[test]
fn socket_na_delivers_an_unexpected_message_over_a_real_fd() {
    init_logging();
    let (a, b) = SocketNa::pair(64, 255).expect("socketpair should succeed");

    let received = Arc::new(Mutex::new(None));
    let received_clone = received.clone();
    a.post_recv_unexpected(
        vec![0u8; 64],
        Box::new(move |completion| {
            *received_clone.lock().unwrap() =
                Some((completion.tag, completion.buf, completion.status.is_ok()));
        }),
    );

    let mut payload = vec![0u8; 64];
    payload[..5].copy_from_slice(b"hello");
    b.post_send_unexpected(payload, SocketAddr, 7, Box::new(|_| {}));

    a.progress(500)
        .expect("the peer's send should land on a's fd before the deadline");
    assert_eq!(a.trigger(4), 1);
    let _ = b.trigger(4);

    let (tag, buf, ok) = received.lock().unwrap().take().expect("recv should have completed");
    assert!(ok);
    assert_eq!(tag, 7);
    assert_eq!(&buf[..5], b"hello");
}
