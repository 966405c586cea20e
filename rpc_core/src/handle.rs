// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The per-call handle.
//!
//! A handle needs two independent owners that can each drop their own
//! reference without racing the other's free: the caller holding the
//! `Handle` it was given, and the dispatch state machine holding a clone
//! while a request is in flight. `Handle` is a thin, cloneable wrapper
//! around `Arc<HandleInner<N>>` for exactly this reason: `create` returns
//! one `Handle`, dispatch clones a second one for itself, and the object is
//! freed the moment the last clone drops.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::context::Context;
use crate::error::Error;
use crate::header;
use crate::na::Na;

/// Protocol state of one handle, made explicit instead of left implicit in
/// callback wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandleState {
    Created,
    Posted,
    Decoded,
    Handled,
    Responded,
    Completed,
}

/// Delivered to a user callback once `trigger` dispatches a completed
/// handle.
pub struct CallbackInfo<N: Na> {
    pub ret: Result<(), Error>,
    pub handle: Handle<N>,
}

/// Snapshot of a handle's bookkeeping fields.
#[derive(Debug, Clone, Copy)]
pub struct HandleInfo {
    pub op_id: u32,
    pub cookie: u32,
    pub tag: u32,
}

pub(crate) type HandleCallback<N> = Box<dyn FnOnce(CallbackInfo<N>) + Send>;

struct PeerAddr<N: Na> {
    addr: Option<N::Addr>,
    /// True when this address was received from NA (server side) and so is
    /// owned by the handle; false when the caller supplied it at `create`.
    mine: bool,
}

pub(crate) struct HandleInner<N: Na> {
    context: Arc<Context<N>>,
    op_id: AtomicU32,
    /// For a client-originated handle, the unique value set at `create`;
    /// for a server-originated handle, overwritten by `process` once the
    /// request header's cookie is decoded, so `respond` mirrors it back.
    cookie: AtomicU32,
    tag: AtomicU32,
    peer: Mutex<PeerAddr<N>>,
    input: Mutex<Vec<u8>>,
    output: Mutex<Vec<u8>>,
    /// Set by `forward_buf`; fires once this handle's call completes from
    /// the originator's point of view (a reply arrived, or the call
    /// failed).
    forward_callback: Mutex<Option<HandleCallback<N>>>,
    /// Set by `respond_buf` (or the auto error-reply path); fires once this
    /// handle's reply has been sent from the responder's point of view.
    /// Kept separate from `forward_callback` because the loopback path in
    /// `forward_buf` runs the responder synchronously against the very
    /// same handle the originator is holding — two distinct roles can be
    /// installed on one handle at once, and each must still fire exactly
    /// once.
    respond_callback: Mutex<Option<HandleCallback<N>>>,
    state: Mutex<HandleState>,
    cancelled: AtomicBool,
    ret: Mutex<Result<(), Error>>,
}

/// A single RPC call. Cheaply cloneable; every clone refers to the same
/// underlying call state.
pub struct Handle<N: Na>(pub(crate) Arc<HandleInner<N>>);

impl<N: Na> Clone for Handle<N> {
    fn clone(&self) -> Self {
        Handle(self.0.clone())
    }
}

impl<N: Na> PartialEq for Handle<N> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<N: Na> fmt::Debug for Handle<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("op_id", &self.op_id())
            .field("cookie", &self.cookie())
            .field("tag", &self.tag())
            .field("state", &self.state())
            .finish()
    }
}

/// A guard exposing the user-visible suffix of a handle's input or output
/// buffer — the bytes past the reserved header prefix.
pub struct BufGuard<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
    prefix: usize,
}

impl Deref for BufGuard<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard[self.prefix..]
    }
}

impl DerefMut for BufGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.guard[self.prefix..]
    }
}

impl<N: Na> Handle<N> {
    pub(crate) fn create(
        context: Arc<Context<N>>,
        peer: Option<N::Addr>,
        op_id: u32,
    ) -> Result<Self, Error> {
        let size = context.class().na().max_expected_size();
        if size < header::REQUEST_HEADER_SIZE || size < header::RESPONSE_HEADER_SIZE {
            return Err(Error::SizeError);
        }
        let cookie = context.class().next_cookie();
        let inner = HandleInner {
            context,
            op_id: AtomicU32::new(op_id),
            cookie: AtomicU32::new(cookie),
            tag: AtomicU32::new(0),
            peer: Mutex::new(PeerAddr {
                addr: peer,
                mine: false,
            }),
            input: Mutex::new(vec![0u8; size]),
            output: Mutex::new(vec![0u8; size]),
            forward_callback: Mutex::new(None),
            respond_callback: Mutex::new(None),
            state: Mutex::new(HandleState::Created),
            cancelled: AtomicBool::new(false),
            ret: Mutex::new(Ok(())),
        };
        Ok(Handle(Arc::new(inner)))
    }

    pub fn cookie(&self) -> u32 {
        self.0.cookie.load(Ordering::Acquire)
    }

    pub(crate) fn set_cookie(&self, cookie: u32) {
        self.0.cookie.store(cookie, Ordering::Release);
    }

    pub fn tag(&self) -> u32 {
        self.0.tag.load(Ordering::Acquire)
    }

    pub fn op_id(&self) -> u32 {
        self.0.op_id.load(Ordering::Acquire)
    }

    pub fn get_addr(&self) -> Option<N::Addr> {
        self.0.peer.lock().unwrap().addr.clone()
    }

    /// True if this handle's peer address was learned from an NA
    /// unexpected receive (server side) rather than supplied by the
    /// caller at `create`.
    pub fn addr_is_mine(&self) -> bool {
        self.0.peer.lock().unwrap().mine
    }

    pub fn get_info(&self) -> HandleInfo {
        HandleInfo {
            op_id: self.op_id(),
            cookie: self.cookie(),
            tag: self.tag(),
        }
    }

    pub(crate) fn set_peer(&self, addr: N::Addr, mine: bool) {
        let mut p = self.0.peer.lock().unwrap();
        p.addr = Some(addr);
        p.mine = mine;
    }

    pub(crate) fn set_tag(&self, tag: u32) {
        self.0.tag.store(tag, Ordering::Release);
    }

    pub(crate) fn set_op_id(&self, id: u32) {
        self.0.op_id.store(id, Ordering::Release);
    }

    /// The user-visible suffix of the input buffer (past the request
    /// header prefix).
    pub fn get_input_buf(&self) -> BufGuard<'_> {
        BufGuard {
            guard: self.0.input.lock().unwrap(),
            prefix: header::REQUEST_HEADER_SIZE,
        }
    }

    /// The user-visible suffix of the output buffer (past the response
    /// header prefix).
    pub fn get_output_buf(&self) -> BufGuard<'_> {
        BufGuard {
            guard: self.0.output.lock().unwrap(),
            prefix: header::RESPONSE_HEADER_SIZE,
        }
    }

    pub(crate) fn input_full(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.input.lock().unwrap()
    }

    pub(crate) fn output_full(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.output.lock().unwrap()
    }

    pub(crate) fn set_forward_callback(&self, cb: HandleCallback<N>) {
        *self.0.forward_callback.lock().unwrap() = Some(cb);
    }

    pub(crate) fn take_forward_callback(&self) -> Option<HandleCallback<N>> {
        self.0.forward_callback.lock().unwrap().take()
    }

    pub(crate) fn set_respond_callback(&self, cb: HandleCallback<N>) {
        *self.0.respond_callback.lock().unwrap() = Some(cb);
    }

    pub(crate) fn take_respond_callback(&self) -> Option<HandleCallback<N>> {
        self.0.respond_callback.lock().unwrap().take()
    }

    pub(crate) fn set_ret(&self, ret: Result<(), Error>) {
        *self.0.ret.lock().unwrap() = ret;
    }

    pub(crate) fn take_ret(&self) -> Result<(), Error> {
        std::mem::replace(&mut *self.0.ret.lock().unwrap(), Ok(()))
    }

    pub(crate) fn state(&self) -> HandleState {
        *self.0.state.lock().unwrap()
    }

    pub(crate) fn set_state(&self, s: HandleState) {
        *self.0.state.lock().unwrap() = s;
    }

    /// Best-effort cancel: marks the handle so its pending NA callbacks
    /// skip dispatching a success completion. Actual NA-level operation
    /// cancellation is not implemented — the `Na` trait exposes no
    /// interrupt primitive for an in-flight `post_send_*`/`post_recv_*`.
    pub fn cancel(&self) -> Result<(), Error> {
        self.0.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn context(&self) -> &Arc<Context<N>> {
        &self.0.context
    }

    /// Explicit teardown; dropping the last `Handle` clone has the same
    /// effect, this just gives call sites a named verb for it.
    pub fn destroy(self) {
        drop(self)
    }
}
