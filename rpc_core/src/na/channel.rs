// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! An in-process NA backend connecting named endpoints with completion
//! queues, no OS resources required. This is the backend exercised by most
//! of this crate's tests (loopback, and multi-endpoint "remote" scenarios
//! running in a single process).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::trace;

use super::completion::NaCompletionQueue;
use super::{Na, NaCallback, NaCompletion, NaError};

/// Address of an endpoint registered with a [`ChannelNetwork`].
#[derive(Clone, Debug)]
pub struct ChannelAddr(Arc<str>);

impl PartialEq for ChannelAddr {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for ChannelAddr {}

struct Tables {
    unexpected_waiters: VecDeque<(Vec<u8>, NaCallback<ChannelAddr>)>,
    unexpected_pending: VecDeque<(Vec<u8>, ChannelAddr, u32)>,
    expected_waiters: HashMap<(ChannelAddr, u32), (Vec<u8>, NaCallback<ChannelAddr>)>,
    expected_pending: HashMap<(ChannelAddr, u32), Vec<u8>>,
}

impl Tables {
    fn new() -> Self {
        Self {
            unexpected_waiters: VecDeque::new(),
            unexpected_pending: VecDeque::new(),
            expected_waiters: HashMap::new(),
            expected_pending: HashMap::new(),
        }
    }
}

struct Endpoint {
    completions: NaCompletionQueue,
    tables: Mutex<Tables>,
    listening: AtomicBool,
}

/// Shared directory of endpoints. Construct one `ChannelNetwork` per test
/// scenario and call [`ChannelNetwork::endpoint`] once per simulated peer.
pub struct ChannelNetwork {
    directory: Mutex<HashMap<Arc<str>, Arc<Endpoint>>>,
}

impl ChannelNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            directory: Mutex::new(HashMap::new()),
        })
    }

    /// Register a new endpoint named `name` and return an NA handle for it.
    pub fn endpoint(
        self: &Arc<Self>,
        name: &str,
        max_expected_size: usize,
        max_tag: u32,
        listening: bool,
    ) -> ChannelNa {
        let addr: Arc<str> = Arc::from(name);
        let ep = Arc::new(Endpoint {
            completions: NaCompletionQueue::new(),
            tables: Mutex::new(Tables::new()),
            listening: AtomicBool::new(listening),
        });
        self.directory
            .lock()
            .unwrap()
            .insert(addr.clone(), ep.clone());

        ChannelNa {
            network: self.clone(),
            self_addr: ChannelAddr(addr),
            self_endpoint: ep,
            max_expected_size,
            max_tag,
        }
    }

    fn endpoint_of(&self, addr: &ChannelAddr) -> Arc<Endpoint> {
        self.directory
            .lock()
            .unwrap()
            .get(&addr.0)
            .expect("ChannelNa peer address not registered in this network")
            .clone()
    }
}

/// NA backend for one endpoint of a [`ChannelNetwork`].
pub struct ChannelNa {
    network: Arc<ChannelNetwork>,
    self_addr: ChannelAddr,
    self_endpoint: Arc<Endpoint>,
    max_expected_size: usize,
    max_tag: u32,
}

impl ChannelNa {
    /// This endpoint's own address, usable as the `peer` for a loopback
    /// [`crate::Context::create`].
    pub fn self_addr(&self) -> ChannelAddr {
        self.self_addr.clone()
    }

    /// Toggle whether this endpoint reports itself as listening (mirrors an
    /// NA class created against a listening address in a real backend).
    pub fn set_listening(&self, listening: bool) {
        self.self_endpoint
            .listening
            .store(listening, Ordering::Relaxed);
    }
}

impl Na for ChannelNa {
    type Addr = ChannelAddr;

    fn max_expected_size(&self) -> usize {
        self.max_expected_size
    }

    fn max_tag(&self) -> u32 {
        self.max_tag
    }

    fn addr_is_self(&self, addr: &Self::Addr) -> bool {
        *addr == self.self_addr
    }

    fn is_listening(&self) -> bool {
        self.self_endpoint.listening.load(Ordering::Relaxed)
    }

    fn post_recv_unexpected(&self, buf: Vec<u8>, cb: NaCallback<Self::Addr>) {
        let mut tables = self.self_endpoint.tables.lock().unwrap();
        if let Some((data, source, tag)) = tables.unexpected_pending.pop_front() {
            drop(tables);
            deliver_into(buf, data, Some(source), tag, cb, &self.self_endpoint.completions);
        } else {
            tables.unexpected_waiters.push_back((buf, cb));
        }
    }

    fn post_send_unexpected(
        &self,
        buf: Vec<u8>,
        peer: Self::Addr,
        tag: u32,
        cb: NaCallback<Self::Addr>,
    ) {
        trace!("ChannelNa({:?}): unexpected send to {:?} tag {tag}", self.self_addr, peer);
        let dest = self.network.endpoint_of(&peer);
        let data = buf.clone();
        let source = self.self_addr.clone();

        let mut tables = dest.tables.lock().unwrap();
        if let Some((recv_buf, recv_cb)) = tables.unexpected_waiters.pop_front() {
            drop(tables);
            deliver_into(recv_buf, data, Some(source), tag, recv_cb, &dest.completions);
        } else {
            tables.unexpected_pending.push_back((data, source, tag));
        }

        self.self_endpoint
            .completions
            .push(Box::new(move || cb(sent_ok(buf))));
    }

    fn post_recv_expected(
        &self,
        buf: Vec<u8>,
        peer: Self::Addr,
        tag: u32,
        cb: NaCallback<Self::Addr>,
    ) {
        let mut tables = self.self_endpoint.tables.lock().unwrap();
        if let Some(data) = tables.expected_pending.remove(&(peer.clone(), tag)) {
            drop(tables);
            deliver_into(buf, data, None, tag, cb, &self.self_endpoint.completions);
        } else {
            tables.expected_waiters.insert((peer, tag), (buf, cb));
        }
    }

    fn post_send_expected(
        &self,
        buf: Vec<u8>,
        peer: Self::Addr,
        tag: u32,
        cb: NaCallback<Self::Addr>,
    ) {
        let dest = self.network.endpoint_of(&peer);
        let data = buf.clone();
        let source = self.self_addr.clone();

        let mut tables = dest.tables.lock().unwrap();
        if let Some((recv_buf, recv_cb)) = tables.expected_waiters.remove(&(source.clone(), tag)) {
            drop(tables);
            deliver_into(recv_buf, data, None, tag, recv_cb, &dest.completions);
        } else {
            tables.expected_pending.insert((source, tag), data);
        }

        self.self_endpoint
            .completions
            .push(Box::new(move || cb(sent_ok(buf))));
    }

    fn trigger(&self, max_count: usize) -> usize {
        self.self_endpoint.completions.trigger(max_count)
    }

    fn progress(&self, timeout_ms: u32) -> Result<(), NaError> {
        self.self_endpoint.completions.progress(timeout_ms)
    }
}

fn sent_ok(buf: Vec<u8>) -> NaCompletion<ChannelAddr> {
    let actual_len = buf.len();
    NaCompletion {
        buf,
        actual_len,
        source: None,
        tag: 0,
        status: Ok(()),
    }
}

fn deliver_into(
    mut into_buf: Vec<u8>,
    data: Vec<u8>,
    source: Option<ChannelAddr>,
    tag: u32,
    cb: NaCallback<ChannelAddr>,
    completions: &NaCompletionQueue,
) {
    let actual_len = data.len().min(into_buf.len());
    into_buf[..actual_len].copy_from_slice(&data[..actual_len]);
    completions.push(Box::new(move || {
        cb(NaCompletion {
            buf: into_buf,
            actual_len,
            source,
            tag,
            status: Ok(()),
        })
    }));
}
