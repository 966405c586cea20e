// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! RPC function registry.
//!
//! An id is `hash(name)` truncated to `u32`: functions are keyed by a
//! numeric id computed up front, just like any procedure dispatch table
//! keyed by a precomputed index. A bare hash risks collisions between two
//! distinct names, so each entry also stores its full name; a lookup by id
//! confirms the name before returning a match, and a colliding `register`
//! call is rejected rather than silently shadowing the existing entry.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::error::Error;
use crate::handle::Handle;
use crate::na::Na;

/// A registered RPC handler. Receives the server-side handle for the call;
/// it reads the request via [`Handle::get_input_buf`], fills
/// [`Handle::get_output_buf`], and calls `respond_buf` itself, synchronously
/// or from another thread.
pub type RpcHandler<N> = Box<dyn Fn(Handle<N>) + Send + Sync>;

/// Optional per-destruction-time hook attached to user data via
/// `register_data`/`attach_data`.
pub type DataDeleter = Box<dyn FnOnce(Box<dyn std::any::Any + Send>) + Send>;

struct Entry<N: Na> {
    name: String,
    handler: RpcHandler<N>,
    data: Option<Box<dyn std::any::Any + Send>>,
    deleter: Option<DataDeleter>,
}

/// Maps RPC names to numeric ids and dispatches to registered handlers.
pub(crate) struct FunctionRegistry<N: Na> {
    entries: HashMap<u32, Entry<N>>,
}

/// `hash(name)` truncated to 32 bits.
pub fn hash_name(name: &str) -> u32 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish() as u32
}

impl<N: Na> FunctionRegistry<N> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register `name` with `handler`, returning its id. Errors if `name`
    /// is already registered, or if a different name collides on the same
    /// id.
    pub(crate) fn register(&mut self, name: &str, handler: RpcHandler<N>) -> Result<u32, Error> {
        let id = hash_name(name);
        if let Some(existing) = self.entries.get(&id) {
            return if existing.name == name {
                Err(Error::InvalidParam("RPC name already registered"))
            } else {
                Err(Error::InvalidParam("RPC id collides with a different name"))
            };
        }
        self.entries.insert(
            id,
            Entry {
                name: name.to_string(),
                handler,
                data: None,
                deleter: None,
            },
        );
        Ok(id)
    }

    /// Look up whether `name` is registered, and its id if so.
    pub(crate) fn registered(&self, name: &str) -> (bool, u32) {
        let id = hash_name(name);
        match self.entries.get(&id) {
            Some(e) if e.name == name => (true, id),
            _ => (false, 0),
        }
    }

    /// Attach opaque user data (and optional deleter) to an already
    /// registered id.
    pub(crate) fn attach_data(
        &mut self,
        id: u32,
        data: Box<dyn std::any::Any + Send>,
        deleter: Option<DataDeleter>,
    ) -> Result<(), Error> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(Error::InvalidParam("unknown RPC id"))?;
        entry.data = Some(data);
        entry.deleter = deleter;
        Ok(())
    }

    /// Borrow the user data previously attached to `id`, if any.
    pub(crate) fn lookup_data(&self, id: u32) -> Option<&(dyn std::any::Any + Send)> {
        self.entries.get(&id).and_then(|e| e.data.as_deref())
    }

    /// Dispatch `handle` to the handler registered under `id`.
    pub(crate) fn dispatch(&self, id: u32, handle: Handle<N>) -> Result<(), Error> {
        let entry = self.entries.get(&id).ok_or(Error::NoMatch)?;
        (entry.handler)(handle);
        Ok(())
    }
}

impl<N: Na> Drop for FunctionRegistry<N> {
    fn drop(&mut self) {
        for (_, mut entry) in self.entries.drain() {
            if let (Some(deleter), Some(data)) = (entry.deleter.take(), entry.data.take()) {
                deleter(data);
            }
        }
    }
}
