// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The process-level runtime anchor.

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use crate::context::Context;
use crate::error::Error;
use crate::na::Na;
use crate::registry::{DataDeleter, FunctionRegistry, RpcHandler};
use crate::tag::TagAllocator;

/// Owns the registry, tag allocator, and the NA endpoint this runtime is
/// layered on top of. Created by [`Class::init`], torn down by
/// [`Class::finalize`] (or simply by dropping the last `Arc`).
pub struct Class<N: Na> {
    na: N,
    registry: Mutex<FunctionRegistry<N>>,
    tags: TagAllocator,
    cookies: AtomicU32,
}

impl<N: Na> Class<N> {
    /// Initialize a runtime anchored on `na`. Bulk transfer is not part of
    /// this core, so there is no corresponding parameter here.
    pub fn init(na: N) -> Result<Arc<Self>, Error> {
        let max_tag = na.max_tag();
        Ok(Arc::new(Self {
            na,
            registry: Mutex::new(FunctionRegistry::new()),
            tags: TagAllocator::new(max_tag),
            cookies: AtomicU32::new(0),
        }))
    }

    /// Explicit teardown; dropping the last `Arc<Class<N>>` has the same
    /// effect once every `Context` is gone.
    pub fn finalize(self: Arc<Self>) {
        drop(self)
    }

    pub fn na(&self) -> &N {
        &self.na
    }

    pub(crate) fn next_cookie(&self) -> u32 {
        self.cookies.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_tag(&self) -> u32 {
        self.tags.next_tag()
    }

    pub fn register_rpc(&self, name: &str, handler: RpcHandler<N>) -> Result<u32, Error> {
        self.registry.lock().unwrap().register(name, handler)
    }

    pub fn registered_rpc(&self, name: &str) -> (bool, u32) {
        self.registry.lock().unwrap().registered(name)
    }

    pub fn register_data(
        &self,
        id: u32,
        data: Box<dyn Any + Send>,
        deleter: Option<DataDeleter>,
    ) -> Result<(), Error> {
        self.registry.lock().unwrap().attach_data(id, data, deleter)
    }

    /// Run `f` against the user data attached to `id`, if any is attached.
    /// Borrows the registry lock for the duration of `f` instead of handing
    /// back a reference that would outlive the lock.
    pub fn registered_data<R>(&self, id: u32, f: impl FnOnce(Option<&(dyn Any + Send)>) -> R) -> R {
        let reg = self.registry.lock().unwrap();
        f(reg.lookup_data(id))
    }

    pub(crate) fn dispatch(&self, id: u32, handle: crate::handle::Handle<N>) -> Result<(), Error> {
        self.registry.lock().unwrap().dispatch(id, handle)
    }

    pub fn context_create(self: &Arc<Self>) -> Result<Arc<Context<N>>, Error> {
        Context::create(self.clone())
    }
}
