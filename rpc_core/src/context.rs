// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Per-thread runtime workspace bound to one [`Class`]: the completion
//! queue and the processing-list backlog live here, each behind its own
//! synchronization primitive.

use std::sync::Arc;

use crate::class::Class;
use crate::error::Error;
use crate::handle::Handle;
use crate::listen::ProcessingList;
use crate::na::Na;
use crate::queue::CompletionQueue;

pub struct Context<N: Na> {
    class: Arc<Class<N>>,
    pub(crate) completions: CompletionQueue<N>,
    pub(crate) processing: ProcessingList<N>,
}

impl<N: Na> Context<N> {
    pub(crate) fn create(class: Arc<Class<N>>) -> Result<Arc<Self>, Error> {
        Ok(Arc::new(Self {
            class,
            completions: CompletionQueue::new(),
            processing: ProcessingList::new(),
        }))
    }

    pub fn class(&self) -> &Arc<Class<N>> {
        &self.class
    }

    /// Create a handle bound to this context, optionally addressed to `peer`.
    pub fn create_handle(self: &Arc<Self>, peer: Option<N::Addr>, id: u32) -> Result<Handle<N>, Error> {
        Handle::create(self.clone(), peer, id)
    }

    /// Only valid once both queues are drained.
    pub fn destroy(self: Arc<Self>) -> Result<(), Error> {
        if self.completions.len() > 0 {
            return Err(Error::InvalidParam(
                "context has undispatched completions",
            ));
        }
        if self.processing.len() > 0 {
            return Err(Error::InvalidParam("context has a pending listen backlog"));
        }
        Ok(())
    }
}
