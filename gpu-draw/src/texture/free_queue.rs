//! Deferred texture frees
//!
//! Backend textures may only be destroyed on the thread that owns the
//! context. Other threads (image loaders, undo, file reload) enqueue frees
//! through a [`FreeQueueHandle`]; the owner drains them once per frame.
//!
//! ```text
//! Loader Thread                      Draw Thread
//!     │                                  │
//! [Image replaced]                       │
//!     │                                  │
//! [free_image]────(channel)────►[flush_pending_frees]
//!                                    [delete_texture]
//! ```

use std::sync::mpsc::{self, Receiver, Sender};

use gpu_scene::{ImageId, SmokeId};

/// A free requested from another thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FreeRequest {
    Image(ImageId),
    Smoke(SmokeId),
}

/// Sending side of the free queue, cheap to clone and `Send`
#[derive(Debug, Clone)]
pub struct FreeQueueHandle {
    tx: Sender<FreeRequest>,
}

impl FreeQueueHandle {
    /// Queue all textures of an image for deletion
    pub fn free_image(&self, image: ImageId) {
        self.send(FreeRequest::Image(image));
    }

    /// Queue the textures of a smoke domain for deletion
    pub fn free_smoke(&self, smoke: SmokeId) {
        self.send(FreeRequest::Smoke(smoke));
    }

    fn send(&self, request: FreeRequest) {
        // The cache is gone, and its textures with it
        if self.tx.send(request).is_err() {
            tracing::trace!(?request, "free queue closed, dropping request");
        }
    }
}

/// Receiving side, owned by the texture cache
#[derive(Debug)]
pub(crate) struct FreeQueue {
    tx: Sender<FreeRequest>,
    rx: Receiver<FreeRequest>,
}

impl FreeQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub(crate) fn handle(&self) -> FreeQueueHandle {
        FreeQueueHandle {
            tx: self.tx.clone(),
        }
    }

    /// Everything queued so far, without blocking
    pub(crate) fn drain(&self) -> Vec<FreeRequest> {
        self.rx.try_iter().collect()
    }
}
