/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Serving one stream request.
//!
//! A request moves between the blob thread and the stream transport pool:
//! the stream is forced open on the pool, described and sent back on the
//! blob thread, and finally closed on the pool again. Destroying the actor
//! revokes the request; the pool steps still run but nothing is sent.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use blob_traits::{BlobActorId, BlobStreamId, InputStreamParams, StreamError};
use log::{debug, warn};

use crate::blob_thread::{BlobThread, BlobThreadHandle};
use crate::cancellation::CancellationToken;
use crate::input_stream::InputStream;
use crate::serialization::serialize_input_stream;

/// Owns the stream being served. Dropping it closes the stream, so the
/// stream is closed even when a step never gets to run.
struct StreamCloser {
    stream: Arc<dyn InputStream>,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for StreamCloser {
    fn drop(&mut self) {
        if let Err(error) = self.stream.close() {
            debug!("Closing served stream failed: {}", error);
        }
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) struct OpenStreamRunnable {
    actor: BlobActorId,
    stream_id: BlobStreamId,
    token: CancellationToken,
    handle: BlobThreadHandle,
    closer: StreamCloser,
}

impl OpenStreamRunnable {
    pub(crate) fn new(
        actor: BlobActorId,
        stream_id: BlobStreamId,
        stream: Arc<dyn InputStream>,
        token: CancellationToken,
        handle: BlobThreadHandle,
        in_flight: Arc<AtomicUsize>,
    ) -> OpenStreamRunnable {
        in_flight.fetch_add(1, Ordering::AcqRel);
        OpenStreamRunnable {
            actor,
            stream_id,
            token,
            handle,
            closer: StreamCloser { stream, in_flight },
        }
    }

    /// Runs on the blob thread.
    pub(crate) fn dispatch(self, thread: &BlobThread) {
        debug!("Opening {} for {}", self.stream_id, self.actor);
        if !thread.spawn_io(move || self.open()) {
            warn!("Stream transport pool is gone, dropping stream request");
        }
    }

    /// Runs on the pool.
    fn open(self) {
        if self.token.is_revoked() {
            debug!("{} was revoked before opening", self.stream_id);
            return;
        }
        // A proxy for another actor is unwrapped here so the peer never
        // receives a chain of proxies.
        let stream = match self.closer.stream.as_remote() {
            Some(remote) if remote.actor_id() != self.actor => remote.block_and_get_internal_stream(),
            _ => Ok(self.closer.stream.clone()),
        };
        // Forces lazily opened streams to open. The value itself is unused.
        let opened = stream.and_then(|stream| stream.available().map(|_| stream));
        let handle = self.handle.clone();
        if handle
            .dispatch(move |thread| self.send(thread, opened))
            .is_err()
        {
            warn!("Blob thread is gone, stream response dropped");
        }
    }

    /// Runs on the blob thread.
    fn send(self, thread: &mut BlobThread, opened: Result<Arc<dyn InputStream>, StreamError>) {
        if self.token.is_revoked() {
            debug!("{} was revoked, not sending a response", self.stream_id);
        } else {
            let result: Result<InputStreamParams, StreamError> =
                opened.and_then(|stream| serialize_input_stream(&*stream));
            thread.send_stream_response(self.actor, self.stream_id, result);
        }
        let closer = self.closer;
        if !thread.spawn_io(move || drop(closer)) {
            warn!("Stream transport pool is gone, closing on the blob thread");
        }
    }
}
