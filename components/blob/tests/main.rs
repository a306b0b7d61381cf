/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

mod actors;
mod streams;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use blob::{
    Blob, BlobError, BlobEvent, BlobImpl, BlobThreadHandle, InputStream, SerializableStream,
    StringInputStream, new_blob_thread_pair,
};
use blob_traits::{BlobActorId, BlobMetadata, StreamError};
use crossbeam_channel::Receiver;
use parking_lot::{Condvar, Mutex};

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct Pair {
    pub parent: BlobThreadHandle,
    pub child: BlobThreadHandle,
    pub parent_events: Receiver<BlobEvent>,
    pub child_events: Receiver<BlobEvent>,
}

pub fn new_pair() -> Pair {
    let _ = env_logger::builder().is_test(true).try_init();
    let (parent_sender, parent_events) = crossbeam_channel::unbounded();
    let (child_sender, child_events) = crossbeam_channel::unbounded();
    let (parent, child) = new_blob_thread_pair(Some(parent_sender), Some(child_sender)).unwrap();
    Pair {
        parent,
        child,
        parent_events,
        child_events,
    }
}

/// Skip events until one matches.
pub fn wait_for_event(events: &Receiver<BlobEvent>, matches: impl Fn(&BlobEvent) -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if matches(&event) => return,
            Ok(_) => continue,
            Err(error) => panic!("Expected blob event never arrived: {error}"),
        }
    }
}

pub fn poll_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "Condition never became true");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Send `blob` from the parent and return the child's copy.
pub fn share(pair: &Pair, blob: &Arc<Blob>) -> (BlobActorId, Arc<Blob>) {
    let sent = blob.clone();
    let actor = pair
        .parent
        .dispatch_and_block(move |thread| thread.send_blob(&sent))
        .unwrap()
        .unwrap();
    wait_for_event(&pair.child_events, |event| {
        *event == BlobEvent::BlobReceived(actor)
    });
    let received = pair
        .child
        .dispatch_and_block(move |thread| thread.get_blob(actor))
        .unwrap()
        .unwrap();
    (actor, received)
}

#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    condvar: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock() = true;
        self.condvar.notify_all();
    }

    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.condvar.wait(&mut open);
        }
    }
}

/// A memory blob whose streams cannot be opened until the gate opens.
struct GatedBlob {
    bytes: Vec<u8>,
    gate: Arc<Gate>,
}

impl BlobImpl for GatedBlob {
    fn get_internal_stream(&self, _: &Arc<Blob>) -> Result<Arc<dyn InputStream>, BlobError> {
        Ok(Arc::new(GatedStream {
            inner: StringInputStream::new(self.bytes.clone()),
            gate: self.gate.clone(),
        }))
    }

    fn create_slice(
        &self,
        _: &Arc<Blob>,
        start: u64,
        length: u64,
        content_type: String,
    ) -> Result<Arc<Blob>, BlobError> {
        let start = start as usize;
        let bytes = self.bytes[start..start + length as usize].to_vec();
        Ok(Blob::from_bytes(bytes, &content_type))
    }
}

struct GatedStream {
    inner: StringInputStream,
    gate: Arc<Gate>,
}

impl InputStream for GatedStream {
    fn read(&self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.inner.read(buf)
    }

    fn available(&self) -> Result<u64, StreamError> {
        self.gate.wait();
        self.inner.available()
    }

    fn close(&self) -> Result<(), StreamError> {
        self.inner.close()
    }

    fn serializable(&self) -> Option<&dyn SerializableStream> {
        self.inner.serializable()
    }
}

pub fn gated_blob(bytes: &[u8], gate: Arc<Gate>) -> Arc<Blob> {
    Blob::new(
        Some(BlobMetadata::new("text/plain", bytes.len() as u64)),
        Box::new(GatedBlob {
            bytes: bytes.to_vec(),
            gate,
        }),
    )
}
