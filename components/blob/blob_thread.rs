/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The main thread of one blob endpoint.
//!
//! Every actor of an endpoint lives on its `BlobThread`, and every protocol
//! message is sent from there. Other threads reach it through a
//! [`BlobThreadHandle`], either posting a task or posting one and blocking
//! until it has run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use base::generic_channel::{self, GenericReceiver, GenericSender};
use base::thread_state::{self, ThreadState};
use base::threadpool::ThreadPool;
use blob_traits::{
    BlobActorId, BlobConstructorParams, BlobMetadata, BlobMsg, BlobStreamId, InputStreamParams,
    RemoteInputStreamParams, ResolveMysteryParams, SlicedBlobConstructorParams, StreamError,
};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, trace, warn};
use servo_config::opts;

use crate::actor::{ActorDestroyReason, BlobActor, MysteryState};
use crate::blob::{Blob, BlobError, RemoteBlob, normalize_content_type};
use crate::cancellation::CancellationToken;
use crate::input_stream::InputStream;
use crate::one_shot::{Completer, OneShot};
use crate::open_stream::OpenStreamRunnable;
use crate::remote_stream::RemoteInputStream;
use crate::serialization::{RemoteStreamResolver, deserialize_input_stream};

pub type BlobTask = Box<dyn FnOnce(&mut BlobThread) + Send>;

pub enum BlobThreadMsg {
    /// A protocol message from the other endpoint.
    Peer(BlobMsg),
    /// Work posted from another thread.
    Task(BlobTask),
    /// The other endpoint is gone.
    PeerDisconnected,
    /// Destroy every actor, stop the stream transport pool and exit.
    Exit(Sender<()>),
}

/// Notifications for the embedder of an endpoint.
#[derive(Clone, Debug, PartialEq)]
pub enum BlobEvent {
    /// The peer constructed an actor on this side.
    BlobReceived(BlobActorId),
    MysteryResolved(BlobActorId),
    ActorDestroyed(BlobActorId, ActorDestroyReason),
    PeerDisconnected,
}

#[derive(Clone)]
pub struct BlobThreadHandle {
    sender: Sender<BlobThreadMsg>,
}

impl BlobThreadHandle {
    /// Run `task` on the blob thread.
    pub fn dispatch<F>(&self, task: F) -> Result<(), BlobError>
    where
        F: FnOnce(&mut BlobThread) + Send + 'static,
    {
        self.sender
            .send(BlobThreadMsg::Task(Box::new(task)))
            .map_err(|_| BlobError::ThreadGone)
    }

    /// Run `task` on the blob thread and wait for its result. Main threads
    /// must never wait, so calling this from one is an error.
    pub fn dispatch_and_block<F, R>(&self, task: F) -> Result<R, BlobError>
    where
        F: FnOnce(&mut BlobThread) -> R + Send + 'static,
        R: Send + 'static,
    {
        if thread_state::is_main_thread() {
            error!("Blocking on a blob thread from a main thread");
            return Err(BlobError::WrongThread);
        }
        let slot = Arc::new(OneShot::new());
        let completer = Completer::new(slot.clone());
        self.dispatch(move |thread| completer.complete(task(thread)))?;
        slot.wait_take().ok_or(BlobError::ThreadGone)
    }

    /// Shut the endpoint down and wait until it is done.
    pub fn exit(&self) -> Result<(), BlobError> {
        if thread_state::is_main_thread() {
            return Err(BlobError::WrongThread);
        }
        let (sender, receiver) = crossbeam_channel::bounded(1);
        self.sender
            .send(BlobThreadMsg::Exit(sender))
            .map_err(|_| BlobError::ThreadGone)?;
        receiver.recv().map_err(|_| BlobError::ThreadGone)
    }

    pub(crate) fn same_thread(&self, other: &BlobThreadHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

pub trait BlobThreadFactory {
    fn new(
        name: &str,
        peer_sender: GenericSender<BlobMsg>,
        peer_receiver: GenericReceiver<BlobMsg>,
        events: Option<Sender<BlobEvent>>,
    ) -> Self;
}

impl BlobThreadFactory for BlobThreadHandle {
    /// Spawn an endpoint talking to its peer over the given channels.
    fn new(
        name: &str,
        peer_sender: GenericSender<BlobMsg>,
        peer_receiver: GenericReceiver<BlobMsg>,
        events: Option<Sender<BlobEvent>>,
    ) -> BlobThreadHandle {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let handle = BlobThreadHandle { sender };

        let router = handle.sender.clone();
        thread::Builder::new()
            .name(format!("{name}Router"))
            .spawn(move || route_peer_messages(peer_receiver, router))
            .expect("Thread spawning failed");

        let thread_handle = handle.clone();
        let thread_name = name.to_owned();
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                thread_state::initialize(ThreadState::MAIN);
                BlobThread::new(thread_name, thread_handle, receiver, peer_sender, events).start();
            })
            .expect("Thread spawning failed");

        handle
    }
}

/// Create two connected endpoints. Returns `None` when the channels between
/// them cannot be created.
pub fn new_blob_thread_pair(
    parent_events: Option<Sender<BlobEvent>>,
    child_events: Option<Sender<BlobEvent>>,
) -> Option<(BlobThreadHandle, BlobThreadHandle)> {
    let (to_child, child_receiver) = generic_channel::channel()?;
    let (to_parent, parent_receiver) = generic_channel::channel()?;
    let parent = BlobThreadHandle::new("BlobParent", to_child, parent_receiver, parent_events);
    let child = BlobThreadHandle::new("BlobChild", to_parent, child_receiver, child_events);
    Some((parent, child))
}

fn route_peer_messages(receiver: GenericReceiver<BlobMsg>, sender: Sender<BlobThreadMsg>) {
    loop {
        match receiver.recv() {
            Ok(msg) => {
                if sender.send(BlobThreadMsg::Peer(msg)).is_err() {
                    return;
                }
            },
            Err(error) => {
                debug!("Blob peer channel closed: {}", error);
                let _ = sender.send(BlobThreadMsg::PeerDisconnected);
                return;
            },
        }
    }
}

/// An absolute offset from the wire as a slice offset. Offsets past
/// `i64::MAX` are past the end of any blob.
fn wire_offset(offset: u64) -> Option<i64> {
    Some(i64::try_from(offset).unwrap_or(i64::MAX))
}

/// A stream requested from the peer and not answered yet.
struct PendingStream {
    actor: BlobActorId,
    stream: Weak<RemoteInputStream>,
}

pub struct BlobThread {
    name: String,
    handle: BlobThreadHandle,
    receiver: Receiver<BlobThreadMsg>,
    peer: GenericSender<BlobMsg>,
    peer_connected: bool,
    events: Option<Sender<BlobEvent>>,
    actors: HashMap<BlobActorId, BlobActor>,
    pending_streams: HashMap<BlobStreamId, PendingStream>,
    /// The stream transport service.
    pool: ThreadPool,
    /// Served streams that have not been closed yet.
    in_flight: Arc<AtomicUsize>,
    responses_sent: usize,
}

impl BlobThread {
    fn new(
        name: String,
        handle: BlobThreadHandle,
        receiver: Receiver<BlobThreadMsg>,
        peer: GenericSender<BlobMsg>,
        events: Option<Sender<BlobEvent>>,
    ) -> BlobThread {
        let pool = ThreadPool::new(
            opts::get().stream_transport_threads,
            format!("{name}StreamTransport"),
        );
        BlobThread {
            name,
            handle,
            receiver,
            peer,
            peer_connected: true,
            events,
            actors: HashMap::new(),
            pending_streams: HashMap::new(),
            pool,
            in_flight: Arc::new(AtomicUsize::new(0)),
            responses_sent: 0,
        }
    }

    fn start(&mut self) {
        while let Ok(msg) = self.receiver.recv() {
            match msg {
                BlobThreadMsg::Peer(msg) => self.handle_peer_msg(msg),
                BlobThreadMsg::Task(task) => task(self),
                BlobThreadMsg::PeerDisconnected => self.handle_peer_disconnected(),
                BlobThreadMsg::Exit(sender) => {
                    self.shutdown();
                    let _ = sender.send(());
                    return;
                },
            }
        }
    }

    fn handle_peer_msg(&mut self, msg: BlobMsg) {
        match msg {
            BlobMsg::Constructor { actor, params } => self.recv_constructor(actor, params),
            BlobMsg::ResolveMystery { actor, params } => self.recv_resolve_mystery(actor, params),
            BlobMsg::StreamConstructor { actor, stream } => {
                self.recv_stream_constructor(actor, stream)
            },
            BlobMsg::StreamDelete {
                actor,
                stream,
                result,
            } => self.recv_stream_delete(actor, stream, result),
            BlobMsg::Delete { actor } => {
                debug!("{}: peer deleted {}", self.name, actor);
                self.actor_destroy(actor, ActorDestroyReason::Deletion);
            },
        }
    }

    fn send_to_peer(&self, msg: BlobMsg) -> Result<(), BlobError> {
        if !self.peer_connected {
            return Err(BlobError::PeerGone);
        }
        self.peer.send(msg).map_err(|error| {
            warn!("{}: could not reach peer: {}", self.name, error);
            BlobError::PeerGone
        })
    }

    fn notify(&self, event: BlobEvent) {
        if let Some(ref events) = self.events {
            let _ = events.send(event);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> BlobThreadHandle {
        self.handle.clone()
    }

    pub(crate) fn spawn_io<F>(&self, work: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(work)
    }

    /// Send a blob to the peer and return the identity of its actor.
    pub fn send_blob(&mut self, blob: &Arc<Blob>) -> Result<BlobActorId, BlobError> {
        if let Some(remote) = blob.as_remote() {
            if remote.belongs_to(&self.handle) {
                // The bytes already live on the peer, behind this actor.
                return remote.actor_id().ok_or(BlobError::ActorGone);
            }
        }
        let params = match blob.metadata() {
            Some(metadata) => BlobConstructorParams::from_metadata(&metadata),
            None => BlobConstructorParams::Mystery,
        };
        self.construct_local_actor(blob, params)
    }

    /// Send a blob without its metadata. The peer learns it from
    /// [`BlobThread::set_mystery_blob_info`].
    pub fn send_mystery_blob(&mut self, blob: &Arc<Blob>) -> Result<BlobActorId, BlobError> {
        self.construct_local_actor(blob, BlobConstructorParams::Mystery)
    }

    fn construct_local_actor(
        &mut self,
        blob: &Arc<Blob>,
        params: BlobConstructorParams,
    ) -> Result<BlobActorId, BlobError> {
        let actor = BlobActorId::new();
        let mystery = matches!(params, BlobConstructorParams::Mystery);
        self.send_to_peer(BlobMsg::Constructor { actor, params })?;
        debug!("{}: constructed {} (mystery: {})", self.name, actor, mystery);
        self.actors
            .insert(actor, BlobActor::new_local(actor, blob.clone(), mystery));
        Ok(actor)
    }

    fn create_remote_blob(&mut self, actor: BlobActorId, metadata: Option<BlobMetadata>) {
        let blob = Blob::new(
            metadata,
            Box::new(RemoteBlob::new(actor, self.handle.clone())),
        );
        self.actors
            .insert(actor, BlobActor::new_remote(actor, blob));
    }

    /// The blob behind `actor`. The first call for a received blob hands its
    /// ownership to the caller.
    pub fn get_blob(&mut self, actor: BlobActorId) -> Option<Arc<Blob>> {
        self.actors.get_mut(&actor)?.get_blob()
    }

    /// Provide the metadata of a mystery blob and tell the peer. Only the
    /// side holding the bytes may do this. Returns false if the blob is not
    /// an unresolved mystery sent from here, or the peer is gone.
    pub fn set_mystery_blob_info(&mut self, actor: BlobActorId, metadata: BlobMetadata) -> bool {
        let blob = match self.actors.get(&actor) {
            Some(blob_actor) if blob_actor.is_remote() => {
                error!(
                    "{}: {} can only be resolved by the side holding its bytes",
                    self.name, actor
                );
                return false;
            },
            Some(blob_actor) if blob_actor.mystery_state() == MysteryState::Pending => {
                blob_actor.blob()
            },
            Some(_) => {
                warn!("{}: {} is not an unresolved mystery blob", self.name, actor);
                return false;
            },
            None => {
                warn!("{}: no actor {} to resolve", self.name, actor);
                return false;
            },
        };
        let params = ResolveMysteryParams::from_metadata(&metadata);
        if self
            .send_to_peer(BlobMsg::ResolveMystery { actor, params })
            .is_err()
        {
            return false;
        }
        if let Some(blob) = blob.filter(|blob| blob.is_mystery()) {
            let _ = blob.set_lazy_data(metadata.clone());
        }
        if let Some(blob_actor) = self.actors.get_mut(&actor) {
            blob_actor.mark_resolved(&metadata);
        }
        true
    }

    /// Slice a blob. Remote blobs of this endpoint are sliced by the peer.
    pub fn slice_blob(
        &mut self,
        blob: &Arc<Blob>,
        start: Option<i64>,
        end: Option<i64>,
        content_type: Option<&str>,
    ) -> Result<Arc<Blob>, BlobError> {
        match blob.as_remote() {
            Some(remote) if remote.belongs_to(&self.handle) => {
                let actor = remote.actor_id().ok_or(BlobError::ActorGone)?;
                let (start, length) = blob.relative_range(start, end)?;
                self.create_remote_slice(
                    actor,
                    start,
                    start + length,
                    normalize_content_type(content_type),
                )
            },
            _ => blob.slice(start, end, content_type),
        }
    }

    /// Construct a slice of the blob behind `source` on the side holding its
    /// bytes, and return the new blob on this side. The range is clamped to
    /// the source the same way the peer clamps it.
    pub(crate) fn create_remote_slice(
        &mut self,
        source: BlobActorId,
        begin: u64,
        end: u64,
        content_type: String,
    ) -> Result<Arc<Blob>, BlobError> {
        let source_actor = self
            .actors
            .get(&source)
            .ok_or(BlobError::UnknownActor(source))?;
        let source_is_remote = source_actor.is_remote();
        let source_blob = source_actor.blob().ok_or(BlobError::ActorGone)?;
        if !source_is_remote {
            return source_blob.slice(
                wire_offset(begin),
                wire_offset(end),
                Some(&content_type),
            );
        }
        let size = source_blob.size().ok_or(BlobError::Mystery)?;
        let end = end.min(size);
        let begin = begin.min(end);
        let actor = BlobActorId::new();
        let length = end - begin;
        let params = BlobConstructorParams::Sliced(SlicedBlobConstructorParams {
            begin,
            end,
            content_type: content_type.clone(),
            source,
        });
        self.send_to_peer(BlobMsg::Constructor { actor, params })?;
        debug!(
            "{}: constructed slice {} of {} ({} bytes)",
            self.name, actor, source, length
        );
        self.create_remote_blob(actor, Some(BlobMetadata::new(&content_type, length)));
        self.get_blob(actor).ok_or(BlobError::ActorGone)
    }

    /// Ask the peer for the bytes behind `actor`, to be delivered to `stream`.
    pub(crate) fn request_stream(&mut self, actor: BlobActorId, stream: &Arc<RemoteInputStream>) {
        if !self.actors.contains_key(&actor) {
            let _ = stream.fail(StreamError::ActorDestroyed);
            return;
        }
        let stream_id = BlobStreamId::new();
        if self
            .send_to_peer(BlobMsg::StreamConstructor {
                actor,
                stream: stream_id,
            })
            .is_err()
        {
            let _ = stream.fail(StreamError::PeerGone);
            return;
        }
        debug!("{}: requested {} for {}", self.name, stream_id, actor);
        self.pending_streams.insert(
            stream_id,
            PendingStream {
                actor,
                stream: Arc::downgrade(stream),
            },
        );
    }

    fn recv_constructor(&mut self, actor: BlobActorId, params: BlobConstructorParams) {
        if self.actors.contains_key(&actor) {
            error!("{}: {} constructed twice", self.name, actor);
            return;
        }
        match params {
            BlobConstructorParams::Sliced(params) => self.recv_sliced_constructor(actor, params),
            params => {
                debug!("{}: received {} ({:?})", self.name, actor, params);
                self.create_remote_blob(actor, params.metadata());
                self.notify(BlobEvent::BlobReceived(actor));
            },
        }
    }

    fn recv_sliced_constructor(&mut self, actor: BlobActorId, params: SlicedBlobConstructorParams) {
        let source = self
            .actors
            .get(&params.source)
            .filter(|source| !source.is_remote())
            .and_then(BlobActor::blob);
        let slice = match source {
            Some(source) => source.slice(
                wire_offset(params.begin),
                wire_offset(params.end),
                Some(&params.content_type),
            ),
            None => Err(BlobError::UnknownActor(params.source)),
        };
        match slice {
            Ok(slice) => {
                debug!("{}: sliced {} into {}", self.name, params.source, actor);
                self.actors
                    .insert(actor, BlobActor::new_local(actor, slice, false));
                self.notify(BlobEvent::BlobReceived(actor));
            },
            Err(error) => {
                warn!("{}: cannot slice {}: {}", self.name, params.source, error);
                let _ = self.send_to_peer(BlobMsg::Delete { actor });
            },
        }
    }

    fn recv_resolve_mystery(&mut self, actor: BlobActorId, params: ResolveMysteryParams) {
        let metadata = params.into_metadata();
        let Some(blob_actor) = self.actors.get_mut(&actor) else {
            warn!("{}: mystery resolution for unknown {}", self.name, actor);
            return;
        };
        if !blob_actor.is_remote() {
            error!("{}: peer tried to resolve {}, whose bytes live here", self.name, actor);
            return;
        }
        if blob_actor.mystery_state() != MysteryState::Pending {
            error!("{}: {} was already resolved", self.name, actor);
            return;
        }
        if let Some(blob) = blob_actor.blob().filter(|blob| blob.is_mystery()) {
            let _ = blob.set_lazy_data(metadata.clone());
        }
        blob_actor.mark_resolved(&metadata);
        debug!("{}: resolved {} as {:?}", self.name, actor, metadata);
        self.notify(BlobEvent::MysteryResolved(actor));
    }

    fn recv_stream_constructor(&mut self, actor: BlobActorId, stream_id: BlobStreamId) {
        let blob = match self.actors.get(&actor) {
            Some(blob_actor) if blob_actor.is_remote() => None,
            Some(blob_actor) => Some(blob_actor.blob().ok_or(BlobError::ActorGone)),
            None => Some(Err(BlobError::UnknownActor(actor))),
        };
        let Some(blob) = blob else {
            // The bytes live on the peer already. Point it at its own blob
            // instead of wrapping our proxy around it.
            let params = InputStreamParams::RemoteInputStream(RemoteInputStreamParams { actor });
            self.send_stream_response(actor, stream_id, Ok(params));
            return;
        };
        let stream = match blob.and_then(|blob| blob.get_internal_stream()) {
            Ok(stream) => stream,
            Err(error) => {
                warn!("{}: cannot open {} for {}: {}", self.name, stream_id, actor, error);
                self.send_stream_response(actor, stream_id, Err(error.into()));
                return;
            },
        };
        let token = CancellationToken::new();
        if let Some(blob_actor) = self.actors.get_mut(&actor) {
            blob_actor.track(stream_id, token.clone());
        }
        OpenStreamRunnable::new(
            actor,
            stream_id,
            stream,
            token,
            self.handle.clone(),
            self.in_flight.clone(),
        )
        .dispatch(self);
    }

    /// Answer a stream request. Consumes the request on this side.
    pub(crate) fn send_stream_response(
        &mut self,
        actor: BlobActorId,
        stream_id: BlobStreamId,
        result: Result<InputStreamParams, StreamError>,
    ) {
        if let Some(blob_actor) = self.actors.get_mut(&actor) {
            blob_actor.untrack(stream_id);
        }
        trace!("{}: answering {} with {:?}", self.name, stream_id, result);
        let msg = BlobMsg::StreamDelete {
            actor,
            stream: stream_id,
            result,
        };
        if self.send_to_peer(msg).is_ok() {
            self.responses_sent += 1;
        }
    }

    fn recv_stream_delete(
        &mut self,
        actor: BlobActorId,
        stream_id: BlobStreamId,
        result: Result<InputStreamParams, StreamError>,
    ) {
        let Some(pending) = self.pending_streams.remove(&stream_id) else {
            warn!("{}: response for unknown {}", self.name, stream_id);
            return;
        };
        if pending.actor != actor {
            warn!(
                "{}: {} answered by {} instead of {}",
                self.name, stream_id, actor, pending.actor
            );
        }
        let Some(stream) = pending.stream.upgrade() else {
            debug!("{}: nobody is waiting for {} anymore", self.name, stream_id);
            return;
        };
        let result = match result {
            Ok(params) => deserialize_input_stream(params, self),
            Err(error) => Err(error),
        };
        let outcome = match result {
            Ok(real) => stream.set_stream(real),
            Err(error) => stream.fail(error),
        };
        if let Err(error) = outcome {
            error!("{}: could not deliver {}: {}", self.name, stream_id, error);
        }
    }

    /// Delete an actor on both sides. Returns how many open-stream tasks were
    /// revoked, or `None` for an unknown actor.
    pub fn delete_actor(&mut self, actor: BlobActorId) -> Option<usize> {
        if !self.actors.contains_key(&actor) {
            return None;
        }
        if let Err(error) = self.send_to_peer(BlobMsg::Delete { actor }) {
            debug!("{}: peer not told about deleting {}: {}", self.name, actor, error);
        }
        self.actor_destroy(actor, ActorDestroyReason::Deletion)
    }

    /// Called when the last reference to a received blob goes away.
    pub(crate) fn note_dying_remote_blob(&mut self, actor: BlobActorId) {
        debug!("{}: remote blob of {} died", self.name, actor);
        self.delete_actor(actor);
    }

    /// Tear an actor down on this side only. Returns how many open-stream
    /// tasks were revoked, or `None` for an unknown actor.
    pub fn actor_destroy(&mut self, actor: BlobActorId, why: ActorDestroyReason) -> Option<usize> {
        let mut blob_actor = self.actors.remove(&actor)?;
        let revoked = blob_actor.revoke_all();
        debug!(
            "{}: destroying {} ({:?}), revoked {} open streams",
            self.name, actor, why, revoked
        );
        if blob_actor.is_remote() {
            if let Some(blob) = blob_actor.blob() {
                if let Some(remote) = blob.as_remote() {
                    remote.clear_actor();
                }
            }
        }
        drop(blob_actor);
        self.fail_pending_streams(
            |pending| pending.actor == actor,
            StreamError::ActorDestroyed,
        );
        self.notify(BlobEvent::ActorDestroyed(actor, why));
        Some(revoked)
    }

    fn fail_pending_streams(
        &mut self,
        filter: impl Fn(&PendingStream) -> bool,
        error: StreamError,
    ) {
        self.pending_streams.retain(|_, pending| {
            if !filter(pending) {
                return true;
            }
            if let Some(stream) = pending.stream.upgrade() {
                let _ = stream.fail(error.clone());
            }
            false
        });
    }

    fn destroy_all_actors(&mut self, why: ActorDestroyReason) {
        let actors: Vec<BlobActorId> = self.actors.keys().copied().collect();
        for actor in actors {
            self.actor_destroy(actor, why);
        }
        self.fail_pending_streams(|_| true, StreamError::PeerGone);
    }

    fn handle_peer_disconnected(&mut self) {
        warn!("{}: peer disconnected", self.name);
        self.peer_connected = false;
        self.destroy_all_actors(ActorDestroyReason::AbnormalShutdown);
        self.notify(BlobEvent::PeerDisconnected);
    }

    fn shutdown(&mut self) {
        debug!("{}: shutting down", self.name);
        self.destroy_all_actors(ActorDestroyReason::Shutdown);
        self.pool.exit();
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn has_actor(&self, actor: BlobActorId) -> bool {
        self.actors.contains_key(&actor)
    }

    pub fn actor_is_file(&self, actor: BlobActorId) -> Option<bool> {
        self.actors.get(&actor).map(BlobActor::is_file)
    }

    /// Whether the actor still keeps its blob alive by itself.
    pub fn actor_owns_blob(&self, actor: BlobActorId) -> Option<bool> {
        self.actors.get(&actor).map(BlobActor::owns_blob)
    }

    pub fn open_stream_task_count(&self, actor: BlobActorId) -> Option<usize> {
        self.actors.get(&actor).map(BlobActor::task_count)
    }

    pub fn pending_stream_count(&self) -> usize {
        self.pending_streams.len()
    }

    /// How many stream responses this endpoint has sent.
    pub fn responses_sent(&self) -> usize {
        self.responses_sent
    }

    /// Served streams whose close step has not run yet.
    pub fn in_flight_open_streams(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl RemoteStreamResolver for BlobThread {
    fn resolve_remote_stream(
        &mut self,
        actor: BlobActorId,
    ) -> Result<Arc<dyn InputStream>, StreamError> {
        let blob_actor = self
            .actors
            .get(&actor)
            .ok_or(StreamError::UnknownActor(actor))?;
        if blob_actor.is_remote() {
            error!(
                "{}: {} refers back to the peer, refusing to proxy it again",
                self.name, actor
            );
            return Err(StreamError::ProxyCycle);
        }
        let blob = blob_actor.blob().ok_or(StreamError::ActorDestroyed)?;
        Ok(blob.get_internal_stream()?)
    }
}
