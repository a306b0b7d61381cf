/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cmp::{max, min};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::UNIX_EPOCH;

use base::thread_state;
use blob_traits::{BlobActorId, BlobMetadata, StreamError};
use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::blob_thread::BlobThreadHandle;
use crate::file_stream::FileInputStream;
use crate::input_stream::{self, InputStream};
use crate::multiplex_stream::MultiplexInputStream;
use crate::remote_stream::RemoteInputStream;
use crate::string_stream::StringInputStream;

#[derive(Clone, Debug, PartialEq)]
pub enum BlobError {
    /// The blob's metadata is not known yet.
    Mystery,
    /// The metadata of a mystery blob was already provided.
    AlreadyResolved,
    /// The operation is not allowed on the calling thread.
    WrongThread,
    /// The actor behind a remote blob has been destroyed.
    ActorGone,
    UnknownActor(BlobActorId),
    /// The other endpoint could not be reached.
    PeerGone,
    /// The blob thread has exited.
    ThreadGone,
    /// Reading the blob failed. No partial data is returned.
    NotReadable,
    Stream(StreamError),
    Io(String),
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::Mystery => write!(f, "blob metadata is not known yet"),
            BlobError::AlreadyResolved => write!(f, "blob metadata was already resolved"),
            BlobError::WrongThread => write!(f, "operation not allowed on this thread"),
            BlobError::ActorGone => write!(f, "blob actor is gone"),
            BlobError::UnknownActor(actor) => write!(f, "unknown blob actor {actor}"),
            BlobError::PeerGone => write!(f, "peer endpoint is gone"),
            BlobError::ThreadGone => write!(f, "blob thread is gone"),
            BlobError::NotReadable => write!(f, "could not read blob"),
            BlobError::Stream(error) => write!(f, "stream error: {error}"),
            BlobError::Io(reason) => write!(f, "i/o error: {reason}"),
        }
    }
}

impl From<StreamError> for BlobError {
    fn from(error: StreamError) -> Self {
        BlobError::Stream(error)
    }
}

impl From<BlobError> for StreamError {
    fn from(error: BlobError) -> Self {
        match error {
            BlobError::Stream(error) => error,
            BlobError::WrongThread => StreamError::WrongThread,
            BlobError::ActorGone => StreamError::ActorDestroyed,
            BlobError::UnknownActor(actor) => StreamError::UnknownActor(actor),
            BlobError::PeerGone | BlobError::ThreadGone => StreamError::PeerGone,
            BlobError::Io(reason) => StreamError::Io(reason),
            other => StreamError::Io(other.to_string()),
        }
    }
}

/// Where the bytes of a blob come from.
pub trait BlobImpl: Send + Sync {
    /// A fresh stream over the blob's bytes. `blob` is the blob owning this
    /// implementation.
    fn get_internal_stream(&self, blob: &Arc<Blob>) -> Result<Arc<dyn InputStream>, BlobError>;

    /// A new blob over `length` bytes starting at `start`. The range has
    /// already been clamped to the blob.
    fn create_slice(
        &self,
        blob: &Arc<Blob>,
        start: u64,
        length: u64,
        content_type: String,
    ) -> Result<Arc<Blob>, BlobError>;

    fn as_remote(&self) -> Option<&RemoteBlob> {
        None
    }
}

pub struct Blob {
    /// `None` until a mystery blob is resolved.
    metadata: Mutex<Option<BlobMetadata>>,
    /// Set once a reader has been handed a stream. Informational only: the
    /// bytes never change, and resolving a mystery only fills in metadata.
    immutable: AtomicBool,
    inner: Box<dyn BlobImpl>,
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("metadata", &*self.metadata.lock())
            .field("immutable", &self.is_immutable())
            .field("remote", &self.as_remote().and_then(RemoteBlob::actor_id))
            .finish()
    }
}

impl Blob {
    pub fn new(metadata: Option<BlobMetadata>, inner: Box<dyn BlobImpl>) -> Arc<Blob> {
        Arc::new(Blob {
            metadata: Mutex::new(metadata),
            immutable: AtomicBool::new(false),
            inner,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>, content_type: &str) -> Arc<Blob> {
        let end = bytes.len();
        let metadata = BlobMetadata::new(&normalize_content_type(Some(content_type)), end as u64);
        Blob::new(
            Some(metadata),
            Box::new(MemoryBlob {
                bytes: Arc::new(bytes),
                start: 0,
                end,
            }),
        )
    }

    /// A file blob. Name, size and modification time come from the file
    /// system and the content type is guessed from the extension.
    pub fn from_file(path: &Path) -> Result<Arc<Blob>, BlobError> {
        let file_metadata = fs::metadata(path).map_err(|error| BlobError::Io(error.to_string()))?;
        if !file_metadata.is_file() {
            return Err(BlobError::Io(format!("{} is not a file", path.display())));
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = mime_guess::from_path(path).first_raw().unwrap_or("");
        let modified = file_metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_millis() as u64);
        let length = file_metadata.len();
        debug!("File blob {:?} ({} bytes, {:?})", path, length, content_type);
        Ok(Blob::new(
            Some(BlobMetadata::new_file(&name, content_type, length, modified)),
            Box::new(FileBlob {
                path: path.to_path_buf(),
                start: 0,
                length,
            }),
        ))
    }

    /// The concatenation of `parts`. Every part must have known metadata.
    pub fn from_parts(parts: Vec<Arc<Blob>>, content_type: &str) -> Result<Arc<Blob>, BlobError> {
        let length = parts.iter().try_fold(0, |total, part| {
            part.size().map(|size| total + size).ok_or(BlobError::Mystery)
        })?;
        Ok(Blob::new(
            Some(BlobMetadata::new(
                &normalize_content_type(Some(content_type)),
                length,
            )),
            Box::new(MultipartBlob { parts }),
        ))
    }

    pub fn metadata(&self) -> Option<BlobMetadata> {
        self.metadata.lock().clone()
    }

    pub fn size(&self) -> Option<u64> {
        self.metadata.lock().as_ref().map(|metadata| metadata.length)
    }

    pub fn is_mystery(&self) -> bool {
        self.metadata.lock().is_none()
    }

    pub fn is_file(&self) -> bool {
        self.metadata
            .lock()
            .as_ref()
            .is_some_and(BlobMetadata::is_file)
    }

    /// Whether a stream over this blob has been handed out. Does not gate
    /// `set_lazy_data`.
    pub fn is_immutable(&self) -> bool {
        self.immutable.load(Ordering::Acquire)
    }

    pub fn as_remote(&self) -> Option<&RemoteBlob> {
        self.inner.as_remote()
    }

    /// Provide the metadata of a mystery blob. Only the first call succeeds.
    pub fn set_lazy_data(&self, metadata: BlobMetadata) -> Result<(), BlobError> {
        let mut current = self.metadata.lock();
        if current.is_some() {
            return Err(BlobError::AlreadyResolved);
        }
        *current = Some(metadata);
        Ok(())
    }

    pub fn get_internal_stream(self: &Arc<Self>) -> Result<Arc<dyn InputStream>, BlobError> {
        self.immutable.store(true, Ordering::Release);
        self.inner.get_internal_stream(self)
    }

    /// Resolve `start` and `end` against the blob size the way the File API
    /// does: negative offsets count from the end and everything is clamped.
    /// Returns the start and the length of the range.
    pub fn relative_range(
        &self,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<(u64, u64), BlobError> {
        let size = self.size().ok_or(BlobError::Mystery)? as i64;
        let relative = |offset: Option<i64>, default: i64| match offset {
            None => default,
            Some(offset) if offset < 0 => max(size + offset, 0),
            Some(offset) => min(offset, size),
        };
        let start = relative(start, 0);
        let end = relative(end, size);
        let span = max(end - start, 0);
        Ok((start as u64, span as u64))
    }

    pub fn slice(
        self: &Arc<Self>,
        start: Option<i64>,
        end: Option<i64>,
        content_type: Option<&str>,
    ) -> Result<Arc<Blob>, BlobError> {
        let (start, length) = self.relative_range(start, end)?;
        let content_type = normalize_content_type(content_type);
        debug!("Slicing {} bytes at {} as {:?}", length, start, content_type);
        self.inner.create_slice(self, start, length, content_type)
    }

    /// Read every byte of the blob. Must not be called on the main thread
    /// for remote blobs.
    pub fn read_to_end(self: &Arc<Self>) -> Result<Vec<u8>, BlobError> {
        let stream = self.get_internal_stream().map_err(|error| {
            warn!("Could not open blob stream: {}", error);
            BlobError::NotReadable
        })?;
        let result = input_stream::read_to_end(&*stream).map_err(|error| {
            warn!("Could not read blob: {}", error);
            BlobError::NotReadable
        });
        if let Err(error) = stream.close() {
            debug!("Closing blob stream failed: {}", error);
        }
        result
    }
}

/// Content types that are not printable ASCII become the empty string,
/// others are lower-cased.
pub fn normalize_content_type(content_type: Option<&str>) -> String {
    match content_type {
        Some(content_type) if content_type.chars().all(|c| ('\x20'..='\x7E').contains(&c)) => {
            content_type.to_ascii_lowercase()
        },
        _ => String::new(),
    }
}

struct MemoryBlob {
    bytes: Arc<Vec<u8>>,
    start: usize,
    end: usize,
}

impl BlobImpl for MemoryBlob {
    fn get_internal_stream(&self, _: &Arc<Blob>) -> Result<Arc<dyn InputStream>, BlobError> {
        Ok(Arc::new(StringInputStream::from_shared(
            self.bytes.clone(),
            self.start,
            self.end,
        )))
    }

    fn create_slice(
        &self,
        _: &Arc<Blob>,
        start: u64,
        length: u64,
        content_type: String,
    ) -> Result<Arc<Blob>, BlobError> {
        let start = self.start + start as usize;
        Ok(Blob::new(
            Some(BlobMetadata::new(&content_type, length)),
            Box::new(MemoryBlob {
                bytes: self.bytes.clone(),
                start,
                end: min(start + length as usize, self.end),
            }),
        ))
    }
}

struct FileBlob {
    path: PathBuf,
    start: u64,
    length: u64,
}

impl BlobImpl for FileBlob {
    fn get_internal_stream(&self, _: &Arc<Blob>) -> Result<Arc<dyn InputStream>, BlobError> {
        Ok(Arc::new(FileInputStream::new(
            self.path.clone(),
            self.start,
            Some(self.length),
        )))
    }

    fn create_slice(
        &self,
        _: &Arc<Blob>,
        start: u64,
        length: u64,
        content_type: String,
    ) -> Result<Arc<Blob>, BlobError> {
        // A slice of a file is not a file itself.
        Ok(Blob::new(
            Some(BlobMetadata::new(&content_type, length)),
            Box::new(FileBlob {
                path: self.path.clone(),
                start: self.start + start,
                length,
            }),
        ))
    }
}

struct MultipartBlob {
    parts: Vec<Arc<Blob>>,
}

impl BlobImpl for MultipartBlob {
    fn get_internal_stream(&self, _: &Arc<Blob>) -> Result<Arc<dyn InputStream>, BlobError> {
        let streams = self
            .parts
            .iter()
            .map(Blob::get_internal_stream)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(MultiplexInputStream::new(streams)))
    }

    fn create_slice(
        &self,
        _: &Arc<Blob>,
        start: u64,
        length: u64,
        content_type: String,
    ) -> Result<Arc<Blob>, BlobError> {
        let end = start + length;
        let mut offset = 0;
        let mut parts = vec![];
        for part in &self.parts {
            let size = part.size().ok_or(BlobError::Mystery)?;
            let (part_start, part_end) = (offset, offset + size);
            offset = part_end;
            if part_end <= start || part_start >= end {
                continue;
            }
            let from = start.saturating_sub(part_start);
            let to = min(end, part_end) - part_start;
            if from == 0 && to == size {
                parts.push(part.clone());
            } else {
                parts.push(part.slice(Some(from as i64), Some(to as i64), None)?);
            }
        }
        Blob::from_parts(parts, &content_type)
    }
}

/// Fails the requested stream if the blob thread never gets to send the
/// request.
struct StreamRequest(Option<Arc<RemoteInputStream>>);

impl StreamRequest {
    fn take(&mut self) -> Option<Arc<RemoteInputStream>> {
        self.0.take()
    }
}

impl Drop for StreamRequest {
    fn drop(&mut self) {
        if let Some(stream) = self.0.take() {
            let _ = stream.fail(StreamError::PeerGone);
        }
    }
}

/// A blob whose bytes live in the other process, behind an actor.
pub struct RemoteBlob {
    /// Back reference to the actor, cleared when the actor is destroyed.
    actor: Mutex<Option<BlobActorId>>,
    thread: BlobThreadHandle,
}

impl RemoteBlob {
    pub(crate) fn new(actor: BlobActorId, thread: BlobThreadHandle) -> RemoteBlob {
        RemoteBlob {
            actor: Mutex::new(Some(actor)),
            thread,
        }
    }

    pub fn actor_id(&self) -> Option<BlobActorId> {
        *self.actor.lock()
    }

    pub(crate) fn clear_actor(&self) {
        self.actor.lock().take();
    }

    pub(crate) fn belongs_to(&self, thread: &BlobThreadHandle) -> bool {
        self.thread.same_thread(thread)
    }
}

impl BlobImpl for RemoteBlob {
    fn get_internal_stream(&self, blob: &Arc<Blob>) -> Result<Arc<dyn InputStream>, BlobError> {
        let actor = self.actor_id().ok_or(BlobError::ActorGone)?;
        let stream = Arc::new(RemoteInputStream::new(actor, Some(blob.clone())));
        let mut request = StreamRequest(Some(stream.clone()));
        self.thread.dispatch(move |thread| {
            if let Some(stream) = request.take() {
                thread.request_stream(actor, &stream);
            }
        })?;
        Ok(stream)
    }

    fn create_slice(
        &self,
        _: &Arc<Blob>,
        start: u64,
        length: u64,
        content_type: String,
    ) -> Result<Arc<Blob>, BlobError> {
        let actor = self.actor_id().ok_or(BlobError::ActorGone)?;
        if thread_state::is_main_thread() {
            error!("Remote slices of {} must be created by the blob thread", actor);
            return Err(BlobError::WrongThread);
        }
        self.thread.dispatch_and_block(move |thread| {
            thread.create_remote_slice(actor, start, start + length, content_type)
        })?
    }

    fn as_remote(&self) -> Option<&RemoteBlob> {
        Some(self)
    }
}

impl Drop for RemoteBlob {
    fn drop(&mut self) {
        if let Some(actor) = self.actor.get_mut().take() {
            debug!("Remote blob for {} is dying", actor);
            let _ = self
                .thread
                .dispatch(move |thread| thread.note_dying_remote_blob(actor));
        }
    }
}
