/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A stream whose bytes live behind a blob actor and arrive later.
//!
//! The proxy is handed out as soon as a stream is requested. The blob thread
//! binds it exactly once, either to the stream described by the peer or to a
//! failure. Until then every blocking operation waits, which is only allowed
//! off the main thread.

use std::io::SeekFrom;
use std::sync::Arc;

use base::thread_state;
use blob_traits::{BlobActorId, InputStreamParams, RemoteInputStreamParams, StreamError};
use log::{debug, error};
use parking_lot::Mutex;

use crate::blob::Blob;
use crate::input_stream::{InputStream, SeekableStream, Seekability, SerializableStream};
use crate::one_shot::OneShot;

type Binding = Result<Arc<dyn InputStream>, StreamError>;

pub struct RemoteInputStream {
    actor: BlobActorId,
    binding: OneShot<Binding>,
    /// Keeps the source blob alive while the stream is read.
    blob: Mutex<Option<Arc<Blob>>>,
}

impl RemoteInputStream {
    pub fn new(actor: BlobActorId, blob: Option<Arc<Blob>>) -> RemoteInputStream {
        RemoteInputStream {
            actor,
            binding: OneShot::new(),
            blob: Mutex::new(blob),
        }
    }

    pub fn actor_id(&self) -> BlobActorId {
        self.actor
    }

    pub fn is_bound(&self) -> bool {
        self.binding
            .try_with(|binding| binding.is_ok())
            .unwrap_or(false)
    }

    /// Install the backing stream and wake every waiter.
    pub fn set_stream(&self, stream: Arc<dyn InputStream>) -> Result<(), StreamError> {
        if !thread_state::is_main_thread() {
            error!("Binding remote stream for {} off the main thread", self.actor);
            return Err(StreamError::WrongThread);
        }
        if std::ptr::addr_eq(Arc::as_ptr(&stream), self as *const RemoteInputStream) {
            error!("Refusing to bind remote stream for {} to itself", self.actor);
            return Err(StreamError::ProxyCycle);
        }
        self.settle(Ok(stream))
    }

    /// Settle the stream with a failure. Readers get `error` instead of bytes.
    pub fn fail(&self, error: StreamError) -> Result<(), StreamError> {
        debug!("Remote stream for {} failed: {}", self.actor, error);
        self.settle(Err(error))
    }

    fn settle(&self, binding: Binding) -> Result<(), StreamError> {
        self.binding.fill(binding).map_err(|_| {
            error!("Remote stream for {} is already bound", self.actor);
            StreamError::AlreadyBound
        })
    }

    /// The backing stream, waiting for it off the main thread.
    fn wait_for_stream(&self) -> Result<Arc<dyn InputStream>, StreamError> {
        if thread_state::is_main_thread() {
            return match self.binding.try_with(Clone::clone) {
                Some(binding) => binding,
                None => {
                    error!("Waiting for remote stream {} on the main thread", self.actor);
                    Err(StreamError::WrongThread)
                },
            };
        }
        self.binding
            .wait_with(Clone::clone)
            .unwrap_or(Err(StreamError::Closed))
    }

    fn wait_for_seekable(&self) -> Result<Arc<dyn InputStream>, StreamError> {
        let stream = self.wait_for_stream()?;
        if stream.seekable().is_none() {
            return Err(StreamError::NotSeekable);
        }
        Ok(stream)
    }

    /// Return the stream that actually holds the bytes, looking through
    /// proxies of this same actor. Blocks, so never on the main thread.
    pub fn block_and_get_internal_stream(&self) -> Result<Arc<dyn InputStream>, StreamError> {
        if thread_state::is_main_thread() {
            error!("Unwrapping remote stream {} on the main thread", self.actor);
            return Err(StreamError::WrongThread);
        }
        let mut visited = vec![self as *const RemoteInputStream];
        let mut stream = self.wait_for_stream()?;
        loop {
            let next = match stream.as_remote() {
                Some(remote) if remote.actor == self.actor => {
                    let layer = remote as *const RemoteInputStream;
                    if visited.contains(&layer) {
                        error!("Remote streams for {} form a cycle", self.actor);
                        return Err(StreamError::ProxyCycle);
                    }
                    visited.push(layer);
                    Some(remote.wait_for_stream()?)
                },
                _ => None,
            };
            match next {
                Some(next) => stream = next,
                None => return Ok(stream),
            }
        }
    }
}

impl InputStream for RemoteInputStream {
    fn read(&self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.wait_for_stream()?.read(buf)
    }

    fn read_segments(
        &self,
        writer: &mut dyn FnMut(&[u8]) -> Result<(), StreamError>,
        count: usize,
    ) -> Result<usize, StreamError> {
        self.wait_for_stream()?.read_segments(writer, count)
    }

    fn available(&self) -> Result<u64, StreamError> {
        if thread_state::is_main_thread() && !self.binding.is_settled() {
            return Err(StreamError::Closed);
        }
        self.wait_for_stream()?.available()
    }

    fn close(&self) -> Result<(), StreamError> {
        let result = match self.wait_for_stream() {
            Ok(stream) => stream.close(),
            Err(StreamError::WrongThread) => return Err(StreamError::WrongThread),
            // Nothing was ever opened.
            Err(_) => Ok(()),
        };
        self.blob.lock().take();
        result
    }

    fn seekable(&self) -> Option<&dyn SeekableStream> {
        match self.seekability() {
            Seekability::No => None,
            Seekability::Yes | Seekability::Maybe => Some(self),
        }
    }

    fn seekability(&self) -> Seekability {
        self.binding
            .try_with(|binding| match binding {
                Ok(stream) => stream.seekability(),
                Err(_) => Seekability::No,
            })
            .unwrap_or(Seekability::Maybe)
    }

    fn serializable(&self) -> Option<&dyn SerializableStream> {
        Some(self)
    }

    fn as_remote(&self) -> Option<&RemoteInputStream> {
        Some(self)
    }
}

impl SeekableStream for RemoteInputStream {
    fn seek(&self, position: SeekFrom) -> Result<u64, StreamError> {
        let stream = self.wait_for_seekable()?;
        stream
            .seekable()
            .ok_or(StreamError::NotSeekable)?
            .seek(position)
    }

    fn tell(&self) -> Result<u64, StreamError> {
        let stream = self.wait_for_seekable()?;
        stream.seekable().ok_or(StreamError::NotSeekable)?.tell()
    }

    fn set_eof(&self) -> Result<(), StreamError> {
        let stream = self.wait_for_seekable()?;
        stream.seekable().ok_or(StreamError::NotSeekable)?.set_eof()
    }
}

impl SerializableStream for RemoteInputStream {
    fn serialize(&self) -> Result<InputStreamParams, StreamError> {
        Ok(InputStreamParams::RemoteInputStream(
            RemoteInputStreamParams { actor: self.actor },
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use base::thread_state::ThreadState;

    use super::*;
    use crate::input_stream::read_to_end;
    use crate::multiplex_stream::MultiplexInputStream;
    use crate::string_stream::StringInputStream;

    /// Run `f` on a fresh thread marked as a main thread.
    fn on_main_thread<R: Send + 'static>(f: impl FnOnce() -> R + Send + 'static) -> R {
        thread::spawn(move || {
            thread_state::initialize(ThreadState::MAIN);
            f()
        })
        .join()
        .unwrap()
    }

    fn string(bytes: &[u8]) -> Arc<dyn InputStream> {
        Arc::new(StringInputStream::new(bytes.to_vec()))
    }

    #[test]
    fn binds_exactly_once() {
        let remote = Arc::new(RemoteInputStream::new(BlobActorId::new(), None));
        let binder = remote.clone();
        let (first, second) = on_main_thread(move || {
            (
                binder.set_stream(string(b"first")),
                binder.set_stream(string(b"second")),
            )
        });
        assert_eq!(first, Ok(()));
        assert_eq!(second, Err(StreamError::AlreadyBound));
        assert_eq!(remote.fail(StreamError::PeerGone), Err(StreamError::AlreadyBound));
        assert_eq!(read_to_end(&*remote).unwrap(), b"first");
    }

    #[test]
    fn binding_off_main_thread_is_rejected() {
        let remote = RemoteInputStream::new(BlobActorId::new(), None);
        assert_eq!(remote.set_stream(string(b"x")), Err(StreamError::WrongThread));
        assert!(!remote.is_bound());
    }

    #[test]
    fn available_on_main_thread_does_not_block() {
        let result = on_main_thread(|| {
            let remote = RemoteInputStream::new(BlobActorId::new(), None);
            let mut buf = [0; 4];
            (remote.available(), remote.read(&mut buf), remote.seekability())
        });
        assert_eq!(result.0, Err(StreamError::Closed));
        assert_eq!(result.1, Err(StreamError::WrongThread));
        assert_eq!(result.2, Seekability::Maybe);
    }

    #[test]
    fn reader_blocks_until_bound() {
        let remote = Arc::new(RemoteInputStream::new(BlobActorId::new(), None));
        let reader = {
            let remote = remote.clone();
            thread::spawn(move || read_to_end(&*remote))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!remote.is_bound());
        let binder = remote.clone();
        on_main_thread(move || binder.set_stream(string(b"late bytes"))).unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), b"late bytes");
        assert_eq!(remote.seekability(), Seekability::Yes);
    }

    #[test]
    fn failure_reaches_waiting_reader() {
        let remote = Arc::new(RemoteInputStream::new(BlobActorId::new(), None));
        let reader = {
            let remote = remote.clone();
            thread::spawn(move || {
                let mut buf = [0; 8];
                remote.read(&mut buf)
            })
        };
        remote.fail(StreamError::ActorDestroyed).unwrap();
        assert_eq!(reader.join().unwrap(), Err(StreamError::ActorDestroyed));
        assert_eq!(remote.close(), Ok(()));
        assert_eq!(remote.seekability(), Seekability::No);
    }

    #[test]
    fn seeking_a_non_seekable_stream_fails() {
        let remote = Arc::new(RemoteInputStream::new(BlobActorId::new(), None));
        let binder = remote.clone();
        on_main_thread(move || {
            let multiplex: Arc<dyn InputStream> =
                Arc::new(MultiplexInputStream::new(vec![string(b"ab")]));
            binder.set_stream(multiplex)
        })
        .unwrap();
        assert_eq!(remote.seekability(), Seekability::No);
        assert!(remote.seekable().is_none());
        assert_eq!(remote.tell(), Err(StreamError::NotSeekable));
    }

    #[test]
    fn unwrap_looks_through_layers_of_the_same_actor() {
        let actor = BlobActorId::new();
        let outer = Arc::new(RemoteInputStream::new(actor, None));
        let inner = Arc::new(RemoteInputStream::new(actor, None));
        let (outer_binder, inner_binder) = (outer.clone(), inner.clone());
        on_main_thread(move || {
            inner_binder.set_stream(string(b"genuine")).unwrap();
            outer_binder.set_stream(inner_binder).unwrap();
        });
        let stream = outer.block_and_get_internal_stream().unwrap();
        assert!(stream.as_remote().is_none());
        assert_eq!(read_to_end(&*stream).unwrap(), b"genuine");
    }

    #[test]
    fn unwrap_stops_at_other_actors() {
        let other = Arc::new(RemoteInputStream::new(BlobActorId::new(), None));
        let outer = Arc::new(RemoteInputStream::new(BlobActorId::new(), None));
        let (outer_binder, other_binder) = (outer.clone(), other.clone());
        on_main_thread(move || outer_binder.set_stream(other_binder)).unwrap();
        let stream = outer.block_and_get_internal_stream().unwrap();
        assert_eq!(
            stream.as_remote().map(RemoteInputStream::actor_id),
            Some(other.actor_id())
        );
    }

    #[test]
    fn unwrap_terminates_on_a_cycle() {
        let actor = BlobActorId::new();
        let first = Arc::new(RemoteInputStream::new(actor, None));
        let second = Arc::new(RemoteInputStream::new(actor, None));
        let (first_binder, second_binder) = (first.clone(), second.clone());
        let self_bind = on_main_thread(move || {
            let self_bind = first_binder.set_stream(first_binder.clone());
            first_binder.set_stream(second_binder.clone()).unwrap();
            second_binder.set_stream(first_binder).unwrap();
            self_bind
        });
        assert_eq!(self_bind, Err(StreamError::ProxyCycle));
        assert!(matches!(
            first.block_and_get_internal_stream(),
            Err(StreamError::ProxyCycle)
        ));
    }

    #[test]
    fn unwrap_on_main_thread_is_rejected() {
        let result = on_main_thread(|| {
            RemoteInputStream::new(BlobActorId::new(), None)
                .block_and_get_internal_stream()
                .map(|_| ())
        });
        assert_eq!(result, Err(StreamError::WrongThread));
    }

    #[test]
    fn seeking_is_forwarded_once_bound() {
        let remote = Arc::new(RemoteInputStream::new(BlobActorId::new(), None));
        let binder = remote.clone();
        on_main_thread(move || binder.set_stream(string(b"hello world"))).unwrap();

        let seekable = remote.seekable().unwrap();
        assert_eq!(seekable.seek(SeekFrom::Start(6)), Ok(6));
        assert_eq!(seekable.tell(), Ok(6));
        let mut buf = [0; 2];
        assert_eq!(remote.read(&mut buf), Ok(2));
        assert_eq!(&buf, b"wo");
        assert_eq!(seekable.tell(), Ok(8));
        assert_eq!(seekable.set_eof(), Ok(()));
        assert_eq!(remote.read(&mut buf), Ok(0));
        assert_eq!(seekable.seek(SeekFrom::End(-3)), Ok(5));
        assert_eq!(read_to_end(&*remote).unwrap(), b" wo");
    }

    #[test]
    fn serializes_as_actor_reference() {
        let actor = BlobActorId::new();
        let remote = RemoteInputStream::new(actor, None);
        assert_eq!(
            remote.serialize(),
            Ok(InputStreamParams::RemoteInputStream(
                RemoteInputStreamParams { actor }
            ))
        );
    }
}
