/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The byte stream capabilities shared by every stream implementation.
//!
//! Streams are shared between the main thread, which hands them out and
//! serializes them, and the stream transport pool, which performs the
//! blocking operations. Every method therefore takes `&self` and
//! implementations keep their cursor behind a lock.

use std::io::SeekFrom;

use blob_traits::{InputStreamParams, StreamError};
use servo_config::opts;

use crate::remote_stream::RemoteInputStream;

/// Whether a stream can seek. Remote proxies answer `Maybe` until their
/// backing stream arrives, rather than blocking to find out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Seekability {
    Yes,
    No,
    Maybe,
}

pub trait InputStream: Send + Sync {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of stream.
    fn read(&self, buf: &mut [u8]) -> Result<usize, StreamError>;

    /// Hand up to `count` bytes to `writer`, one segment at a time, and
    /// return how many were handed out.
    fn read_segments(
        &self,
        writer: &mut dyn FnMut(&[u8]) -> Result<(), StreamError>,
        count: usize,
    ) -> Result<usize, StreamError> {
        let chunk_size = opts::get().file_chunk_size;
        let mut buffer = vec![0; chunk_size.min(count)];
        let mut total = 0;
        while total < count {
            let wanted = (count - total).min(buffer.len());
            let read = self.read(&mut buffer[..wanted])?;
            if read == 0 {
                break;
            }
            writer(&buffer[..read])?;
            total += read;
        }
        Ok(total)
    }

    /// Number of bytes that can be read without reaching the end of the
    /// stream. May force a lazily opened stream to open.
    fn available(&self) -> Result<u64, StreamError>;

    fn close(&self) -> Result<(), StreamError>;

    fn seekable(&self) -> Option<&dyn SeekableStream> {
        None
    }

    fn seekability(&self) -> Seekability {
        if self.seekable().is_some() {
            Seekability::Yes
        } else {
            Seekability::No
        }
    }

    fn serializable(&self) -> Option<&dyn SerializableStream> {
        None
    }

    fn as_remote(&self) -> Option<&RemoteInputStream> {
        None
    }
}

pub trait SeekableStream {
    fn seek(&self, position: SeekFrom) -> Result<u64, StreamError>;

    fn tell(&self) -> Result<u64, StreamError>;

    /// Truncate the readable part of the stream at the current position.
    fn set_eof(&self) -> Result<(), StreamError>;
}

pub trait SerializableStream {
    /// Describe the unread part of the stream.
    fn serialize(&self) -> Result<InputStreamParams, StreamError>;
}

/// Read a stream until its end.
pub fn read_to_end(stream: &dyn InputStream) -> Result<Vec<u8>, StreamError> {
    let mut bytes = vec![];
    stream.read_segments(
        &mut |segment| {
            bytes.extend_from_slice(segment);
            Ok(())
        },
        usize::MAX,
    )?;
    Ok(bytes)
}

/// Resolve a seek request against a cursor and a length.
pub(crate) fn seek_position(
    position: SeekFrom,
    current: u64,
    length: u64,
) -> Result<u64, StreamError> {
    let target = match position {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
        SeekFrom::End(delta) => length.checked_add_signed(delta),
    };
    match target {
        Some(target) if target <= length => Ok(target),
        _ => Err(StreamError::Io(format!(
            "seek to {position:?} outside of 0..={length}"
        ))),
    }
}
