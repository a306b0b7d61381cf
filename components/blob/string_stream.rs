/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::io::SeekFrom;
use std::sync::Arc;

use blob_traits::{InputStreamParams, StreamError, StringInputStreamParams};
use parking_lot::Mutex;

use crate::input_stream::{InputStream, SeekableStream, SerializableStream, seek_position};

struct StringStreamState {
    /// Readable window into `bytes`.
    start: usize,
    end: usize,
    /// Cursor, relative to `start`.
    position: usize,
    closed: bool,
}

/// A stream over shared in-memory bytes. Memory blobs and their slices hand
/// these out without copying.
pub struct StringInputStream {
    bytes: Arc<Vec<u8>>,
    state: Mutex<StringStreamState>,
}

impl StringInputStream {
    pub fn new(bytes: Vec<u8>) -> StringInputStream {
        let end = bytes.len();
        StringInputStream::from_shared(Arc::new(bytes), 0, end)
    }

    /// A stream over `bytes[start..end]`. The range is clamped to the data.
    pub fn from_shared(bytes: Arc<Vec<u8>>, start: usize, end: usize) -> StringInputStream {
        let end = end.min(bytes.len());
        let start = start.min(end);
        StringInputStream {
            bytes,
            state: Mutex::new(StringStreamState {
                start,
                end,
                position: 0,
                closed: false,
            }),
        }
    }

    fn remaining(state: &StringStreamState) -> usize {
        state.end - state.start - state.position
    }
}

impl InputStream for StringInputStream {
    fn read(&self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StreamError::Closed);
        }
        let count = buf.len().min(Self::remaining(&state));
        let from = state.start + state.position;
        buf[..count].copy_from_slice(&self.bytes[from..from + count]);
        state.position += count;
        Ok(count)
    }

    fn available(&self) -> Result<u64, StreamError> {
        let state = self.state.lock();
        if state.closed {
            return Err(StreamError::Closed);
        }
        Ok(Self::remaining(&state) as u64)
    }

    fn close(&self) -> Result<(), StreamError> {
        self.state.lock().closed = true;
        Ok(())
    }

    fn seekable(&self) -> Option<&dyn SeekableStream> {
        Some(self)
    }

    fn serializable(&self) -> Option<&dyn SerializableStream> {
        Some(self)
    }
}

impl SeekableStream for StringInputStream {
    fn seek(&self, position: SeekFrom) -> Result<u64, StreamError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StreamError::Closed);
        }
        let length = (state.end - state.start) as u64;
        let target = seek_position(position, state.position as u64, length)?;
        state.position = target as usize;
        Ok(target)
    }

    fn tell(&self) -> Result<u64, StreamError> {
        let state = self.state.lock();
        if state.closed {
            return Err(StreamError::Closed);
        }
        Ok(state.position as u64)
    }

    fn set_eof(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StreamError::Closed);
        }
        state.end = state.start + state.position;
        Ok(())
    }
}

impl SerializableStream for StringInputStream {
    fn serialize(&self) -> Result<InputStreamParams, StreamError> {
        let state = self.state.lock();
        if state.closed {
            return Err(StreamError::Closed);
        }
        let from = state.start + state.position;
        Ok(InputStreamParams::StringInputStream(
            StringInputStreamParams {
                data: self.bytes[from..state.end].to_vec(),
            },
        ))
    }
}
