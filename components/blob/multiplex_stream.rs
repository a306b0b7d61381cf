/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::Arc;

use blob_traits::{InputStreamParams, MultiplexInputStreamParams, StreamError};
use log::trace;
use parking_lot::Mutex;

use crate::input_stream::{InputStream, SerializableStream};

struct MultiplexState {
    streams: Vec<Arc<dyn InputStream>>,
    /// Index of the child currently being read.
    current: usize,
    closed: bool,
}

/// The concatenation of several streams, read one after the other.
pub struct MultiplexInputStream {
    state: Mutex<MultiplexState>,
}

impl MultiplexInputStream {
    pub fn new(streams: Vec<Arc<dyn InputStream>>) -> MultiplexInputStream {
        MultiplexInputStream {
            state: Mutex::new(MultiplexState {
                streams,
                current: 0,
                closed: false,
            }),
        }
    }

    pub fn stream_count(&self) -> usize {
        self.state.lock().streams.len()
    }
}

impl InputStream for MultiplexInputStream {
    fn read(&self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            // Children may block, so the lock is not held across their reads.
            let child = {
                let state = self.state.lock();
                if state.closed {
                    return Err(StreamError::Closed);
                }
                match state.streams.get(state.current) {
                    Some(child) => child.clone(),
                    None => return Ok(0),
                }
            };
            let read = child.read(buf)?;
            if read > 0 {
                return Ok(read);
            }
            let mut state = self.state.lock();
            state.current += 1;
            trace!("Multiplex stream moved to child {}", state.current);
        }
    }

    fn available(&self) -> Result<u64, StreamError> {
        let children = {
            let state = self.state.lock();
            if state.closed {
                return Err(StreamError::Closed);
            }
            state.streams[state.current.min(state.streams.len())..].to_vec()
        };
        children
            .iter()
            .try_fold(0u64, |total, child| Ok(total + child.available()?))
    }

    fn close(&self) -> Result<(), StreamError> {
        let children = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.streams)
        };
        let mut result = Ok(());
        for child in children {
            if let Err(error) = child.close() {
                result = Err(error);
            }
        }
        result
    }

    fn serializable(&self) -> Option<&dyn SerializableStream> {
        Some(self)
    }
}

impl SerializableStream for MultiplexInputStream {
    fn serialize(&self) -> Result<InputStreamParams, StreamError> {
        let children = {
            let state = self.state.lock();
            if state.closed {
                return Err(StreamError::Closed);
            }
            state.streams[state.current.min(state.streams.len())..].to_vec()
        };
        let streams = children
            .iter()
            .map(|child| {
                child
                    .serializable()
                    .ok_or(StreamError::NotSerializable)?
                    .serialize()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InputStreamParams::MultiplexInputStream(
            MultiplexInputStreamParams { streams },
        ))
    }
}
