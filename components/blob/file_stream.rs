/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use blob_traits::{FileInputStreamParams, InputStreamParams, StreamError};
use log::{debug, trace};
use parking_lot::Mutex;

use crate::input_stream::{InputStream, SeekableStream, SerializableStream, seek_position};

struct FileStreamState {
    /// Opened on first use.
    file: Option<File>,
    /// Readable length from `start`, resolved against the file size on open.
    length: Option<u64>,
    /// Cursor, relative to `start`.
    position: u64,
    closed: bool,
}

/// A stream over a byte range of a file. The file is opened lazily, so
/// creating the stream on the main thread never touches the disk.
pub struct FileInputStream {
    path: PathBuf,
    start: u64,
    state: Mutex<FileStreamState>,
}

impl FileInputStream {
    pub fn new(path: PathBuf, start: u64, length: Option<u64>) -> FileInputStream {
        FileInputStream {
            path,
            start,
            state: Mutex::new(FileStreamState {
                file: None,
                length,
                position: 0,
                closed: false,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file if needed and return the resolved readable length.
    fn ensure_open(&self, state: &mut FileStreamState) -> Result<u64, StreamError> {
        if state.closed {
            return Err(StreamError::Closed);
        }
        if state.file.is_none() {
            debug!("Opening {:?} at offset {}", self.path, self.start);
            let mut file = File::open(&self.path).map_err(io_error)?;
            let size = file.metadata().map_err(io_error)?.len();
            let available = size.saturating_sub(self.start);
            let length = state.length.map_or(available, |length| length.min(available));
            file.seek(SeekFrom::Start(self.start + state.position))
                .map_err(io_error)?;
            state.length = Some(length);
            state.file = Some(file);
        }
        Ok(state.length.unwrap_or(0))
    }
}

fn io_error(error: std::io::Error) -> StreamError {
    StreamError::Io(error.to_string())
}

impl InputStream for FileInputStream {
    fn read(&self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let mut state = self.state.lock();
        let length = self.ensure_open(&mut state)?;
        let remaining = length.saturating_sub(state.position);
        let wanted = (buf.len() as u64).min(remaining) as usize;
        if wanted == 0 {
            return Ok(0);
        }
        let read = match state.file {
            Some(ref mut file) => file.read(&mut buf[..wanted]).map_err(io_error)?,
            None => return Err(StreamError::Closed),
        };
        state.position += read as u64;
        trace!("Read {} bytes from {:?}", read, self.path);
        Ok(read)
    }

    fn available(&self) -> Result<u64, StreamError> {
        let mut state = self.state.lock();
        let length = self.ensure_open(&mut state)?;
        Ok(length.saturating_sub(state.position))
    }

    fn close(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        state.file = None;
        state.closed = true;
        Ok(())
    }

    fn seekable(&self) -> Option<&dyn SeekableStream> {
        Some(self)
    }

    fn serializable(&self) -> Option<&dyn SerializableStream> {
        Some(self)
    }
}

impl SeekableStream for FileInputStream {
    fn seek(&self, position: SeekFrom) -> Result<u64, StreamError> {
        let mut state = self.state.lock();
        let length = self.ensure_open(&mut state)?;
        let target = seek_position(position, state.position, length)?;
        if let Some(ref mut file) = state.file {
            file.seek(SeekFrom::Start(self.start + target))
                .map_err(io_error)?;
        }
        state.position = target;
        Ok(target)
    }

    fn tell(&self) -> Result<u64, StreamError> {
        let state = self.state.lock();
        if state.closed {
            return Err(StreamError::Closed);
        }
        Ok(state.position)
    }

    fn set_eof(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        self.ensure_open(&mut state)?;
        state.length = Some(state.position);
        Ok(())
    }
}

impl SerializableStream for FileInputStream {
    fn serialize(&self) -> Result<InputStreamParams, StreamError> {
        let state = self.state.lock();
        if state.closed {
            return Err(StreamError::Closed);
        }
        Ok(InputStreamParams::FileInputStream(FileInputStreamParams {
            path: self.path.clone(),
            start: self.start + state.position,
            length: state
                .length
                .map(|length| length.saturating_sub(state.position)),
        }))
    }
}
