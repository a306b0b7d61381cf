/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Configuration options for a single run of the blob transfer machinery.
//! Set once by the embedder, read from any thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, RwLock, RwLockReadGuard};

use log::warn;
use serde::{Deserialize, Serialize};

/// Global flags, normally set by the embedder at startup.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Opts {
    /// Whether we're running in multiprocess mode. Channels between the two
    /// blob endpoints are OS IPC channels when this is set.
    pub multiprocess: bool,

    /// Use IPC channels even when running in a single process. Useful to
    /// exercise the serialization paths in tests.
    pub force_ipc: bool,

    /// Number of threads in the stream transport pool used for blocking
    /// file and stream operations.
    pub stream_transport_threads: usize,

    /// Size of the segments handed out by `read_segments`.
    pub file_chunk_size: usize,
}

impl Opts {
    /// Parse options from a JSON document. Missing fields keep their default
    /// value.
    pub fn from_json(json: &str) -> Result<Opts, serde_json::Error> {
        let mut opts: Opts = serde_json::from_str(json)?;
        if opts.stream_transport_threads == 0 {
            warn!("stream_transport_threads must be at least 1, using 1");
            opts.stream_transport_threads = 1;
        }
        if opts.file_chunk_size == 0 {
            warn!("file_chunk_size must be non-zero, using the default");
            opts.file_chunk_size = default_opts().file_chunk_size;
        }
        Ok(opts)
    }
}

impl Default for Opts {
    fn default() -> Self {
        default_opts()
    }
}

pub fn default_opts() -> Opts {
    Opts {
        multiprocess: false,
        force_ipc: false,
        stream_transport_threads: 4,
        file_chunk_size: 32768,
    }
}

static MULTIPROCESS: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn multiprocess() -> bool {
    MULTIPROCESS.load(Ordering::Relaxed)
}

// Make Opts available globally. This saves having to clone and pass
// opts everywhere it is used.
static OPTIONS: LazyLock<RwLock<Opts>> = LazyLock::new(|| RwLock::new(default_opts()));

pub fn set_options(opts: Opts) {
    MULTIPROCESS.store(opts.multiprocess, Ordering::SeqCst);
    match OPTIONS.write() {
        Ok(mut guard) => *guard = opts,
        Err(poisoned) => *poisoned.into_inner() = opts,
    }
}

#[inline]
pub fn get() -> RwLockReadGuard<'static, Opts> {
    OPTIONS.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}
