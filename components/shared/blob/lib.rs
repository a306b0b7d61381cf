/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! Messages exchanged by the two blob endpoints, and the tagged descriptions
//! of blobs and byte streams they carry.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod input_stream_params;

pub use crate::input_stream_params::{
    FileInputStreamParams, InputStreamParams, MultiplexInputStreamParams,
    OptionalInputStreamParams, RemoteInputStreamParams, StringInputStreamParams,
};

/// Identity of a blob actor. Both endpoints of an actor pair use the same id.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct BlobActorId(pub Uuid);

impl BlobActorId {
    pub fn new() -> BlobActorId {
        BlobActorId(Uuid::new_v4())
    }
}

impl Default for BlobActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlobActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob-{}", self.0.simple())
    }
}

/// Identity of one stream request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct BlobStreamId(pub Uuid);

impl BlobStreamId {
    pub fn new() -> BlobStreamId {
        BlobStreamId(Uuid::new_v4())
    }
}

impl Default for BlobStreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlobStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0.simple())
    }
}

/// What is known about a blob: everything but its bytes.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BlobMetadata {
    /// File name, `None` for blobs that are not files.
    pub name: Option<String>,
    pub content_type: String,
    pub length: u64,
    /// Milliseconds since the Unix epoch, `None` when unknown.
    pub last_modified: Option<u64>,
}

impl BlobMetadata {
    pub fn new(content_type: &str, length: u64) -> BlobMetadata {
        BlobMetadata {
            name: None,
            content_type: content_type.to_owned(),
            length,
            last_modified: None,
        }
    }

    pub fn new_file(
        name: &str,
        content_type: &str,
        length: u64,
        last_modified: Option<u64>,
    ) -> BlobMetadata {
        BlobMetadata {
            name: Some(name.to_owned()),
            content_type: content_type.to_owned(),
            length,
            last_modified,
        }
    }

    pub fn is_file(&self) -> bool {
        self.name.is_some()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NormalBlobConstructorParams {
    pub content_type: String,
    pub length: u64,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FileBlobConstructorParams {
    pub name: String,
    pub content_type: String,
    pub length: u64,
    pub modified: Option<u64>,
}

/// A byte range of `source`, with its own content type. `end` is exclusive.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SlicedBlobConstructorParams {
    pub begin: u64,
    pub end: u64,
    pub content_type: String,
    pub source: BlobActorId,
}

/// Parameters of a blob actor construction.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum BlobConstructorParams {
    Normal(NormalBlobConstructorParams),
    File(FileBlobConstructorParams),
    /// Metadata follows later in a single `ResolveMystery` message.
    Mystery,
    Sliced(SlicedBlobConstructorParams),
}

impl BlobConstructorParams {
    pub fn from_metadata(metadata: &BlobMetadata) -> BlobConstructorParams {
        match ResolveMysteryParams::from_metadata(metadata) {
            ResolveMysteryParams::Normal(params) => BlobConstructorParams::Normal(params),
            ResolveMysteryParams::File(params) => BlobConstructorParams::File(params),
        }
    }

    /// The metadata carried by the parameters, if any. `Mystery` carries
    /// none, and a slice's length depends on its source.
    pub fn metadata(&self) -> Option<BlobMetadata> {
        match self {
            BlobConstructorParams::Normal(params) => {
                Some(BlobMetadata::new(&params.content_type, params.length))
            },
            BlobConstructorParams::File(params) => Some(BlobMetadata::new_file(
                &params.name,
                &params.content_type,
                params.length,
                params.modified,
            )),
            BlobConstructorParams::Mystery | BlobConstructorParams::Sliced(_) => None,
        }
    }
}

/// The one-shot metadata of a mystery blob.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ResolveMysteryParams {
    Normal(NormalBlobConstructorParams),
    File(FileBlobConstructorParams),
}

impl ResolveMysteryParams {
    pub fn from_metadata(metadata: &BlobMetadata) -> ResolveMysteryParams {
        match metadata.name {
            Some(ref name) => ResolveMysteryParams::File(FileBlobConstructorParams {
                name: name.clone(),
                content_type: metadata.content_type.clone(),
                length: metadata.length,
                modified: metadata.last_modified,
            }),
            None => ResolveMysteryParams::Normal(NormalBlobConstructorParams {
                content_type: metadata.content_type.clone(),
                length: metadata.length,
            }),
        }
    }

    pub fn into_metadata(self) -> BlobMetadata {
        match self {
            ResolveMysteryParams::Normal(params) => {
                BlobMetadata::new(&params.content_type, params.length)
            },
            ResolveMysteryParams::File(params) => BlobMetadata::new_file(
                &params.name,
                &params.content_type,
                params.length,
                params.modified,
            ),
        }
    }
}

/// Failures of stream operations, including the ones reported across the
/// process boundary in a `StreamDelete` message.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum StreamError {
    /// The stream is closed, or not yet available and the caller may not wait.
    Closed,
    /// The operation is not allowed on the calling thread.
    WrongThread,
    /// A remote stream already has its backing stream.
    AlreadyBound,
    /// The stream does not support seeking.
    NotSeekable,
    /// The stream has no wire description.
    NotSerializable,
    /// A chain of remote proxies loops back on itself.
    ProxyCycle,
    /// No actor with this identity exists on the receiving side.
    UnknownActor(BlobActorId),
    /// The actor that was to deliver the stream has been destroyed.
    ActorDestroyed,
    /// The other endpoint could not be reached.
    PeerGone,
    /// The backing file or stream failed.
    Io(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Closed => write!(f, "stream closed"),
            StreamError::WrongThread => write!(f, "operation not allowed on this thread"),
            StreamError::AlreadyBound => write!(f, "remote stream already bound"),
            StreamError::NotSeekable => write!(f, "stream is not seekable"),
            StreamError::NotSerializable => write!(f, "stream is not serializable"),
            StreamError::ProxyCycle => write!(f, "remote stream proxies form a cycle"),
            StreamError::UnknownActor(actor) => write!(f, "unknown blob actor {actor}"),
            StreamError::ActorDestroyed => write!(f, "blob actor destroyed"),
            StreamError::PeerGone => write!(f, "peer endpoint is gone"),
            StreamError::Io(reason) => write!(f, "i/o error: {reason}"),
        }
    }
}

/// Messages of the blob protocol. Each one names the actor it is addressed
/// to; the receiving endpoint looks the actor up by id.
#[derive(Debug, Deserialize, Serialize)]
pub enum BlobMsg {
    /// Construct a blob actor on the receiving side.
    Constructor {
        actor: BlobActorId,
        params: BlobConstructorParams,
    },
    /// Sent exactly once per mystery blob.
    ResolveMystery {
        actor: BlobActorId,
        params: ResolveMysteryParams,
    },
    /// Please open a stream for this blob.
    StreamConstructor {
        actor: BlobActorId,
        stream: BlobStreamId,
    },
    /// The answer to a stream request, carrying the stream description or the failure.
    StreamDelete {
        actor: BlobActorId,
        stream: BlobStreamId,
        result: Result<InputStreamParams, StreamError>,
    },
    /// Delete the actor on both sides.
    Delete { actor: BlobActorId },
}
