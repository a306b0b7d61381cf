/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! Blobs shared between two endpoints.
//!
//! Each endpoint runs a blob thread owning the actors of the blobs it has
//! sent or received. A received blob reads its bytes through a
//! [`RemoteInputStream`], which the peer binds to a stream description once
//! its stream transport pool has opened the real stream.

mod actor;
pub mod blob;
pub mod blob_thread;
mod cancellation;
pub mod file_stream;
pub mod input_stream;
pub mod multiplex_stream;
mod one_shot;
mod open_stream;
pub mod remote_stream;
pub mod serialization;
pub mod string_stream;

pub use crate::actor::ActorDestroyReason;
pub use crate::blob::{Blob, BlobError, BlobImpl, RemoteBlob, normalize_content_type};
pub use crate::blob_thread::{
    BlobEvent, BlobThread, BlobThreadFactory, BlobThreadHandle, new_blob_thread_pair,
};
pub use crate::file_stream::FileInputStream;
pub use crate::input_stream::{
    InputStream, Seekability, SeekableStream, SerializableStream, read_to_end,
};
pub use crate::multiplex_stream::MultiplexInputStream;
pub use crate::remote_stream::RemoteInputStream;
pub use crate::serialization::{
    RemoteStreamResolver, deserialize_input_stream, deserialize_optional_input_stream,
    serialize_input_stream, serialize_optional_input_stream,
};
pub use crate::string_stream::StringInputStream;
