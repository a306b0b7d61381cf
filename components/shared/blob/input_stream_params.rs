/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Process-transferable descriptions of byte streams.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::BlobActorId;

/// Inline bytes: the unread remainder of an in-memory stream.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StringInputStreamParams {
    pub data: Vec<u8>,
}

/// A byte range of a file. `length` is `None` to read until the end of the
/// file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FileInputStreamParams {
    pub path: PathBuf,
    pub start: u64,
    pub length: Option<u64>,
}

/// The concatenation of the child streams, in order.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MultiplexInputStreamParams {
    pub streams: Vec<InputStreamParams>,
}

/// A stream whose bytes belong to the blob behind `actor`, which the
/// receiving endpoint already knows.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RemoteInputStreamParams {
    pub actor: BlobActorId,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum InputStreamParams {
    StringInputStream(StringInputStreamParams),
    FileInputStream(FileInputStreamParams),
    MultiplexInputStream(MultiplexInputStreamParams),
    RemoteInputStream(RemoteInputStreamParams),
}

impl InputStreamParams {
    /// Short name of the variant, for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            InputStreamParams::StringInputStream(_) => "string",
            InputStreamParams::FileInputStream(_) => "file",
            InputStreamParams::MultiplexInputStream(_) => "multiplex",
            InputStreamParams::RemoteInputStream(_) => "remote",
        }
    }
}

/// A stream parameter that call sites may legitimately omit.
pub type OptionalInputStreamParams = Option<InputStreamParams>;
