/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Conversion between concrete streams and their wire descriptions.

use std::sync::Arc;

use blob_traits::{
    BlobActorId, FileInputStreamParams, InputStreamParams, OptionalInputStreamParams,
    StreamError,
};
use log::{error, trace};

use crate::file_stream::FileInputStream;
use crate::input_stream::InputStream;
use crate::multiplex_stream::MultiplexInputStream;
use crate::string_stream::StringInputStream;

/// Turns a `RemoteInputStream` description back into a stream. The actor
/// named by the description is local to the receiving side, so its blob can
/// hand out its own stream without copying any bytes.
pub trait RemoteStreamResolver {
    fn resolve_remote_stream(
        &mut self,
        actor: BlobActorId,
    ) -> Result<Arc<dyn InputStream>, StreamError>;
}

pub fn serialize_input_stream(stream: &dyn InputStream) -> Result<InputStreamParams, StreamError> {
    let Some(serializable) = stream.serializable() else {
        error!("Attempted to serialize a stream without a wire description");
        return Err(StreamError::NotSerializable);
    };
    let params = serializable.serialize()?;
    trace!("Serialized {} stream", params.tag());
    Ok(params)
}

pub fn serialize_optional_input_stream(
    stream: Option<&dyn InputStream>,
) -> Result<OptionalInputStreamParams, StreamError> {
    stream.map(serialize_input_stream).transpose()
}

pub fn deserialize_input_stream(
    params: InputStreamParams,
    resolver: &mut dyn RemoteStreamResolver,
) -> Result<Arc<dyn InputStream>, StreamError> {
    trace!("Deserializing {} stream", params.tag());
    let stream: Arc<dyn InputStream> = match params {
        InputStreamParams::StringInputStream(params) => {
            Arc::new(StringInputStream::new(params.data))
        },
        InputStreamParams::FileInputStream(FileInputStreamParams {
            path,
            start,
            length,
        }) => Arc::new(FileInputStream::new(path, start, length)),
        InputStreamParams::MultiplexInputStream(params) => {
            let streams = params
                .streams
                .into_iter()
                .map(|child| deserialize_input_stream(child, resolver))
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(MultiplexInputStream::new(streams))
        },
        InputStreamParams::RemoteInputStream(params) => resolver
            .resolve_remote_stream(params.actor)
            .inspect_err(|error| {
                error!(
                    "Could not resolve remote stream for {}: {}",
                    params.actor, error
                )
            })?,
    };
    Ok(stream)
}

pub fn deserialize_optional_input_stream(
    params: OptionalInputStreamParams,
    resolver: &mut dyn RemoteStreamResolver,
) -> Result<Option<Arc<dyn InputStream>>, StreamError> {
    params
        .map(|params| deserialize_input_stream(params, resolver))
        .transpose()
}
