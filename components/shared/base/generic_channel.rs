/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Channels that are either OS IPC channels or in-process crossbeam channels.
//!
//! The blob endpoints talk to each other through these. In multiprocess mode
//! (or when `force_ipc` is set) every message is serialized and crosses an
//! IPC channel; otherwise the same message types travel over crossbeam.

use std::fmt;

use ipc_channel::IpcError;
use ipc_channel::ipc::{self, IpcReceiver, IpcSender};
use log::warn;
use serde::{Deserialize, Serialize};
use servo_config::opts;

#[derive(Clone, Debug, PartialEq)]
pub enum SendError {
    /// The receiving end is gone.
    Disconnected,
    /// The message could not be serialized, or the IPC transport failed.
    SerializationError(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Disconnected => write!(f, "receiver disconnected"),
            SendError::SerializationError(reason) => write!(f, "failed to send: {reason}"),
        }
    }
}

pub type SendResult = Result<(), SendError>;

#[derive(Clone, Debug, PartialEq)]
pub enum ReceiveError {
    /// Every sender is gone.
    Disconnected,
    /// The message could not be decoded, or the IPC transport failed.
    DeserializationFailed(String),
}

impl fmt::Display for ReceiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiveError::Disconnected => write!(f, "sender disconnected"),
            ReceiveError::DeserializationFailed(reason) => {
                write!(f, "failed to receive: {reason}")
            },
        }
    }
}

pub type ReceiveResult<T> = Result<T, ReceiveError>;

pub struct GenericSender<T: Serialize>(GenericSenderVariants<T>);

enum GenericSenderVariants<T: Serialize> {
    Ipc(IpcSender<T>),
    Crossbeam(crossbeam_channel::Sender<T>),
}

impl<T: Serialize> Clone for GenericSender<T> {
    fn clone(&self) -> Self {
        match &self.0 {
            GenericSenderVariants::Ipc(sender) => {
                GenericSender(GenericSenderVariants::Ipc(sender.clone()))
            },
            GenericSenderVariants::Crossbeam(sender) => {
                GenericSender(GenericSenderVariants::Crossbeam(sender.clone()))
            },
        }
    }
}

impl<T: Serialize> fmt::Debug for GenericSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            GenericSenderVariants::Ipc(_) => f.write_str("GenericSender(Ipc)"),
            GenericSenderVariants::Crossbeam(_) => f.write_str("GenericSender(Crossbeam)"),
        }
    }
}

impl<T: Serialize> GenericSender<T> {
    pub fn send(&self, msg: T) -> SendResult {
        match &self.0 {
            GenericSenderVariants::Ipc(sender) => sender
                .send(msg)
                .map_err(|error| SendError::SerializationError(error.to_string())),
            GenericSenderVariants::Crossbeam(sender) => {
                sender.send(msg).map_err(|_| SendError::Disconnected)
            },
        }
    }

    pub fn is_ipc(&self) -> bool {
        matches!(self.0, GenericSenderVariants::Ipc(_))
    }
}

pub struct GenericReceiver<T>(GenericReceiverVariants<T>)
where
    T: for<'de> Deserialize<'de> + Serialize;

enum GenericReceiverVariants<T>
where
    T: for<'de> Deserialize<'de> + Serialize,
{
    Ipc(IpcReceiver<T>),
    Crossbeam(crossbeam_channel::Receiver<T>),
}

impl<T> GenericReceiver<T>
where
    T: for<'de> Deserialize<'de> + Serialize,
{
    /// Block until a message arrives or every sender is gone.
    pub fn recv(&self) -> ReceiveResult<T> {
        match &self.0 {
            GenericReceiverVariants::Ipc(receiver) => receiver.recv().map_err(|error| match error {
                IpcError::Disconnected => ReceiveError::Disconnected,
                other => ReceiveError::DeserializationFailed(format!("{other:?}")),
            }),
            GenericReceiverVariants::Crossbeam(receiver) => {
                receiver.recv().map_err(|_| ReceiveError::Disconnected)
            },
        }
    }
}

/// Creates a channel of the flavour selected by the current options.
/// Returns `None` only when an IPC channel was requested and the OS refused
/// to create one.
pub fn channel<T>() -> Option<(GenericSender<T>, GenericReceiver<T>)>
where
    T: for<'de> Deserialize<'de> + Serialize,
{
    if opts::multiprocess() || opts::get().force_ipc {
        create_ipc_channel()
    } else {
        Some(create_crossbeam_channel())
    }
}

pub fn create_ipc_channel<T>() -> Option<(GenericSender<T>, GenericReceiver<T>)>
where
    T: for<'de> Deserialize<'de> + Serialize,
{
    match ipc::channel() {
        Ok((sender, receiver)) => Some((
            GenericSender(GenericSenderVariants::Ipc(sender)),
            GenericReceiver(GenericReceiverVariants::Ipc(receiver)),
        )),
        Err(error) => {
            warn!("Could not create ipc channel: {error}");
            None
        },
    }
}

pub fn create_crossbeam_channel<T>() -> (GenericSender<T>, GenericReceiver<T>)
where
    T: for<'de> Deserialize<'de> + Serialize,
{
    let (sender, receiver) = crossbeam_channel::unbounded();
    (
        GenericSender(GenericSenderVariants::Crossbeam(sender)),
        GenericReceiver(GenericReceiverVariants::Crossbeam(receiver)),
    )
}
