/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::{Arc, Weak};

use blob_traits::{BlobActorId, BlobMetadata, BlobStreamId};
use log::debug;

use crate::blob::Blob;
use crate::cancellation::CancellationToken;

/// Why an actor went away.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActorDestroyReason {
    /// Either side deleted the actor.
    Deletion,
    /// The peer disconnected without deleting its actors.
    AbnormalShutdown,
    /// The local endpoint is exiting.
    Shutdown,
}

/// How an actor holds on to its blob.
pub(crate) enum BlobOwnership {
    /// The actor keeps the blob alive.
    Owned(Arc<Blob>),
    /// Someone else owns the blob; the actor only needs to reach it.
    External(Weak<Blob>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum MysteryState {
    NotMystery,
    /// Waiting for the one-shot metadata.
    Pending,
    Resolved,
}

/// One endpoint of a blob actor pair.
pub(crate) struct BlobActor {
    id: BlobActorId,
    ownership: BlobOwnership,
    /// Whether the bytes live on the other side.
    remote: bool,
    is_file: bool,
    mystery: MysteryState,
    /// Open-stream tasks serving this actor, by request.
    open_stream_tasks: Vec<(BlobStreamId, CancellationToken)>,
}

impl BlobActor {
    /// The sending side of a local blob.
    pub(crate) fn new_local(id: BlobActorId, blob: Arc<Blob>, mystery: bool) -> BlobActor {
        BlobActor {
            id,
            is_file: blob.is_file(),
            ownership: BlobOwnership::Owned(blob),
            remote: false,
            mystery: if mystery {
                MysteryState::Pending
            } else {
                MysteryState::NotMystery
            },
            open_stream_tasks: vec![],
        }
    }

    /// The receiving side, holding a `RemoteBlob` until someone takes it.
    pub(crate) fn new_remote(id: BlobActorId, blob: Arc<Blob>) -> BlobActor {
        BlobActor {
            id,
            is_file: blob.is_file(),
            mystery: if blob.is_mystery() {
                MysteryState::Pending
            } else {
                MysteryState::NotMystery
            },
            ownership: BlobOwnership::Owned(blob),
            remote: true,
            open_stream_tasks: vec![],
        }
    }

    pub(crate) fn is_remote(&self) -> bool {
        self.remote
    }

    pub(crate) fn is_file(&self) -> bool {
        self.is_file
    }

    pub(crate) fn mystery_state(&self) -> MysteryState {
        self.mystery
    }

    pub(crate) fn mark_resolved(&mut self, metadata: &BlobMetadata) {
        self.mystery = MysteryState::Resolved;
        self.is_file = metadata.is_file();
    }

    /// The blob, without changing who owns it.
    pub(crate) fn blob(&self) -> Option<Arc<Blob>> {
        match self.ownership {
            BlobOwnership::Owned(ref blob) => Some(blob.clone()),
            BlobOwnership::External(ref blob) => blob.upgrade(),
        }
    }

    /// Hand the blob to an external consumer. The first call on a remote
    /// actor gives up the actor's own reference, so the blob dies with its
    /// last consumer and notifies the actor from its destructor.
    pub(crate) fn get_blob(&mut self) -> Option<Arc<Blob>> {
        let blob = self.blob()?;
        if self.remote && matches!(self.ownership, BlobOwnership::Owned(_)) {
            debug!("{} is now owned by its consumers", self.id);
            self.ownership = BlobOwnership::External(Arc::downgrade(&blob));
        }
        Some(blob)
    }

    pub(crate) fn owns_blob(&self) -> bool {
        matches!(self.ownership, BlobOwnership::Owned(_))
    }

    pub(crate) fn track(&mut self, stream: BlobStreamId, token: CancellationToken) {
        self.open_stream_tasks.push((stream, token));
    }

    pub(crate) fn untrack(&mut self, stream: BlobStreamId) -> bool {
        let before = self.open_stream_tasks.len();
        self.open_stream_tasks.retain(|(id, _)| *id != stream);
        self.open_stream_tasks.len() != before
    }

    pub(crate) fn task_count(&self) -> usize {
        self.open_stream_tasks.len()
    }

    /// Revoke and forget every tracked task. Returns how many there were.
    pub(crate) fn revoke_all(&mut self) -> usize {
        let tasks = std::mem::take(&mut self.open_stream_tasks);
        for (_, token) in &tasks {
            token.revoke();
        }
        tasks.len()
    }
}
