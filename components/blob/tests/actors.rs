/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use blob::{ActorDestroyReason, Blob, BlobError, BlobEvent};
use blob_traits::BlobMetadata;

use crate::{new_pair, share, wait_for_event};

#[test]
fn test_exit() {
    let pair = new_pair();
    pair.parent.exit().unwrap();
    wait_for_event(&pair.child_events, |event| {
        *event == BlobEvent::PeerDisconnected
    });
    pair.child.exit().unwrap();
    assert_eq!(
        pair.parent.dispatch(|_| {}),
        Err(BlobError::ThreadGone)
    );
}

#[test]
fn test_received_blob_keeps_metadata() {
    let pair = new_pair();
    let blob = Blob::from_bytes(b"Hello, blob world!".to_vec(), "Text/Plain");
    let (actor, received) = share(&pair, &blob);
    assert_eq!(received.metadata(), Some(BlobMetadata::new("text/plain", 18)));
    assert_eq!(received.as_remote().and_then(|remote| remote.actor_id()), Some(actor));
    assert_eq!(received.read_to_end().unwrap(), b"Hello, blob world!");
}

#[test]
fn test_first_get_blob_hands_over_ownership() {
    let pair = new_pair();
    let blob = Blob::from_bytes(b"owned".to_vec(), "");
    let (actor, received) = share(&pair, &blob);
    assert_eq!(
        pair.child
            .dispatch_and_block(move |thread| thread.actor_owns_blob(actor))
            .unwrap(),
        Some(false)
    );
    assert_eq!(
        pair.parent
            .dispatch_and_block(move |thread| thread.actor_owns_blob(actor))
            .unwrap(),
        Some(true)
    );

    drop(received);
    let deleted = BlobEvent::ActorDestroyed(actor, ActorDestroyReason::Deletion);
    wait_for_event(&pair.child_events, |event| *event == deleted);
    wait_for_event(&pair.parent_events, |event| *event == deleted);
    assert!(
        !pair
            .parent
            .dispatch_and_block(move |thread| thread.has_actor(actor))
            .unwrap()
    );
}

#[test]
fn test_sending_a_received_blob_back_reuses_its_actor() {
    let pair = new_pair();
    let blob = Blob::from_bytes(b"boomerang".to_vec(), "");
    let (actor, received) = share(&pair, &blob);
    let returned = received.clone();
    assert_eq!(
        pair.child
            .dispatch_and_block(move |thread| thread.send_blob(&returned))
            .unwrap(),
        Ok(actor)
    );
    assert_eq!(
        pair.parent
            .dispatch_and_block(|thread| thread.actor_count())
            .unwrap(),
        1
    );
}

#[test]
fn test_received_blob_outlives_its_actor() {
    let pair = new_pair();
    let blob = Blob::from_bytes(b"short lived".to_vec(), "");
    let (actor, received) = share(&pair, &blob);
    assert_eq!(
        pair.parent
            .dispatch_and_block(move |thread| thread.delete_actor(actor))
            .unwrap(),
        Some(0)
    );
    wait_for_event(&pair.child_events, |event| {
        *event == BlobEvent::ActorDestroyed(actor, ActorDestroyReason::Deletion)
    });
    assert!(received.as_remote().unwrap().actor_id().is_none());
    assert_eq!(
        received.get_internal_stream().err(),
        Some(BlobError::ActorGone)
    );
    assert_eq!(received.size(), Some(11));
}

#[test]
fn test_remote_slice() {
    let pair = new_pair();
    let blob = Blob::from_bytes(b"Hello, blob world!".to_vec(), "text/plain");
    let (_, received) = share(&pair, &blob);

    let slice = received
        .slice(Some(7), Some(11), Some("TEXT/X-Custom"))
        .unwrap();
    assert_eq!(slice.size(), Some(4));
    assert_eq!(slice.metadata().unwrap().content_type, "text/x-custom");
    assert!(slice.as_remote().is_some());
    assert_eq!(slice.read_to_end().unwrap(), b"blob");

    let tail = received.slice(Some(-6), None, None).unwrap();
    assert_eq!(tail.metadata(), Some(BlobMetadata::new("", 6)));
    assert_eq!(tail.read_to_end().unwrap(), b"world!");

    assert_eq!(
        pair.parent
            .dispatch_and_block(|thread| thread.actor_count())
            .unwrap(),
        3
    );
}

#[test]
fn test_remote_slice_on_the_blob_thread() {
    let pair = new_pair();
    let blob = Blob::from_bytes(b"Hello, blob world!".to_vec(), "");
    let (_, received) = share(&pair, &blob);

    let direct = received.clone();
    assert_eq!(
        pair.child
            .dispatch_and_block(move |_| direct.slice(Some(0), Some(5), None))
            .unwrap()
            .err(),
        Some(BlobError::WrongThread)
    );

    let sliced = received.clone();
    let head = pair
        .child
        .dispatch_and_block(move |thread| thread.slice_blob(&sliced, Some(0), Some(5), None))
        .unwrap()
        .unwrap();
    assert_eq!(head.read_to_end().unwrap(), b"Hello");
}
