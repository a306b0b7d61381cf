/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::Arc;
use std::thread;

use blob::{ActorDestroyReason, Blob, BlobEvent, read_to_end};
use blob_traits::StreamError;

use crate::{Gate, gated_blob, new_pair, poll_until, share, wait_for_event};

#[test]
fn test_concurrent_streams_over_one_blob() {
    let pair = new_pair();
    let contents: Vec<u8> = (0..100_000u32).map(|i| (i % 256) as u8).collect();
    let blob = Blob::from_bytes(contents.clone(), "");
    let (_, received) = share(&pair, &blob);

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let received = received.clone();
            thread::spawn(move || received.read_to_end().unwrap())
        })
        .collect();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), contents);
    }
    poll_until(|| {
        pair.parent
            .dispatch_and_block(|thread| thread.in_flight_open_streams())
            .unwrap() ==
            0
    });
    assert_eq!(
        pair.parent
            .dispatch_and_block(|thread| thread.responses_sent())
            .unwrap(),
        2
    );
}

#[test]
fn test_available_on_the_blob_thread_does_not_block() {
    let pair = new_pair();
    let gate = Arc::new(Gate::default());
    let blob = gated_blob(b"gated", gate.clone());
    let (_, received) = share(&pair, &blob);

    let stream = received.get_internal_stream().unwrap();
    assert!(received.is_immutable());
    let polled = stream.clone();
    assert_eq!(
        pair.child
            .dispatch_and_block(move |_| polled.available())
            .unwrap(),
        Err(StreamError::Closed)
    );
    gate.open();
    assert_eq!(read_to_end(&*stream).unwrap(), b"gated");
}

#[test]
fn test_deleting_an_actor_revokes_open_stream_tasks() {
    let pair = new_pair();
    let gate = Arc::new(Gate::default());
    let blob = gated_blob(b"never sent", gate.clone());
    let (actor, received) = share(&pair, &blob);

    let streams: Vec<_> = (0..3)
        .map(|_| received.get_internal_stream().unwrap())
        .collect();
    poll_until(|| {
        pair.parent
            .dispatch_and_block(move |thread| thread.open_stream_task_count(actor))
            .unwrap() ==
            Some(3)
    });
    assert_eq!(
        pair.parent
            .dispatch_and_block(move |thread| thread.delete_actor(actor))
            .unwrap(),
        Some(3)
    );
    wait_for_event(&pair.child_events, |event| {
        *event == BlobEvent::ActorDestroyed(actor, ActorDestroyReason::Deletion)
    });
    for stream in &streams {
        assert_eq!(read_to_end(&**stream), Err(StreamError::ActorDestroyed));
    }

    gate.open();
    poll_until(|| {
        pair.parent
            .dispatch_and_block(|thread| thread.in_flight_open_streams())
            .unwrap() ==
            0
    });
    assert_eq!(
        pair.parent
            .dispatch_and_block(|thread| thread.responses_sent())
            .unwrap(),
        0
    );
}

#[test]
fn test_peer_exit_while_a_stream_is_opening() {
    let pair = new_pair();
    let gate = Arc::new(Gate::default());
    let blob = gated_blob(b"abandoned", gate.clone());
    let (actor, received) = share(&pair, &blob);

    let stream = received.get_internal_stream().unwrap();
    poll_until(|| {
        pair.parent
            .dispatch_and_block(move |thread| thread.open_stream_task_count(actor))
            .unwrap() ==
            Some(1)
    });
    pair.child.exit().unwrap();
    wait_for_event(&pair.parent_events, |event| {
        *event == BlobEvent::ActorDestroyed(actor, ActorDestroyReason::AbnormalShutdown)
    });
    wait_for_event(&pair.parent_events, |event| {
        *event == BlobEvent::PeerDisconnected
    });
    assert!(read_to_end(&*stream).is_err());

    gate.open();
    poll_until(|| {
        pair.parent
            .dispatch_and_block(|thread| thread.in_flight_open_streams())
            .unwrap() ==
            0
    });
    assert_eq!(
        pair.parent
            .dispatch_and_block(|thread| (thread.actor_count(), thread.responses_sent()))
            .unwrap(),
        (0, 0)
    );
}

#[test]
fn test_open_stream_keeps_a_dropped_blob_alive_until_closed() {
    let pair = new_pair();
    let blob = Blob::from_bytes(b"kept alive".to_vec(), "");
    let (actor, received) = share(&pair, &blob);

    let stream = received.get_internal_stream().unwrap();
    assert_eq!(read_to_end(&*stream).unwrap(), b"kept alive");
    drop(received);
    assert_eq!(
        pair.child
            .dispatch_and_block(move |thread| {
                (thread.has_actor(actor), thread.actor_owns_blob(actor))
            })
            .unwrap(),
        (true, Some(false))
    );
    assert!(
        pair.parent
            .dispatch_and_block(move |thread| thread.has_actor(actor))
            .unwrap()
    );

    stream.close().unwrap();
    drop(stream);
    wait_for_event(&pair.child_events, |event| {
        *event == BlobEvent::ActorDestroyed(actor, ActorDestroyReason::Deletion)
    });
    wait_for_event(&pair.parent_events, |event| {
        *event == BlobEvent::ActorDestroyed(actor, ActorDestroyReason::Deletion)
    });
    assert!(
        !pair
            .parent
            .dispatch_and_block(move |thread| thread.has_actor(actor))
            .unwrap()
    );
}

#[test]
fn test_multipart_with_a_remote_part_round_trips() {
    let pair = new_pair();
    let head = Blob::from_bytes(b"head".to_vec(), "");
    let (_, remote_head) = share(&pair, &head);
    let multipart = Blob::from_parts(
        vec![remote_head, Blob::from_bytes(b" tail".to_vec(), "")],
        "text/plain",
    )
    .unwrap();

    let sent = multipart.clone();
    let actor = pair
        .child
        .dispatch_and_block(move |thread| thread.send_blob(&sent))
        .unwrap()
        .unwrap();
    wait_for_event(&pair.parent_events, |event| {
        *event == BlobEvent::BlobReceived(actor)
    });
    let returned = pair
        .parent
        .dispatch_and_block(move |thread| thread.get_blob(actor))
        .unwrap()
        .unwrap();
    assert_eq!(returned.size(), Some(9));
    assert_eq!(returned.read_to_end().unwrap(), b"head tail");
}
