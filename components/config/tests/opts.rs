/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use servo_config::opts::{self, Opts};

#[test]
fn test_default_opts() {
    let opts = opts::default_opts();
    assert!(!opts.multiprocess);
    assert!(!opts.force_ipc);
    assert!(opts.stream_transport_threads > 0);
    assert_eq!(opts.file_chunk_size, 32768);
}

#[test]
fn test_parse_partial_json() {
    let opts = Opts::from_json(r#"{ "stream_transport_threads": 2 }"#).unwrap();
    assert_eq!(opts.stream_transport_threads, 2);
    assert!(!opts.multiprocess);
    assert_eq!(opts.file_chunk_size, 32768);
}

#[test]
fn test_parse_rejects_zero_sizes() {
    let opts =
        Opts::from_json(r#"{ "stream_transport_threads": 0, "file_chunk_size": 0 }"#).unwrap();
    assert_eq!(opts.stream_transport_threads, 1);
    assert_eq!(opts.file_chunk_size, 32768);
}

#[test]
fn test_parse_invalid_json() {
    assert!(Opts::from_json("{ multiprocess: yes").is_err());
}

#[test]
fn test_set_options() {
    let mut new_opts = opts::default_opts();
    new_opts.multiprocess = true;
    new_opts.file_chunk_size = 1024;
    opts::set_options(new_opts);
    assert!(opts::multiprocess());
    assert_eq!(opts::get().file_chunk_size, 1024);

    opts::set_options(opts::default_opts());
    assert!(!opts::multiprocess());
}
