mod common;

use common::{Client, start_server};

#[test]
fn history_keeps_the_newest_fifty() {
    let addr = start_server();
    let mut poster = Client::connect(addr);
    let mut reader = Client::connect(addr);

    // Register the reader before anything is posted.
    reader.folks();

    poster.send_line("my name is alice");
    poster.expect_line("ok");
    for i in 0..51 {
        poster.send_line(&format!("send m{i}"));
        poster.expect_line("ok");
    }

    reader.send_line("new");
    reader.expect_line("50");
    let mut bodies = Vec::new();
    for _ in 0..50 {
        let line = reader.read_line();
        let (_, body) = line.split_once("] ").expect("timestamped line");
        bodies.push(body.to_string());
    }
    // Newest first; the very first post has rolled off.
    assert_eq!(bodies.first().map(String::as_str), Some("alice: m50"));
    assert_eq!(bodies.last().map(String::as_str), Some("alice: m1"));
    assert!(!bodies.iter().any(|b| b == "alice: m0"));

    reader.send_line("new");
    reader.expect_line("0");
}

#[test]
fn poll_only_sees_posts_after_the_cursor() {
    let addr = start_server();
    let mut poster = Client::connect(addr);
    let mut reader = Client::connect(addr);
    reader.folks();

    poster.send_line("send one");
    poster.expect_line("ok");

    reader.send_line("new");
    reader.expect_line("1");
    let first = reader.read_line();
    assert!(first.ends_with("] anonym: one"), "unexpected line {first:?}");

    poster.send_line("send two");
    poster.expect_line("ok");
    poster.send_line("send three");
    poster.expect_line("ok");

    reader.send_line("new");
    reader.expect_line("2");
    assert!(reader.read_line().ends_with("] anonym: three"));
    assert!(reader.read_line().ends_with("] anonym: two"));
}

#[test]
fn late_joiner_sees_nothing_old() {
    let addr = start_server();
    let mut poster = Client::connect(addr);
    poster.send_line("send before anyone joined");
    poster.expect_line("ok");

    let mut late = Client::connect(addr);
    late.send_line("new");
    late.expect_line("0");
}
