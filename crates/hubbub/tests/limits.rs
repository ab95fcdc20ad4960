mod common;

use common::{Client, start_server};
use hubbub::{MAX_LINE, MSG_MAX, NICK_MAX};

#[test]
fn nick_boundary() {
    let addr = start_server();
    let mut c = Client::connect(addr);
    let exact = "n".repeat(NICK_MAX);
    c.send_line(&format!("my name is {exact}"));
    c.expect_line("ok");
    assert_eq!(c.folks(), vec![exact]);

    let long = "n".repeat(NICK_MAX + 1);
    c.send_line(&format!("my name is {long}"));
    assert!(c.wait_closed());
}

#[test]
fn message_boundary() {
    let addr = start_server();
    let mut c = Client::connect(addr);
    let exact = "m".repeat(MSG_MAX);
    c.send_line(&format!("send {exact}"));
    c.expect_line("ok");

    let mut d = Client::connect(addr);
    let long = "m".repeat(MSG_MAX + 1);
    d.send_line(&format!("send {long}"));
    assert!(d.wait_closed());
}

#[test]
fn unterminated_line_at_capacity_closes() {
    let addr = start_server();
    let mut c = Client::connect(addr);
    c.send_raw(&vec![b'a'; MAX_LINE - 1]);
    std::thread::sleep(std::time::Duration::from_millis(20));
    c.send_raw(b"a");
    assert!(c.wait_closed());
}

#[test]
fn empty_line_closes() {
    let addr = start_server();
    let mut c = Client::connect(addr);
    c.send_line("");
    assert!(c.wait_closed());
}

#[test]
fn nick_with_spaces_is_stored_verbatim() {
    let addr = start_server();
    let mut c = Client::connect(addr);
    c.send_line("my name is two words");
    c.expect_line("ok");
    assert_eq!(c.folks(), vec!["two words"]);
}
