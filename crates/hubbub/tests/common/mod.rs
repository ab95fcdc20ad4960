#![allow(dead_code)]

use std::{
    io::{Read, Write},
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream},
    thread,
    time::Duration,
};

use hubbub::{Clock, Server};

/// Boots a server on an ephemeral port and leaves it running on a
/// background thread for the lifetime of the test process.
pub fn start_server() -> SocketAddr {
    let mut server = Server::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), Clock::new())
        .expect("failed to bind test server");
    let addr = server.local_addr();
    thread::spawn(move || {
        if let Err(err) = server.run() {
            panic!("server died: {err}");
        }
    });
    addr
}

/// A blocking wire-protocol client for driving the server from tests.
pub struct Client {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl Client {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("failed to connect");
        stream.set_read_timeout(Some(Duration::from_secs(5))).expect("set_read_timeout");
        Self { stream, buf: Vec::new() }
    }

    pub fn send_line(&mut self, line: &str) {
        self.send_raw(line.as_bytes());
        self.send_raw(b"\r\n");
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).expect("failed to send");
    }

    /// Reads one CRLF-terminated line, terminator stripped.
    pub fn read_line(&mut self) -> String {
        loop {
            if let Some(at) = self.buf.windows(2).position(|w| w == b"\r\n") {
                let line = String::from_utf8_lossy(&self.buf[..at]).into_owned();
                self.buf.drain(..at + 2);
                return line;
            }
            let mut chunk = [0u8; 512];
            let n = self.stream.read(&mut chunk).expect("read failed");
            assert!(n > 0, "connection closed while waiting for a line");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    pub fn expect_line(&mut self, want: &str) {
        assert_eq!(self.read_line(), want);
    }

    /// Drains a `folks` reply, returning the listed nicknames. Doubles as
    /// a round-trip barrier: once it returns, the server has registered
    /// this client.
    pub fn folks(&mut self) -> Vec<String> {
        self.send_line("folks");
        let count: usize = self.read_line().parse().expect("folks count");
        (0..count).map(|_| self.read_line()).collect()
    }

    /// Waits for the server to drop this connection.
    pub fn wait_closed(&mut self) -> bool {
        let mut chunk = [0u8; 64];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return true,
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::ConnectionReset => return true,
                Err(err) => panic!("waiting for close: {err}"),
            }
        }
    }
}
