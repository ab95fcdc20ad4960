use std::{
    io,
    net::{SocketAddr, SocketAddrV4},
    os::fd::FromRawFd,
};

use hubbub_utils::safe_panic;
use mio::{Events, Interest, Poll, event::Event, net::TcpListener};
use tracing::{debug, info, trace, warn};

use crate::{
    MAX_CONN, MAX_LINE, POOL_SIZE,
    clock::Clock,
    conn::{ConnTable, LISTENER, slot_of, token_of},
    error::FatalError,
    framer::Ingest,
    history::{History, Nick, Text},
    outbox::Drain,
    pool::BlockPool,
    proto::{self, Command},
};

const BACKLOG: libc::c_int = 128;

/// The whole chat server: listener, poller, block pool, history and the
/// connection table, owned by one value and driven by one thread.
pub struct Server {
    events: Events,
    engine: Engine,
}

impl Server {
    /// Binds the listening socket (`SO_REUSEADDR`, non-blocking) and sets
    /// up the poller. Nothing runs until [`run`](Self::run).
    pub fn bind(addr: SocketAddrV4, clock: Clock) -> Result<Self, FatalError> {
        let mut listener = bind_listener(addr).map_err(FatalError::Listen)?;
        let local_addr = listener.local_addr().map_err(FatalError::Listen)?;
        let poll = Poll::new().map_err(FatalError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(FatalError::Listen)?;

        Ok(Self {
            events: Events::with_capacity(MAX_CONN),
            engine: Engine {
                poll,
                listener,
                local_addr,
                clock,
                pool: BlockPool::new(POOL_SIZE),
                history: History::new(),
                conns: ConnTable::new(),
                scratch: Vec::with_capacity(MAX_LINE),
            },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.engine.local_addr
    }

    /// Blocks on readiness, dispatches, compacts; forever, or until a
    /// fatal condition (pool exhaustion, poller failure) ends the process.
    pub fn run(&mut self) -> Result<(), FatalError> {
        loop {
            self.engine.poll.poll(&mut self.events, None).map_err(FatalError::Poll)?;
            for event in self.events.iter() {
                self.engine.handle_event(event)?;
            }
            self.engine.end_turn();
        }
    }
}

struct Engine {
    poll: Poll,
    listener: TcpListener,
    local_addr: SocketAddr,
    clock: Clock,
    pool: BlockPool,
    history: History,
    conns: ConnTable,
    /// Reply staging buffer, cleared per packet.
    scratch: Vec<u8>,
}

impl Engine {
    fn handle_event(&mut self, event: &Event) -> Result<(), FatalError> {
        if event.token() == LISTENER {
            if event.is_readable() {
                self.accept_burst();
            }
            return Ok(());
        }

        let slot = slot_of(event.token());
        if slot >= self.conns.peer_count() {
            safe_panic!("event for unknown token {:?}", event.token());
            return Ok(());
        }

        if event.is_readable() {
            self.handle_input(slot)?;
        }
        if event.is_writable() {
            self.handle_output(slot);
        } else if event.is_error() || event.is_read_closed() {
            if let Some(conn) = self.conns.get_mut(slot) {
                conn.closed = true;
            }
        }
        Ok(())
    }

    fn accept_burst(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => {
                    if self.conns.is_full() {
                        warn!(?peer_addr, "connection table full, rejecting");
                        drop(stream);
                        continue;
                    }
                    let cursor = self.clock.stamp();
                    let Engine { poll, conns, .. } = self;
                    match conns.accept_one(poll.registry(), stream, peer_addr, cursor) {
                        Ok(token) => info!(?peer_addr, ?token, "client connected"),
                        Err(err) => warn!(?err, ?peer_addr, "failed to register client"),
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(%err, "accept failed");
                    break;
                }
            }
        }
    }

    /// Reads until the socket runs dry, the peer goes away, or replies
    /// start waiting in the outbox. Pending output pauses input, so a
    /// client that never reads throttles itself, not the server.
    fn handle_input(&mut self, slot: usize) -> Result<(), FatalError> {
        loop {
            let Some(conn) = self.conns.get_mut(slot) else { return Ok(()) };
            if conn.closed {
                return Ok(());
            }
            let ingest = match conn.framer.ingest(&mut conn.stream) {
                Ok(ingest) => ingest,
                Err(err) => {
                    debug!(?err, peer_addr = ?conn.peer_addr, "recv failed");
                    conn.closed = true;
                    break;
                }
            };
            match ingest {
                Ingest::Eof => {
                    debug!(peer_addr = ?conn.peer_addr, "peer closed the connection");
                    conn.closed = true;
                    break;
                }
                Ingest::WouldBlock => break,
                Ingest::Received(_) => {
                    self.process_lines(slot)?;
                    let Some(conn) = self.conns.get_mut(slot) else { return Ok(()) };
                    if conn.closed || !conn.outbox.is_empty() {
                        break;
                    }
                }
            }
        }
        self.update_interest(slot);
        Ok(())
    }

    fn process_lines(&mut self, slot: usize) -> Result<(), FatalError> {
        loop {
            let Some(conn) = self.conns.get_mut(slot) else { return Ok(()) };
            let line = match conn.framer.take_line() {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(()),
                Err(err) => {
                    debug!(%err, peer_addr = ?conn.peer_addr, "closing connection");
                    conn.closed = true;
                    return Ok(());
                }
            };
            self.handle_line(slot, &line)?;
            if self.conns.get_mut(slot).is_none_or(|conn| conn.closed) {
                return Ok(());
            }
        }
    }

    /// Interprets one packet in the context of connection `slot` and
    /// stages the reply. The only fatal outcome is running the shared
    /// block pool dry while queueing that reply.
    fn handle_line(&mut self, slot: usize, line: &[u8]) -> Result<(), FatalError> {
        trace!(slot, line = %String::from_utf8_lossy(line), "packet");

        let command = match proto::parse(line) {
            Ok(command) => command,
            Err(violation) => {
                let Some(conn) = self.conns.get_mut(slot) else { return Ok(()) };
                debug!(%violation, peer_addr = ?conn.peer_addr, "closing connection");
                conn.closed = true;
                return Ok(());
            }
        };

        let Engine { conns, pool, history, clock, scratch, .. } = self;
        scratch.clear();

        match command {
            Command::SetNick(nick) => {
                let Some(conn) = conns.get_mut(slot) else { return Ok(()) };
                conn.nick = Nick::try_from(nick).expect("parse enforces the nick limit");
                proto::push_ok(scratch);
            }
            Command::Folks => {
                // Count and listing both cover every peer slot, the
                // requester included, in accept order.
                proto::push_count(scratch, conns.peer_count());
                for peer in conns.iter() {
                    proto::push_nick(scratch, &peer.nick);
                }
            }
            Command::Send(text) => {
                let Some(conn) = conns.get_mut(slot) else { return Ok(()) };
                let text = Text::try_from(text).expect("parse enforces the message limit");
                history.append(conn.nick, text, clock.stamp(), clock.wall());
                proto::push_ok(scratch);
            }
            Command::New => {
                let Some(conn) = conns.get_mut(slot) else { return Ok(()) };
                proto::push_count(scratch, history.newer_than(conn.cursor).count());
                for entry in history.newer_than(conn.cursor) {
                    proto::push_entry(scratch, entry);
                }
                conn.cursor = clock.stamp();
            }
        }

        let Some(conn) = conns.get_mut(slot) else { return Ok(()) };
        conn.outbox.enqueue(pool, scratch)?;
        Ok(())
    }

    fn handle_output(&mut self, slot: usize) {
        let Engine { poll, conns, pool, .. } = self;
        let Some(conn) = conns.get_mut(slot) else { return };
        if conn.closed {
            return;
        }
        match conn.outbox.drain(pool, &mut conn.stream) {
            Ok(Drain::Empty) => {
                if let Err(err) =
                    conn.set_interest(poll.registry(), token_of(slot), Interest::READABLE)
                {
                    debug!(?err, "interest reregister failed");
                    conn.closed = true;
                }
            }
            Ok(Drain::Pending) => {}
            Err(err) => {
                debug!(?err, peer_addr = ?conn.peer_addr, "send failed");
                conn.closed = true;
            }
        }
    }

    fn update_interest(&mut self, slot: usize) {
        let Engine { poll, conns, .. } = self;
        let Some(conn) = conns.get_mut(slot) else { return };
        if conn.closed {
            return;
        }
        let want = if conn.outbox.is_empty() { Interest::READABLE } else { Interest::WRITABLE };
        if let Err(err) = conn.set_interest(poll.registry(), token_of(slot), want) {
            debug!(?err, "interest reregister failed");
            conn.closed = true;
        }
    }

    fn end_turn(&mut self) {
        let Engine { poll, conns, pool, .. } = self;
        conns.compact(poll.registry(), pool);
    }
}

/// Raw listener setup: `SO_REUSEADDR` has to go on before `bind`, which
/// the std builders cannot express, so the socket is made by hand.
fn bind_listener(addr: SocketAddrV4) -> io::Result<TcpListener> {
    let fd = unsafe {
        libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC, 0)
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // Owning the fd from here on closes it on every error path below.
    let listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };

    let one: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &one as *const _ as *const libc::c_void,
            core::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    let sin = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: addr.port().to_be(),
        sin_addr: libc::in_addr { s_addr: u32::from(*addr.ip()).to_be() },
        sin_zero: [0; 8],
    };
    let rc = unsafe {
        libc::bind(
            fd,
            &sin as *const _ as *const libc::sockaddr,
            core::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    if unsafe { libc::listen(fd, BACKLOG) } < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(TcpListener::from_std(listener))
}
