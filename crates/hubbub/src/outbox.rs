use std::io;

use crate::pool::{BlockIdx, BlockPool, PoolExhausted};

/// Outcome of draining an outbox to its socket.
#[derive(Debug, PartialEq, Eq)]
pub enum Drain {
    /// Every queued byte reached the kernel; interest can revert to reads.
    Empty,
    /// The socket stopped accepting bytes; retry on the next writable event.
    Pending,
}

/// Per-connection chain of pool blocks awaiting transmission, oldest at
/// the head. Only the tail block may be partially filled; enqueues top it
/// up before chaining a fresh block.
pub struct Outbox {
    head: Option<BlockIdx>,
    tail: Option<BlockIdx>,
}

impl Outbox {
    pub const fn new() -> Self {
        Self { head: None, tail: None }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Queues `bytes` behind everything already pending, pulling blocks
    /// from the pool as the chain grows.
    pub fn enqueue(&mut self, pool: &mut BlockPool, mut bytes: &[u8]) -> Result<(), PoolExhausted> {
        while !bytes.is_empty() {
            let tail = match self.tail {
                Some(idx) if pool.get(idx).free_space() > 0 => idx,
                _ => self.grow(pool)?,
            };
            let taken = pool.get_mut(tail).fill(bytes);
            bytes = &bytes[taken..];
        }
        Ok(())
    }

    fn grow(&mut self, pool: &mut BlockPool) -> Result<BlockIdx, PoolExhausted> {
        let idx = pool.take()?;
        match self.tail {
            Some(tail) => pool.get_mut(tail).set_next(Some(idx)),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        Ok(idx)
    }

    /// Writes the chain head-first. One write attempt per block: a full
    /// write releases the block and moves on, a short write records the
    /// offset and yields, `WouldBlock` yields, anything else is the
    /// caller's cue to drop the connection.
    pub fn drain(&mut self, pool: &mut BlockPool, writer: &mut impl io::Write) -> io::Result<Drain> {
        while let Some(idx) = self.head {
            let remaining = pool.get(idx).unsent().len();
            match writer.write(pool.get(idx).unsent()) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) if n == remaining => {
                    self.head = pool.get(idx).next();
                    if self.head.is_none() {
                        self.tail = None;
                    }
                    pool.release(idx);
                }
                Ok(n) => {
                    pool.get_mut(idx).advance(n);
                    return Ok(Drain::Pending);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(Drain::Pending),
                Err(err) => return Err(err),
            }
        }
        Ok(Drain::Empty)
    }

    /// Hands every queued block back to the pool. Called on teardown so a
    /// closed connection cannot strand pool capacity.
    pub fn clear(&mut self, pool: &mut BlockPool) {
        while let Some(idx) = self.head {
            self.head = pool.get(idx).next();
            pool.release(idx);
        }
        self.tail = None;
    }
}
