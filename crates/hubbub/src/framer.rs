use std::io;

use hubbub_utils::ByteVec;
use thiserror::Error;

use crate::MAX_LINE;

/// A decoded packet: one CRLF-terminated line, terminator stripped.
pub type Line = ByteVec<MAX_LINE>;

/// What a single read attempt produced.
#[derive(Debug, PartialEq, Eq)]
pub enum Ingest {
    Received(usize),
    WouldBlock,
    Eof,
}

/// The peer filled the whole buffer without ever terminating a line.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("line exceeds {max} bytes without a terminator", max = MAX_LINE)]
pub struct LineTooLong;

/// Accumulates raw socket bytes and carves them into CRLF-delimited
/// packets. Append, scan, emit, shift: leftover bytes of a partial line
/// are moved to the buffer head after each extraction.
pub struct LineFramer {
    buf: [u8; MAX_LINE],
    used: usize,
}

impl LineFramer {
    pub const fn new() -> Self {
        Self { buf: [0; MAX_LINE], used: 0 }
    }

    /// One read into the free tail of the buffer. Callers must pull all
    /// complete lines (or hit [`LineTooLong`]) before reading again.
    pub fn ingest(&mut self, reader: &mut impl io::Read) -> io::Result<Ingest> {
        debug_assert!(self.used < MAX_LINE, "ingest on a full buffer");
        match reader.read(&mut self.buf[self.used..]) {
            Ok(0) => Ok(Ingest::Eof),
            Ok(n) => {
                self.used += n;
                Ok(Ingest::Received(n))
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(Ingest::WouldBlock),
            Err(err) => Err(err),
        }
    }

    /// Pops the next complete line, if any. A full buffer holding no
    /// terminator is a protocol violation, not a wait state.
    pub fn take_line(&mut self) -> Result<Option<Line>, LineTooLong> {
        let filled = &self.buf[..self.used];
        match filled.windows(2).position(|w| w == b"\r\n") {
            Some(at) => {
                let line = Line::try_from(&self.buf[..at]).expect("line fits the frame buffer");
                self.buf.copy_within(at + 2..self.used, 0);
                self.used -= at + 2;
                Ok(Some(line))
            }
            None if self.used == MAX_LINE => Err(LineTooLong),
            None => Ok(None),
        }
    }
}
