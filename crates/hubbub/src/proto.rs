use std::io::Write;

use thiserror::Error;

use crate::{MSG_MAX, NICK_MAX, history::Entry};

const SET_NICK_PREFIX: &[u8] = b"my name is ";
const SEND_PREFIX: &[u8] = b"send ";
const FOLKS: &[u8] = b"folks";
const NEW: &[u8] = b"new";

const OK: &[u8] = b"ok";
const CRLF: &[u8] = b"\r\n";

/// One decoded client packet.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    SetNick(&'a [u8]),
    Folks,
    Send(&'a [u8]),
    New,
}

/// Any of these costs the peer its connection. No reply is sent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    #[error("nickname of {0} bytes exceeds the limit of {max}", max = NICK_MAX)]
    NickTooLong(usize),
    #[error("message of {0} bytes exceeds the limit of {max}", max = MSG_MAX)]
    MessageTooLong(usize),
    #[error("unrecognised packet")]
    UnknownPacket,
}

/// Classifies a decoded line. Prefix commands keep the remainder of the
/// line verbatim, spaces included; `folks` and `new` match exactly.
pub fn parse(line: &[u8]) -> Result<Command<'_>, Violation> {
    if let Some(nick) = line.strip_prefix(SET_NICK_PREFIX) {
        if nick.len() > NICK_MAX {
            return Err(Violation::NickTooLong(nick.len()));
        }
        return Ok(Command::SetNick(nick));
    }
    if line == FOLKS {
        return Ok(Command::Folks);
    }
    if let Some(text) = line.strip_prefix(SEND_PREFIX) {
        if text.len() > MSG_MAX {
            return Err(Violation::MessageTooLong(text.len()));
        }
        return Ok(Command::Send(text));
    }
    if line == NEW {
        return Ok(Command::New);
    }
    Err(Violation::UnknownPacket)
}

pub fn push_ok(out: &mut Vec<u8>) {
    out.extend_from_slice(OK);
    out.extend_from_slice(CRLF);
}

pub fn push_count(out: &mut Vec<u8>, count: usize) {
    write!(out, "{count}").expect("write to Vec");
    out.extend_from_slice(CRLF);
}

pub fn push_nick(out: &mut Vec<u8>, nick: &[u8]) {
    out.extend_from_slice(nick);
    out.extend_from_slice(CRLF);
}

/// Renders `[HH:MM:SS] <nick>: <message>` in the server's local time.
pub fn push_entry(out: &mut Vec<u8>, entry: &Entry) {
    write!(out, "[{}] ", entry.wall.format("%H:%M:%S")).expect("write to Vec");
    out.extend_from_slice(&entry.nick);
    out.extend_from_slice(b": ");
    out.extend_from_slice(&entry.text);
    out.extend_from_slice(CRLF);
}
