//! Minimal RESP (Redis Serialization Protocol) encoding and parsing.
//!
//! Commands are encoded as arrays of bulk strings; replies cover the five
//! RESP2 types the store uses. Values themselves are text (the store's
//! [`ValueCodec`](crate::codec::ValueCodec) output), so bulk payloads are
//! required to be valid UTF-8.

use std::io::BufRead;

use crate::error::{StoreError, StoreResult};

/// A parsed RESP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR …\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n`, with `None` for the null bulk `$-1\r\n`.
    Bulk(Option<String>),
    /// `*2\r\n…`, with `None` for the null array `*-1\r\n`.
    Array(Option<Vec<Reply>>),
}

/// Encode a command as a RESP array of bulk strings.
pub fn encode_command(parts: &[&str]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 * parts.len());
    out.extend_from_slice(format!("*{}\r\n", parts.len()).as_bytes());
    for part in parts {
        out.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        out.extend_from_slice(part.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Read one reply from the wire.
pub fn read_reply(reader: &mut impl BufRead) -> StoreResult<Reply> {
    let line = read_line(reader)?;
    let (kind, rest) = line
        .split_at_checked(1)
        .ok_or_else(|| StoreError::Protocol("empty reply line".to_string()))?;

    match kind {
        "+" => Ok(Reply::Simple(rest.to_string())),
        "-" => Ok(Reply::Error(rest.to_string())),
        ":" => rest
            .parse::<i64>()
            .map(Reply::Integer)
            .map_err(|_| StoreError::Protocol(format!("bad integer reply: {rest:?}"))),
        "$" => {
            let len: i64 = rest
                .parse()
                .map_err(|_| StoreError::Protocol(format!("bad bulk length: {rest:?}")))?;
            if len < 0 {
                return Ok(Reply::Bulk(None));
            }
            let mut buf = vec![0u8; len as usize + 2];
            reader
                .read_exact(&mut buf)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            if !buf.ends_with(b"\r\n") {
                return Err(StoreError::Protocol("bulk string missing CRLF".to_string()));
            }
            buf.truncate(len as usize);
            String::from_utf8(buf)
                .map(|s| Reply::Bulk(Some(s)))
                .map_err(|_| StoreError::Protocol("bulk string is not UTF-8".to_string()))
        }
        "*" => {
            let len: i64 = rest
                .parse()
                .map_err(|_| StoreError::Protocol(format!("bad array length: {rest:?}")))?;
            if len < 0 {
                return Ok(Reply::Array(None));
            }
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(read_reply(reader)?);
            }
            Ok(Reply::Array(Some(items)))
        }
        other => Err(StoreError::Protocol(format!(
            "unknown reply type marker: {other:?}"
        ))),
    }
}

fn read_line(reader: &mut impl BufRead) -> StoreResult<String> {
    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .map_err(|e| StoreError::Io(e.to_string()))?;
    if n == 0 {
        return Err(StoreError::Io("connection closed".to_string()));
    }
    if !line.ends_with("\r\n") {
        return Err(StoreError::Protocol("reply line missing CRLF".to_string()));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}
