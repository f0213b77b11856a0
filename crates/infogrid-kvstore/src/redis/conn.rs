//! A single blocking Redis connection.

use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::redis::resp::{Reply, encode_command, read_reply};

/// Options applied when establishing a connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Timeout for the TCP connect itself.
    pub connect_timeout: Duration,
    /// Read/write timeout per operation.
    pub io_timeout: Duration,
    /// Optional `AUTH` password.
    pub password: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(30),
            password: None,
        }
    }
}

/// One TCP connection speaking RESP, pinned to a logical database.
pub struct RedisConnection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl RedisConnection {
    /// Connect, authenticate if configured, and select the logical database.
    pub fn connect(host: &str, port: u16, db: u32, opts: &ConnectOptions) -> StoreResult<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| StoreError::Connect(format!("{host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| StoreError::Connect(format!("{host}:{port}: no address")))?;

        let stream = TcpStream::connect_timeout(&addr, opts.connect_timeout)
            .map_err(|e| StoreError::Connect(format!("{host}:{port}: {e}")))?;
        stream
            .set_read_timeout(Some(opts.io_timeout))
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        stream
            .set_write_timeout(Some(opts.io_timeout))
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        let reader = BufReader::new(
            stream
                .try_clone()
                .map_err(|e| StoreError::Connect(e.to_string()))?,
        );
        let mut conn = Self {
            reader,
            writer: stream,
        };

        if let Some(password) = &opts.password {
            conn.expect_ok(&["AUTH", password])?;
        }
        if db != 0 {
            conn.expect_ok(&["SELECT", &db.to_string()])?;
        }

        debug!(%host, port, db, "redis connection established");
        Ok(conn)
    }

    /// Send one command and read its reply. Server error replies (`-ERR …`)
    /// become [`StoreError::Backend`]; the connection stays usable.
    pub fn command(&mut self, parts: &[&str]) -> StoreResult<Reply> {
        self.writer
            .write_all(&encode_command(parts))
            .map_err(|e| StoreError::Io(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        match read_reply(&mut self.reader)? {
            Reply::Error(message) => Err(StoreError::Backend(message)),
            reply => Ok(reply),
        }
    }

    fn expect_ok(&mut self, parts: &[&str]) -> StoreResult<()> {
        match self.command(parts)? {
            Reply::Simple(s) if s == "OK" => Ok(()),
            other => Err(StoreError::Protocol(format!(
                "expected +OK to {:?}, got {other:?}",
                parts[0]
            ))),
        }
    }

    /// Health check: `PING` must answer `PONG`.
    pub fn ping(&mut self) -> bool {
        matches!(self.command(&["PING"]), Ok(Reply::Simple(s)) if s == "PONG")
    }
}
