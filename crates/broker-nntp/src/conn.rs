//! Line-level NNTP connection: status lines, dot-stuffed multiline blocks,
//! article transmission. One request/response in flight at a time.

use std::time::Duration;

use newspool_broker::BrokerEndpoint;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::Error;

/// A parsed response status line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Status {
    pub code: u16,
    pub text: String,
}

impl Status {
    /// Parses `"211 42 10 51 topic.name"` style status lines.
    pub fn parse(line: &str) -> Result<Self, Error> {
        let code = line
            .get(..3)
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| Error::Protocol(line.to_string()))?;

        Ok(Self {
            code,
            text: line.get(3..).unwrap_or_default().trim().to_string(),
        })
    }

    /// Splits the status text into whitespace fields.
    pub fn fields(&self) -> Vec<&str> {
        self.text.split_whitespace().collect()
    }
}

#[derive(Debug)]
pub(crate) struct NntpConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
    /// Topic currently selected with GROUP, to skip redundant reselects.
    pub current_topic: Option<String>,
}

impl NntpConnection {
    /// Opens a connection, consumes the greeting, and switches the session
    /// into reader mode. Feeder-configured servers refuse reading access
    /// until MODE READER is sent.
    pub async fn open(endpoint: &BrokerEndpoint) -> Result<Self, Error> {
        let stream = timeout(
            endpoint.timeout,
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await
        .map_err(|_| Error::Timeout("connect"))?
        .map_err(|e| Error::Io("error connecting", e))?;

        let (read_half, write_half) = stream.into_split();
        let mut conn = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout: endpoint.timeout,
            current_topic: None,
        };

        let greeting = conn.read_status().await?;
        if greeting.code != 200 && greeting.code != 201 {
            return Err(Error::NotReady {
                code: greeting.code,
                text: greeting.text,
            });
        }
        debug!(%endpoint, code = greeting.code, "connected to broker");

        // Servers that predate MODE READER answer 500; that is fine.
        let _ = conn.command("MODE READER").await?;

        Ok(conn)
    }

    /// Sends one command line and reads the status response.
    pub async fn command(&mut self, line: &str) -> Result<Status, Error> {
        trace!(command = line, "sending");
        self.write_all(format!("{line}\r\n").as_bytes()).await?;
        self.read_status().await
    }

    pub async fn read_status(&mut self) -> Result<Status, Error> {
        let line = self.read_line().await?;
        trace!(response = %line, "received");
        Status::parse(&line)
    }

    /// Reads a dot-terminated multiline block, unstuffing leading dots.
    pub async fn read_multiline(&mut self) -> Result<Vec<String>, Error> {
        let mut lines = Vec::new();

        loop {
            let line = self.read_line().await?;
            if line == "." {
                return Ok(lines);
            }
            lines.push(unstuff(&line).to_string());
        }
    }

    /// Transmits article bytes after a go-ahead: dot-stuffed, CRLF line
    /// endings, terminated by a lone dot.
    pub async fn send_article(&mut self, wire: &[u8]) -> Result<(), Error> {
        let mut stuffed: Vec<u8> = Vec::with_capacity(wire.len() + 16);

        for line in wire.split(|&byte| byte == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                stuffed.push(b'.');
            }
            stuffed.extend_from_slice(line);
            stuffed.extend_from_slice(b"\r\n");
        }
        stuffed.extend_from_slice(b".\r\n");

        self.write_all(&stuffed).await
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        timeout(self.timeout, async {
            self.writer
                .write_all(bytes)
                .await
                .map_err(|e| Error::Io("error writing to broker", e))?;
            self.writer
                .flush()
                .await
                .map_err(|e| Error::Io("error flushing to broker", e))
        })
        .await
        .map_err(|_| Error::Timeout("write"))?
    }

    async fn read_line(&mut self) -> Result<String, Error> {
        let mut line = String::new();

        let read = timeout(self.timeout, self.reader.read_line(&mut line))
            .await
            .map_err(|_| Error::Timeout("read"))?
            .map_err(|e| Error::Io("error reading from broker", e))?;

        if read == 0 {
            return Err(Error::Closed);
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }

        Ok(line)
    }
}

/// Removes the dot added by the sender to lines starting with a dot. The
/// block terminator itself never reaches this function.
fn unstuff(line: &str) -> &str {
    line.strip_prefix('.').unwrap_or(line)
}
