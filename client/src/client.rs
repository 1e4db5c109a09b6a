//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Line-oriented TCP client

use crate::{ClientConfig, ClientError, Result};
use futures_util::{SinkExt, StreamExt};
use linewire_linecodec::LineCodec;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, trace};

/// A connected line client.
///
/// Every call to [`send_line`](Self::send_line) writes and flushes one
/// terminated line. Inbound lines are read one at a time, subject to the
/// configured read timeout.
pub struct LineClient {
    config: ClientConfig,
    framed: Framed<TcpStream, LineCodec>,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
}

impl LineClient {
    /// Connect to the server named in `config`
    #[instrument(skip_all, fields(address = %config.address()))]
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(config.address()))
            .await
            .map_err(|_| ClientError::ConnectionTimeout)??;
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        let codec = LineCodec::from_settings(config.max_line_length, config.line_ending);
        info!(peer = %peer_addr, "Connected");
        Ok(Self {
            config,
            framed: Framed::new(stream, codec),
            peer_addr,
            local_addr,
        })
    }

    /// The configuration this client was built from
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Server address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Local address of the socket
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send one line and flush it.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        trace!(line, "Sending line");
        self.framed.send(line).await?;
        Ok(())
    }

    /// Read the next line.
    ///
    /// Returns `Ok(None)` once the server has closed the connection. A
    /// trailing unterminated fragment is discarded.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let next = match self.config.read_timeout {
            Some(limit) => timeout(limit, self.framed.next())
                .await
                .map_err(|_| ClientError::ReadTimeout)?,
            None => self.framed.next().await,
        };
        match next {
            Some(line) => {
                let line = line?;
                trace!(line = %line, "Received line");
                Ok(Some(line))
            }
            None => {
                debug!("Server closed connection");
                Ok(None)
            }
        }
    }

    /// Read the next line, treating end of stream as an error.
    pub async fn recv_line(&mut self) -> Result<String> {
        self.next_line().await?.ok_or(ClientError::ConnectionClosed)
    }

    /// Read the next line and check that it equals `expected`.
    pub async fn expect_line(&mut self, expected: &str) -> Result<()> {
        let actual = self.recv_line().await?;
        if actual == expected {
            Ok(())
        } else {
            Err(ClientError::UnexpectedLine {
                expected: expected.to_string(),
                actual,
            })
        }
    }

    /// Wait until the server closes the connection, collecting any lines
    /// it sends first.
    pub async fn read_to_close(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Flush pending output and close the write side.
    pub async fn close(mut self) -> Result<()> {
        SinkExt::<&str>::close(&mut self.framed).await?;
        info!(peer = %self.peer_addr, "Disconnected");
        Ok(())
    }
}

impl std::fmt::Debug for LineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineClient")
            .field("peer_addr", &self.peer_addr)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, ClientConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, ClientConfig::new("127.0.0.1", port))
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let (listener, config) = listener().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            assert_eq!(line, "ping\n");
            reader.get_mut().write_all(b"pong\r\nbye\n").await.unwrap();
        });

        let mut client = LineClient::connect(config).await.unwrap();
        client.send_line("ping").await.unwrap();
        assert_eq!(client.recv_line().await.unwrap(), "pong");
        client.expect_line("bye").await.unwrap();
        server.await.unwrap();
        assert_eq!(client.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expect_line_mismatch() {
        let (listener, config) = listener().await;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"hello\n").await.unwrap();
        });

        let mut client = LineClient::connect(config).await.unwrap();
        let err = client.expect_line("goodbye").await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedLine { .. }));
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (listener, config) = listener().await;
        let config = config.with_read_timeout(Some(Duration::from_millis(50)));
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let mut client = LineClient::connect(config).await.unwrap();
        let err = client.next_line().await.unwrap_err();
        assert!(matches!(err, ClientError::ReadTimeout));
    }

    #[tokio::test]
    async fn test_read_to_close_drops_fragment() {
        let (listener, config) = listener().await;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"one\ntwo\nthr").await.unwrap();
        });

        let mut client = LineClient::connect(config).await.unwrap();
        let lines = client.read_to_close().await.unwrap();
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
        assert!(matches!(
            client.recv_line().await.unwrap_err(),
            ClientError::ConnectionClosed
        ));
    }

    #[tokio::test]
    async fn test_close_shuts_down_write_side() {
        let (listener, config) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).await.unwrap();
            received
        });

        let mut client = LineClient::connect(config).await.unwrap();
        client.send_line("last words").await.unwrap();
        client.close().await.unwrap();
        assert_eq!(server.await.unwrap(), "last words\n");
    }

    #[tokio::test]
    async fn test_embedded_newline_rejected() {
        let (listener, config) = listener().await;
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });
        let mut client = LineClient::connect(config).await.unwrap();
        let err = client.send_line("a\nb").await.unwrap_err();
        assert!(matches!(err, ClientError::Codec(_)));
    }
}
