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

//! Append every received line to a shared file
//!
//! The file is opened by [`LogFileFactory`] when the server starts and closed
//! when it stops. All connections append through the same handle; each line
//! is written and flushed while holding the handle's lock, so lines from
//! concurrent connections never interleave.

use async_trait::async_trait;
use linewire_service::{LineConnection, LineProtocol, ProtocolFactory, Result, ServiceError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Shared append-only handle
#[derive(Debug, Clone, Default)]
struct LogSink {
    file: Arc<Mutex<Option<File>>>,
}

impl LogSink {
    async fn open(&self, path: &Path) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        *self.file.lock().await = Some(file);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }

    async fn append(&self, line: &str) -> Result<()> {
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        let mut guard = self.file.lock().await;
        let file = guard
            .as_mut()
            .ok_or_else(|| ServiceError::ResourceUnavailable("log file is not open".into()))?;
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Factory for [`LoggingProtocol`] appending to one file
#[derive(Debug)]
pub struct LogFileFactory {
    path: PathBuf,
    sink: LogSink,
}

impl LogFileFactory {
    /// Create a factory appending to `path`
    ///
    /// The file is created if needed when the server starts.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sink: LogSink::default(),
        }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProtocolFactory for LogFileFactory {
    async fn on_start(&self) -> Result<()> {
        self.sink.open(&self.path).await?;
        info!(path = %self.path.display(), "Log file opened");
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        self.sink.close().await?;
        info!(path = %self.path.display(), "Log file closed");
        Ok(())
    }

    fn build_protocol(&self, _conn: &LineConnection) -> Box<dyn LineProtocol> {
        Box::new(LoggingProtocol {
            sink: self.sink.clone(),
        })
    }
}

/// Fire-and-forget line logger; sends nothing back
#[derive(Debug)]
pub struct LoggingProtocol {
    sink: LogSink,
}

#[async_trait]
impl LineProtocol for LoggingProtocol {
    async fn on_connect(&mut self, conn: &LineConnection) -> Result<()> {
        info!(connection_id = %conn.id(), "Connection made, waiting for log lines");
        Ok(())
    }

    async fn on_line(&mut self, conn: &LineConnection, line: String) -> Result<()> {
        debug!(connection_id = %conn.id(), line = %line, "Logging");
        self.sink.append(&line).await
    }

    async fn on_disconnect(&mut self, conn: &LineConnection) {
        info!(connection_id = %conn.id(), "Connection lost, logging done");
    }
}
