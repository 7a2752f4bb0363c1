//! Live device source.
//!
//! Reads newline-delimited status words from an async byte stream: a serial
//! device node, a TCP connection, or anything else implementing `AsyncRead`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use super::InputSource;

/// Number of lines buffered between the reader task and `poll()`.
const LINE_BUFFER: usize = 16;

/// A source that receives status words from a device stream.
///
/// This source spawns a background task that reads lines from the provided
/// async reader and makes them available via `poll()`. Blank lines are
/// skipped; bytes that are not valid UTF-8 are replaced so the evaluator can
/// reject them instead of the reader giving up.
///
/// # Example with a byte stream
///
/// ```
/// use std::io::Cursor;
/// use faultwatch::DeviceSource;
///
/// # tokio_test::block_on(async {
/// let data = b"0000\n0010\n";
/// let source = DeviceSource::spawn(Cursor::new(data.to_vec()), "example");
/// # });
/// ```
#[derive(Debug)]
pub struct DeviceSource {
    receiver: mpsc::Receiver<String>,
    description: String,
    last_error: Arc<Mutex<Option<String>>>,
}

impl DeviceSource {
    /// Spawn a background task that reads from the given async reader.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        let last_error = Arc::new(Mutex::new(None));
        let error_handle = last_error.clone();
        let desc = description.to_string();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = Vec::new();

            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => {
                        tracing::warn!(device = %desc, "device stream closed");
                        set_error(&error_handle, Some("Device closed".to_string()));
                        break;
                    }
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&line);
                        let token = text.trim();
                        if token.is_empty() {
                            continue;
                        }
                        set_error(&error_handle, None);
                        if tx.send(token.to_string()).await.is_err() {
                            // Receiver dropped
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(device = %desc, error = %e, "device read failed");
                        set_error(&error_handle, Some(format!("Read error: {}", e)));
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("device: {}", description),
            last_error,
        }
    }

    /// Open a device node (e.g. `/dev/ttyUSB0`) or any readable file.
    ///
    /// The port must already be configured (baud rate etc.) by the OS.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open device {}", path.display()))?;
        Ok(Self::spawn(file, &path.display().to_string()))
    }

    /// Connect to a TCP endpoint that streams status words.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = tokio::net::TcpStream::connect(addr)
            .await
            .with_context(|| format!("Failed to connect to {}", addr))?;
        Ok(Self::spawn(stream, &format!("tcp://{}", addr)))
    }
}

fn set_error(slot: &Mutex<Option<String>>, value: Option<String>) {
    *slot.lock().unwrap_or_else(|e| e.into_inner()) = value;
}

impl InputSource for DeviceSource {
    fn poll(&mut self) -> Option<String> {
        match self.receiver.try_recv() {
            Ok(token) => Some(token),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => None,
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
