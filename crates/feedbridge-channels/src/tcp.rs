use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{debug, info};

use crate::{channel::FeedChannel, error::ChannelError, types::ChannelStatus};

/// Initial read buffer size; one feed chunk is at most this many bytes.
pub const READ_CAPACITY: usize = 64 * 1024;

/// Plain TCP feed: raw bytes in, newline-terminated lines out.
pub struct TcpFeed {
    addr: String,
    reader: tokio::sync::Mutex<Option<FramedRead<OwnedReadHalf, BytesCodec>>>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    status: Mutex<ChannelStatus>,
}

impl TcpFeed {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            reader: tokio::sync::Mutex::new(None),
            writer: tokio::sync::Mutex::new(None),
            status: Mutex::new(ChannelStatus::Disconnected),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn set_status(&self, status: ChannelStatus) {
        *self.status.lock().expect("feed status mutex poisoned") = status;
    }
}

#[async_trait]
impl FeedChannel for TcpFeed {
    fn name(&self) -> &str {
        "tcp"
    }

    async fn connect(&self) -> Result<(), ChannelError> {
        self.set_status(ChannelStatus::Connecting);
        let stream = match TcpStream::connect(&self.addr).await {
            Ok(s) => s,
            Err(e) => {
                self.set_status(ChannelStatus::Error(e.to_string()));
                return Err(ChannelError::ConnectionFailed(format!("{}: {e}", self.addr)));
            }
        };
        // Feed frames are small; don't let Nagle hold replies back.
        let _ = stream.set_nodelay(true);
        let (read, write) = stream.into_split();
        let reader = FramedRead::with_capacity(read, BytesCodec::new(), READ_CAPACITY);
        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(write);
        self.set_status(ChannelStatus::Connected);
        info!(addr = %self.addr, "feed connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ChannelError> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(addr = %self.addr, error = %e, "feed write shutdown failed");
            }
        }
        self.reader.lock().await.take();
        self.set_status(ChannelStatus::Disconnected);
        info!(addr = %self.addr, "feed disconnected");
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, ChannelError> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(ChannelError::NotConnected)?;
        match reader.next().await {
            Some(Ok(bytes)) => {
                debug!(len = bytes.len(), "feed chunk received");
                Ok(Some(bytes.to_vec()))
            }
            Some(Err(e)) => {
                self.set_status(ChannelStatus::Error(e.to_string()));
                Err(ChannelError::ReceiveFailed(e.to_string()))
            }
            None => {
                self.set_status(ChannelStatus::Disconnected);
                Ok(None)
            }
        }
    }

    async fn send_line(&self, line: &str) -> Result<(), ChannelError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ChannelError::NotConnected)?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        writer
            .write_all(&buf)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    fn status(&self) -> ChannelStatus {
        self.status
            .lock()
            .expect("feed status mutex poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"hello feed").await.unwrap();
            let mut buf = [0u8; 6];
            sock.read_exact(&mut buf).await.unwrap();
            buf
        });

        let feed = TcpFeed::new("127.0.0.1", port);
        assert_eq!(feed.status(), ChannelStatus::Disconnected);
        feed.connect().await.unwrap();
        assert_eq!(feed.status(), ChannelStatus::Connected);

        let chunk = feed.recv().await.unwrap().unwrap();
        assert_eq!(chunk, b"hello feed");

        feed.send_line("reply").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"reply\n");

        // Server hung up after reading.
        assert!(feed.recv().await.unwrap().is_none());
        feed.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn reader_buffer_holds_a_full_chunk() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move { listener.accept().await.unwrap() });

        let feed = TcpFeed::new("127.0.0.1", port);
        feed.connect().await.unwrap();
        let capacity = feed
            .reader
            .lock()
            .await
            .as_ref()
            .map(|r| r.read_buffer().capacity())
            .unwrap();
        assert!(capacity >= READ_CAPACITY);

        drop(server.await.unwrap());
        feed.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn io_before_connect_is_rejected() {
        let feed = TcpFeed::new("127.0.0.1", 1);
        assert!(matches!(feed.recv().await, Err(ChannelError::NotConnected)));
        assert!(matches!(
            feed.send_line("x").await,
            Err(ChannelError::NotConnected)
        ));
    }
}
