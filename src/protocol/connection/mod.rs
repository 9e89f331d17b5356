use std::io::{self, Cursor};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use crate::error::{StoreError, StoreErrorKind};
use crate::protocol::{Frame, FrameError};

pub const DEFAULT_BUFFER_BYTES: usize = 4 * 1024;

pub struct Connection<T = TcpStream> {
    stream: BufWriter<T>,
    // The buffer for reading frames.
    buffer: BytesMut,
    // Encoded frames not yet handed to the stream.
    outgoing: BytesMut,
}

impl<T> Connection<T>
where
    T: AsyncWrite + AsyncRead + Unpin,
{
    pub fn new(stream: T, buffer_size: Option<usize>) -> Self {
        Self {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(buffer_size.unwrap_or(DEFAULT_BUFFER_BYTES)),
            outgoing: BytesMut::new(),
        }
    }

    /// Queue `frame` and flush everything queued so far.
    ///
    /// If the returned future is dropped early, the unsent bytes stay queued
    /// and go out with the next [`flush`](Self::flush), so the stream never
    /// carries a torn frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), StoreError> {
        frame.encode(&mut self.outgoing);
        self.flush().await
    }

    pub async fn flush(&mut self) -> Result<(), StoreError> {
        while !self.outgoing.is_empty() {
            if 0 == self.stream.write_buf(&mut self.outgoing).await? {
                return Err(io::Error::from(io::ErrorKind::WriteZero).into());
            }
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one frame. `None` means the peer closed the connection cleanly.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, StoreError> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(StoreErrorKind::ConnectionClosed.into())
                };
            }
        }
    }

    fn parse_frame(&mut self) -> Result<Option<Frame>, StoreError> {
        use FrameError::Incomplete;

        let mut buf = Cursor::new(&self.buffer[..]);

        match Frame::check(&mut buf) {
            Ok(_) => {
                let len = buf.position() as usize;
                buf.set_position(0);
                let frame = Frame::parse(&mut buf)?;
                self.buffer.advance(len);

                Ok(Some(frame))
            }
            Err(Incomplete) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::protocol::Command;

    #[test]
    fn frames_round_trip_over_stream() {
        tokio_test::block_on(async move {
            let (client, server) = tokio::io::duplex(64);
            let mut client_conn = Connection::new(client, None);
            let mut server_conn = Connection::new(server, Some(16));

            let frames: Vec<Frame> = vec![
                Command::ping().into(),
                Command::set("user:1", r#"{"name":"alice"}"#.into(), None).into(),
                Frame::ok(),
                Frame::Null,
                Frame::Integer(1),
                Frame::Error("ERR unknown command".into()),
                Frame::Array(vec![Frame::bulk("f1"), Frame::bulk("v".repeat(200))]),
            ];
            let frames_clone = frames.clone();

            let write_handle = tokio::spawn(async move {
                for frame in frames {
                    client_conn.write_frame(&frame).await.unwrap();
                }
            });

            let read_handle = tokio::spawn(async move {
                for want in frames_clone {
                    let got = server_conn.read_frame().await.unwrap().unwrap();
                    assert_eq!(want, got);
                }
                // writer dropped its half.
                assert!(server_conn.read_frame().await.unwrap().is_none());
            });

            write_handle.await.unwrap();
            read_handle.await.unwrap();
        })
    }

    #[test]
    fn truncated_frame_is_connection_closed() {
        tokio_test::block_on(async move {
            let (mut client, server) = tokio::io::duplex(64);
            let mut server_conn = Connection::new(server, None);

            client.write_all(b"$10\r\nabc").await.unwrap();
            drop(client);

            let err = server_conn.read_frame().await.unwrap_err();
            assert!(matches!(err.kind(), StoreErrorKind::ConnectionClosed));
        })
    }

    #[test]
    fn dropped_write_is_completed_by_next_flush() {
        tokio_test::block_on(async move {
            let (client, server) = tokio::io::duplex(16);
            let mut client_conn = Connection::new(client, None);
            let mut server_conn = Connection::new(server, None);

            let big: Frame = Command::set("k", "v".repeat(64 * 1024).into(), None).into();
            // Nobody reads yet, so the write stalls part way.
            let stalled =
                tokio::time::timeout(Duration::from_millis(20), client_conn.write_frame(&big))
                    .await;
            assert!(stalled.is_err());

            let read_handle = tokio::spawn(async move {
                let first = server_conn.read_frame().await.unwrap().unwrap();
                let second = server_conn.read_frame().await.unwrap().unwrap();
                (first, second)
            });

            client_conn
                .write_frame(&Command::ping().into())
                .await
                .unwrap();

            let (first, second) = read_handle.await.unwrap();
            assert_eq!(first, big);
            assert_eq!(second, Frame::from(Command::ping()));
        })
    }
}
