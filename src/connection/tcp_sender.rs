use std::io;
use std::io::IoSlice;
use std::sync::Arc;
use bytes::Buf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::trace;
use wire::safe_converter::PrecheckedCast;
use wire::MessageBuffer;
use crate::connection::stats::TrafficCounters;
use crate::connection::tcp_receiver::FRAME_HEADER_LEN;
use crate::connection::DisconnectCause;
use crate::error::SocketError;

/// Writes the connection's queued outbound buffers to the TCP stream, one frame per buffer
pub(crate) struct TcpSender {
    stream: Arc<TcpStream>,
    outbound: mpsc::UnboundedReceiver<MessageBuffer>,
}

impl TcpSender {
    pub fn new(stream: Arc<TcpStream>, outbound: mpsc::UnboundedReceiver<MessageBuffer>) -> TcpSender {
        TcpSender {
            stream,
            outbound,
        }
    }

    /// Runs until writing fails or the queue is closed, returning the cause
    pub async fn send_loop(&mut self, traffic: &TrafficCounters) -> DisconnectCause {
        while let Some(buffer) = self.outbound.recv().await {
            if let Err(e) = write_frame(&self.stream, &buffer).await {
                return (SocketError::from(&e), Some(e));
            }
            traffic.add_tcp_sent(FRAME_HEADER_LEN + buffer.len());
            buffer.dispose();
        }
        trace!("outbound queue closed");
        (SocketError::Success, None)
    }
}

/// The length header and the body go out as two segments of a vectored write, so the header
///  never becomes part of the body's buffer
pub(crate) async fn write_frame(stream: &TcpStream, body: &MessageBuffer) -> io::Result<()> {
    let body_len: i32 = body.len().prechecked_cast();
    let header = body_len.to_be_bytes();
    write_all(stream, (&header[..]).chain(body.as_slice())).await
}

/// Writes all of `buf` to a stream that is shared between tasks
pub(crate) async fn write_all(stream: &TcpStream, mut buf: impl Buf) -> io::Result<()> {
    while buf.has_remaining() {
        stream.writable().await?;

        let mut slices = [IoSlice::new(&[]); 2];
        let num_slices = buf.chunks_vectored(&mut slices);
        match stream.try_write_vectored(&slices[..num_slices]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(num_written) => buf.advance(num_written),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_write_frame() {
        let (client, mut server) = socket_pair().await;

        write_frame(&client, &MessageBuffer::from_slice(b"hello")).await.unwrap();
        write_frame(&client, &MessageBuffer::create(0)).await.unwrap();

        let mut received = [0u8; 13];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"\0\0\0\x05hello\0\0\0\0");
    }

    #[tokio::test]
    async fn test_write_frame_large_body() {
        let (client, mut server) = socket_pair().await;
        let body = MessageBuffer::from_slice(&vec![3u8; 1_000_000]);

        let writer = tokio::spawn(async move {
            write_frame(&client, &body).await.unwrap();
        });

        let mut header = [0u8; 4];
        server.read_exact(&mut header).await.unwrap();
        assert_eq!(i32::from_be_bytes(header), 1_000_000);

        let mut received = vec![0u8; 1_000_000];
        server.read_exact(&mut received).await.unwrap();
        assert!(received.iter().all(|b| *b == 3));

        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_loop() {
        let (client, mut server) = socket_pair().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sender = TcpSender::new(Arc::new(client), rx);

        tx.send(MessageBuffer::from_slice(b"ab")).unwrap();
        tx.send(MessageBuffer::from_slice(b"cde")).unwrap();
        drop(tx);

        let traffic = TrafficCounters::default();
        let (socket_error, source) = sender.send_loop(&traffic).await;
        assert_eq!(socket_error, SocketError::Success);
        assert!(source.is_none());
        assert_eq!(traffic.snapshot().tcp_bytes_sent, 13);

        let mut received = [0u8; 13];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"\0\0\0\x02ab\0\0\0\x03cde");
    }
}
