//! Integration tests for the newline-delimited TCP transport.

#[cfg(feature = "tcp")]
mod tcp {
    use pairforge_transport::{
        Connection, MAX_LINE_BYTES, TcpLineConnection, TcpLineTransport,
        Transport,
    };
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    async fn pair() -> (TcpStream, TcpLineConnection) {
        let mut transport = TcpLineTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");
        let server =
            tokio::spawn(async move { transport.accept().await.expect("accept") });
        let client = TcpStream::connect(addr).await.expect("connect");
        let conn = server.await.expect("task should complete");
        (client, conn)
    }

    #[tokio::test]
    async fn test_lines_are_split_and_trimmed() {
        let (mut client, conn) = pair().await;
        client.write_all(b"first\r\nsecond\n\n").await.unwrap();

        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("first"));
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("second"));
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_end_of_stream_yields_none() {
        let (mut client, conn) = pair().await;
        client.write_all(b"partial").await.unwrap();
        client.shutdown().await.unwrap();

        // An unterminated last line is still delivered.
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("partial"));
        assert_eq!(conn.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_receive_error() {
        let (mut client, conn) = pair().await;
        client.write_all(&[0xff, 0xfe, b'\n']).await.unwrap();
        assert!(conn.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_overlong_line_is_receive_error() {
        let (mut client, conn) = pair().await;
        let long = vec![b'a'; MAX_LINE_BYTES as usize + 16];
        client.write_all(&long).await.unwrap();
        assert!(conn.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_overlong_line_tail_is_discarded() {
        let (mut client, conn) = pair().await;
        let mut bytes = vec![b'a'; MAX_LINE_BYTES as usize * 2];
        bytes.extend_from_slice(b"\nnext\n");
        client.write_all(&bytes).await.unwrap();

        assert!(conn.recv().await.is_err());
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_line_at_the_limit_is_accepted() {
        let (mut client, conn) = pair().await;
        let mut bytes = vec![b'a'; MAX_LINE_BYTES as usize - 1];
        bytes.push(b'\n');
        client.write_all(&bytes).await.unwrap();

        let line = conn.recv().await.unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_BYTES as usize - 1);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_poison_the_next() {
        let (mut client, conn) = pair().await;
        client.write_all(&[0xff, b'\n']).await.unwrap();
        client.write_all(b"fine\n").await.unwrap();

        assert!(conn.recv().await.is_err());
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("fine"));
    }

    #[tokio::test]
    async fn test_cancelled_recv_keeps_partial_line() {
        let (mut client, conn) = pair().await;
        client.write_all(b"pin").await.unwrap();

        // Give the server time to buffer the partial line, then give up.
        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), conn.recv()).await;
        assert!(cancelled.is_err(), "recv should still be waiting");

        client.write_all(b"g\n").await.unwrap();
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("ping"));
    }

    #[tokio::test]
    async fn test_send_appends_newline() {
        let (client, conn) = pair().await;
        conn.send("hello").await.unwrap();
        conn.close().await.unwrap();

        let mut reader = BufReader::new(client);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "hello\n");
        line.clear();
        assert_eq!(reader.read_line(&mut line).await.unwrap(), 0);
    }
}
