use std::time::Duration;

use bytes::Bytes;

use framebus_channel::error::ChannelError;
use framebus_channel::options::{ReaderOptions, ReaderSocketMode, WriterOptions, WriterSocketMode};
use framebus_channel::reader::ChannelReader;
use framebus_channel::writer::ChannelWriter;

fn frame(tag: u8, body: &[u8]) -> Vec<Bytes> {
    vec![Bytes::copy_from_slice(&[tag]), Bytes::copy_from_slice(body)]
}

/// Send with retries until a peer is connected (`immediate = true` drops
/// with WouldBlock until then).
async fn send_when_connected(writer: &mut ChannelWriter, parts: Vec<Bytes>) {
    for _ in 0..500 {
        match writer.write_multipart(parts.clone()).await {
            Ok(()) => return,
            Err(ChannelError::WouldBlock) => tokio::time::sleep(Duration::from_millis(10)).await,
            Err(e) => panic!("write failed: {e}"),
        }
    }
    panic!("no peer connected within deadline");
}

async fn recv_one(reader: &mut ChannelReader) -> Vec<Bytes> {
    for _ in 0..100 {
        if let Some(parts) = reader.read_multipart().await.expect("read") {
            return parts;
        }
    }
    panic!("no frame within deadline");
}

#[tokio::test]
async fn publish_subscribe_preserves_order_over_tcp() {
    let mut writer = ChannelWriter::new(WriterOptions::new("tcp://127.0.0.1:0"));
    writer.start().await.expect("writer start");
    let address = writer.bound_address().expect("bound").to_string();

    let mut reader = ChannelReader::new(ReaderOptions::new(&address));
    reader.start().await.expect("reader start");

    send_when_connected(&mut writer, frame(1, b"first")).await;
    for body in [&b"second"[..], b"third"] {
        writer
            .write_multipart(frame(1, body))
            .await
            .expect("write");
    }

    assert_eq!(recv_one(&mut reader).await, frame(1, b"first"));
    assert_eq!(recv_one(&mut reader).await, frame(1, b"second"));
    assert_eq!(recv_one(&mut reader).await, frame(1, b"third"));

    reader.stop().await.expect("reader stop");
    writer.stop().await.expect("writer stop");
}

#[tokio::test]
async fn subscribe_topic_is_an_exact_prefix_filter() {
    let mut writer = ChannelWriter::new(WriterOptions::new("tcp://127.0.0.1:0"));
    writer.start().await.expect("writer start");
    let address = writer.bound_address().expect("bound").to_string();

    let mut options = ReaderOptions::new(&address);
    options.topic = b"cam1".to_vec();
    let mut reader = ChannelReader::new(options);
    reader.start().await.expect("reader start");

    send_when_connected(&mut writer, vec![Bytes::from_static(b"cam2"), Bytes::from_static(b"x")])
        .await;
    writer
        .write_multipart(vec![Bytes::from_static(b"cam1/left"), Bytes::from_static(b"y")])
        .await
        .expect("write");

    // Only the cam1-prefixed frame comes through.
    let parts = recv_one(&mut reader).await;
    assert_eq!(parts[0], Bytes::from_static(b"cam1/left"));

    reader.stop().await.expect("reader stop");
    writer.stop().await.expect("writer stop");
}

#[tokio::test]
async fn push_pull_roundtrips_over_ipc() {
    let dir = tempfile::tempdir().expect("tempdir");
    let address = format!("ipc://{}/frames.sock", dir.path().display());

    let mut options = WriterOptions::new(&address);
    options.socket_mode = WriterSocketMode::Push;
    let mut writer = ChannelWriter::new(options);
    writer.start().await.expect("writer start");

    let mut options = ReaderOptions::new(&address);
    options.socket_mode = ReaderSocketMode::Pull;
    let mut reader = ChannelReader::new(options);
    reader.start().await.expect("reader start");

    send_when_connected(&mut writer, frame(2, b"payload")).await;
    assert_eq!(recv_one(&mut reader).await, frame(2, b"payload"));

    reader.stop().await.expect("reader stop");
    writer.stop().await.expect("writer stop");
}

#[tokio::test]
async fn read_times_out_with_none_when_nothing_arrives() {
    let mut options = ReaderOptions::new("tcp://127.0.0.1:1");
    options.read_timeout_ms = 50;
    let mut reader = ChannelReader::new(options);
    reader.start().await.expect("reader start");

    let started = std::time::Instant::now();
    let mut empties = 0;
    while started.elapsed() < Duration::from_millis(500) {
        match reader.read_multipart().await.expect("read") {
            None => empties += 1,
            Some(_) => panic!("nothing should arrive"),
        }
    }
    // ~10 timeouts fit in the window; require half to allow scheduling slack.
    assert!(empties >= 5, "got {empties} empty reads");

    reader.stop().await.expect("reader stop");
}

#[tokio::test]
async fn nonblocking_read_never_waits() {
    let mut options = ReaderOptions::new("tcp://127.0.0.1:1");
    options.nonblocking = true;
    let mut reader = ChannelReader::new(options);
    reader.start().await.expect("reader start");

    let started = std::time::Instant::now();
    assert!(reader.read_multipart().await.expect("read").is_none());
    assert!(started.elapsed() < Duration::from_millis(50));

    reader.stop().await.expect("reader stop");
}

#[tokio::test]
async fn immediate_push_with_no_peer_would_block() {
    let mut options = WriterOptions::new("tcp://127.0.0.1:0");
    options.socket_mode = WriterSocketMode::Push;
    let mut writer = ChannelWriter::new(options);
    writer.start().await.expect("writer start");

    assert!(matches!(
        writer.write_multipart(frame(2, b"dropped")).await,
        Err(ChannelError::WouldBlock)
    ));

    writer.stop().await.expect("writer stop");
}

#[tokio::test]
async fn io_outside_the_started_state_is_invalid() {
    let mut reader = ChannelReader::new(ReaderOptions::new("tcp://127.0.0.1:1"));
    assert!(matches!(
        reader.read_multipart().await,
        Err(ChannelError::InvalidState(_))
    ));

    reader.start().await.expect("start");
    reader.stop().await.expect("stop");
    // Stop is idempotent, reads after it are not.
    reader.stop().await.expect("second stop");
    assert!(matches!(
        reader.read_multipart().await,
        Err(ChannelError::InvalidState(_))
    ));
    assert!(matches!(
        reader.start().await,
        Err(ChannelError::InvalidState(_))
    ));

    let mut writer = ChannelWriter::new(WriterOptions::new("tcp://127.0.0.1:0"));
    writer.start().await.expect("start");
    assert!(matches!(
        writer.start().await,
        Err(ChannelError::InvalidState(_))
    ));
    writer.stop().await.expect("stop");
    assert!(matches!(
        writer.write_multipart(frame(1, b"late")).await,
        Err(ChannelError::InvalidState(_))
    ));
}

#[tokio::test]
async fn start_rejects_inconsistent_options() {
    let mut reader = ChannelReader::new(ReaderOptions::new("bogus://nope"));
    assert!(matches!(reader.start().await, Err(ChannelError::Config(_))));

    let mut options = ReaderOptions::new("tcp://127.0.0.1:1");
    options.socket_mode = ReaderSocketMode::Pull;
    options.topic = b"cam0".to_vec();
    let mut reader = ChannelReader::new(options);
    assert!(matches!(reader.start().await, Err(ChannelError::Config(_))));

    let mut options = WriterOptions::new("tcp://127.0.0.1:0");
    options.conflate = true;
    let mut writer = ChannelWriter::new(options);
    assert!(matches!(writer.start().await, Err(ChannelError::Config(_))));
}
