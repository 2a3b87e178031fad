use std::time::Duration;

use bytes::Bytes;

use framebus_channel::error::ChannelError;
use framebus_channel::options::{ReaderOptions, WriterOptions};
use framebus_channel::reader::ChannelReader;
use framebus_channel::writer::ChannelWriter;
use framebus_proto::message::{Buffer, BufferMeta, Caps, Message};
use framebus_stage::error::StageError;
use framebus_stage::handler::PassThrough;
use framebus_stage::reader::{MessageReader, Recv, TypedReader};
use framebus_stage::stage::Stage;
use framebus_stage::writer::{MessageWriter, TypedWriter};

fn caps() -> Message {
    Message::Caps(Caps {
        caps_str: "video/x-raw".to_string(),
        width: 4,
        height: 4,
        format: Some("RGB".to_string()),
        fps_n: Some(30.0),
        fps_d: Some(1.0),
        framerate: Some("30/1".to_string()),
    })
}

fn buffer() -> Message {
    Message::Buffer(Buffer {
        meta: Some(BufferMeta {
            pts: 42,
            width: 4,
            height: 4,
            flags: 0,
            dts: None,
            duration: Some(33),
            caps_str: None,
        }),
        custom: None,
        payload: Bytes::from_static(b"\x01\x02\x03\x04"),
    })
}

async fn recv_message(reader: &mut MessageReader) -> Message {
    for _ in 0..200 {
        match reader.recv().await.expect("recv") {
            Recv::Got(message) => return message,
            Recv::Empty => {}
            Recv::Closed => panic!("reader closed early"),
        }
    }
    panic!("no message within deadline");
}

/// Producer → relay stage → consumer over real ipc sockets. The relay
/// runs default handlers, so the consumer must see the producer's stream
/// unchanged and the relay must end with it.
#[tokio::test]
async fn relay_stage_passes_a_stream_through() {
    let dir = tempfile::tempdir().expect("tempdir");
    let upstream = format!("ipc://{}/upstream.sock", dir.path().display());
    let downstream = format!("ipc://{}/downstream.sock", dir.path().display());

    let mut stage_reader_options = ReaderOptions::new(&upstream);
    stage_reader_options.read_timeout_ms = 20;
    let stage = Stage::new(
        Box::new(MessageReader::new(ChannelReader::new(stage_reader_options))),
        Some(Box::new(MessageWriter::new(ChannelWriter::new(
            WriterOptions::new(&downstream),
        )))),
        PassThrough,
    );
    let stage_handle = tokio::spawn(stage.run());

    let mut consumer_options = ReaderOptions::new(&downstream);
    consumer_options.read_timeout_ms = 20;
    let mut consumer = MessageReader::new(ChannelReader::new(consumer_options));
    consumer.start().await.expect("consumer start");

    let mut producer = MessageWriter::new(ChannelWriter::new(WriterOptions::new(&upstream)));
    producer.start().await.expect("producer start");

    // Re-send caps until the whole chain is connected and one lands at
    // the consumer; publish sockets drop frames while peers are missing.
    let first = loop {
        match producer.send(caps()).await {
            Ok(()) => {}
            Err(StageError::Channel(ChannelError::WouldBlock)) => {}
            Err(e) => panic!("producer send: {e}"),
        }
        match tokio::time::timeout(Duration::from_millis(50), recv_message(&mut consumer)).await {
            Ok(message) => break message,
            Err(_) => continue,
        }
    };
    assert_eq!(first, caps());

    producer.send(buffer()).await.expect("send buffer");
    producer
        .send(Message::EndOfStream)
        .await
        .expect("send eos");

    // Skip the duplicate caps from the handshake retries.
    let mut message = recv_message(&mut consumer).await;
    while message == caps() {
        message = recv_message(&mut consumer).await;
    }
    assert_eq!(message, buffer());
    assert_eq!(recv_message(&mut consumer).await, Message::EndOfStream);

    // The inbound end-of-stream ends the relay.
    tokio::time::timeout(Duration::from_secs(5), stage_handle)
        .await
        .expect("stage must end with the stream")
        .expect("join")
        .expect("run");

    consumer.stop().await.expect("consumer stop");
    producer.stop().await.expect("producer stop");
}
