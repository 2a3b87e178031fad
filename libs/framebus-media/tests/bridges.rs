use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use framebus_media::error::BridgeError;
use framebus_media::sink::{MediaSink, SinkFrame, run_sink_bridge};
use framebus_media::source::{MediaSource, SourceEvent, run_source_bridge};
use framebus_proto::message::{Buffer, BufferMeta, Caps, CustomMeta, Message};
use framebus_stage::error::StageError;
use framebus_stage::reader::{Recv, TypedReader};
use framebus_stage::writer::TypedWriter;

fn caps() -> Caps {
    Caps {
        caps_str: "video/x-raw".to_string(),
        width: 8,
        height: 8,
        format: Some("RGB".to_string()),
        fps_n: None,
        fps_d: None,
        framerate: None,
    }
}

fn meta(pts: u64) -> BufferMeta {
    BufferMeta {
        pts,
        width: 8,
        height: 8,
        flags: 0,
        dts: None,
        duration: Some(33),
        caps_str: None,
    }
}

struct ScriptSource {
    events: VecDeque<SourceEvent>,
}

impl MediaSource for ScriptSource {
    fn next_event(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<SourceEvent, BridgeError>> + Send + '_>> {
        let event = self
            .events
            .pop_front()
            .ok_or_else(|| BridgeError::element("source drained past end-of-stream"));
        Box::pin(async move { event })
    }
}

#[derive(Clone)]
struct CollectWriter {
    sent: Arc<Mutex<Vec<Message>>>,
}

impl TypedWriter for CollectWriter {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn send(
        &mut self,
        message: Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        self.sent.lock().expect("lock").push(message);
        Box::pin(async { Ok(()) })
    }
}

struct ScriptReader {
    script: VecDeque<Result<Recv, StageError>>,
}

impl TypedReader for ScriptReader {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Recv, StageError>> + Send + '_>> {
        let next = self.script.pop_front().unwrap_or(Ok(Recv::Closed));
        Box::pin(async move { next })
    }
}

#[derive(Default)]
struct RecordingSink {
    caps: Vec<Caps>,
    frames: Vec<SinkFrame>,
    eos: usize,
}

impl MediaSink for RecordingSink {
    fn set_caps(
        &mut self,
        caps: Caps,
    ) -> Pin<Box<dyn Future<Output = Result<(), BridgeError>> + Send + '_>> {
        self.caps.push(caps);
        Box::pin(async { Ok(()) })
    }

    fn render(
        &mut self,
        frame: SinkFrame,
    ) -> Pin<Box<dyn Future<Output = Result<(), BridgeError>> + Send + '_>> {
        self.frames.push(frame);
        Box::pin(async { Ok(()) })
    }

    fn eos(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BridgeError>> + Send + '_>> {
        self.eos += 1;
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test]
async fn source_bridge_maps_events_to_messages() {
    let mut source = ScriptSource {
        events: VecDeque::from([
            SourceEvent::Caps(caps()),
            SourceEvent::Frame {
                meta: meta(100),
                custom: None,
                payload: Bytes::from_static(b"abcd"),
            },
            SourceEvent::Eos,
        ]),
    };
    let mut writer = CollectWriter {
        sent: Arc::new(Mutex::new(Vec::new())),
    };

    run_source_bridge(&mut source, &mut writer)
        .await
        .expect("bridge");

    let sent = writer.sent.lock().expect("lock").clone();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0], Message::Caps(caps()));
    assert_eq!(
        sent[1],
        Message::Buffer(Buffer {
            meta: Some(meta(100)),
            custom: None,
            payload: Bytes::from_static(b"abcd"),
        })
    );
    assert_eq!(sent[2], Message::EndOfStream);
}

#[tokio::test]
async fn sink_bridge_maps_messages_to_callbacks() {
    let mut custom = serde_json::Map::new();
    custom.insert("objects".to_string(), serde_json::json!([1, 2]));

    let mut reader = ScriptReader {
        script: VecDeque::from([
            Ok(Recv::Got(Message::Caps(caps()))),
            Ok(Recv::Empty),
            Ok(Recv::Got(Message::Buffer(Buffer {
                meta: Some(meta(7)),
                custom: Some(CustomMeta(custom.clone())),
                payload: Bytes::from_static(b"xyz"),
            }))),
            // Standalone metas have no native mapping and are skipped.
            Ok(Recv::Got(Message::BufferMeta(meta(8)))),
            Ok(Recv::Got(Message::EndOfStream)),
        ]),
    };
    let mut sink = RecordingSink::default();

    run_sink_bridge(&mut reader, &mut sink).await.expect("bridge");

    assert_eq!(sink.caps.len(), 1);
    assert_eq!(sink.caps[0].caps_str, "video/x-raw");
    assert_eq!(sink.frames.len(), 1);
    assert_eq!(sink.frames[0].pts, 7);
    assert_eq!(sink.frames[0].payload, Bytes::from_static(b"xyz"));
    let annotation = sink.frames[0].annotation.as_ref().expect("annotation");
    let decoded: serde_json::Value = serde_json::from_slice(annotation).expect("json");
    assert_eq!(decoded["objects"], serde_json::json!([1, 2]));
    assert_eq!(sink.eos, 1);
}

#[tokio::test]
async fn sink_bridge_ends_quietly_on_closed_channel() {
    let mut reader = ScriptReader {
        script: VecDeque::from([Ok(Recv::Got(Message::Caps(caps()))), Ok(Recv::Closed)]),
    };
    let mut sink = RecordingSink::default();

    run_sink_bridge(&mut reader, &mut sink).await.expect("bridge");

    assert_eq!(sink.caps.len(), 1);
    assert_eq!(sink.eos, 0);
}
