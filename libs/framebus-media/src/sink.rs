use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use framebus_proto::message::{Buffer, BufferMeta, Caps, Message};
use framebus_stage::error::StageError;
use framebus_stage::reader::{Recv, TypedReader};

use crate::error::BridgeError;

/// One timestamped frame handed to the media framework sink element.
/// Custom meta rides along serialized as an opaque binary annotation.
pub struct SinkFrame {
    pub pts: u64,
    pub dts: Option<u64>,
    pub duration: Option<u64>,
    pub flags: u32,
    pub payload: Bytes,
    pub annotation: Option<Bytes>,
}

/// The media framework side of an egress bridge. Implemented by sink
/// elements; the core only consumes this contract.
pub trait MediaSink: Send {
    /// Caps set or renegotiate the element's output capabilities.
    fn set_caps(
        &mut self,
        caps: Caps,
    ) -> Pin<Box<dyn Future<Output = Result<(), BridgeError>> + Send + '_>>;

    fn render(
        &mut self,
        frame: SinkFrame,
    ) -> Pin<Box<dyn Future<Output = Result<(), BridgeError>> + Send + '_>>;

    /// Propagate end-of-stream downstream.
    fn eos(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BridgeError>> + Send + '_>>;
}

/// Drain a typed reader into a media sink until end-of-stream.
///
/// Malformed frames are logged and skipped; a closed channel counts as
/// stream end without the eos callback. The reader is started here and
/// stopped on every exit path.
pub async fn run_sink_bridge(
    reader: &mut dyn TypedReader,
    sink: &mut dyn MediaSink,
) -> Result<(), BridgeError> {
    reader.start().await?;
    let result = pump(reader, sink).await;
    if let Err(e) = reader.stop().await {
        tracing::warn!(error = %e, "failed to stop bridge reader");
    }
    result
}

async fn pump(reader: &mut dyn TypedReader, sink: &mut dyn MediaSink) -> Result<(), BridgeError> {
    loop {
        match reader.recv().await {
            Ok(Recv::Empty) => {}
            Ok(Recv::Closed) => {
                tracing::info!("channel closed before end-of-stream");
                return Ok(());
            }
            Ok(Recv::Got(message)) => match message {
                Message::Caps(caps) => sink.set_caps(caps).await?,
                Message::Buffer(buffer) => sink.render(sink_frame(buffer)?).await?,
                Message::EndOfStream => {
                    sink.eos().await?;
                    return Ok(());
                }
                other => {
                    // Standalone metas have no native buffer shape.
                    tracing::debug!(tag = ?other.tag(), "message without a native mapping skipped");
                }
            },
            Err(StageError::Malformed(e)) => {
                tracing::warn!(error = %e, "malformed frame skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn sink_frame(buffer: Buffer) -> Result<SinkFrame, BridgeError> {
    let annotation = match &buffer.custom {
        Some(custom) => Some(Bytes::from(
            serde_json::to_vec(custom).map_err(|e| StageError::Malformed(e.into()))?,
        )),
        None => None,
    };
    let meta = buffer.meta.unwrap_or(BufferMeta {
        pts: 0,
        width: 0,
        height: 0,
        flags: 0,
        dts: None,
        duration: None,
        caps_str: None,
    });
    Ok(SinkFrame {
        pts: meta.pts,
        dts: meta.dts,
        duration: meta.duration,
        flags: meta.flags,
        payload: buffer.payload,
        annotation,
    })
}
